//! Environment configuration, validation, and error types.
//!
//! [`EnvConfig`] is the input for constructing a [`BridgeEnv`](crate::env::BridgeEnv)
//! or a bare [`RunSupervisor`](crate::supervisor::RunSupervisor).
//! [`validate()`](EnvConfig::validate) checks structural invariants once,
//! before the first engine state is created.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use simbridge_core::{EngineError, HandleKind, HandleSpec};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating or applying an [`EnvConfig`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// No handles declared.
    NoHandles,
    /// Two handles share a name.
    DuplicateHandle {
        /// The repeated name.
        name: String,
    },
    /// A handle declaration failed structural validation.
    InvalidHandle {
        /// Description of the validation failure.
        reason: String,
    },
    /// The building model file does not exist.
    MissingModel {
        /// The configured path.
        path: PathBuf,
    },
    /// The weather file does not exist.
    MissingWeather {
        /// The configured path.
        path: PathBuf,
    },
    /// The output directory path is empty.
    MissingOutputDir,
    /// The episode output directory could not be created.
    OutputDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error text.
        reason: String,
    },
    /// `step_timeout` is zero.
    InvalidTimeout,
    /// The engine library refused to create a state.
    Engine(EngineError),
    /// The engine thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHandles => write!(f, "no handles declared"),
            Self::DuplicateHandle { name } => write!(f, "handle name '{name}' declared twice"),
            Self::InvalidHandle { reason } => write!(f, "invalid handle: {reason}"),
            Self::MissingModel { path } => {
                write!(f, "model file not found: {}", path.display())
            }
            Self::MissingWeather { path } => {
                write!(f, "weather file not found: {}", path.display())
            }
            Self::MissingOutputDir => write!(f, "output_dir must not be empty"),
            Self::OutputDir { path, reason } => {
                write!(f, "cannot create {}: {reason}", path.display())
            }
            Self::InvalidTimeout => write!(f, "step_timeout must be non-zero"),
            Self::Engine(e) => write!(f, "engine: {e}"),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "thread spawn failed: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for ConfigError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

// ── EnvConfig ──────────────────────────────────────────────────────

/// Complete configuration for one environment.
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// Environment name; prefixes episode directories and thread names.
    pub name: String,
    /// Engine values exchanged with the controller, in declaration order.
    pub handles: Vec<HandleSpec>,
    /// Building model passed to the engine.
    pub model_path: PathBuf,
    /// Weather file passed to the engine.
    pub weather_path: PathBuf,
    /// Parent of the per-episode output directories.
    pub output_dir: PathBuf,
    /// Deadline for each handoff operation in `step`. Default: 2s.
    pub step_timeout: Duration,
    /// Let the engine print to the console. Default: false.
    pub console_output: bool,
}

impl EnvConfig {
    /// Configuration with default timing and console settings.
    pub fn new(
        name: impl Into<String>,
        model_path: impl Into<PathBuf>,
        weather_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            handles: Vec::new(),
            model_path: model_path.into(),
            weather_path: weather_path.into(),
            output_dir: output_dir.into(),
            step_timeout: Duration::from_secs(2),
            console_output: false,
        }
    }

    /// Append one handle declaration.
    pub fn with_handle(mut self, spec: HandleSpec) -> Self {
        self.handles.push(spec);
        self
    }

    /// Override the per-step handoff deadline.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one handle, each well-formed, names unique.
        if self.handles.is_empty() {
            return Err(ConfigError::NoHandles);
        }
        let mut seen = HashSet::with_capacity(self.handles.len());
        for spec in &self.handles {
            spec.validate()
                .map_err(|reason| ConfigError::InvalidHandle { reason })?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateHandle {
                    name: spec.name.clone(),
                });
            }
        }
        // 2. Input files exist.
        if !self.model_path.is_file() {
            return Err(ConfigError::MissingModel {
                path: self.model_path.clone(),
            });
        }
        if !self.weather_path.is_file() {
            return Err(ConfigError::MissingWeather {
                path: self.weather_path.clone(),
            });
        }
        // 3. Output parent is named; it is created on demand.
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingOutputDir);
        }
        // 4. Handoff deadline.
        if self.step_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Number of actuator declarations, i.e. the expected action length.
    pub fn action_len(&self) -> usize {
        self.handles
            .iter()
            .filter(|s| s.kind == HandleKind::Actuator)
            .count()
    }

    /// Output directory for episode `episode`: `<output_dir>/<name><episode>`.
    pub fn episode_output_dir(&self, episode: u64) -> PathBuf {
        self.output_dir.join(format!("{}{episode}", self.name))
    }

    /// Command-line arguments for one engine run.
    pub fn engine_args(&self, episode_dir: &Path) -> Vec<String> {
        vec![
            "-w".to_string(),
            self.weather_path.display().to_string(),
            "-d".to_string(),
            episode_dir.display().to_string(),
            self.model_path.display().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbridge_test_utils::TempInputs;

    fn valid_config(inputs: &TempInputs) -> EnvConfig {
        EnvConfig::new(
            "office",
            inputs.model_path(),
            inputs.weather_path(),
            inputs.output_dir(),
        )
        .with_handle(HandleSpec::variable(
            "oat",
            "Site Outdoor Air Drybulb Temperature",
            "Environment",
        ))
        .with_handle(HandleSpec::actuator(
            "cool_sp",
            "Schedule:Constant",
            "Schedule Value",
            "Cooling SP",
        ))
    }

    #[test]
    fn validate_valid_config_succeeds() {
        let inputs = TempInputs::new("config-valid");
        assert!(valid_config(&inputs).validate().is_ok());
    }

    #[test]
    fn validate_no_handles_fails() {
        let inputs = TempInputs::new("config-nohandles");
        let mut cfg = valid_config(&inputs);
        cfg.handles.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoHandles));
    }

    #[test]
    fn validate_duplicate_name_fails() {
        let inputs = TempInputs::new("config-dup");
        let cfg = valid_config(&inputs).with_handle(HandleSpec::meter("oat", "Electricity:Facility"));
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicateHandle { name: "oat".into() })
        );
    }

    #[test]
    fn validate_bad_arity_fails() {
        let inputs = TempInputs::new("config-arity");
        let mut cfg = valid_config(&inputs);
        cfg.handles[0].selectors.pop();
        match cfg.validate() {
            Err(ConfigError::InvalidHandle { reason }) => {
                assert!(reason.contains("needs 2 selectors"), "{reason}")
            }
            other => panic!("expected InvalidHandle, got {other:?}"),
        }
    }

    #[test]
    fn validate_missing_files_fail() {
        let inputs = TempInputs::new("config-missing");
        let mut cfg = valid_config(&inputs);
        cfg.model_path = inputs.output_dir().join("nope.idf");
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingModel { .. })));

        let mut cfg = valid_config(&inputs);
        cfg.weather_path = inputs.output_dir().join("nope.epw");
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingWeather { .. })));

        let mut cfg = valid_config(&inputs);
        cfg.output_dir = PathBuf::new();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingOutputDir));
    }

    #[test]
    fn validate_zero_timeout_fails() {
        let inputs = TempInputs::new("config-timeout");
        let cfg = valid_config(&inputs).with_step_timeout(Duration::ZERO);
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidTimeout));
    }

    #[test]
    fn engine_args_and_episode_dir() {
        let cfg = EnvConfig::new("office", "/m/model.idf", "/w/weather.epw", "/out");
        let dir = cfg.episode_output_dir(3);
        assert_eq!(dir, PathBuf::from("/out/office3"));
        assert_eq!(
            cfg.engine_args(&dir),
            ["-w", "/w/weather.epw", "-d", "/out/office3", "/m/model.idf"]
        );
    }

    #[test]
    fn action_len_counts_actuators() {
        let inputs = TempInputs::new("config-actlen");
        assert_eq!(valid_config(&inputs).action_len(), 1);
    }
}
