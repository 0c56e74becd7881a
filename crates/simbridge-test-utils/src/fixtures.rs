//! Filesystem fixtures.
//!
//! [`TempInputs`] creates a private temporary directory holding a
//! placeholder model, a placeholder weather file, and an empty output
//! directory. The whole tree is removed when it is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Model, weather, and output paths for one test.
pub struct TempInputs {
    dir: TempDir,
}

impl TempInputs {
    /// Create a fresh tree; `label` prefixes the directory name so a
    /// leftover tree can be traced back to its test.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory is not writable.
    pub fn new(label: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("simbridge-{label}-"))
            .tempdir()
            .expect("create temp dir");
        std::fs::create_dir(dir.path().join("out")).expect("create temp output dir");
        std::fs::write(dir.path().join("model.idf"), "Version,24.1;\n").expect("write model");
        std::fs::write(dir.path().join("weather.epw"), "LOCATION,Test\n").expect("write weather");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn model_path(&self) -> PathBuf {
        self.root().join("model.idf")
    }

    pub fn weather_path(&self) -> PathBuf {
        self.root().join("weather.epw")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("out")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_inputs_and_removes_them_on_drop() {
        let inputs = TempInputs::new("fixture");
        let root = inputs.root().to_path_buf();
        assert!(inputs.model_path().is_file());
        assert!(inputs.weather_path().is_file());
        assert!(inputs.output_dir().is_dir());
        assert!(root
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("simbridge-fixture-")));

        drop(inputs);
        assert!(!root.exists());
    }

    #[test]
    fn trees_are_distinct() {
        let a = TempInputs::new("same");
        let b = TempInputs::new("same");
        assert_ne!(a.root(), b.root());
    }
}
