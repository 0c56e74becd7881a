//! Handle table: symbolic names resolved to engine handles, once per episode.
//!
//! Resolution is gated on the engine reporting its exchange surface as
//! fully populated. Before that point [`resolve`] is a no-op that returns
//! `Ok(None)`; the caller retries at every later callback. Once every
//! declaration resolves, the resulting [`HandleTable`] is frozen for the
//! rest of the episode and is never queried against the engine again.

use indexmap::IndexMap;

use simbridge_core::{DataExchange, Handle, HandleError, HandleKind, HandleSpec};

/// One resolved entry of a [`HandleTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedHandle {
    /// Declared kind.
    pub kind: HandleKind,
    /// Engine handle, valid for the engine state that produced it.
    pub handle: Handle,
}

/// Frozen `name → handle` mapping for one engine run.
///
/// Entries keep declaration order, which fixes the observation layout and
/// the actuator order actions are applied in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandleTable {
    entries: IndexMap<String, ResolvedHandle>,
}

impl HandleTable {
    /// Number of resolved handles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look a handle up by declared name.
    pub fn get(&self, name: &str) -> Option<ResolvedHandle> {
        self.entries.get(name).copied()
    }

    /// All entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ResolvedHandle)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Entries of one kind, in declaration order.
    pub fn of_kind(&self, kind: HandleKind) -> impl Iterator<Item = (&str, Handle)> {
        self.entries
            .iter()
            .filter(move |(_, r)| r.kind == kind)
            .map(|(k, r)| (k.as_str(), r.handle))
    }

    /// `name → handle` map for one kind, for diagnostics.
    pub fn kind_map(&self, kind: HandleKind) -> IndexMap<String, Handle> {
        self.of_kind(kind)
            .map(|(k, h)| (k.to_string(), h))
            .collect()
    }

    /// Number of actuator handles.
    pub fn actuator_count(&self) -> usize {
        self.of_kind(HandleKind::Actuator).count()
    }
}

/// Resolve every declaration against the engine.
///
/// Returns `Ok(None)` without touching the engine when the exchange
/// surface is not ready yet. Returns [`HandleError::Unresolved`] for the
/// first declaration whose raw handle fails its kind's validity check.
pub fn resolve(
    specs: &[HandleSpec],
    exchange: &mut dyn DataExchange,
) -> Result<Option<HandleTable>, HandleError> {
    if !exchange.api_data_fully_ready() {
        return Ok(None);
    }

    let mut entries = IndexMap::with_capacity(specs.len());
    for spec in specs {
        let raw = exchange.resolve_handle(spec.kind, &spec.selectors);
        if !spec.kind.is_valid(raw) {
            return Err(HandleError::Unresolved {
                name: spec.name.clone(),
                kind: spec.kind,
                raw,
            });
        }
        entries.insert(
            spec.name.clone(),
            ResolvedHandle {
                kind: spec.kind,
                handle: Handle(raw),
            },
        );
    }
    Ok(Some(HandleTable { entries }))
}
