use std::collections::HashMap;
use std::hash::Hash;

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Confirmed,
    RolledBack { reason: String },
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }
}

impl std::fmt::Display for MutationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationState::Idle => write!(f, "idle"),
            MutationState::Pending => write!(f, "pending"),
            MutationState::Confirmed => write!(f, "confirmed"),
            MutationState::RolledBack { reason } => write!(f, "rolled back: {}", reason),
        }
    }
}

/// Mutation state per entity key.
///
/// Requests on the same key are not serialized: `begin` always restarts the
/// key at Pending and whichever response settles last is what remains.
#[derive(Debug, Clone)]
pub struct MutationTracker<K> {
    states: HashMap<K, MutationState>,
}

impl<K> Default for MutationTracker<K> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> MutationTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &K) -> MutationState {
        self.states.get(key).cloned().unwrap_or_default()
    }

    pub fn begin(&mut self, key: K) {
        self.states.insert(key, MutationState::Pending);
    }

    pub fn confirm(&mut self, key: K) {
        self.states.insert(key, MutationState::Confirmed);
    }

    pub fn roll_back(&mut self, key: K, reason: impl Into<String>) {
        self.states.insert(
            key,
            MutationState::RolledBack {
                reason: reason.into(),
            },
        );
    }
}
