use anyhow::{bail, Result};

/// States of a single reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Start,
    CheckingExistence,
    Exists,
    Creating,
    ReconcilingPolicy,
    Done,
    Failed,
}

impl std::fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileState::Start => write!(f, "Start"),
            ReconcileState::CheckingExistence => write!(f, "CheckingExistence"),
            ReconcileState::Exists => write!(f, "Exists"),
            ReconcileState::Creating => write!(f, "Creating"),
            ReconcileState::ReconcilingPolicy => write!(f, "ReconcilingPolicy"),
            ReconcileState::Done => write!(f, "Done"),
            ReconcileState::Failed => write!(f, "Failed"),
        }
    }
}

/// Check if a state is terminal (no further transitions allowed)
pub fn is_terminal(state: &ReconcileState) -> bool {
    matches!(state, ReconcileState::Done | ReconcileState::Failed)
}

/// Check if a state transition is valid
pub fn is_valid_transition(from: &ReconcileState, to: &ReconcileState) -> bool {
    use ReconcileState::*;

    match (from, to) {
        (from, _) if is_terminal(from) => false,

        // Any step may fail
        (_, Failed) => true,

        (Start, CheckingExistence) => true,
        (CheckingExistence, Exists) => true,
        (CheckingExistence, Creating) => true,
        (Exists | Creating, ReconcilingPolicy) => true,
        (ReconcilingPolicy, Done) => true,

        _ => false,
    }
}

/// Validate a state transition and return an error if invalid
pub fn validate_transition(from: &ReconcileState, to: &ReconcileState) -> Result<()> {
    if !is_valid_transition(from, to) {
        bail!(
            "Invalid reconcile state transition from '{}' to '{}'",
            from,
            to
        );
    }
    Ok(())
}
