//! Orchestrator state and background completion messages.

use refine_types::OptimizationResult;

use crate::catalog::ModelCatalog;

/// Optimization lifecycle.
///
/// `Dispatching` never outlives a single `trigger_optimization` call; it exists
/// so the busy surface is set before the task is spawned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    Idle,
    Dispatching {
        model: String,
    },
    AwaitingResult {
        model: String,
    },
}

impl OperationState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn in_flight_model(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Dispatching { model } | Self::AwaitingResult { model } => Some(model),
        }
    }
}

/// Catalog refresh lifecycle. `generation` identifies the newest refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshState {
    #[default]
    Idle,
    Fetching {
        generation: u64,
    },
}

/// Posted exactly once by each background task; applied only by the frame loop.
#[derive(Debug)]
pub enum Completion {
    Optimization(OptimizationResult),
    Catalog {
        generation: u64,
        catalog: ModelCatalog,
        error: Option<String>,
    },
}

/// Why a trigger did or did not dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Dispatched,
    EmptyInput,
    /// The credential prompt was opened instead.
    CredentialMissing,
    /// Selected entry is unknown or a sentinel.
    NoModel,
    Busy,
}
