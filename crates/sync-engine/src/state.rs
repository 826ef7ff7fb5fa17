//! Per-mapping run state machine.
//!
//! ```text
//! Pending -> Reconciling -> Extracting -> Loading -> Committing -> Done
//!    \___________\_____________\____________\___________\-> Failed
//! ```
//!
//! The only state that carries a committed watermark is `Done`. Every
//! failure path ends in `Failed`, which by construction never does.

use serde::Serialize;
use std::fmt;
use sync_core::WatermarkValue;
use tracing::debug;

/// Non-terminal phases, also used to report where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Reconciling,
    Extracting,
    Loading,
    Committing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Reconciling => "reconciling",
            Self::Extracting => "extracting",
            Self::Loading => "loading",
            Self::Committing => "committing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MappingState {
    Pending,
    Reconciling,
    Extracting {
        lower: Option<WatermarkValue>,
        upper: Option<WatermarkValue>,
    },
    Loading {
        rows_extracted: u64,
        next_watermark: Option<WatermarkValue>,
    },
    Committing {
        rows_loaded: u64,
        next_watermark: Option<WatermarkValue>,
    },
    Done {
        /// The watermark written by this run; None when nothing advanced
        committed: Option<WatermarkValue>,
    },
    Failed {
        phase: Phase,
    },
}

impl MappingState {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Pending => Some(Phase::Pending),
            Self::Reconciling => Some(Phase::Reconciling),
            Self::Extracting { .. } => Some(Phase::Extracting),
            Self::Loading { .. } => Some(Phase::Loading),
            Self::Committing { .. } => Some(Phase::Committing),
            Self::Done { .. } | Self::Failed { .. } => None,
        }
    }

    /// Lowercase state name for reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
            Self::Pending => "pending",
            Self::Reconciling => "reconciling",
            Self::Extracting { .. } => "extracting",
            Self::Loading { .. } => "loading",
            Self::Committing { .. } => "committing",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_none()
    }

    pub fn watermark_committed(&self) -> bool {
        matches!(self, Self::Done { committed: Some(_) })
    }

    fn can_transition_to(&self, next: &MappingState) -> bool {
        use MappingState::*;
        matches!(
            (self, next),
            (Pending, Reconciling)
                | (Reconciling, Extracting { .. })
                | (Extracting { .. }, Loading { .. })
                | (Loading { .. }, Committing { .. })
                | (Committing { .. }, Done { .. })
        ) || (!self.is_terminal() && matches!(next, Failed { .. }))
    }
}

/// Tracks one mapping through a run.
#[derive(Debug)]
pub struct MappingRun {
    mapping: String,
    state: MappingState,
}

impl MappingRun {
    pub fn new(mapping: impl Into<String>) -> Self {
        Self {
            mapping: mapping.into(),
            state: MappingState::Pending,
        }
    }

    pub fn state(&self) -> &MappingState {
        &self.state
    }

    /// Moves to `next`. Illegal transitions are programming errors.
    pub fn advance(&mut self, next: MappingState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Mapping '{}': {:?} -> {:?}", self.mapping, self.state, next);
        self.state = next;
    }

    /// Moves to `Failed`, remembering the phase that failed. Returns that
    /// phase, or None if the run had already terminated.
    pub fn fail(&mut self) -> Option<Phase> {
        let phase = self.state.phase()?;
        self.advance(MappingState::Failed { phase });
        Some(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_commits_only_at_done() {
        let mut run = MappingRun::new("users");
        run.advance(MappingState::Reconciling);
        run.advance(MappingState::Extracting {
            lower: None,
            upper: None,
        });
        run.advance(MappingState::Loading {
            rows_extracted: 3,
            next_watermark: Some(WatermarkValue::Integer(3)),
        });
        run.advance(MappingState::Committing {
            rows_loaded: 3,
            next_watermark: Some(WatermarkValue::Integer(3)),
        });
        assert!(!run.state().watermark_committed());
        run.advance(MappingState::Done {
            committed: Some(WatermarkValue::Integer(3)),
        });
        assert!(run.state().watermark_committed());
        assert!(run.state().is_terminal());
        assert_eq!(run.fail(), None);
    }

    #[test]
    fn test_failure_from_committing_is_not_committed() {
        let mut run = MappingRun::new("users");
        run.advance(MappingState::Reconciling);
        run.advance(MappingState::Extracting {
            lower: None,
            upper: None,
        });
        run.advance(MappingState::Loading {
            rows_extracted: 1,
            next_watermark: None,
        });
        run.advance(MappingState::Committing {
            rows_loaded: 1,
            next_watermark: None,
        });
        assert_eq!(run.fail(), Some(Phase::Committing));
        assert_eq!(
            run.state(),
            &MappingState::Failed {
                phase: Phase::Committing
            }
        );
        assert!(!run.state().watermark_committed());
    }

    #[test]
    fn test_transition_table() {
        assert!(MappingState::Pending.can_transition_to(&MappingState::Reconciling));
        assert!(!MappingState::Pending.can_transition_to(&MappingState::Done { committed: None }));
        assert!(MappingState::Reconciling.can_transition_to(&MappingState::Failed {
            phase: Phase::Reconciling
        }));
        assert!(!MappingState::Done { committed: None }.can_transition_to(&MappingState::Failed {
            phase: Phase::Pending
        }));
    }
}
