use thiserror::Error;

use crate::state::UnitState;

/// Errors raised by the unit-of-work state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("illegal unit-of-work transition: {from} -> {to}")]
    IllegalTransition { from: UnitState, to: UnitState },
}
