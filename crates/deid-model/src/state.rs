//! Unit-of-work lifecycle.
//!
//! One unit of work exists per (method, data source) pair. Its state moves
//! `Pending -> Ready` or `Pending -> Error`; re-validation moves a finished
//! unit back to `Pending`. Setting the current state again is a logged no-op.
//!
//! The method-level state is never stored. It is derived on read from all of
//! the method's units with [`aggregate_state`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    /// Validated, queued or running.
    Pending,
    /// Transformation succeeded.
    Ready,
    /// Validation or execution failed.
    Error,
}

impl UnitState {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::Ready => "ready",
            UnitState::Error => "error",
        }
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// Same-state "transitions" are not edges; callers treat them as no-ops.
    pub fn can_transition_to(self, next: UnitState) -> bool {
        matches!(
            (self, next),
            (UnitState::Pending, UnitState::Ready)
                | (UnitState::Pending, UnitState::Error)
                | (UnitState::Ready, UnitState::Pending)
                | (UnitState::Error, UnitState::Pending)
        )
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a state change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied { from: UnitState, to: UnitState },
    Unchanged(UnitState),
}

/// Persistence callbacks used by the transformer to record outcomes.
pub trait StateSink: Send + Sync {
    fn set_pending(&self) -> Result<Transition, StateError>;
    fn set_ready(&self) -> Result<Transition, StateError>;
    fn set_error(&self) -> Result<Transition, StateError>;
}

/// In-memory unit of work for one (method, data source) pair.
#[derive(Debug)]
pub struct UnitOfWork {
    method_id: String,
    data_source_id: String,
    state: Mutex<UnitState>,
}

impl UnitOfWork {
    /// Create a unit in the `Pending` state.
    pub fn new(method_id: impl Into<String>, data_source_id: impl Into<String>) -> Self {
        Self {
            method_id: method_id.into(),
            data_source_id: data_source_id.into(),
            state: Mutex::new(UnitState::Pending),
        }
    }

    pub fn method_id(&self) -> &str {
        &self.method_id
    }

    pub fn data_source_id(&self) -> &str {
        &self.data_source_id
    }

    pub fn state(&self) -> UnitState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`, enforcing the transition table.
    pub fn transition(&self, next: UnitState) -> Result<Transition, StateError> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = *guard;
        if current == next {
            tracing::warn!(
                method = %self.method_id,
                data_source = %self.data_source_id,
                state = %current,
                "unit of work already in requested state"
            );
            return Ok(Transition::Unchanged(current));
        }
        if !current.can_transition_to(next) {
            return Err(StateError::IllegalTransition {
                from: current,
                to: next,
            });
        }
        *guard = next;
        tracing::debug!(
            method = %self.method_id,
            data_source = %self.data_source_id,
            from = %current,
            to = %next,
            "unit of work state changed"
        );
        Ok(Transition::Applied {
            from: current,
            to: next,
        })
    }

    /// Reset a finished unit to `Pending` so it can be re-run.
    pub fn revalidate(&self) -> Result<Transition, StateError> {
        self.transition(UnitState::Pending)
    }
}

impl StateSink for UnitOfWork {
    fn set_pending(&self) -> Result<Transition, StateError> {
        self.transition(UnitState::Pending)
    }

    fn set_ready(&self) -> Result<Transition, StateError> {
        self.transition(UnitState::Ready)
    }

    fn set_error(&self) -> Result<Transition, StateError> {
        self.transition(UnitState::Error)
    }
}

/// Derive a method's state from the states of all its units.
///
/// `Error` when at least one unit exists and none is `Ready`; otherwise
/// `Pending` while any unit is pending; otherwise `Ready`.
pub fn aggregate_state<I>(states: I) -> UnitState
where
    I: IntoIterator<Item = UnitState>,
{
    let mut total = 0usize;
    let mut ready = 0usize;
    let mut pending = 0usize;
    for state in states {
        total += 1;
        match state {
            UnitState::Ready => ready += 1,
            UnitState::Pending => pending += 1,
            UnitState::Error => {}
        }
    }
    if total > 0 && ready == 0 {
        UnitState::Error
    } else if pending > 0 {
        UnitState::Pending
    } else {
        UnitState::Ready
    }
}
