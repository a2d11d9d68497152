//! Controller lifecycle state machine.
//!
//! The host drives the controller through install and activate; the controller
//! never schedules its own transitions. Fetches are only intercepted once
//! active.

use serde::Serialize;

use crate::error::{Result, WorkerError};

/// Lifecycle state of the offline controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Nothing cached yet, or the last install failed.
    #[default]
    Uninstalled,
    /// Static assets are being precached.
    Installing,
    /// Installed, waiting to be activated.
    Waiting,
    /// Stale caches are being removed.
    Activating,
    /// Serving fetches.
    Active,
}

/// Events that move the controller between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BeginInstall,
    InstallSucceeded,
    InstallFailed,
    BeginActivate,
    ActivateCompleted,
    /// A previous activation was found in persisted caches.
    Resume,
}

impl Transition {
    fn as_str(&self) -> &'static str {
        match self {
            Transition::BeginInstall => "install",
            Transition::InstallSucceeded => "install success",
            Transition::InstallFailed => "install failure",
            Transition::BeginActivate => "activate",
            Transition::ActivateCompleted => "activate completion",
            Transition::Resume => "resume",
        }
    }
}

impl WorkerState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
        }
    }

    /// Returns true if fetches should be intercepted in this state.
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Active)
    }

    /// Applies a transition, rejecting events that do not fit the current state.
    pub fn transition(self, event: Transition) -> Result<WorkerState> {
        use Transition::*;
        use WorkerState::*;

        match (self, event) {
            (Uninstalled, BeginInstall) => Ok(Installing),
            (Installing, InstallSucceeded) => Ok(Waiting),
            (Installing, InstallFailed) => Ok(Uninstalled),
            (Waiting, BeginActivate) => Ok(Activating),
            (Activating, ActivateCompleted) => Ok(Active),
            (Uninstalled, Resume) => Ok(Active),
            (state, event) => Err(WorkerError::invalid_state(event.as_str(), state)),
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
