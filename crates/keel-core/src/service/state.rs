use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::service::error::ServiceStateError;

/// The four lifecycle states of a registered service.
///
/// `Stopped` is both the initial state of a freshly registered service and
/// the terminal state of a completed stop. There is no failure state: a
/// failed start reverts the service to `Stopped` and the error is reported
/// through the monitors.
///
/// Each state carries a stable index 0-3 usable for compact external
/// representations; the upper-case names parse back case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceState {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ServiceState {
    /// Stable integer index of this state (0-3).
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Resolve a state from its stable index.
    pub fn from_index(index: u32) -> Result<Self, ServiceStateError> {
        match index {
            0 => Ok(ServiceState::Starting),
            1 => Ok(ServiceState::Running),
            2 => Ok(ServiceState::Stopping),
            3 => Ok(ServiceState::Stopped),
            other => Err(ServiceStateError::InvalidIndex(other)),
        }
    }

    /// The canonical upper-case name of this state.
    pub fn name(self) -> &'static str {
        match self {
            ServiceState::Starting => "STARTING",
            ServiceState::Running => "RUNNING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Stopped => "STOPPED",
        }
    }

    pub fn is_stopped(self) -> bool {
        self == ServiceState::Stopped
    }

    pub fn is_running(self) -> bool {
        self == ServiceState::Running
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceState {
    type Err = ServiceStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STARTING" => Ok(ServiceState::Starting),
            "RUNNING" => Ok(ServiceState::Running),
            "STOPPING" => Ok(ServiceState::Stopping),
            "STOPPED" => Ok(ServiceState::Stopped),
            _ => Err(ServiceStateError::UnknownName(s.to_string())),
        }
    }
}

impl Serialize for ServiceState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
