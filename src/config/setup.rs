//! Setup session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and presentation settings shared by every setup session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Prefix shown in the status message instructions
    pub command_prefix: String,
    /// A session aborts when no command is accepted for this long
    pub inactivity_timeout_seconds: u64,
    /// Warn this long before the inactivity timeout (0 disables the warning)
    pub inactivity_warning_seconds: u64,
    /// How long an invitee has to type `accept`
    pub invite_timeout_seconds: u64,
    /// How long the issuer has to confirm a destructive variant change
    pub confirmation_timeout_seconds: u64,
    /// Capacity of each session's command channel
    pub command_buffer: usize,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            command_prefix: "gm!".to_string(),
            inactivity_timeout_seconds: 120,
            inactivity_warning_seconds: 15,
            invite_timeout_seconds: 30,
            confirmation_timeout_seconds: 10,
            command_buffer: 32,
        }
    }
}

impl SetupConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_seconds)
    }

    pub fn inactivity_warning(&self) -> Duration {
        Duration::from_secs(self.inactivity_warning_seconds)
    }

    pub fn invite_timeout(&self) -> Duration {
        Duration::from_secs(self.invite_timeout_seconds)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds)
    }
}
