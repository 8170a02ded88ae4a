//! Monitor input-source switching over DDC/CI.
//!
//! Each configured display is addressed by its I2C bus number and driven with
//! one `ddcutil setvcp` invocation per transition:
//!
//! ```text
//! ddcutil --bus 3 setvcp 0x60 0x12
//! ```
//!
//! Calls are independent and best-effort: a monitor that is off or slow to
//! answer DDC must not prevent the remaining displays from switching, and
//! never fails the transition.  The exit outcome is returned for observation
//! and logged, nothing more.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::config::DisplayTarget;
use crate::infrastructure::commands::{execute, CommandOutcome};

/// Drives display input sources via external `ddcutil` calls.
#[derive(Debug, Clone)]
pub struct DisplaySwitcher {
    use_sudo: bool,
    timeout: Duration,
}

impl DisplaySwitcher {
    pub fn new(use_sudo: bool, timeout: Duration) -> Self {
        Self { use_sudo, timeout }
    }

    /// Sets one display's VCP feature to `value` (a host- or guest-input
    /// code).
    ///
    /// Feature and value are passed in `0x`-prefixed hex, the form ddcutil
    /// documents.  A non-zero exit is logged at warn level and returned, but
    /// is not an error.
    // The parameter is deliberately not named `display`: the tracing event
    // macros bring `tracing::field::display` into scope and would shadow it.
    pub async fn set_input(&self, target: &DisplayTarget, value: u16) -> CommandOutcome {
        let command = self.build_command(target, value);

        debug!(
            bus = target.bus,
            feature = format_args!("{:#x}", target.feature),
            value = format_args!("{:#x}", value),
            "switching display input"
        );

        let outcome = execute(command, self.timeout).await;
        if !outcome.success() {
            warn!(bus = target.bus, ?outcome, "ddcutil call did not succeed");
        }
        outcome
    }

    fn build_command(&self, target: &DisplayTarget, value: u16) -> Command {
        let mut command = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("ddcutil");
            c
        } else {
            Command::new("ddcutil")
        };

        command
            .arg("--bus")
            .arg(target.bus.to_string())
            .arg("setvcp")
            .arg(format!("{:#x}", target.feature))
            .arg(format!("{:#x}", value));
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> DisplayTarget {
        DisplayTarget {
            bus: 3,
            feature: 0x60,
            host: 0x0f,
            guest: 0x12,
        }
    }

    fn argv(command: &Command) -> Vec<String> {
        let inner = command.as_std();
        std::iter::once(inner.get_program())
            .chain(inner.get_args())
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_line_without_sudo() {
        let switcher = DisplaySwitcher::new(false, Duration::from_secs(5));
        let command = switcher.build_command(&target(), 0x12);
        assert_eq!(
            argv(&command),
            vec!["ddcutil", "--bus", "3", "setvcp", "0x60", "0x12"]
        );
    }

    #[test]
    fn test_command_line_with_sudo_prefixes_ddcutil() {
        let switcher = DisplaySwitcher::new(true, Duration::from_secs(5));
        let command = switcher.build_command(&target(), 0x0f);
        assert_eq!(
            argv(&command),
            vec!["sudo", "ddcutil", "--bus", "3", "setvcp", "0x60", "0xf"]
        );
    }
}
