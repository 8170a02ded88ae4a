//! Domain types for the daemon: the transition direction and the validated
//! runtime configuration.

pub mod config;

use serde::{Deserialize, Serialize};

/// The two symmetric transition directions.
///
/// "Host" hands the peripherals back to the physical machine (displays to
/// their host inputs, devices detached from the guest); "guest" hands them to
/// the virtual machine.  There is no third state and no tracked current
/// state — re-issuing a direction is safe because device reconciliation is
/// idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Host,
    Guest,
}

impl Direction {
    /// The wire spelling used in the HTTP API and the configuration file.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Host => "host",
            Direction::Guest => "guest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_deserializes_from_lowercase_wire_form() {
        let host: Direction = serde_json::from_str("\"host\"").unwrap();
        let guest: Direction = serde_json::from_str("\"guest\"").unwrap();
        assert_eq!(host, Direction::Host);
        assert_eq!(guest, Direction::Guest);
    }

    #[test]
    fn test_direction_rejects_unknown_values() {
        assert!(serde_json::from_str::<Direction>("\"sideways\"").is_err());
    }
}
