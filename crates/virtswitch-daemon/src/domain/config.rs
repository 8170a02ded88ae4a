//! TOML-based configuration for the virtswitch daemon.
//!
//! The configuration is loaded once at startup and validated up front: every
//! missing or malformed required field is a [`ConfigError`] before the daemon
//! serves a single request, never a lazy failure at first use.  After load
//! the [`SwitchConfig`] value is immutable.
//!
//! Example:
//!
//! ```toml
//! [http]
//! address = "127.0.0.1:8800"
//!
//! [http.security]
//! enabled = true
//! secret = "s3cret"
//!
//! [[devices]]
//! vendor = "0x046d"
//! product = "0xc52b"
//!
//! [[displays]]
//! bus = 3
//! feature = 0x60
//! host = 0x0f
//! guest = 0x12
//!
//! [libvirt]
//! uri = "qemu:///system"
//! domain = "gaming"
//!
//! [commands]
//! host = ["pactl set-default-sink host-sink"]
//! guest = ["pactl set-default-sink guest-sink"]
//!
//! [kvm]
//! check_guest = true
//! use_sudo = false
//! ```
//!
//! The `address` string accepts both IPv4 (`127.0.0.1:8800`) and bracketed
//! IPv6 (`[::1]:8800`) forms via `SocketAddr` parsing.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use virtswitch_core::{DeviceIdentity, ParseIdError};

/// Fallback timeout for every external call (ddcutil, shell commands,
/// hypervisor operations) when the config does not override it.
const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 30;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A device entry carries a vendor or product id that is not valid
    /// 16-bit hexadecimal.
    #[error("device entry {index}: {source}")]
    InvalidDeviceId {
        index: usize,
        #[source]
        source: ParseIdError,
    },

    /// The same device identity appears twice in the device list.  Duplicates
    /// would make attach/detach counting ambiguous, so they are rejected at
    /// load time.
    #[error("duplicate device identity {0} in device list")]
    DuplicateDevice(DeviceIdentity),

    /// Security is enabled but the secret is empty.
    #[error("http.security.enabled is true but http.security.secret is empty")]
    EmptySecret,
}

// ── Validated config types ────────────────────────────────────────────────────

/// Top-level validated daemon configuration.
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    pub http: HttpConfig,
    /// The configured device set — the universe of devices the switch will
    /// ever attach or detach, in configuration order.
    pub devices: Vec<DeviceIdentity>,
    pub displays: Vec<DisplayTarget>,
    pub libvirt: LibvirtConfig,
    pub commands: CommandsConfig,
    pub kvm: KvmConfig,
}

/// Bind address and endpoint security.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub address: SocketAddr,
    pub security: SecurityConfig,
}

/// Shared-secret authentication for the control endpoint.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub secret: String,
}

/// One monitor reachable over DDC/CI.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct DisplayTarget {
    /// I2C bus number, as listed by `ddcutil detect`.
    pub bus: u32,
    /// VCP feature code; 0x60 is the standard input-source feature.
    pub feature: u8,
    /// Input-source value when the host owns the monitor.
    pub host: u16,
    /// Input-source value when the guest owns the monitor.
    pub guest: u16,
}

/// Hypervisor connection target.
#[derive(Debug, Clone, Deserialize)]
pub struct LibvirtConfig {
    /// libvirt connection URI, e.g. `qemu:///system`.
    pub uri: String,
    /// Name of the guest domain to drive.
    pub domain: String,
}

/// Side-effect command lists, keyed by direction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default)]
    pub guest: Vec<String>,
}

/// Switch behaviour knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct KvmConfig {
    /// When true, a guest-direction switch is skipped entirely if the domain
    /// is not running.
    pub check_guest: bool,
    /// When true, ddcutil is invoked through sudo.
    pub use_sudo: bool,
    /// Upper bound in seconds for each external call.
    #[serde(default = "default_external_timeout_secs")]
    pub external_timeout_secs: u64,
}

impl KvmConfig {
    /// The external-call timeout as a [`Duration`].
    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }
}

fn default_external_timeout_secs() -> u64 {
    DEFAULT_EXTERNAL_TIMEOUT_SECS
}

// ── Raw (pre-validation) schema ───────────────────────────────────────────────
//
// Device ids arrive as hex strings and the whole document needs cross-field
// validation, so deserialization lands in raw structs first and `validate`
// turns them into the public types above.

#[derive(Debug, Deserialize)]
struct RawConfig {
    http: RawHttpConfig,
    #[serde(default)]
    devices: Vec<RawDeviceEntry>,
    #[serde(default)]
    displays: Vec<DisplayTarget>,
    libvirt: LibvirtConfig,
    #[serde(default)]
    commands: CommandsConfig,
    kvm: KvmConfig,
}

#[derive(Debug, Deserialize)]
struct RawHttpConfig {
    address: SocketAddr,
    security: RawSecurityConfig,
}

#[derive(Debug, Deserialize)]
struct RawSecurityConfig {
    enabled: bool,
    #[serde(default)]
    secret: String,
}

#[derive(Debug, Deserialize)]
struct RawDeviceEntry {
    vendor: String,
    product: String,
}

impl SwitchConfig {
    /// Loads and validates the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        raw.validate()
    }
}

impl RawConfig {
    fn validate(self) -> Result<SwitchConfig, ConfigError> {
        if self.http.security.enabled && self.http.security.secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let mut devices = Vec::with_capacity(self.devices.len());
        for (index, entry) in self.devices.iter().enumerate() {
            let identity = DeviceIdentity::from_hex(&entry.vendor, &entry.product)
                .map_err(|source| ConfigError::InvalidDeviceId { index, source })?;
            if devices.contains(&identity) {
                return Err(ConfigError::DuplicateDevice(identity));
            }
            devices.push(identity);
        }

        Ok(SwitchConfig {
            http: HttpConfig {
                address: self.http.address,
                security: SecurityConfig {
                    enabled: self.http.security.enabled,
                    secret: self.http.security.secret,
                },
            },
            devices,
            displays: self.displays,
            libvirt: self.libvirt,
            commands: self.commands,
            kvm: self.kvm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
        [http]
        address = "127.0.0.1:8800"

        [http.security]
        enabled = true
        secret = "s3cret"

        [[devices]]
        vendor = "0x046d"
        product = "0xc52b"

        [[devices]]
        vendor = "0x1532"
        product = "0x0084"

        [[displays]]
        bus = 3
        feature = 0x60
        host = 0x0f
        guest = 0x12

        [libvirt]
        uri = "qemu:///system"
        domain = "gaming"

        [commands]
        host = ["echo host"]
        guest = ["echo guest"]

        [kvm]
        check_guest = true
        use_sudo = false
    "#;

    #[test]
    fn test_full_config_parses_and_validates() {
        let config = SwitchConfig::from_toml(FULL_CONFIG).unwrap();

        assert_eq!(config.http.address.port(), 8800);
        assert!(config.http.security.enabled);
        assert_eq!(config.http.security.secret, "s3cret");
        assert_eq!(
            config.devices,
            vec![
                DeviceIdentity::new(0x046d, 0xc52b),
                DeviceIdentity::new(0x1532, 0x0084),
            ]
        );
        assert_eq!(config.displays.len(), 1);
        assert_eq!(config.displays[0].feature, 0x60);
        assert_eq!(config.libvirt.domain, "gaming");
        assert_eq!(config.commands.host, vec!["echo host"]);
        assert!(config.kvm.check_guest);
        assert_eq!(config.kvm.external_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_ipv6_bind_address_is_accepted() {
        let toml = FULL_CONFIG.replace("127.0.0.1:8800", "[::1]:8800");
        let config = SwitchConfig::from_toml(&toml).unwrap();
        assert!(config.http.address.is_ipv6());
    }

    #[test]
    fn test_commands_section_defaults_to_empty_lists() {
        let toml = r#"
            [http]
            address = "127.0.0.1:8800"
            [http.security]
            enabled = false
            [libvirt]
            uri = "qemu:///system"
            domain = "gaming"
            [kvm]
            check_guest = false
            use_sudo = false
        "#;
        let config = SwitchConfig::from_toml(toml).unwrap();
        assert!(config.commands.host.is_empty());
        assert!(config.commands.guest.is_empty());
        assert!(config.devices.is_empty());
        assert!(config.displays.is_empty());
    }

    #[test]
    fn test_enabled_security_with_empty_secret_is_rejected() {
        let toml = FULL_CONFIG.replace("secret = \"s3cret\"", "secret = \"\"");
        assert!(matches!(
            SwitchConfig::from_toml(&toml),
            Err(ConfigError::EmptySecret)
        ));
    }

    #[test]
    fn test_bad_hex_device_id_is_rejected_with_its_index() {
        let toml = FULL_CONFIG.replace("\"0x1532\"", "\"0xnope\"");
        match SwitchConfig::from_toml(&toml) {
            Err(ConfigError::InvalidDeviceId { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidDeviceId, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_device_identity_is_rejected() {
        let toml = FULL_CONFIG
            .replace("vendor = \"0x1532\"", "vendor = \"0x046d\"")
            .replace("product = \"0x0084\"", "product = \"0xc52b\"");
        assert!(matches!(
            SwitchConfig::from_toml(&toml),
            Err(ConfigError::DuplicateDevice(_))
        ));
    }

    #[test]
    fn test_missing_libvirt_section_is_a_parse_error() {
        let toml = r#"
            [http]
            address = "127.0.0.1:8800"
            [http.security]
            enabled = false
            [kvm]
            check_guest = false
            use_sudo = false
        "#;
        assert!(matches!(
            SwitchConfig::from_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }
}
