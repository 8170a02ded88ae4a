//! virtswitch — entry point.
//!
//! A software KVM switch for libvirt/VFIO passthrough setups: shares one set
//! of USB peripherals and monitors between the physical host and a single
//! guest domain, driven by an authenticated HTTP endpoint.
//!
//! # Usage
//!
//! ```text
//! virtswitch --config /etc/virtswitch/config.toml
//! ```
//!
//! The config path can also come from the `VIRTSWITCH_CONFIG` environment
//! variable; the CLI flag takes precedence.  Log verbosity is controlled by
//! `RUST_LOG` (e.g. `RUST_LOG=debug`).
//!
//! # What happens at startup
//!
//! 1. Logging is initialised.
//! 2. The TOML configuration is loaded and fully validated; any missing or
//!    malformed field aborts here, before a single request is served.
//! 3. The libvirt connection target is probed (URI reachable, domain name
//!    resolvable), so misconfiguration fails fast.
//! 4. The control endpoint starts serving `POST /switch`.
//!
//! The binary requires the `libvirt` cargo feature; without it there is no
//! backend to drive and startup fails with an explanatory error.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use virtswitch_daemon::domain::config::SwitchConfig;

/// The poor man's KVM switch for libvirt and VFIO users.
#[derive(Debug, Parser)]
#[command(name = "virtswitch", about, version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "VIRTSWITCH_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = SwitchConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let config = Arc::new(config);

    info!(
        domain = %config.libvirt.domain,
        devices = config.devices.len(),
        displays = config.displays.len(),
        "virtswitch starting"
    );

    #[cfg(not(feature = "libvirt"))]
    return Err(anyhow::anyhow!(
        "this binary was built without the `libvirt` feature and has no \
         hypervisor backend; rebuild with `--features libvirt`"
    ));

    #[cfg(feature = "libvirt")]
    {
        use virtswitch_daemon::application::SwitchService;
        use virtswitch_daemon::infrastructure::http_server::{self, AppState};
        use virtswitch_daemon::infrastructure::hypervisor::libvirt::LibvirtHypervisor;
        use virtswitch_daemon::infrastructure::hypervisor::DeviceHotplug;

        let backend = LibvirtHypervisor::connect(&config.libvirt.uri, &config.libvirt.domain)
            .context("failed to reach the hypervisor at startup")?;
        let backend: Arc<dyn DeviceHotplug> = Arc::new(backend);

        let service = SwitchService::new(Arc::clone(&config), backend);
        let state = AppState::new(config.http.security.clone(), service);

        http_server::serve(config.http.address, state).await
    }
}
