//! SwitchService: the fixed three-step transition sequence.
//!
//! Every transition, in both directions, is the same order of operations:
//!
//! 1. Set every configured display's input source to the direction's value.
//! 2. Run the direction's side-effect command list.
//! 3. Reconcile the configured USB device set against the guest domain:
//!    detach for "host", attach for "guest".
//!
//! Steps 1 and 2 are best-effort and never fail the transition.  Only step 3
//! can return an error, and by then steps 1–2 have already run irreversibly:
//! there is **no rollback**.  A failed transition may leave the displays and
//! commands applied for one direction with the devices still reflecting the
//! other; the caller sees the error text and decides what to do.  This is a
//! documented simplicity trade-off, not an accident.
//!
//! The service tracks no current state.  Re-issuing a direction re-runs the
//! displays and commands but is a device-level no-op thanks to the
//! reconciliation in [`HypervisorClient`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::config::SwitchConfig;
use crate::domain::Direction;
use crate::infrastructure::commands::CommandRunner;
use crate::infrastructure::display::DisplaySwitcher;
use crate::infrastructure::hypervisor::{DeviceHotplug, HypervisorClient, HypervisorError};

/// Errors that can fail a transition.
///
/// Only the hypervisor step produces these; display and command failures are
/// swallowed at the exit-status level by design.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error(transparent)]
    Hypervisor(#[from] HypervisorError),

    /// The hypervisor operation did not finish within the configured bound.
    #[error("hypervisor operation timed out after {0:?}")]
    Timeout(Duration),

    /// The blocking hypervisor task could not be joined.
    #[error("hypervisor task failed: {0}")]
    Task(String),
}

/// Orchestrates transitions between host and guest ownership.
///
/// Holds no state beyond configuration and the injected backend handle.
/// Callers must serialize transitions (the HTTP layer wraps the service in a
/// `tokio::sync::Mutex`); the service itself assumes it is never run
/// concurrently with itself against the same domain.
pub struct SwitchService {
    config: Arc<SwitchConfig>,
    hypervisor: HypervisorClient,
    displays: DisplaySwitcher,
    commands: CommandRunner,
}

impl SwitchService {
    pub fn new(config: Arc<SwitchConfig>, backend: Arc<dyn DeviceHotplug>) -> Self {
        let timeout = config.kvm.external_timeout();
        Self {
            hypervisor: HypervisorClient::new(backend),
            displays: DisplaySwitcher::new(config.kvm.use_sudo, timeout),
            commands: CommandRunner::new(timeout),
            config,
        }
    }

    /// Runs one transition in the given direction.
    pub async fn switch(&self, direction: Direction) -> Result<(), SwitchError> {
        match direction {
            Direction::Host => self.switch_to_host().await,
            Direction::Guest => self.switch_to_guest().await,
        }
    }

    /// Hands the peripherals back to the physical host: displays to their
    /// host inputs, host command list, configured devices detached from the
    /// guest.
    #[instrument(skip(self))]
    pub async fn switch_to_host(&self) -> Result<(), SwitchError> {
        self.apply(Direction::Host).await
    }

    /// Hands the peripherals to the guest: displays to their guest inputs,
    /// guest command list, configured devices attached to the guest.
    ///
    /// When `kvm.check_guest` is set and the domain is not running, the whole
    /// transition is skipped (nothing would receive the devices) and reported
    /// as success with a log line.
    #[instrument(skip(self))]
    pub async fn switch_to_guest(&self) -> Result<(), SwitchError> {
        if self.config.kvm.check_guest && !self.run_hypervisor(|h| h.is_running()).await? {
            info!("guest is not running, not switching");
            return Ok(());
        }

        self.apply(Direction::Guest).await
    }

    async fn apply(&self, direction: Direction) -> Result<(), SwitchError> {
        info!(direction = direction.as_str(), "starting transition");

        // Step 1: displays, each independent, best-effort.
        for display in &self.config.displays {
            let value = match direction {
                Direction::Host => display.host,
                Direction::Guest => display.guest,
            };
            self.displays.set_input(display, value).await;
        }

        // Step 2: side-effect commands, best-effort.
        let commands = match direction {
            Direction::Host => &self.config.commands.host,
            Direction::Guest => &self.config.commands.guest,
        };
        self.commands.run_all(commands).await;

        // Step 3: device reconciliation.  The only step that can fail, and
        // steps 1-2 are not rolled back when it does.
        let targets = self.config.devices.clone();
        match direction {
            Direction::Host => {
                self.run_hypervisor(move |h| h.detach_set(&targets)).await?;
            }
            Direction::Guest => {
                self.run_hypervisor(move |h| h.attach_set(&targets)).await?;
            }
        }

        info!(direction = direction.as_str(), "transition complete");
        Ok(())
    }

    /// Runs one blocking hypervisor operation off the async runtime, bounded
    /// by the configured external-call timeout.
    ///
    /// Blocking FFI cannot be cancelled: on [`SwitchError::Timeout`] the
    /// orphaned operation keeps running on its blocking thread and may still
    /// take effect after the error is reported.  A later transition can then
    /// start while it is in flight; the per-transition mutex upstream bounds
    /// the overlap to that one stray call.
    async fn run_hypervisor<T, F>(&self, op: F) -> Result<T, SwitchError>
    where
        T: Send + 'static,
        F: FnOnce(&HypervisorClient) -> Result<T, HypervisorError> + Send + 'static,
    {
        let client = self.hypervisor.clone();
        let timeout = self.config.kvm.external_timeout();
        let task = tokio::task::spawn_blocking(move || op(&client));

        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(SwitchError::Timeout(timeout)),
            Ok(Err(join_err)) => Err(SwitchError::Task(join_err.to_string())),
            Ok(Ok(result)) => Ok(result?),
        }
    }
}
