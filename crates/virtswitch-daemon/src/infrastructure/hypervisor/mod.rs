//! Hypervisor control-plane access.
//!
//! The daemon only ever needs four primitives from the hypervisor: fetch the
//! domain's live XML, attach a descriptor fragment, detach a descriptor
//! fragment, and probe whether the domain is running.  Those four make up the
//! [`DeviceHotplug`] trait; everything above it — parsing, identity matching,
//! and idempotent reconciliation — is [`HypervisorClient`], which is backend
//! independent and fully testable without a libvirt daemon.
//!
//! Backends:
//! - [`libvirt::LibvirtHypervisor`] — the real thing, behind the `libvirt`
//!   cargo feature.
//! - [`memory::InMemoryHypervisor`] — a stateful in-memory fake used by the
//!   test suites.

#[cfg(feature = "libvirt")]
pub mod libvirt;
pub mod memory;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use virtswitch_core::{
    attach_fragment, attach_plan, detach_plan, parse_usb_hostdevs, AttachedDevice,
    DeviceIdentity, HostdevError,
};

/// Errors raised by hypervisor operations.
#[derive(Debug, Error)]
pub enum HypervisorError {
    /// The hypervisor management endpoint could not be reached.
    #[error("failed to connect to hypervisor at {uri}: {reason}")]
    Connect { uri: String, reason: String },

    /// The configured guest domain does not exist on the hypervisor.
    #[error("domain '{name}' not found: {reason}")]
    DomainNotFound { name: String, reason: String },

    /// Querying the domain's live descriptor failed.
    #[error("failed to query domain: {0}")]
    Query(String),

    /// The domain descriptor the hypervisor returned could not be decoded.
    #[error("bad domain descriptor: {0}")]
    Descriptor(#[from] HostdevError),

    /// A live attach was rejected (domain not running, device busy, …).
    #[error("device attach failed: {0}")]
    Attach(String),

    /// A live detach was rejected.
    #[error("device detach failed: {0}")]
    Detach(String),
}

/// The minimal backend surface the daemon needs from a hypervisor.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and
/// callable from a blocking thread; all methods may block.
pub trait DeviceHotplug: Send + Sync {
    /// Returns the guest domain's live XML descriptor.
    fn domain_xml(&self) -> Result<String, HypervisorError>;

    /// Issues a live attach of one descriptor fragment.
    fn attach_device(&self, xml: &str) -> Result<(), HypervisorError>;

    /// Issues a live detach of one descriptor fragment.
    fn detach_device(&self, xml: &str) -> Result<(), HypervisorError>;

    /// Whether the domain is currently running.
    fn is_running(&self) -> Result<bool, HypervisorError>;
}

/// Backend-independent device reconciliation against the guest domain.
///
/// All state lives in the hypervisor; the client holds nothing but the
/// backend handle, so every operation starts from a fresh enumeration.
#[derive(Clone)]
pub struct HypervisorClient {
    backend: Arc<dyn DeviceHotplug>,
}

impl HypervisorClient {
    pub fn new(backend: Arc<dyn DeviceHotplug>) -> Self {
        Self { backend }
    }

    /// Enumerates the USB passthrough devices currently attached to the
    /// domain.  Order is whatever the hypervisor reports.
    pub fn attached_devices(&self) -> Result<Vec<AttachedDevice>, HypervisorError> {
        let xml = self.backend.domain_xml()?;
        Ok(parse_usb_hostdevs(&xml)?)
    }

    /// Finds the first attached device with an exactly matching identity.
    pub fn find_by_identity(
        &self,
        identity: DeviceIdentity,
    ) -> Result<Option<AttachedDevice>, HypervisorError> {
        Ok(self
            .attached_devices()?
            .into_iter()
            .find(|dev| dev.identity == identity))
    }

    /// Attaches every target identity not already attached, using a minimal
    /// synthesized fragment per device.
    ///
    /// Already-attached identities are skipped — calling this twice with the
    /// same target set performs at most one physical attach per identity.
    /// The first failure aborts the remaining attaches; nothing is retried.
    /// Returns the number of attaches issued.
    pub fn attach_set(&self, targets: &[DeviceIdentity]) -> Result<usize, HypervisorError> {
        let attached = self.attached_devices()?;
        let plan = attach_plan(&attached, targets);

        for identity in &plan {
            info!(device = %identity, "attaching device to guest");
            self.backend.attach_device(&attach_fragment(*identity))?;
        }

        debug!(
            attached = plan.len(),
            skipped = targets.len() - plan.len(),
            "attach reconciliation complete"
        );
        Ok(plan.len())
    }

    /// Detaches every attached device whose identity is in the target set,
    /// echoing back each device's own fetched descriptor fragment verbatim.
    ///
    /// Devices attached to the domain but absent from the target set are
    /// left untouched.  The first failure aborts the remaining detaches.
    /// Returns the number of detaches issued.
    pub fn detach_set(&self, targets: &[DeviceIdentity]) -> Result<usize, HypervisorError> {
        let attached = self.attached_devices()?;
        let plan = detach_plan(&attached, targets);

        for device in &plan {
            info!(device = %device.identity, "detaching device from guest");
            self.backend.detach_device(&device.xml)?;
        }

        debug!(detached = plan.len(), "detach reconciliation complete");
        Ok(plan.len())
    }

    /// Whether the guest domain is currently running.
    pub fn is_running(&self) -> Result<bool, HypervisorError> {
        self.backend.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryHypervisor;
    use super::*;

    const LOGITECH: DeviceIdentity = DeviceIdentity::new(0x046d, 0xc52b);
    const RAZER: DeviceIdentity = DeviceIdentity::new(0x1532, 0x0084);

    fn client(backend: &Arc<InMemoryHypervisor>) -> HypervisorClient {
        HypervisorClient::new(Arc::clone(backend) as Arc<dyn DeviceHotplug>)
    }

    #[test]
    fn test_attach_set_attaches_every_missing_target() {
        let backend = Arc::new(InMemoryHypervisor::new());
        let issued = client(&backend).attach_set(&[LOGITECH, RAZER]).unwrap();

        assert_eq!(issued, 2);
        let calls = backend.attach_calls();
        assert!(calls[0].contains("0x46d"));
        assert!(calls[1].contains("0x1532"));
    }

    #[test]
    fn test_attach_set_skips_already_attached_identities() {
        let backend = Arc::new(InMemoryHypervisor::new());
        let client = client(&backend);

        client.attach_set(&[LOGITECH]).unwrap();
        let issued = client.attach_set(&[LOGITECH, RAZER]).unwrap();

        assert_eq!(issued, 1);
        assert_eq!(backend.attach_calls().len(), 2);
    }

    #[test]
    fn test_attach_failure_aborts_remaining_attaches() {
        let backend = Arc::new(InMemoryHypervisor::new());
        backend.fail_next_attach("device busy");

        let err = client(&backend).attach_set(&[LOGITECH, RAZER]).unwrap_err();

        assert!(matches!(err, HypervisorError::Attach(_)));
        // The failing call was issued; the second one never was.
        assert_eq!(backend.attach_calls().len(), 1);
    }

    #[test]
    fn test_detach_failure_aborts_remaining_detaches() {
        let logitech = "<hostdev mode='subsystem' type='usb'>\
             <source><vendor id='0x046d'/><product id='0xc52b'/></source>\
             </hostdev>";
        let razer = "<hostdev mode='subsystem' type='usb'>\
             <source><vendor id='0x1532'/><product id='0x0084'/></source>\
             </hostdev>";
        let backend = Arc::new(InMemoryHypervisor::with_devices(&[logitech, razer]));
        backend.fail_next_detach("device busy");

        let err = client(&backend).detach_set(&[LOGITECH, RAZER]).unwrap_err();

        assert!(matches!(err, HypervisorError::Detach(_)));
        // The failing call was issued; the second one never was.
        assert_eq!(backend.detach_calls().len(), 1);
    }

    #[test]
    fn test_detach_set_echoes_the_fetched_fragment_verbatim() {
        let fragment = "<hostdev mode='subsystem' type='usb' managed='no'>\
             <source><vendor id='0x046d'/><product id='0xc52b'/>\
             <address bus='3' device='7'/></source>\
             <alias name='hostdev0'/>\
             </hostdev>";
        let backend = Arc::new(InMemoryHypervisor::with_devices(&[fragment]));

        let issued = client(&backend).detach_set(&[LOGITECH]).unwrap();

        assert_eq!(issued, 1);
        assert_eq!(backend.detach_calls(), vec![fragment.to_string()]);
    }

    #[test]
    fn test_detach_set_leaves_unconfigured_devices_alone() {
        let other = "<hostdev mode='subsystem' type='usb'>\
             <source><vendor id='0x0b05'/><product id='0x1872'/></source>\
             </hostdev>";
        let backend = Arc::new(InMemoryHypervisor::with_devices(&[other]));

        let issued = client(&backend).detach_set(&[LOGITECH]).unwrap();

        assert_eq!(issued, 0);
        assert!(backend.detach_calls().is_empty());
    }

    #[test]
    fn test_find_by_identity_matches_exactly() {
        let backend = Arc::new(InMemoryHypervisor::new());
        let client = client(&backend);
        client.attach_set(&[LOGITECH]).unwrap();

        assert!(client.find_by_identity(LOGITECH).unwrap().is_some());
        assert!(client.find_by_identity(RAZER).unwrap().is_none());
    }
}
