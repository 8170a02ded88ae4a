//! In-memory hypervisor backend for the test suites.
//!
//! Behaves like a tiny libvirt: it holds a domain XML document, appends
//! attached fragments into the `<devices>` section, and removes them again on
//! detach — so reconciliation against it is observable across calls exactly
//! as it would be against a real domain.  Every attach/detach call is
//! recorded verbatim, and the next call of either kind can be made to fail
//! for error-path tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{DeviceHotplug, HypervisorError};

/// Skeleton domain document the fake starts from.
const EMPTY_DOMAIN: &str = "<domain type='kvm'><name>testdomain</name>\
     <devices></devices></domain>";

/// A stateful in-memory [`DeviceHotplug`] implementation.
pub struct InMemoryHypervisor {
    domain_xml: Mutex<String>,
    running: AtomicBool,
    attach_calls: Mutex<Vec<String>>,
    detach_calls: Mutex<Vec<String>>,
    fail_next_attach: Mutex<Option<String>>,
    fail_next_detach: Mutex<Option<String>>,
}

impl InMemoryHypervisor {
    /// Creates a fake with a running domain and no attached devices.
    pub fn new() -> Self {
        Self {
            domain_xml: Mutex::new(EMPTY_DOMAIN.to_string()),
            running: AtomicBool::new(true),
            attach_calls: Mutex::new(Vec::new()),
            detach_calls: Mutex::new(Vec::new()),
            fail_next_attach: Mutex::new(None),
            fail_next_detach: Mutex::new(None),
        }
    }

    /// Creates a fake whose domain already has the given hostdev fragments
    /// attached.
    pub fn with_devices(fragments: &[&str]) -> Self {
        let fake = Self::new();
        for fragment in fragments {
            fake.insert_fragment(fragment);
        }
        fake
    }

    /// Marks the domain running or shut off.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Makes the next `attach_device` call fail with the given reason.
    pub fn fail_next_attach(&self, reason: &str) {
        *self.fail_next_attach.lock().expect("lock poisoned") = Some(reason.to_string());
    }

    /// Makes the next `detach_device` call fail with the given reason.
    pub fn fail_next_detach(&self, reason: &str) {
        *self.fail_next_detach.lock().expect("lock poisoned") = Some(reason.to_string());
    }

    /// Every fragment passed to `attach_device`, in call order.
    pub fn attach_calls(&self) -> Vec<String> {
        self.attach_calls.lock().expect("lock poisoned").clone()
    }

    /// Every fragment passed to `detach_device`, in call order.
    pub fn detach_calls(&self) -> Vec<String> {
        self.detach_calls.lock().expect("lock poisoned").clone()
    }

    fn insert_fragment(&self, fragment: &str) {
        let mut xml = self.domain_xml.lock().expect("lock poisoned");
        *xml = xml.replacen("</devices>", &format!("{fragment}</devices>"), 1);
    }
}

impl Default for InMemoryHypervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceHotplug for InMemoryHypervisor {
    fn domain_xml(&self) -> Result<String, HypervisorError> {
        Ok(self.domain_xml.lock().expect("lock poisoned").clone())
    }

    fn attach_device(&self, xml: &str) -> Result<(), HypervisorError> {
        self.attach_calls
            .lock()
            .expect("lock poisoned")
            .push(xml.to_string());

        if let Some(reason) = self.fail_next_attach.lock().expect("lock poisoned").take() {
            return Err(HypervisorError::Attach(reason));
        }

        self.insert_fragment(xml);
        Ok(())
    }

    fn detach_device(&self, xml: &str) -> Result<(), HypervisorError> {
        self.detach_calls
            .lock()
            .expect("lock poisoned")
            .push(xml.to_string());

        if let Some(reason) = self.fail_next_detach.lock().expect("lock poisoned").take() {
            return Err(HypervisorError::Detach(reason));
        }

        let mut stored = self.domain_xml.lock().expect("lock poisoned");
        *stored = stored.replacen(xml, "", 1);
        Ok(())
    }

    fn is_running(&self) -> Result<bool, HypervisorError> {
        Ok(self.running.load(Ordering::SeqCst))
    }
}
