//! libvirt backend for [`DeviceHotplug`].
//!
//! Built only with the `libvirt` cargo feature, which pulls in the `virt`
//! bindings and therefore needs the libvirt development headers at build
//! time.
//!
//! The backend stores only the connection URI and domain name and opens a
//! fresh connection per operation.  libvirt connection objects are not
//! thread-transferable, and per-operation connections sidestep that while
//! also surviving libvirtd restarts; transitions are serialized upstream, so
//! there is no churn from concurrent opens.  [`LibvirtHypervisor::connect`]
//! still opens once eagerly so that a bad URI or unknown domain name fails at
//! daemon startup instead of on the first switch request.

use tracing::debug;
use virt::connect::Connect;
use virt::domain::Domain;

use super::{DeviceHotplug, HypervisorError};

/// [`DeviceHotplug`] implementation backed by a libvirt daemon.
pub struct LibvirtHypervisor {
    uri: String,
    domain: String,
}

impl LibvirtHypervisor {
    /// Validates the connection target and returns the backend.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::Connect`] if the management endpoint is
    /// unreachable and [`HypervisorError::DomainNotFound`] if the named
    /// domain does not exist.
    pub fn connect(uri: &str, domain: &str) -> Result<Self, HypervisorError> {
        let backend = Self {
            uri: uri.to_string(),
            domain: domain.to_string(),
        };

        // Probe once so misconfiguration is a startup error.
        let (mut conn, _dom) = backend.open()?;
        let _ = conn.close();
        debug!(uri, domain, "validated libvirt connection target");

        Ok(backend)
    }

    fn open(&self) -> Result<(Connect, Domain), HypervisorError> {
        let conn = Connect::open(Some(self.uri.as_str())).map_err(|err| HypervisorError::Connect {
            uri: self.uri.clone(),
            reason: err.to_string(),
        })?;

        let dom = Domain::lookup_by_name(&conn, &self.domain).map_err(|err| {
            HypervisorError::DomainNotFound {
                name: self.domain.clone(),
                reason: err.to_string(),
            }
        })?;

        Ok((conn, dom))
    }
}

impl DeviceHotplug for LibvirtHypervisor {
    fn domain_xml(&self) -> Result<String, HypervisorError> {
        let (mut conn, dom) = self.open()?;
        let result = dom
            .get_xml_desc(0)
            .map_err(|err| HypervisorError::Query(err.to_string()));
        let _ = conn.close();
        result
    }

    fn attach_device(&self, xml: &str) -> Result<(), HypervisorError> {
        let (mut conn, dom) = self.open()?;
        let result = dom
            .attach_device(xml)
            .map(drop)
            .map_err(|err| HypervisorError::Attach(err.to_string()));
        let _ = conn.close();
        result
    }

    fn detach_device(&self, xml: &str) -> Result<(), HypervisorError> {
        let (mut conn, dom) = self.open()?;
        let result = dom
            .detach_device(xml)
            .map(drop)
            .map_err(|err| HypervisorError::Detach(err.to_string()));
        let _ = conn.close();
        result
    }

    fn is_running(&self) -> Result<bool, HypervisorError> {
        let (mut conn, dom) = self.open()?;
        let result = dom
            .is_active()
            .map_err(|err| HypervisorError::Query(err.to_string()));
        let _ = conn.close();
        result
    }
}
