//! The hostdev XML dialect.
//!
//! libvirt describes a USB passthrough device as a `<hostdev>` element inside
//! the domain's `<devices>` section:
//!
//! ```xml
//! <hostdev mode='subsystem' type='usb' managed='no'>
//!   <source>
//!     <vendor id='0x046d'/>
//!     <product id='0xc52b'/>
//!     <address bus='3' device='7'/>
//!   </source>
//!   <alias name='hostdev0'/>
//!   <address type='usb' bus='0' port='4'/>
//! </hostdev>
//! ```
//!
//! The protocol is asymmetric.  To *attach*, libvirt accepts a minimal
//! fragment carrying only the mode, type, and vendor/product ids — it picks
//! the bus addressing itself.  To *detach*, the fragment must match the
//! device as libvirt knows it, including the addressing fields libvirt added
//! on attach.  A fragment reconstructed from the identity alone may fail to
//! match.  virtswitch therefore keeps the verbatim XML text of every
//! enumerated entry and echoes it back unchanged on detach; only the attach
//! side synthesizes XML.

mod codec;

pub use codec::{attach_fragment, parse_usb_hostdevs};

use thiserror::Error;

use crate::domain::identity::{DeviceIdentity, ParseIdError};

/// Errors raised while decoding hostdev entries from a domain XML document.
#[derive(Debug, Error)]
pub enum HostdevError {
    /// The document is not well-formed XML.
    #[error("malformed domain XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A USB hostdev entry lacks its vendor or product id.
    #[error("usb hostdev entry is missing its {field} id")]
    MissingId { field: &'static str },

    /// A USB hostdev entry carries a vendor or product id that is not valid
    /// 16-bit hexadecimal.
    #[error("usb hostdev entry has an invalid {field} id: {source}")]
    InvalidId {
        field: &'static str,
        source: ParseIdError,
    },
}

/// A USB device currently attached to the guest domain.
///
/// `xml` is the exact `<hostdev>` element text sliced out of the domain XML
/// the hypervisor returned, preserved for detach (see the module docs for
/// why it is never reconstructed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevice {
    /// Parsed vendor/product identity, used for matching.
    pub identity: DeviceIdentity,
    /// The verbatim descriptor fragment as reported by the hypervisor.
    pub xml: String,
}
