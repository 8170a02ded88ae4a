//! Decoding and encoding of hostdev fragments.
//!
//! [`parse_usb_hostdevs`] walks a full domain XML document and extracts every
//! `<hostdev type="usb">` entry, validating the vendor/product ids at parse
//! time.  [`attach_fragment`] synthesizes the minimal fragment libvirt
//! accepts for a live attach.

use roxmltree::{Document, Node};

use crate::domain::identity::{parse_hex_id, DeviceIdentity};
use crate::hostdev::{AttachedDevice, HostdevError};

/// Extracts all USB passthrough entries from a domain XML document.
///
/// Non-USB hostdev entries (PCI passthrough, SCSI, …) are skipped.  For each
/// USB entry the vendor and product ids are parsed from their hexadecimal
/// attribute form, and the element's verbatim text is sliced out of the
/// source document so it can be echoed back on detach.
///
/// Order is whatever the hypervisor reports; it is not guaranteed stable
/// across calls.
///
/// # Errors
///
/// Returns [`HostdevError`] if the document is not well-formed XML or a USB
/// entry is missing or carries an unparsable vendor/product id.  A malformed
/// entry is an error, not a skip: silently ignoring it could make the planner
/// attach a duplicate device.
pub fn parse_usb_hostdevs(domain_xml: &str) -> Result<Vec<AttachedDevice>, HostdevError> {
    let doc = Document::parse(domain_xml)?;

    let mut devices = Vec::new();
    for node in doc.descendants().filter(is_usb_hostdev) {
        let identity = DeviceIdentity {
            vendor_id: source_id(node, "vendor")?,
            product_id: source_id(node, "product")?,
        };
        devices.push(AttachedDevice {
            identity,
            xml: domain_xml[node.range()].to_string(),
        });
    }

    tracing::debug!(count = devices.len(), "parsed usb hostdev entries");
    Ok(devices)
}

/// Builds the minimal descriptor fragment for a live attach of `identity`.
///
/// Only mode, type, and the vendor/product ids are specified; libvirt fills
/// in the addressing itself.  Ids are written `0x`-prefixed as libvirt emits
/// them.
pub fn attach_fragment(identity: DeviceIdentity) -> String {
    format!(
        "<hostdev mode='subsystem' type='usb'>\
         <source>\
         <vendor id='{:#x}'/>\
         <product id='{:#x}'/>\
         </source>\
         </hostdev>",
        identity.vendor_id, identity.product_id,
    )
}

fn is_usb_hostdev(node: &Node<'_, '_>) -> bool {
    node.has_tag_name("hostdev") && node.attribute("type") == Some("usb")
}

/// Reads `<source><{field} id='0x…'/></source>` under a hostdev node.
fn source_id(hostdev: Node<'_, '_>, field: &'static str) -> Result<u16, HostdevError> {
    let raw = hostdev
        .children()
        .find(|c| c.has_tag_name("source"))
        .and_then(|source| source.children().find(|c| c.has_tag_name(field)))
        .and_then(|n| n.attribute("id"))
        .ok_or(HostdevError::MissingId { field })?;

    parse_hex_id(raw).map_err(|source| HostdevError::InvalidId { field, source })
}
