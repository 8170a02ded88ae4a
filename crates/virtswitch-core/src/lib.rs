//! # virtswitch-core
//!
//! Shared library for virtswitch containing the USB device identity model,
//! the hostdev XML codec, and the attach/detach reconciliation planner.
//!
//! This crate is used by the daemon that drives the actual hypervisor.
//! It has zero dependencies on libvirt, sockets, or async runtimes.
//!
//! # Architecture overview
//!
//! virtswitch is a software KVM switch for VFIO passthrough setups: one set of
//! USB peripherals (keyboard, mouse, headset, …) and one set of monitors is
//! shared between the physical host and a single virtual machine.  A switch
//! request flips the monitors' input sources, runs configured side-effect
//! commands, and hot-plugs the configured USB devices into or out of the
//! guest domain.
//!
//! This crate (`virtswitch-core`) is the pure foundation.  It defines:
//!
//! - **`domain`** – The [`DeviceIdentity`] value type (vendor/product id pair)
//!   and the reconciliation planner: given the devices currently attached to
//!   the guest and the configured target set, compute which identities need a
//!   live attach and which attached devices need a live detach.  Both plans
//!   are idempotent by construction.
//!
//! - **`hostdev`** – A typed parser and serializer for the minimal subset of
//!   the libvirt domain XML dialect that virtswitch touches: `<hostdev
//!   type="usb">` entries with hexadecimal vendor/product source ids.  The
//!   parser preserves each entry's verbatim XML text, because the hypervisor
//!   assigns addressing details on attach that must be echoed back exactly on
//!   detach.

pub mod domain;
pub mod hostdev;

// Re-export the most-used types at the crate root so callers can write
// `virtswitch_core::DeviceIdentity` instead of the full module path.
pub use domain::identity::{parse_hex_id, DeviceIdentity, ParseIdError};
pub use domain::plan::{attach_plan, detach_plan};
pub use hostdev::{attach_fragment, parse_usb_hostdevs, AttachedDevice, HostdevError};
