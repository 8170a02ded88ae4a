//! Attach/detach reconciliation planning.
//!
//! The planner answers one question: given the devices the hypervisor
//! currently reports as attached to the guest, and the target identity set
//! from configuration, which live operations are needed?
//!
//! Both functions are pure and idempotent by construction:
//!
//! - [`attach_plan`] returns the target identities *not* currently attached
//!   (T \ C).  Running the plan and replanning yields an empty plan.
//! - [`detach_plan`] returns the attached devices whose identity *is* in the
//!   target set (C ∩ T), carrying each device's own fetched descriptor so the
//!   caller can echo it back verbatim.
//!
//! The configured target set is the universe: a device attached to the domain
//! but absent from configuration never appears in either plan.

use crate::domain::identity::DeviceIdentity;
use crate::hostdev::AttachedDevice;

/// Returns the identities that need a live attach: every target identity not
/// currently found among the attached devices.
///
/// Order follows the target list, so attaches happen in configuration order.
/// If the hypervisor reports duplicate identities, the first occurrence is
/// the one that counts (configuration is assumed not to produce duplicates).
pub fn attach_plan(
    attached: &[AttachedDevice],
    targets: &[DeviceIdentity],
) -> Vec<DeviceIdentity> {
    targets
        .iter()
        .copied()
        .filter(|id| !attached.iter().any(|dev| dev.identity == *id))
        .collect()
}

/// Returns the attached devices that need a live detach: every currently
/// attached device whose identity is in the target set.
///
/// Order follows the hypervisor's enumeration order.  Each returned device
/// carries the descriptor fragment the hypervisor itself reported, which is
/// the only form the hypervisor is guaranteed to accept for detach.
pub fn detach_plan<'a>(
    attached: &'a [AttachedDevice],
    targets: &[DeviceIdentity],
) -> Vec<&'a AttachedDevice> {
    attached
        .iter()
        .filter(|dev| targets.contains(&dev.identity))
        .collect()
}
