//! Domain logic for virtswitch.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: no libvirt, no process spawning, no network.  Everything
//! here can be unit-tested on any platform without external setup.

/// USB device identity — the (vendor id, product id) pair.
pub mod identity;

/// Attach/detach reconciliation planning.
pub mod plan;
