//! Application layer: the transition use case.
//!
//! [`switch_service::SwitchService`] depends only on the config value, the
//! [`crate::infrastructure::hypervisor::DeviceHotplug`] trait, and the two
//! best-effort adapters; the libvirt backend is injected at construction
//! time, so the whole sequence is testable against the in-memory backend.

pub mod switch_service;

pub use switch_service::{SwitchError, SwitchService};
