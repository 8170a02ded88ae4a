//! # virtswitch-daemon
//!
//! The virtswitch daemon: a software KVM switch for libvirt/VFIO passthrough
//! setups.  One set of USB peripherals and monitors is shared between the
//! physical host and a single guest domain; a POST to the control endpoint
//! flips ownership in one direction or the other.
//!
//! # Architecture overview
//!
//! ```text
//! HTTP client  (POST /switch {"to": "guest"})
//!       ↕
//! virtswitch-daemon  ← this process
//!   domain/         SwitchConfig, transition direction
//!   application/    SwitchService — the three-step transition sequence
//!   infrastructure/
//!     http_server/  axum control-plane endpoint (auth, validation)
//!     hypervisor/   DeviceHotplug trait, libvirt backend, in-memory backend
//!     display/      ddcutil input-source switching
//!     commands/     shell side-effect commands
//!       ↕
//! libvirt daemon  (device hot-plug on the guest domain)
//! ```
//!
//! A transition is always the same fixed sequence: switch every configured
//! display's input source, run the direction's command list, then reconcile
//! the configured USB device set against the guest via live attach/detach.
//! The first two steps are best-effort; only the hypervisor step can fail the
//! transition, and a failure there does not roll the earlier steps back.

pub mod application;
pub mod domain;
pub mod infrastructure;
