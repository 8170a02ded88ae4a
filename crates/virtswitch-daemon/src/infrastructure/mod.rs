//! Infrastructure adapters: everything that talks to the outside world.
//!
//! - [`hypervisor`] — the libvirt control plane (device enumeration and live
//!   attach/detach) behind the [`hypervisor::DeviceHotplug`] trait.
//! - [`display`] — monitor input-source switching via `ddcutil`.
//! - [`commands`] — configured shell side-effect commands.
//! - [`http_server`] — the axum control-plane endpoint.

pub mod commands;
pub mod display;
pub mod http_server;
pub mod hypervisor;
