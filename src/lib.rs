//! Workspace placeholder crate.
//!
//! Exposes the feature flags that map onto the workspace crates. Hosts can
//! depend on `mini-player-workspace` with `desktop-shims` enabled to get
//! [`core_service::PlayerService`] with the desktop HTTP and storage
//! defaults wired in.

#[cfg(feature = "desktop-shims")]
pub use core_service;
