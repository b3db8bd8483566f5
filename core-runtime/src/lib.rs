//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the player core:
//! - Logging and tracing setup
//! - Configuration and bridge injection
//! - Event bus
//!
//! Every other core crate depends on this one for its logging conventions
//! and for the [`events::EventBus`] it publishes to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
