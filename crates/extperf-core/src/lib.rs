//! Data model, impact scoring and report aggregation for extension performance measurement.
//!
//! Nothing in this crate talks to a browser; measurements arrive as plain values and leave as an
//! [`report::ImpactReport`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod page;
pub mod report;

pub use error::{Error, Result};
