//! Shared building blocks for the KRIZZY OPS relay.
//!
//! - [`result`]: tagged probe / flow-trigger / cycle result types and their
//!   `{ "ok": ... }` wire shape.
//! - [`error`]: failure classification and configuration errors.
//! - [`env`]: environment lookup with legacy aliases.
//! - [`feed`]: ATOM feed parsing.
//! - [`text`]: char-safe truncation for outgoing messages.

pub mod env;
pub mod error;
pub mod feed;
pub mod result;
pub mod text;

pub use env::EnvReader;
pub use error::{ConfigError, FailureKind, OpsFailure};
pub use result::{CycleReport, FlowTriggerResult, ProbeResult};
