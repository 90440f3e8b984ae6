//! Outbound integrations of the KRIZZY OPS relay.
//!
//! Everything that talks to a third-party API lives here: the shared
//! [`http::HttpClient`] and its [`retry`] policy, the Discord [`notifier`],
//! the read-only [`probes`] and the workflow [`flows`]. None of these surface errors as
//! `Err` to their callers; outcomes are values from `krizzy_core::result`.

pub mod flows;
pub mod http;
pub mod notifier;
pub mod probes;
pub mod retry;
pub mod services;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use flows::{FlowKind, FlowTrigger};
pub use http::{HttpClient, HttpError};
pub use notifier::{Notifier, NotifyOutcome};
pub use probes::Probe;
pub use retry::RetryPolicy;
pub use services::{FeatureFlags, Integrations};
