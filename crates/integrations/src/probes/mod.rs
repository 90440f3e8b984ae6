//! Read-only checks against the external systems the relay depends on.
//!
//! Every probe validates its configuration first and reports missing
//! credentials without touching the network. A probe never returns
//! `Err` and never panics on a remote failure: the outcome is always a
//! [`ProbeResult`].

use std::time::Duration;

use async_trait::async_trait;
use krizzy_core::ProbeResult;

mod airtable;
mod feed;
mod sam;
mod twilio;

pub use airtable::{AirtableConfig, AirtableProbe};
pub use feed::{FeedConfig, FeedProbe, DEFAULT_SAMPLE_SIZE};
pub use sam::{SamConfig, SamProbe};
pub use twilio::{TwilioConfig, TwilioProbe};

/// A named health check that can be run on demand or at startup.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the check. `timeout` bounds (and cancels) the network call.
    async fn check(&self, timeout: Option<Duration>) -> ProbeResult;
}
