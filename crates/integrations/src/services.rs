use std::sync::Arc;

use krizzy_core::EnvReader;
use serde::Serialize;

use crate::flows::{FlowKind, FlowTrigger};
use crate::http::HttpClient;
use crate::notifier::{Notifier, NotifierConfig};
use crate::probes::{
    AirtableConfig, AirtableProbe, FeedConfig, FeedProbe, Probe, SamConfig, SamProbe,
    TwilioConfig, TwilioProbe,
};

/// Which integrations have the configuration they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    pub discord: bool,
    pub airtable: bool,
    pub twilio: bool,
    pub sam: bool,
    pub rei: bool,
    pub govcon: bool,
}

/// Every outbound integration, built once from the environment and shared
/// by the worker and the HTTP surface.
#[derive(Debug, Clone)]
pub struct Integrations {
    pub notifier: Notifier,
    pub airtable: Arc<AirtableProbe>,
    pub twilio: Arc<TwilioProbe>,
    pub feed: Arc<FeedProbe>,
    pub sam: Arc<SamProbe>,
    rei: FlowTrigger,
    govcon: FlowTrigger,
}

impl Integrations {
    pub fn from_env(env: &EnvReader, client: HttpClient) -> Self {
        let notifier = Notifier::new(client.clone(), NotifierConfig::from_env(env));
        Self {
            airtable: Arc::new(AirtableProbe::new(client.clone(), AirtableConfig::from_env(env))),
            twilio: Arc::new(TwilioProbe::new(client.clone(), TwilioConfig::from_env(env))),
            feed: Arc::new(FeedProbe::new(client.clone(), FeedConfig::from_env(env))),
            sam: Arc::new(SamProbe::new(client.clone(), SamConfig::from_env(env))),
            rei: FlowTrigger::from_env(FlowKind::Rei, env, client.clone(), notifier.clone()),
            govcon: FlowTrigger::from_env(FlowKind::Govcon, env, client, notifier.clone()),
            notifier,
        }
    }

    /// Probes run during the startup phase, in reporting order.
    pub fn probes(&self) -> Vec<Arc<dyn Probe>> {
        vec![
            self.airtable.clone() as Arc<dyn Probe>,
            self.twilio.clone() as Arc<dyn Probe>,
            self.feed.clone() as Arc<dyn Probe>,
            self.sam.clone() as Arc<dyn Probe>,
        ]
    }

    pub fn flow(&self, kind: FlowKind) -> &FlowTrigger {
        match kind {
            FlowKind::Rei => &self.rei,
            FlowKind::Govcon => &self.govcon,
        }
    }

    /// Flow triggers run by each cycle, in reporting order.
    pub fn flows(&self) -> [&FlowTrigger; 2] {
        [&self.rei, &self.govcon]
    }

    pub fn features(&self) -> FeatureFlags {
        FeatureFlags {
            discord: self.notifier.is_configured(),
            airtable: self.airtable.is_configured(),
            twilio: self.twilio.is_configured(),
            sam: self.sam.is_configured(),
            rei: self.rei.is_configured(),
            govcon: self.govcon.is_configured(),
        }
    }
}
