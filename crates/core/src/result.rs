//! Tagged result types produced by probes, flow triggers and cycles.
//!
//! Each type serializes to the `{ "ok": bool, ... }` wire shape the ops
//! endpoints have always returned, so HTTP clients see the same JSON whether
//! the result came from a success or a failure path.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{FailureKind, OpsFailure};

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

fn is_empty_slice(v: &&[String]) -> bool {
    v.is_empty()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultWire<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    missing_config: &'a [String],
}

impl<'a> ResultWire<'a> {
    fn failed(failure: &'a OpsFailure) -> Self {
        Self {
            ok: false,
            status: failure.status,
            data: None,
            workflow_id: None,
            error: Some(&failure.message),
            error_kind: Some(failure.kind),
            missing_config: &failure.missing_config,
        }
    }
}

// ---------------------------------------------------------------------------
// ProbeResult
// ---------------------------------------------------------------------------

/// Outcome of a single read-only check against one external system.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Ok {
        status: Option<u16>,
        data: Value,
    },
    Failed(OpsFailure),
}

impl ProbeResult {
    pub fn ok(status: u16, data: Value) -> Self {
        ProbeResult::Ok {
            status: Some(status),
            data,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeResult::Ok { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ProbeResult::Ok { data, .. } => Some(data),
            ProbeResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&OpsFailure> {
        match self {
            ProbeResult::Ok { .. } => None,
            ProbeResult::Failed(f) => Some(f),
        }
    }
}

impl From<OpsFailure> for ProbeResult {
    fn from(failure: OpsFailure) -> Self {
        ProbeResult::Failed(failure)
    }
}

impl Serialize for ProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ProbeResult::Ok { status, data } => ResultWire {
                ok: true,
                status: *status,
                data: Some(data),
                workflow_id: None,
                error: None,
                error_kind: None,
                missing_config: &[],
            },
            ProbeResult::Failed(failure) => ResultWire::failed(failure),
        };
        wire.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// FlowTriggerResult
// ---------------------------------------------------------------------------

/// Outcome of asking the workflow engine to run one flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowTriggerResult {
    Ok {
        status: u16,
        /// Set when the workflow was resolved through the list endpoint.
        workflow_id: Option<String>,
    },
    Failed(OpsFailure),
}

impl FlowTriggerResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, FlowTriggerResult::Ok { .. })
    }

    pub fn failure(&self) -> Option<&OpsFailure> {
        match self {
            FlowTriggerResult::Ok { .. } => None,
            FlowTriggerResult::Failed(f) => Some(f),
        }
    }
}

impl From<OpsFailure> for FlowTriggerResult {
    fn from(failure: OpsFailure) -> Self {
        FlowTriggerResult::Failed(failure)
    }
}

impl Serialize for FlowTriggerResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            FlowTriggerResult::Ok {
                status,
                workflow_id,
            } => ResultWire {
                ok: true,
                status: Some(*status),
                data: None,
                workflow_id: workflow_id.as_deref(),
                error: None,
                error_kind: None,
                missing_config: &[],
            },
            FlowTriggerResult::Failed(failure) => ResultWire::failed(failure),
        };
        wire.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// Per-cycle mapping from flow name to its trigger result, in invocation order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CycleReport {
    entries: IndexMap<String, FlowTriggerResult>,
}

impl CycleReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flow: impl Into<String>, result: FlowTriggerResult) {
        self.entries.insert(flow.into(), result);
    }

    pub fn get(&self, flow: &str) -> Option<&FlowTriggerResult> {
        self.entries.get(flow)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlowTriggerResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Failing entries, including suspended flows.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &OpsFailure)> {
        self.iter()
            .filter_map(|(name, result)| result.failure().map(|f| (name, f)))
    }

    /// Failing entries that warrant an operator notification.
    ///
    /// Suspended flows are excluded: the suspension itself was announced
    /// when the guard tripped.
    pub fn notifiable_failures(&self) -> Vec<(&str, &OpsFailure)> {
        self.failures()
            .filter(|(_, f)| f.kind != FailureKind::Suspended)
            .collect()
    }

    /// Human-readable summary of the notifiable failures, or `None` if the
    /// cycle needs no notification.
    pub fn failure_summary(&self) -> Option<String> {
        let failures = self.notifiable_failures();
        if failures.is_empty() {
            return None;
        }

        let names: Vec<&str> = failures.iter().map(|(name, _)| *name).collect();
        let mut summary = format!(
            "[CYCLE] {} flow(s) failed: {}",
            failures.len(),
            names.join(", ")
        );
        for (name, failure) in &failures {
            summary.push_str(&format!("\n- {name} ({}): {}", failure.kind, failure.message));
        }
        Some(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_ok_serializes_with_data() {
        let result = ProbeResult::ok(200, json!({ "records": 1 }));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, json!({ "ok": true, "status": 200, "data": { "records": 1 } }));
    }

    #[test]
    fn probe_missing_config_serializes_names() {
        let result = ProbeResult::from(OpsFailure::missing_config(vec![
            "AIRTABLE_API_KEY".into(),
        ]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["errorKind"], "missing_config");
        assert_eq!(json["missingConfig"], json!(["AIRTABLE_API_KEY"]));
        assert!(json.get("status").is_none());
    }

    #[test]
    fn flow_ok_serializes_workflow_id() {
        let result = FlowTriggerResult::Ok {
            status: 200,
            workflow_id: Some("wf-7".into()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, json!({ "ok": true, "status": 200, "workflowId": "wf-7" }));
    }

    #[test]
    fn flow_http_failure_keeps_status() {
        let result = FlowTriggerResult::from(OpsFailure::http_status(502, "bad gateway"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["status"], 502);
        assert_eq!(json["error"], "HTTP 502: bad gateway");
        assert!(json.get("missingConfig").is_none());
    }

    #[test]
    fn cycle_report_preserves_insertion_order() {
        let mut report = CycleReport::new();
        report.insert("rei", FlowTriggerResult::Ok { status: 200, workflow_id: None });
        report.insert(
            "govcon",
            OpsFailure::new(FailureKind::Transport, "x").into(),
        );
        let names: Vec<&str> = report.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["rei", "govcon"]);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.find("rei").unwrap() < json.find("govcon").unwrap());
    }

    #[test]
    fn summary_lists_only_failing_flows() {
        let mut report = CycleReport::new();
        report.insert("rei", FlowTriggerResult::Ok { status: 200, workflow_id: None });
        report.insert(
            "govcon",
            OpsFailure::new(FailureKind::Transport, "x").into(),
        );

        let summary = report.failure_summary().expect("one failure");
        assert!(summary.contains("1 flow(s) failed: govcon"));
        assert!(summary.contains("- govcon (transport): x"));
        assert!(!summary.contains("rei"));
    }

    #[test]
    fn summary_is_none_when_all_ok_or_suspended() {
        let mut report = CycleReport::new();
        report.insert("rei", FlowTriggerResult::Ok { status: 200, workflow_id: None });
        report.insert(
            "govcon",
            OpsFailure::new(FailureKind::Suspended, "suspended").into(),
        );
        assert_eq!(report.failures().count(), 1);
        assert!(report.failure_summary().is_none());
    }
}
