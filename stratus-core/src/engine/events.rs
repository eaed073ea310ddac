//! Engine event stream types.
//!
//! The engine reports progress as raw JSON events plus free text. Events are
//! classified by their discriminator field into a small set of categories the
//! progress interpreter understands.

use crate::types::ChangeCounts;
use serde_json::Value;

/// One message from the engine, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// A line of raw engine output.
    Text(String),
    /// A structured engine event.
    Event(EngineEvent),
}

/// A raw engine event (one line of the engine's JSON event log).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent(pub Value);

/// Lifecycle phase of a resource event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePhase {
    PreCreate,
    PreUpdate,
    PreDelete,
    OutputsReady,
}

impl ResourcePhase {
    /// Whether this phase means infrastructure is about to change.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::OutputsReady)
    }
}

/// Normalized view of one resource lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    /// Fully qualified type token (`aws:s3/bucket:Bucket`).
    pub resource_type: String,
    /// Logical resource name.
    pub name: String,
    pub phase: ResourcePhase,
}

/// Category of an engine event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventCategory {
    /// Operation starting.
    Prelude,
    /// Operation finished; carries the engine's change counts when present.
    Summary(Option<ChangeCounts>),
    /// Resource lifecycle event.
    Resource(ResourceEvent),
    /// Free-text progress hint.
    Diagnostic { message: String, severity: String },
    /// Anything else (no-op resource steps, policy events, ...).
    Other,
}

impl EngineEvent {
    /// Parse one event-log line.
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str::<Value>(line).ok().filter(Value::is_object).map(Self)
    }

    /// Classify the event by its discriminator field.
    pub fn classify(&self) -> EventCategory {
        let event = &self.0;

        if event.get("preludeEvent").is_some() {
            return EventCategory::Prelude;
        }

        if let Some(summary) = event.get("summaryEvent") {
            return EventCategory::Summary(
                summary.get("resourceChanges").map(ChangeCounts::from_resource_changes),
            );
        }

        if let Some(metadata) = event.get("resourcePreEvent").and_then(|e| e.get("metadata")) {
            let phase = match metadata.get("op").and_then(Value::as_str).unwrap_or_default() {
                "create" | "create-replacement" | "import" => ResourcePhase::PreCreate,
                "update" | "replace" => ResourcePhase::PreUpdate,
                "delete" | "delete-replaced" | "discard" => ResourcePhase::PreDelete,
                _ => return EventCategory::Other,
            };
            return resource_event(metadata, phase);
        }

        if let Some(metadata) = event.get("resOutputsEvent").and_then(|e| e.get("metadata")) {
            return resource_event(metadata, ResourcePhase::OutputsReady);
        }

        if let Some(diag) = event.get("diagnosticEvent") {
            let text = |key: &str| diag.get(key).and_then(Value::as_str).unwrap_or_default();
            return EventCategory::Diagnostic {
                message: text("message").trim().to_string(),
                severity: text("severity").to_string(),
            };
        }

        EventCategory::Other
    }
}

fn resource_event(metadata: &Value, phase: ResourcePhase) -> EventCategory {
    let resource_type = metadata.get("type").and_then(Value::as_str).unwrap_or_default();
    if resource_type.is_empty() || is_internal_type(resource_type) {
        return EventCategory::Other;
    }

    let urn = metadata.get("urn").and_then(Value::as_str).unwrap_or_default();
    let name = urn.rsplit("::").next().unwrap_or(urn);

    EventCategory::Resource(ResourceEvent {
        resource_type: resource_type.to_string(),
        name: name.to_string(),
        phase,
    })
}

/// Engine bookkeeping resources (the stack root and providers) are not
/// user-visible infrastructure.
fn is_internal_type(resource_type: &str) -> bool {
    resource_type == "pulumi:pulumi:Stack" || resource_type.starts_with("pulumi:providers:")
}
