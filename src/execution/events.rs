use crate::redaction::Redactor;
use crate::shared::time::now_rfc3339;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    StepSkipped,
    StepFailed,
    Custom,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StepSkipped => "StepSkipped",
            Self::StepFailed => "StepFailed",
            Self::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit event. `data` has already been redacted when an event exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub index: usize,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    pub correlation_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EventSinkError {
    pub message: String,
}

impl EventSinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Host-supplied destination for streamed events.
pub trait EventSink {
    fn write_event(&self, event: &Event) -> Result<(), EventSinkError>;
}

/// Per-execution event buffer. Every event is redacted, buffered, and then
/// forwarded to the sink while the sink keeps accepting them. A sink failure
/// never interrupts buffering; it is remembered with the index of the event
/// that was rejected.
pub struct EventWriter<'s> {
    redactor: Redactor,
    correlation_id: String,
    sink: Option<&'s dyn EventSink>,
    events: Vec<Event>,
    sink_failure: Option<(usize, EventSinkError)>,
}

impl<'s> EventWriter<'s> {
    pub fn new(
        redactor: Redactor,
        correlation_id: impl Into<String>,
        sink: Option<&'s dyn EventSink>,
    ) -> Self {
        Self {
            redactor,
            correlation_id: correlation_id.into(),
            sink,
            events: Vec::new(),
            sink_failure: None,
        }
    }

    pub fn write_event(
        &mut self,
        event_type: EventType,
        message: impl Into<String>,
        step_name: Option<&str>,
        data: Option<Map<String, Value>>,
    ) {
        let event = Event {
            index: self.events.len(),
            event_type,
            message: message.into(),
            step_name: step_name.map(str::to_string),
            data: data.map(|data| self.redactor.redact_map(&data)),
            correlation_id: self.correlation_id.clone(),
            timestamp: now_rfc3339(),
        };
        if self.sink_failure.is_none() {
            if let Some(sink) = self.sink {
                if let Err(err) = sink.write_event(&event) {
                    self.sink_failure = Some((event.index, err));
                }
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Index of the first rejected event and the sink's error.
    pub fn sink_failure(&self) -> Option<(usize, &EventSinkError)> {
        self.sink_failure
            .as_ref()
            .map(|(index, err)| (*index, err))
    }

    pub fn into_parts(self) -> (Vec<Event>, Option<(usize, EventSinkError)>) {
        (self.events, self.sink_failure)
    }
}
