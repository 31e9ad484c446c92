//! Envelope and payloads carried on the [`EventBus`](crate::EventBus).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldsense_perception::{FusedFrame, ViewportUpdate};
use fieldsense_types::{BallModelIdentResult, KickEvent, QualityAnnotation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Wall-clock publication time (the payload carries its own vision time).
    pub timestamp: DateTime<Utc>,
    /// Component that produced the event, e.g. `"vision_filter"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// A freshly published fused frame. Shared, never mutated.
    Frame(Arc<FusedFrame>),
    Viewport(ViewportUpdate),
    Kick(KickEvent),
    ModelIdentification(BallModelIdentResult),
    Quality(QualityAnnotation),
}

impl EventPayload {
    /// Topic lane this payload is routed to.
    pub fn topic(&self) -> crate::Topic {
        use crate::Topic;
        match self {
            EventPayload::Frame(_) => Topic::Frames,
            EventPayload::Viewport(_) => Topic::Viewports,
            EventPayload::Kick(_) => Topic::Kicks,
            EventPayload::ModelIdentification(_) => Topic::ModelIdentification,
            EventPayload::Quality(_) => Topic::Quality,
        }
    }
}
