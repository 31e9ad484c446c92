//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! observer receives every message without any single observer blocking the
//! publish cycle.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::Frames`] | One fused frame per publish cycle |
//! | [`Topic::Viewports`] | Viewport assignments after camera set / geometry changes |
//! | [`Topic::Kicks`] | Detected kick events |
//! | [`Topic::ModelIdentification`] | Ball model identification results |
//! | [`Topic::Quality`] | Quality annotations raised by the inspectors |

use fieldsense_types::VisionError;
use tokio::sync::broadcast;
use tracing::warn;

use crate::event::{Event, EventPayload};

/// Number of buffered events before old ones are dropped for slow observers.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Frames,
    Viewports,
    Kicks,
    ModelIdentification,
    Quality,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    frames: broadcast::Sender<Event>,
    viewports: broadcast::Sender<Event>,
    kicks: broadcast::Sender<Event>,
    model_identification: broadcast::Sender<Event>,
    quality: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (frames, _) = broadcast::channel(capacity);
        let (viewports, _) = broadcast::channel(capacity);
        let (kicks, _) = broadcast::channel(capacity);
        let (model_identification, _) = broadcast::channel(capacity);
        let (quality, _) = broadcast::channel(capacity);
        Self {
            frames,
            viewports,
            kicks,
            model_identification,
            quality,
        }
    }

    /// Publish `event` to the given [`Topic`].
    ///
    /// Returns the number of observers that were handed the event; `Ok(0)`
    /// when nobody is listening, which is the normal state for diagnostic
    /// topics.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, VisionError> {
        let sender = self.topic_sender(topic);
        if sender.receiver_count() == 0 {
            return Ok(0);
        }
        sender
            .send(event)
            .map_err(|e| VisionError::Channel(format!("event bus send error on {topic:?}: {e}")))
    }

    /// Wrap `payload` in an [`Event`] from `source` and route it by payload
    /// kind.
    pub fn emit(&self, source: &str, payload: EventPayload) -> Result<usize, VisionError> {
        let topic = payload.topic();
        self.publish_to(topic, Event::new(source, payload))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of observers currently attached to `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Frames => &self.frames,
            Topic::Viewports => &self.viewports,
            Topic::Kicks => &self.kicks,
            Topic::ModelIdentification => &self.model_identification,
            Topic::Quality => &self.quality,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Receiver
// ────────────────────────────────────────────────────────────────────────────

/// An async receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// `Err(RecvError::Lagged(n))` means the observer fell behind and `n`
    /// events were dropped; `Err(RecvError::Closed)` means the bus is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Like [`TopicReceiver::recv`], but skips over lag and returns `None`
    /// only once the bus has shut down.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "observer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll; `None` when nothing is queued.
    pub fn try_next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "observer lagged");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fieldsense_perception::FusedFrame;
    use fieldsense_types::{AnnotationKind, BotId, KickEvent, KickKind, QualityAnnotation};
    use nalgebra::Vector3;

    fn frame_payload(id: u64) -> EventPayload {
        EventPayload::Frame(Arc::new(FusedFrame {
            id,
            ..Default::default()
        }))
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() -> Result<(), VisionError> {
        let bus = EventBus::default();
        assert_eq!(bus.emit("test", frame_payload(1))?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn multiple_observers_receive_same_frame() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut first = bus.subscribe_to(Topic::Frames);
        let mut second = bus.subscribe_to(Topic::Frames);

        assert_eq!(bus.emit("vision_filter", frame_payload(7))?, 2);

        for rx in [&mut first, &mut second] {
            match rx.recv().await?.payload {
                EventPayload::Frame(frame) => assert_eq!(frame.id, 7),
                other => panic!("unexpected payload {other:?}"),
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn payloads_are_routed_by_kind() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut kicks = bus.subscribe_to(Topic::Kicks);
        let mut quality = bus.subscribe_to(Topic::Quality);

        bus.emit(
            "preprocessor",
            EventPayload::Kick(KickEvent {
                kind: KickKind::Chip,
                position: Vector3::zeros(),
                velocity: Vector3::new(2000.0, 0.0, 3000.0),
                kicking_bot: BotId::blue(1),
                timestamp: 5,
            }),
        )?;

        assert!(matches!(kicks.recv().await?.payload, EventPayload::Kick(_)));
        assert!(quality.try_next().is_none());

        bus.emit(
            "inspector",
            EventPayload::Quality(QualityAnnotation::new(AnnotationKind::NonFiniteState, 5, "nan")),
        )?;
        assert!(matches!(quality.try_next().map(|e| e.payload), Some(EventPayload::Quality(_))));
        Ok(())
    }

    #[tokio::test]
    async fn slow_observer_lags_instead_of_blocking() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::Frames);
        for id in 0..1000 {
            let _ = bus.emit("flood", frame_payload(id));
        }
        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
        // `next` skips the gap and resumes at the oldest retained frame.
        assert!(slow.next().await.is_some());
    }

    #[tokio::test]
    async fn receiver_sees_close_when_bus_dropped() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Viewports);
        drop(bus);
        assert!(rx.next().await.is_none());
    }
}
