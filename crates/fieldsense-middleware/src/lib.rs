//! `fieldsense-middleware` – delivery of pipeline output to observers.
//!
//! Routes fused frames and diagnostic events from the vision filter to any
//! number of observers without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`event`] – the [`Event`] envelope and its [`EventPayload`] variants.

pub mod bus;
pub mod event;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use event::{Event, EventPayload};
