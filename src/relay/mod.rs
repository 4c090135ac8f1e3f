//! Relay handlers.
//!
//! - [`publish::PublishHandler`] turns `POST /publish` bodies into broker events
//! - [`subscriber::SubscriptionRegistry`] routes delivered messages to
//!   [`subscriber::MessageHandler`]s
//! - [`health::handle_health`] answers liveness probes
//!
//! Handlers get their broker client and log sink injected; none of them hold
//! state across invocations.

pub mod health;
pub mod log;
pub mod publish;
pub mod subscriber;

pub use health::{handle_health, HEALTH_MESSAGE};
pub use log::{EventLog, MemoryLog, TracingLog};
pub use publish::PublishHandler;
pub use subscriber::{MessageHandler, SubscriptionRegistry, TopicMessageLogger};
