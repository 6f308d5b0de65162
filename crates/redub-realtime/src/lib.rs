//! Subscription gateway: per-client, reference-counted job subscriptions
//! with per-job fan-out rooms and global broadcasts.

pub mod client;
pub mod gateway;
pub mod message;
pub mod registry;

pub use client::{ClientHandle, ClientId};
pub use gateway::SubscriptionGateway;
pub use message::{InboundMessage, ServerMessage};
pub use registry::SubscriptionRegistry;
