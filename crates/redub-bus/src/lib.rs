//! In-process event bus: five typed fan-out channels plus an ordered
//! firehose consumed by the event aggregator.

pub mod bus;
pub mod message;

pub use bus::EventBus;
pub use message::{
    Channel, ErrorPayload, EventMessage, EventPayload, LogLevel, LogPayload, ProgressPayload,
    Stage, StateChangePayload,
};
