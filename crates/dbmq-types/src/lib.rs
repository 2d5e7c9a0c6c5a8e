//! `dbmq-types` – shared vocabulary of the D-Bus ⇄ MQTT bridge.
//!
//! - [`value`] – the dynamically shaped [`Value`] tree payloads are converted
//!   into.
//! - [`mapping`] – [`MappingRule`] records from the configuration file.
//! - [`event`] – inbound [`BusSignal`] / [`BrokerMessage`] descriptors and the
//!   outbound [`BusCall`].
//! - [`error`] – [`BridgeError`], used by every crate in the workspace.

pub mod error;
pub mod event;
pub mod mapping;
pub mod value;

pub use error::BridgeError;
pub use event::{BrokerMessage, BusArg, BusCall, BusSignal};
pub use mapping::{
    ArgType, DbusEndpoint, Direction, MappingRule, MessageKind, Mode, MqttEndpoint,
    TransformOptions,
};
pub use value::{Scalar, Value};
