//! `dbmq-middleware` – transports and the bridge loops
//!
//! Moves events between the message bus and the broker without caring about
//! their meaning; every decision is delegated to `dbmq-engine`.
//!
//! # Modules
//!
//! - [`bridge`] – the bus→broker and broker→bus loops.
//! - [`adapter`] – outbound transport traits the loops deliver through.
//! - [`inbox`] – bounded, drop-on-full queues between transports and loops.
//! - [`mqtt_adapter`] – `rumqttc` client, publisher and event-loop pump.
//! - [`dbus_adapter`] – `zbus` connection, `AddMatch` registration, signal
//!   pump and dispatcher.

pub mod adapter;
pub mod bridge;
pub mod dbus_adapter;
pub mod inbox;
pub mod mqtt_adapter;

pub use adapter::{BrokerPublisher, BusDispatcher};
pub use bridge::{DbusToMqtt, Forwarded, MqttToDbus};
pub use dbus_adapter::{BusKind, DbusDispatcher, SignalPump};
pub use inbox::{INBOUND_CAPACITY, Inbox, InboxSender, OfferError, inbox};
pub use mqtt_adapter::{MqttPublisher, MqttPump, MqttSettings};
