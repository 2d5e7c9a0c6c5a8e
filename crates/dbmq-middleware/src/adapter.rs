//! Transport seams.
//!
//! The bridge loops never speak to the broker or the bus directly. They hand
//! finished work to an outbound adapter and treat it as a black box that either
//! delivers or returns [`BridgeError::DeliveryFailed`].
//!
//! # Overview
//!
//! - [`BrokerPublisher`] – delivers a formatted payload to a broker topic.
//!   Implemented by [`MqttPublisher`][crate::mqtt_adapter::MqttPublisher].
//! - [`BusDispatcher`] – performs a method call or signal emission on the bus.
//!   Implemented by [`DbusDispatcher`][crate::dbus_adapter::DbusDispatcher].

use async_trait::async_trait;
use dbmq_types::{BridgeError, BusCall};

/// Outbound side of the bus→broker loop.
///
/// # Contract
///
/// Publishes are fire-and-forget at QoS 0 and never retained. An `Ok` means
/// the payload was handed to the transport, not that any subscriber saw it.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError>;
}

/// Outbound side of the broker→bus loop.
#[async_trait]
pub trait BusDispatcher: Send + Sync {
    async fn dispatch(&self, call: BusCall) -> Result<(), BridgeError>;
}
