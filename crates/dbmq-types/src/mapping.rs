//! Mapping rule records as they appear in the configuration file.
//!
//! Field names follow the external configuration format (`mqtt.topic`,
//! `dbus.structPath`, `dbus.removeQuotmark`, ...). Rules are parsed once at
//! startup and never mutated afterwards. Path expressions are kept as text:
//! their syntax is checked when an event is resolved, not at load time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which way a rule translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Bus signal in, broker message out.
    #[default]
    DbusToMqtt,
    /// Broker message in, bus method call or signal emission out.
    MqttToDbus,
}

/// Translation style. Only extract-and-forward is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    #[serde(alias = "passtrough")]
    Passthrough,
}

/// Kind of bus message a rule listens for or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Signal,
    #[serde(alias = "method")]
    MethodCall,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Signal => f.write_str("signal"),
            MessageKind::MethodCall => f.write_str("method_call"),
        }
    }
}

/// Type of the single argument sent on the bus for broker→bus rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
    Int64,
    Double,
    Boolean,
}

/// Broker side of a rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MqttEndpoint {
    /// Topic published to (bus→broker) or subscribed to (broker→bus).
    #[serde(default)]
    pub topic: String,
}

/// Bus side of a rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbusEndpoint {
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub sender: String,
    /// Path expression into the signal body (bus→broker only).
    #[serde(default)]
    pub struct_path: String,
    #[serde(default)]
    pub remove_quotmark: bool,
    /// Method or signal name (broker→bus only).
    #[serde(default)]
    pub member: String,
    /// Bus name receiving method calls (broker→bus only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub arg_type: ArgType,
}

/// Normalization flags applied while formatting a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformOptions {
    /// Remove every `"` from the formatted output.
    pub strip_quotes: bool,
}

/// One directional translation rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MappingRule {
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub mqtt: MqttEndpoint,
    #[serde(default)]
    pub dbus: DbusEndpoint,
    #[serde(default)]
    pub mode: Mode,
}

impl MappingRule {
    /// Bus→broker rule forwarding `struct_path` of signals on `path` to
    /// `topic`.
    pub fn dbus_to_mqtt(
        path: impl Into<String>,
        struct_path: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            direction: Direction::DbusToMqtt,
            mqtt: MqttEndpoint {
                topic: topic.into(),
            },
            dbus: DbusEndpoint {
                kind: MessageKind::Signal,
                path: path.into(),
                struct_path: struct_path.into(),
                ..DbusEndpoint::default()
            },
            mode: Mode::Passthrough,
        }
    }

    /// Broker→bus rule turning messages on `topic` into a `kind` message to
    /// `interface.member` at `path`.
    pub fn mqtt_to_dbus(
        topic: impl Into<String>,
        kind: MessageKind,
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            direction: Direction::MqttToDbus,
            mqtt: MqttEndpoint {
                topic: topic.into(),
            },
            dbus: DbusEndpoint {
                kind,
                path: path.into(),
                interface: interface.into(),
                member: member.into(),
                ..DbusEndpoint::default()
            },
            mode: Mode::Passthrough,
        }
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            strip_quotes: self.dbus.remove_quotmark,
        }
    }

    /// Path expression to extract, or `None` for broker→bus rules where the
    /// whole message body is the value.
    pub fn source_path_expression(&self) -> Option<&str> {
        match self.direction {
            Direction::DbusToMqtt => Some(&self.dbus.struct_path),
            Direction::MqttToDbus => None,
        }
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::DbusToMqtt => write!(
                f,
                "dbus {} [{}] -> mqtt {}",
                self.dbus.path, self.dbus.struct_path, self.mqtt.topic
            ),
            Direction::MqttToDbus => write!(
                f,
                "mqtt {} -> dbus {} {} {}.{}",
                self.mqtt.topic,
                self.dbus.kind,
                self.dbus.path,
                self.dbus.interface,
                self.dbus.member
            ),
        }
    }
}
