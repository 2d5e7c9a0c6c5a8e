//! Event descriptors exchanged between transports and bridge loops.

use std::fmt;

use uuid::Uuid;

use crate::mapping::MessageKind;
use crate::value::Value;

/// A signal received from the bus.
#[derive(Debug, Clone)]
pub struct BusSignal {
    pub id: Uuid,
    /// Object path the signal was emitted from.
    pub path: String,
    pub interface: String,
    pub member: String,
    /// Unique bus name of the emitter, when the bus reported one.
    pub sender: String,
    pub body: Value,
}

impl BusSignal {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            interface: String::new(),
            member: String::new(),
            sender: String::new(),
            body,
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = member.into();
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }
}

/// A message received from the broker.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub id: Uuid,
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Single typed argument attached to an outbound bus message.
#[derive(Debug, Clone, PartialEq)]
pub enum BusArg {
    Text(String),
    Int64(i64),
    Double(f64),
    Boolean(bool),
}

impl fmt::Display for BusArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusArg::Text(s) => write!(f, "{s:?}"),
            BusArg::Int64(i) => write!(f, "{i}"),
            BusArg::Double(x) => write!(f, "{x}"),
            BusArg::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Outbound bus method call or signal emission.
#[derive(Debug, Clone, PartialEq)]
pub struct BusCall {
    pub kind: MessageKind,
    /// Bus name to address; required for method calls, optional for signals.
    pub destination: Option<String>,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub arg: BusArg,
}

impl fmt::Display for BusCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}({}) at {}",
            self.kind, self.interface, self.member, self.arg, self.path
        )?;
        if let Some(dest) = &self.destination {
            write!(f, " on {dest}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_builder_fills_locator_fields() {
        let signal = BusSignal::new("/com/example/Battery", Value::from(1))
            .with_interface("com.example.Battery")
            .with_member("Changed")
            .with_sender(":1.7");
        assert_eq!(signal.path, "/com/example/Battery");
        assert_eq!(signal.interface, "com.example.Battery");
        assert_eq!(signal.member, "Changed");
        assert_eq!(signal.sender, ":1.7");
    }

    #[test]
    fn each_event_gets_its_own_id() {
        let a = BrokerMessage::new("t", "1");
        let b = BrokerMessage::new("t", "1");
        assert_ne!(a.id, b.id);
        assert_eq!(a.payload, b"1".to_vec());
    }

    #[test]
    fn bus_call_display_is_readable() {
        let call = BusCall {
            kind: MessageKind::MethodCall,
            destination: Some("com.example.Light".into()),
            path: "/light".into(),
            interface: "com.example.Light".into(),
            member: "SetLevel".into(),
            arg: BusArg::Int64(40),
        };
        assert_eq!(
            call.to_string(),
            "method_call com.example.Light.SetLevel(40) at /light on com.example.Light"
        );
    }
}
