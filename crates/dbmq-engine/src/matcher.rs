//! Mapping matcher – picks the rule an inbound event belongs to.
//!
//! Rules are scanned in table order and the first one whose locator equals
//! the event's wins. Only rules of the event's direction are considered.
//!
//! Signals are matched on their object path alone. Interface and sender are
//! carried in the locator for diagnostics but not compared: the sender a bus
//! reports is a unique connection name (`:1.42`) that rarely equals the
//! well-known name written in a mapping.

use std::fmt;

use dbmq_types::{BridgeError, BrokerMessage, BusSignal, Direction, MappingRule};

use crate::table::MappingTable;

/// What identifies an inbound event for matching purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLocator<'a> {
    Signal {
        path: &'a str,
        interface: &'a str,
        sender: &'a str,
    },
    Topic(&'a str),
}

impl<'a> EventLocator<'a> {
    pub fn of_signal(signal: &'a BusSignal) -> Self {
        EventLocator::Signal {
            path: &signal.path,
            interface: &signal.interface,
            sender: &signal.sender,
        }
    }

    pub fn of_message(message: &'a BrokerMessage) -> Self {
        EventLocator::Topic(&message.topic)
    }

    pub fn direction(&self) -> Direction {
        match self {
            EventLocator::Signal { .. } => Direction::DbusToMqtt,
            EventLocator::Topic(_) => Direction::MqttToDbus,
        }
    }

    fn matches(&self, rule: &MappingRule) -> bool {
        match self {
            EventLocator::Signal { path, .. } => rule.dbus.path == *path,
            EventLocator::Topic(topic) => rule.mqtt.topic == *topic,
        }
    }
}

impl fmt::Display for EventLocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLocator::Signal {
                path,
                interface,
                sender,
            } => write!(
                f,
                "signal at {path} (interface '{interface}', sender '{sender}')"
            ),
            EventLocator::Topic(topic) => write!(f, "topic '{topic}'"),
        }
    }
}

/// A successful match: the rule and its position in the table.
#[derive(Debug, Clone, Copy)]
pub struct Matched<'t> {
    pub index: usize,
    pub rule: &'t MappingRule,
}

impl MappingTable {
    /// Return the first rule of the locator's direction whose locator equals
    /// the event's.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NoMappingMatch`] when no rule matches. This is an
    /// expected outcome, not a fault.
    pub fn find(&self, locator: &EventLocator<'_>) -> Result<Matched<'_>, BridgeError> {
        self.rules_for(locator.direction())
            .find(|(_, rule)| locator.matches(rule))
            .map(|(index, rule)| Matched { index, rule })
            .ok_or_else(|| BridgeError::NoMappingMatch(locator.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmq_types::{MessageKind, Value};

    fn signal_at(path: &str) -> BusSignal {
        BusSignal::new(path, Value::from(0))
    }

    #[test]
    fn empty_table_never_matches() {
        let table = MappingTable::default();
        let signal = signal_at("/com/example/Battery");
        assert!(matches!(
            table.find(&EventLocator::of_signal(&signal)),
            Err(BridgeError::NoMappingMatch(_))
        ));
        assert!(matches!(
            table.find(&EventLocator::Topic("home/battery")),
            Err(BridgeError::NoMappingMatch(_))
        ));
    }

    #[test]
    fn first_matching_rule_wins() {
        let table = MappingTable::new(vec![
            MappingRule::dbus_to_mqtt("/other", "X", "t/other"),
            MappingRule::dbus_to_mqtt("/bat", "Level", "t/first"),
            MappingRule::dbus_to_mqtt("/bat", "Level", "t/second"),
        ]);
        let signal = signal_at("/bat");
        let matched = table.find(&EventLocator::of_signal(&signal)).unwrap();
        assert_eq!(matched.index, 1);
        assert_eq!(matched.rule.mqtt.topic, "t/first");
    }

    #[test]
    fn sender_and_interface_are_not_compared() {
        let mut rule = MappingRule::dbus_to_mqtt("/bat", "Level", "t/bat");
        rule.dbus.sender = "com.example.Power".into();
        rule.dbus.interface = "com.example.Battery".into();
        let table = MappingTable::new(vec![rule]);

        let signal = signal_at("/bat")
            .with_sender(":1.42")
            .with_interface("org.freedesktop.DBus.Properties");
        assert!(table.find(&EventLocator::of_signal(&signal)).is_ok());
    }

    #[test]
    fn directions_do_not_cross() {
        // A reverse rule sharing a path with a signal must not capture it,
        // and a forward rule sharing a topic must not capture a message.
        let table = MappingTable::new(vec![
            MappingRule::mqtt_to_dbus("home/bat", MessageKind::Signal, "/bat", "x.Bat", "Set"),
            MappingRule::dbus_to_mqtt("/other", "Level", "home/bat/set"),
        ]);
        let signal = signal_at("/bat");
        assert!(table.find(&EventLocator::of_signal(&signal)).is_err());
        assert!(table.find(&EventLocator::Topic("home/bat/set")).is_err());
        assert_eq!(
            table.find(&EventLocator::Topic("home/bat")).unwrap().index,
            0
        );
    }

    #[test]
    fn topics_match_exactly_without_wildcards() {
        let table = MappingTable::new(vec![MappingRule::mqtt_to_dbus(
            "home/+/set",
            MessageKind::Signal,
            "/x",
            "x.X",
            "Set",
        )]);
        assert!(table.find(&EventLocator::Topic("home/light/set")).is_err());
        assert!(table.find(&EventLocator::Topic("home/+/set")).is_ok());
    }

    #[test]
    fn no_match_error_names_the_locator() {
        let table = MappingTable::default();
        let message = BrokerMessage::new("home/unknown", "1");
        let err = table.find(&EventLocator::of_message(&message)).unwrap_err();
        assert!(err.to_string().contains("home/unknown"));
    }
}
