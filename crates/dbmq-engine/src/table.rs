//! [`MappingTable`] – the ordered, immutable rule set.
//!
//! Built once from the configuration file and shared read-only (behind an
//! `Arc`) by both bridge loops. There is no way to add, remove or reorder
//! rules after construction.

use dbmq_types::{DbusEndpoint, Direction, MappingRule, MessageKind};

/// Ordered collection of [`MappingRule`]s.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingRule> {
        self.rules.iter()
    }

    /// Rules of one direction together with their position in the table.
    pub fn rules_for(&self, direction: Direction) -> impl Iterator<Item = (usize, &MappingRule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.direction == direction)
    }

    /// Bus-side filters of every bus→broker rule, in table order.
    ///
    /// Used to register one signal match rule per mapping with the bus.
    pub fn signal_filters(&self) -> impl Iterator<Item = &DbusEndpoint> {
        self.rules_for(Direction::DbusToMqtt).map(|(_, rule)| &rule.dbus)
    }

    /// Distinct topics of broker→bus rules, in order of first appearance.
    pub fn command_topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for (_, rule) in self.rules_for(Direction::MqttToDbus) {
            if !topics.contains(&rule.mqtt.topic.as_str()) {
                topics.push(&rule.mqtt.topic);
            }
        }
        topics
    }

    /// Describe rules that can never deliver anything.
    ///
    /// The table is still usable; callers log these at startup. Path
    /// expressions are deliberately not checked here.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.mqtt.topic.is_empty() {
                out.push(format!("mapping #{index}: empty mqtt.topic"));
            }
            if rule.dbus.path.is_empty() {
                out.push(format!("mapping #{index}: empty dbus.path"));
            }
            match rule.direction {
                Direction::DbusToMqtt => {
                    if rule.dbus.kind != MessageKind::Signal {
                        out.push(format!(
                            "mapping #{index}: dbus_to_mqtt rules only receive signals, got dbus.type '{}'",
                            rule.dbus.kind
                        ));
                    }
                }
                Direction::MqttToDbus => {
                    if rule.dbus.member.is_empty() || rule.dbus.interface.is_empty() {
                        out.push(format!(
                            "mapping #{index}: mqtt_to_dbus rules need dbus.interface and dbus.member"
                        ));
                    }
                    if rule.dbus.kind == MessageKind::MethodCall && rule.dbus.destination.is_none() {
                        out.push(format!(
                            "mapping #{index}: method calls need dbus.destination"
                        ));
                    }
                }
            }
        }
        out
    }
}
