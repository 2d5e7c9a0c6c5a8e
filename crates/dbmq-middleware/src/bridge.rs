//! The two bridge loops.
//!
//! * [`DbusToMqtt`] – bus signal → match → resolve → format → broker publish.
//! * [`MqttToDbus`] – broker message → match → argument → bus call / emission.
//!
//! Each loop drains its own [`Inbox`] and processes one event completely
//! before taking the next, so ordering is preserved per direction. Every
//! per-event failure is logged and the loop moves on; only a closed inbox ends
//! a loop.

use std::sync::Arc;

use dbmq_engine::{EventLocator, MappingTable, format, resolve_str, to_bus_arg};
use dbmq_types::{BridgeError, BrokerMessage, BusCall, BusSignal};
use tracing::{debug, error, info, instrument, warn};

use crate::adapter::{BrokerPublisher, BusDispatcher};
use crate::inbox::Inbox;

/// Result of a delivered bus→broker event.
#[derive(Debug, Clone, PartialEq)]
pub struct Forwarded {
    pub rule: usize,
    pub topic: String,
    pub payload: String,
}

/// Bus→broker loop.
#[derive(Clone)]
pub struct DbusToMqtt {
    table: Arc<MappingTable>,
    publisher: Arc<dyn BrokerPublisher>,
}

impl DbusToMqtt {
    pub fn new(table: Arc<MappingTable>, publisher: Arc<dyn BrokerPublisher>) -> Self {
        Self { table, publisher }
    }

    /// Drain `inbox` until every producer has gone away.
    pub async fn run(self, mut inbox: Inbox<BusSignal>) {
        info!("dbus→mqtt loop started");
        while let Some(signal) = inbox.recv().await {
            let _ = self.handle(&signal).await;
        }
        info!("dbus→mqtt loop stopped: inbox closed");
    }

    /// Run one signal through every stage.
    ///
    /// A signal that no rule matches is dropped quietly. If the rule's path
    /// expression cannot be resolved against the body, nothing is published.
    #[instrument(skip_all, fields(signal_id = %signal.id, path = %signal.path))]
    pub async fn handle(&self, signal: &BusSignal) -> Result<Forwarded, BridgeError> {
        let matched = match self.table.find(&EventLocator::of_signal(signal)) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "signal ignored");
                return Err(e);
            }
        };
        let rule = matched.rule;
        let expression = rule.source_path_expression().unwrap_or_default();

        let value = match resolve_str(&signal.body, expression) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    rule = matched.index,
                    expression,
                    member = %signal.member,
                    error = %e,
                    "path resolution failed, nothing published"
                );
                return Err(e);
            }
        };

        let payload = format(value, rule.transform_options());
        let topic = &rule.mqtt.topic;
        if let Err(e) = self.publisher.publish(topic, payload.clone()).await {
            error!(rule = matched.index, topic = %topic, error = %e, "publish failed");
            return Err(e);
        }
        debug!(rule = matched.index, topic = %topic, payload = %payload, "published");

        Ok(Forwarded {
            rule: matched.index,
            topic: topic.clone(),
            payload,
        })
    }
}

/// Broker→bus loop.
#[derive(Clone)]
pub struct MqttToDbus {
    table: Arc<MappingTable>,
    dispatcher: Arc<dyn BusDispatcher>,
}

impl MqttToDbus {
    pub fn new(table: Arc<MappingTable>, dispatcher: Arc<dyn BusDispatcher>) -> Self {
        Self { table, dispatcher }
    }

    pub async fn run(self, mut inbox: Inbox<BrokerMessage>) {
        info!("mqtt→dbus loop started");
        while let Some(message) = inbox.recv().await {
            let _ = self.handle(&message).await;
        }
        info!("mqtt→dbus loop stopped: inbox closed");
    }

    /// Run one broker message through every stage and return the bus call
    /// that was dispatched.
    #[instrument(skip_all, fields(message_id = %message.id, topic = %message.topic))]
    pub async fn handle(&self, message: &BrokerMessage) -> Result<BusCall, BridgeError> {
        let matched = match self.table.find(&EventLocator::of_message(message)) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "message ignored");
                return Err(e);
            }
        };
        let rule = matched.rule;

        let arg = match to_bus_arg(&message.payload, rule.transform_options(), rule.dbus.arg_type) {
            Ok(arg) => arg,
            Err(e) => {
                warn!(rule = matched.index, error = %e, "payload rejected");
                return Err(e);
            }
        };

        let call = BusCall {
            kind: rule.dbus.kind,
            destination: rule.dbus.destination.clone(),
            path: rule.dbus.path.clone(),
            interface: rule.dbus.interface.clone(),
            member: rule.dbus.member.clone(),
            arg,
        };
        if let Err(e) = self.dispatcher.dispatch(call.clone()).await {
            error!(rule = matched.index, call = %call, error = %e, "dispatch failed");
            return Err(e);
        }
        debug!(rule = matched.index, call = %call, "dispatched");
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use dbmq_types::{ArgType, BusArg, MappingRule, MessageKind, Value};

    use crate::inbox::inbox;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BrokerPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError> {
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl BrokerPublisher for FailingPublisher {
        async fn publish(&self, _topic: &str, _payload: String) -> Result<(), BridgeError> {
            Err(BridgeError::DeliveryFailed("broker offline".into()))
        }
    }

    /// Rejects the first `failures` publishes, then records like
    /// [`RecordingPublisher`].
    struct FlakyPublisher {
        failures: AtomicUsize,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl FlakyPublisher {
        fn failing(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                sent: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl BrokerPublisher for FlakyPublisher {
        async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BridgeError::DeliveryFailed("broker offline".into()));
            }
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<BusCall>>,
    }

    #[async_trait]
    impl BusDispatcher for RecordingDispatcher {
        async fn dispatch(&self, call: BusCall) -> Result<(), BridgeError> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    struct FlakyDispatcher {
        failures: AtomicUsize,
        calls: Mutex<Vec<BusCall>>,
    }

    #[async_trait]
    impl BusDispatcher for FlakyDispatcher {
        async fn dispatch(&self, call: BusCall) -> Result<(), BridgeError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BridgeError::DeliveryFailed("service unknown".into()));
            }
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    fn forward(rules: Vec<MappingRule>) -> (Arc<RecordingPublisher>, DbusToMqtt) {
        let publisher = Arc::new(RecordingPublisher::default());
        let bridge = DbusToMqtt::new(Arc::new(MappingTable::new(rules)), publisher.clone());
        (publisher, bridge)
    }

    fn battery_rule() -> MappingRule {
        MappingRule::dbus_to_mqtt("/com/example/Battery", "Level", "home/battery")
    }

    #[tokio::test]
    async fn scenario_a_record_field_is_published() {
        let (publisher, bridge) = forward(vec![battery_rule()]);
        let signal = BusSignal::new(
            "/com/example/Battery",
            Value::record([("Level", Value::from(87)), ("Charging", Value::from(false))]),
        );

        let out = bridge.handle(&signal).await.unwrap();
        assert_eq!(out.rule, 0);
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec![("home/battery".to_string(), "87".to_string())]
        );
    }

    #[tokio::test]
    async fn scenario_b_quotes_are_stripped() {
        let mut rule = battery_rule();
        rule.dbus.remove_quotmark = true;
        let (publisher, bridge) = forward(vec![rule]);
        let signal = BusSignal::new(
            "/com/example/Battery",
            Value::record([("Level", Value::from("42\""))]),
        );

        bridge.handle(&signal).await.unwrap();
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec![("home/battery".to_string(), "42".to_string())]
        );
    }

    #[tokio::test]
    async fn quotes_are_stripped_from_sequence_element() {
        let mut rule = MappingRule::dbus_to_mqtt("/com/example/Sensor", "[0]", "home/sensor");
        rule.dbus.remove_quotmark = true;
        let (publisher, bridge) = forward(vec![rule]);
        let signal = BusSignal::new(
            "/com/example/Sensor",
            Value::sequence([Value::from("42\""), Value::from("x")]),
        );

        bridge.handle(&signal).await.unwrap();
        assert_eq!(publisher.sent.lock().unwrap()[0].1, "42");
    }

    #[tokio::test]
    async fn scenario_c_unmatched_signal_publishes_nothing() {
        let (publisher, bridge) = forward(vec![battery_rule()]);
        let signal = BusSignal::new("/com/example/Other", Value::from(1));

        let err = bridge.handle(&signal).await.unwrap_err();
        assert!(matches!(err, BridgeError::NoMappingMatch(_)));
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scenario_d_nested_path_resolves() {
        let rule = MappingRule::dbus_to_mqtt("/c/e/Climate", "Readings.[2].['temp']", "home/temp");
        let (publisher, bridge) = forward(vec![rule]);
        let body = Value::record([(
            "Readings",
            Value::sequence([
                Value::Mapping(vec![]),
                Value::Mapping(vec![]),
                Value::mapping([("temp", Value::from(19.5))]),
            ]),
        )]);

        bridge.handle(&BusSignal::new("/c/e/Climate", body)).await.unwrap();
        assert_eq!(publisher.sent.lock().unwrap()[0].1, "19.5");
    }

    #[tokio::test]
    async fn scenario_e_resolution_failure_publishes_nothing() {
        let rule = MappingRule::dbus_to_mqtt("/c/e/Climate", "Readings.[5]", "home/temp");
        let (publisher, bridge) = forward(vec![rule]);
        let body = Value::record([(
            "Readings",
            Value::sequence([Value::from(1), Value::from(2), Value::from(3)]),
        )]);

        let err = bridge
            .handle(&BusSignal::new("/c/e/Climate", body))
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::IndexOutOfRange { index: 5, len: 3 });
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_expression_publishes_whole_body() {
        let rule = MappingRule::dbus_to_mqtt("/p", "", "t");
        let (publisher, bridge) = forward(vec![rule]);
        bridge
            .handle(&BusSignal::new("/p", Value::from("on")))
            .await
            .unwrap();
        assert_eq!(publisher.sent.lock().unwrap()[0].1, "on");
    }

    #[tokio::test]
    async fn delivery_failure_is_reported() {
        let bridge = DbusToMqtt::new(
            Arc::new(MappingTable::new(vec![battery_rule()])),
            Arc::new(FailingPublisher),
        );
        let signal = BusSignal::new("/com/example/Battery", Value::record([("Level", Value::from(3))]));
        assert!(matches!(
            bridge.handle(&signal).await,
            Err(BridgeError::DeliveryFailed(_))
        ));
    }

    #[tokio::test]
    async fn run_keeps_going_after_errors_and_stops_when_inbox_closes() {
        let (publisher, bridge) = forward(vec![battery_rule()]);
        let (tx, rx) = inbox("dbus", 8);

        tx.offer(BusSignal::new("/nope", Value::from(0))).unwrap();
        tx.offer(BusSignal::new("/com/example/Battery", Value::from(0))).unwrap();
        tx.offer(BusSignal::new(
            "/com/example/Battery",
            Value::record([("Level", Value::from(55))]),
        ))
        .unwrap();
        drop(tx);

        bridge.run(rx).await;
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec![("home/battery".to_string(), "55".to_string())]
        );
    }

    #[tokio::test]
    async fn run_publishes_after_a_failed_publish() {
        let publisher = Arc::new(FlakyPublisher::failing(1));
        let bridge = DbusToMqtt::new(
            Arc::new(MappingTable::new(vec![battery_rule()])),
            publisher.clone(),
        );
        let (tx, rx) = inbox("dbus", 8);

        for level in [10, 20] {
            tx.offer(BusSignal::new(
                "/com/example/Battery",
                Value::record([("Level", Value::from(level))]),
            ))
            .unwrap();
        }
        drop(tx);

        bridge.run(rx).await;
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec![("home/battery".to_string(), "20".to_string())]
        );
    }

    fn light_rule() -> MappingRule {
        let mut rule = MappingRule::mqtt_to_dbus(
            "home/light/set",
            MessageKind::MethodCall,
            "/light",
            "com.example.Light",
            "SetLevel",
        );
        rule.dbus.destination = Some("com.example.Light".into());
        rule.dbus.arg_type = ArgType::Int64;
        rule
    }

    #[tokio::test]
    async fn broker_message_becomes_method_call() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let bridge = MqttToDbus::new(
            Arc::new(MappingTable::new(vec![light_rule()])),
            dispatcher.clone(),
        );

        let call = bridge
            .handle(&BrokerMessage::new("home/light/set", "40"))
            .await
            .unwrap();
        assert_eq!(call.kind, MessageKind::MethodCall);
        assert_eq!(call.destination.as_deref(), Some("com.example.Light"));
        assert_eq!(call.arg, BusArg::Int64(40));
        assert_eq!(dispatcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_payload_is_not_dispatched() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let bridge = MqttToDbus::new(
            Arc::new(MappingTable::new(vec![light_rule()])),
            dispatcher.clone(),
        );

        let err = bridge
            .handle(&BrokerMessage::new("home/light/set", "bright"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_is_ignored() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let bridge = MqttToDbus::new(
            Arc::new(MappingTable::new(vec![light_rule()])),
            dispatcher.clone(),
        );
        assert!(
            bridge
                .handle(&BrokerMessage::new("home/light/state", "1"))
                .await
                .is_err()
        );
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_is_reported() {
        let dispatcher = Arc::new(FlakyDispatcher {
            failures: AtomicUsize::new(1),
            calls: Mutex::default(),
        });
        let bridge = MqttToDbus::new(
            Arc::new(MappingTable::new(vec![light_rule()])),
            dispatcher.clone(),
        );

        let err = bridge
            .handle(&BrokerMessage::new("home/light/set", "40"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::DeliveryFailed(_)));
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reverse_run_dispatches_after_errors_and_stops_when_inbox_closes() {
        let dispatcher = Arc::new(FlakyDispatcher {
            failures: AtomicUsize::new(1),
            calls: Mutex::default(),
        });
        let bridge = MqttToDbus::new(
            Arc::new(MappingTable::new(vec![light_rule()])),
            dispatcher.clone(),
        );
        let (tx, rx) = inbox("mqtt", 8);

        tx.offer(BrokerMessage::new("home/light/set", "10")).unwrap();
        tx.offer(BrokerMessage::new("home/light/state", "1")).unwrap();
        tx.offer(BrokerMessage::new("home/light/set", "dim")).unwrap();
        tx.offer(BrokerMessage::new("home/light/set", "70")).unwrap();
        drop(tx);

        bridge.run(rx).await;
        let calls = dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arg, BusArg::Int64(70));
    }
}
