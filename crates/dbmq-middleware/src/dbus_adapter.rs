//! D-Bus transport built on `zbus`.
//!
//! * [`connect`] opens the session or system bus.
//! * [`register_matches`] asks the bus daemon to route the signals named by
//!   the bus→broker rules to this connection (`AddMatch`).
//! * [`SignalPump`] turns every inbound signal into a [`BusSignal`] and offers
//!   it to the bus→broker inbox.
//! * [`DbusDispatcher`] is the [`BusDispatcher`] of the broker→bus loop.
//!
//! Signal bodies are converted into the bridge's [`Value`] tree: the argument
//! list and every struct become a sequence, `a{..}` dictionaries become
//! mappings and variants are unwrapped.

use async_trait::async_trait;
use dbmq_engine::MappingTable;
use dbmq_types::{BridgeError, BusArg, BusCall, BusSignal, DbusEndpoint, MessageKind, Scalar, Value};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};
use zbus::fdo::DBusProxy;
use zbus::message::Type as MessageType;
use zbus::zvariant::{self, Structure, Value as ZValue};
use zbus::{Connection, MatchRule, Message, MessageStream};

use crate::adapter::BusDispatcher;
use crate::inbox::{InboxSender, OfferError};

/// Which message bus to attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

impl std::str::FromStr for BusKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(BusKind::Session),
            "system" => Ok(BusKind::System),
            other => Err(BridgeError::Config(format!(
                "unknown bus '{other}', expected 'session' or 'system'"
            ))),
        }
    }
}

/// Open a connection to `bus`.
pub async fn connect(bus: BusKind) -> Result<Connection, BridgeError> {
    let conn = match bus {
        BusKind::Session => Connection::session().await,
        BusKind::System => Connection::system().await,
    }
    .map_err(|e| BridgeError::Connection(format!("{bus:?} bus: {e}")))?;
    info!(bus = ?bus, unique_name = ?conn.unique_name().map(|n| n.to_string()), "dbus connected");
    Ok(conn)
}

/// Register one signal match rule per bus→broker mapping.
///
/// Returns the number of rules registered.
pub async fn register_matches(conn: &Connection, table: &MappingTable) -> Result<usize, BridgeError> {
    let proxy = DBusProxy::new(conn)
        .await
        .map_err(|e| BridgeError::Connection(format!("dbus daemon proxy: {e}")))?;

    let mut count = 0;
    for filter in table.signal_filters() {
        let rule = match_rule(filter)?;
        let shown = rule.to_string();
        proxy
            .add_match_rule(rule)
            .await
            .map_err(|e| BridgeError::Connection(format!("AddMatch {shown}: {e}")))?;
        info!(rule = %shown, "dbus match registered");
        count += 1;
    }
    Ok(count)
}

/// `type='signal'` plus path, interface and sender where the mapping sets them.
fn match_rule(filter: &DbusEndpoint) -> Result<MatchRule<'_>, BridgeError> {
    let invalid = |e: zbus::Error| BridgeError::Config(format!("match rule for '{}': {e}", filter.path));

    let mut builder = MatchRule::builder().msg_type(MessageType::Signal);
    if !filter.path.is_empty() {
        builder = builder.path(filter.path.as_str()).map_err(invalid)?;
    }
    if !filter.interface.is_empty() {
        builder = builder.interface(filter.interface.as_str()).map_err(invalid)?;
    }
    if !filter.sender.is_empty() {
        builder = builder.sender(filter.sender.as_str()).map_err(invalid)?;
    }
    Ok(builder.build())
}

/// Forwards bus signals into the bus→broker inbox.
pub struct SignalPump {
    stream: MessageStream,
    inbox: InboxSender<BusSignal>,
}

impl SignalPump {
    pub fn new(conn: &Connection, inbox: InboxSender<BusSignal>) -> Self {
        Self {
            stream: MessageStream::from(conn),
            inbox,
        }
    }

    /// Run until the bus connection ends or the inbox closes.
    pub async fn run(mut self) {
        while let Some(item) = self.stream.next().await {
            let msg = match item {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "dbus stream error");
                    continue;
                }
            };
            if msg.message_type() != MessageType::Signal {
                continue;
            }
            if self.inbox.offer(to_bus_signal(&msg)) == Err(OfferError::Closed) {
                break;
            }
        }
        info!("dbus signal pump stopped");
    }
}

fn to_bus_signal(msg: &Message) -> BusSignal {
    let header = msg.header();
    let name = |s: Option<String>| s.unwrap_or_default();

    let signal = BusSignal::new(name(header.path().map(|p| p.to_string())), signal_body(msg))
        .with_interface(name(header.interface().map(|i| i.to_string())))
        .with_member(name(header.member().map(|m| m.to_string())))
        .with_sender(name(header.sender().map(|s| s.to_string())));
    debug!(
        signal_id = %signal.id,
        path = %signal.path,
        member = %signal.member,
        sender = %signal.sender,
        "dbus signal"
    );
    signal
}

/// The argument list as a sequence. An empty or undecodable body yields an
/// empty sequence.
fn signal_body(msg: &Message) -> Value {
    let has_args = msg
        .header()
        .signature()
        .is_some_and(|sig| !sig.as_str().is_empty());
    if !has_args {
        return Value::Sequence(Vec::new());
    }
    let body = msg.body();
    match body.deserialize::<Structure<'_>>() {
        Ok(args) => Value::Sequence(args.fields().iter().map(to_value).collect()),
        Err(e) => {
            debug!(error = %e, "signal body not decodable");
            Value::Sequence(Vec::new())
        }
    }
}

/// Convert a D-Bus value into the bridge's value tree.
pub fn to_value(value: &ZValue<'_>) -> Value {
    match value {
        ZValue::U8(n) => Value::from(*n),
        ZValue::Bool(b) => Value::from(*b),
        ZValue::I16(n) => Value::from(*n),
        ZValue::U16(n) => Value::from(*n),
        ZValue::I32(n) => Value::from(*n),
        ZValue::U32(n) => Value::from(*n),
        ZValue::I64(n) => Value::from(*n),
        ZValue::U64(n) => Value::from(*n),
        ZValue::F64(n) => Value::from(*n),
        ZValue::Str(s) => Value::from(s.as_str()),
        ZValue::Signature(s) => Value::from(s.as_str()),
        ZValue::ObjectPath(p) => Value::from(p.as_str()),
        ZValue::Value(inner) => to_value(inner),
        ZValue::Array(items) => Value::Sequence(items.iter().map(to_value).collect()),
        ZValue::Dict(dict) => Value::Mapping(
            dict.iter()
                .map(|(k, v)| (to_scalar(k), to_value(v)))
                .collect(),
        ),
        ZValue::Structure(fields) => Value::Sequence(fields.fields().iter().map(to_value).collect()),
        other => Value::from(format!("{other:?}")),
    }
}

fn to_scalar(key: &ZValue<'_>) -> Scalar {
    match to_value(key) {
        Value::Scalar(s) => s,
        other => Scalar::Text(other.to_string()),
    }
}

/// Performs method calls and signal emissions for the broker→bus loop.
#[derive(Clone)]
pub struct DbusDispatcher {
    conn: Connection,
}

impl DbusDispatcher {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    async fn send<B>(&self, call: &BusCall, body: &B) -> Result<(), BridgeError>
    where
        B: serde::Serialize + zvariant::DynamicType + Sync,
    {
        let path = call.path.as_str();
        let interface = call.interface.as_str();
        let member = call.member.as_str();

        let result = match call.kind {
            MessageKind::MethodCall => {
                let destination = call.destination.as_deref().ok_or_else(|| {
                    BridgeError::DeliveryFailed(format!("{call}: no destination configured"))
                })?;
                self.conn
                    .call_method(Some(destination), path, Some(interface), member, body)
                    .await
                    .map(|_| ())
            }
            MessageKind::Signal => {
                self.conn
                    .emit_signal(None::<&str>, path, interface, member, body)
                    .await
            }
        };
        result.map_err(|e| BridgeError::DeliveryFailed(format!("{call}: {e}")))
    }
}

#[async_trait]
impl BusDispatcher for DbusDispatcher {
    async fn dispatch(&self, call: BusCall) -> Result<(), BridgeError> {
        match &call.arg {
            BusArg::Text(s) => self.send(&call, &(s.as_str(),)).await,
            BusArg::Int64(n) => self.send(&call, &(*n,)).await,
            BusArg::Double(n) => self.send(&call, &(*n,)).await,
            BusArg::Boolean(b) => self.send(&call, &(*b,)).await,
        }
    }
}
