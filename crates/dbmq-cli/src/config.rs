//! Bridge configuration – reads `config.json` (or a `.toml` equivalent).

use std::fs;
use std::path::{Path, PathBuf};

use dbmq_engine::MappingTable;
use dbmq_middleware::{BusKind, MqttSettings};
use dbmq_types::{BridgeError, MappingRule};
use serde::Deserialize;
use tracing::warn;
use zeroize::Zeroizing;

/// File used when neither a CLI argument nor `DBMQ_CONFIG` names one.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Top-level configuration record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default, alias = "Dbus")]
    pub dbus: DbusSection,
    #[serde(default, alias = "Mqtt")]
    pub mqtt: MqttSection,
    /// Ordered mapping rules; earlier rules win.
    #[serde(default, alias = "Mapping")]
    pub mapping: Vec<MappingRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbusSection {
    #[serde(default)]
    pub bus: BusKind,
}

/// Broker connection settings.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSection {
    /// Broker URLs. Only the first entry is used.
    #[serde(default = "default_servers", alias = "Servers")]
    pub servers: Vec<String>,

    #[serde(default, alias = "ClientID", alias = "clientID")]
    pub client_id: String,

    #[serde(default, alias = "Username")]
    pub username: String,

    /// Wiped from memory when the config is dropped.
    #[serde(default, alias = "Password")]
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for MqttSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSection")
            .field("servers", &self.servers)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .finish()
    }
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            client_id: String::new(),
            username: String::new(),
            password: Zeroizing::new(String::new()),
        }
    }
}

fn default_servers() -> Vec<String> {
    vec!["tcp://localhost:1883".to_string()]
}

impl MqttSection {
    /// Transport settings for the first configured server.
    pub fn settings(&self) -> Result<MqttSettings, BridgeError> {
        let server = self
            .servers
            .first()
            .ok_or_else(|| BridgeError::Config("mqtt.servers is empty".to_string()))?;
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Ok(MqttSettings {
            server: server.clone(),
            client_id: self.client_id.clone(),
            username: non_empty(&self.username),
            password: non_empty(&self.password),
        })
    }
}

impl BridgeConfig {
    pub fn mapping_table(&self) -> MappingTable {
        MappingTable::new(self.mapping.clone())
    }
}

/// Pick the config file: first CLI argument, then `DBMQ_CONFIG`, then
/// [`DEFAULT_CONFIG_PATH`].
pub fn config_path(cli_arg: Option<String>) -> PathBuf {
    cli_arg
        .or_else(|| std::env::var("DBMQ_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load `path` and apply `DBMQ_*` environment overrides.
pub fn load(path: &Path) -> Result<BridgeConfig, BridgeError> {
    let mut cfg = load_from(path)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse `path` as TOML when it ends in `.toml`, as JSON otherwise.
pub(crate) fn load_from(path: &Path) -> Result<BridgeConfig, BridgeError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&raw)
            .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

/// Apply `DBMQ_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DBMQ_MQTT_SERVER` | replaces `mqtt.servers` |
/// | `DBMQ_MQTT_CLIENT_ID` | `mqtt.clientId` |
/// | `DBMQ_MQTT_USERNAME` | `mqtt.username` |
/// | `DBMQ_MQTT_PASSWORD` | `mqtt.password` |
/// | `DBMQ_DBUS_BUS` | `dbus.bus` (`session` / `system`) |
///
/// Unparsable values are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut BridgeConfig) {
    if let Ok(v) = std::env::var("DBMQ_MQTT_SERVER") {
        cfg.mqtt.servers = vec![v];
    }
    if let Ok(v) = std::env::var("DBMQ_MQTT_CLIENT_ID") {
        cfg.mqtt.client_id = v;
    }
    if let Ok(v) = std::env::var("DBMQ_MQTT_USERNAME") {
        cfg.mqtt.username = v;
    }
    if let Ok(v) = std::env::var("DBMQ_MQTT_PASSWORD") {
        cfg.mqtt.password = Zeroizing::new(v);
    }
    if let Ok(v) = std::env::var("DBMQ_DBUS_BUS") {
        match v.parse::<BusKind>() {
            Ok(bus) => cfg.dbus.bus = bus,
            Err(e) => warn!(error = %e, "ignoring DBMQ_DBUS_BUS"),
        }
    }
}
