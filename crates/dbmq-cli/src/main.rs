//! `dbmq` – D-Bus ⇄ MQTT bridge
//!
//! 1. Loads the configuration (first argument, `DBMQ_CONFIG` or
//!    `./config.json`) and builds the mapping table.
//! 2. Connects to the message bus, registers one signal match per
//!    bus→broker mapping and connects to the broker.
//! 3. Runs both bridge loops and their transport pumps.
//! 4. Offers a `# ` control prompt; `exit` or Ctrl-C stops the bridge.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dbmq_middleware::{
    DbusDispatcher, DbusToMqtt, INBOUND_CAPACITY, MqttToDbus, SignalPump, dbus_adapter, inbox,
    mqtt_adapter,
};
use dbmq_types::BridgeError;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Process-wide stop request shared by the prompt, Ctrl-C and `main`.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if !self.is_requested() {
            self.notify.notified().await;
        }
    }
}

fn main() -> ExitCode {
    // Before the runtime exists: the OTLP simple exporter must not run inside
    // an async context at init time.
    let _guard = telemetry::init_tracing("dbmq");

    let shutdown = Arc::new(Shutdown::default());
    let ctrlc_shutdown = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Ctrl-C received, stopping bridge …".yellow().bold());
        ctrlc_shutdown.request();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let path = config::config_path(std::env::args().nth(1));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Runtime error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(&path, shutdown));
    runtime.shutdown_background();

    match result {
        Ok(()) => {
            println!("{}", "Goodbye.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "bridge failed to start");
            eprintln!("{}: {}", "dbmq".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &Path, shutdown: Arc<Shutdown>) -> Result<(), BridgeError> {
    let cfg = config::load(path)?;
    info!(path = %path.display(), rules = cfg.mapping.len(), "config loaded");

    let table = Arc::new(cfg.mapping_table());
    for warning in table.warnings() {
        warn!("{warning}");
    }

    let conn = dbus_adapter::connect(cfg.dbus.bus).await?;
    let matches = dbus_adapter::register_matches(&conn, &table).await?;

    let (signal_tx, signal_rx) = inbox("dbus_to_mqtt", INBOUND_CAPACITY);
    let (message_tx, message_rx) = inbox("mqtt_to_dbus", INBOUND_CAPACITY);

    let topics: Vec<String> = table.command_topics().into_iter().map(String::from).collect();
    let (publisher, mqtt_pump) = mqtt_adapter::connect(&cfg.mqtt.settings()?, topics, message_tx)?;
    let signal_pump = SignalPump::new(&conn, signal_tx);

    let forward = DbusToMqtt::new(table.clone(), Arc::new(publisher));
    let reverse = MqttToDbus::new(table.clone(), Arc::new(DbusDispatcher::new(conn.clone())));

    let mut tasks = JoinSet::new();
    tasks.spawn(mqtt_pump.run());
    tasks.spawn(signal_pump.run());
    tasks.spawn(forward.run(signal_rx));
    tasks.spawn(reverse.run(message_rx));
    info!(rules = table.len(), signal_matches = matches, "bridge running");

    print_ready(path);
    let prompt_table = table.clone();
    let prompt_shutdown = shutdown.clone();
    std::thread::spawn(move || repl::run(prompt_table, prompt_shutdown));

    tokio::select! {
        _ = shutdown.wait() => info!("shutdown requested"),
        Some(ended) = tasks.join_next() => {
            if let Err(e) = ended {
                error!(error = %e, "bridge task failed");
            } else {
                warn!("bridge task ended, shutting down");
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}

fn print_ready(config: &Path) {
    println!();
    println!(
        "  {} bridge running ({})",
        "dbmq".bold().cyan(),
        config.display().to_string().dimmed()
    );
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());
}
