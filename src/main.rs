use anyhow::{Context, Result};
use gpio_pad_controller::config::{ConfigStore, JsonFileStore};
use gpio_pad_controller::gpio::rpi::RpiDriver;
use gpio_pad_controller::settings::Settings;
use gpio_pad_controller::{server, ControllerEvent, Daemon};
use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logger();

    // Parse command line arguments
    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/gpio-pad-controller/settings.yaml".to_string());

    info!("GPIO pad controller starting...");
    let settings = load_settings(&settings_path)?;

    // Load controller configuration
    let store = JsonFileStore::new(&settings.config_path);
    info!("Loading configuration from: {}", store.path().display());
    let config = store
        .load()
        .context(format!("Failed to load configuration: {}", settings.config_path))?;
    info!(
        "Configuration loaded: {} button(s), {} action(s)",
        config.buttons.len(),
        config.actions.len()
    );

    let driver = RpiDriver::new(settings.gpio.debounce()).context("Failed to open GPIO")?;

    let (events, _) = broadcast::channel::<ControllerEvent>(settings.events.capacity);
    let (daemon, edges) = Daemon::new(config, &driver, Box::new(store), Arc::new(events.clone()));
    let daemon = Arc::new(daemon);
    tokio::spawn(daemon.dispatcher().run(edges));

    let listener = TcpListener::bind(&settings.listen)
        .await
        .context(format!("Failed to listen on {}", settings.listen))?;
    info!("Listening on {}", settings.listen);
    let mut server = tokio::spawn(server::serve(listener, daemon.clone(), events));

    // Setup signal handling via tokio
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;

    info!("Daemon started successfully");

    loop {
        tokio::select! {
            result = &mut server => {
                match result {
                    Ok(Ok(())) => info!("Server stopped"),
                    Ok(Err(e)) => error!("Server error: {}", e),
                    Err(e) => error!("Server task failed: {}", e),
                }
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                if let Err(e) = daemon.reload_config() {
                    warn!("Configuration reload failed, keeping current: {}", e);
                }
            }
        }
    }

    daemon.shutdown();
    info!("GPIO pad controller shutdown complete");
    Ok(())
}

fn load_settings(path: &str) -> Result<Settings> {
    if !Path::new(path).exists() {
        warn!("Settings file {} not found, using defaults", path);
        return Ok(Settings::default());
    }
    info!("Loading settings from: {}", path);
    let content =
        fs::read_to_string(path).context(format!("Failed to read settings file: {}", path))?;
    let settings: Settings =
        serde_yaml::from_str(&content).context("Failed to parse settings file")?;
    settings
        .validate()
        .context(format!("Invalid settings file: {}", path))?;
    Ok(settings)
}

fn init_logger() {
    // Use `env_logger` for logging. Systemd/journald will capture stdout/stderr.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}
