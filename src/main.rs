#![forbid(unsafe_code)]

mod animation;
mod config;
mod constants;
mod controller;
mod display;
mod geometry;
mod gui;
mod input;
mod ipc;
mod platform;
mod types;
mod window;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use animation::pack::PackPaths;
use config::{default_settings_path, SettingsStore};
use controller::{Controller, ControllerEvent, SettingsWindow};
use input::{hook, EvdevHook};
use ipc::{ControlServer, Request};
use platform::Platform;
use window::x11::X11Factory;
use window::{WindowController, WindowEventSink};

#[derive(Parser, Debug)]
#[command(name = "keypet", about = "Desktop pet that reacts to your typing", version)]
struct Cli {
    /// Open the settings window for a running overlay
    #[arg(long)]
    settings: bool,

    /// Control socket path (default: $XDG_RUNTIME_DIR/keypet/control.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Settings file path (default: ~/.config/keypet/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install tracing subscriber")
}

fn run_overlay(socket: PathBuf, config: PathBuf) -> Result<()> {
    let mut store = SettingsStore::new(config);
    let settings = store.get_all();
    info!(path = %store.path().display(), "Settings loaded");

    let (events_tx, events_rx) = mpsc::channel();

    let server = ControlServer::bind_to(socket.clone())?;

    let window_events: WindowEventSink = {
        let events = events_tx.clone();
        Arc::new(move |event| {
            let _ = events.send(ControllerEvent::Window(event));
        })
    };
    let factory = X11Factory::connect(window_events)?;

    let display = {
        let events = events_tx.clone();
        display::spawn(
            settings,
            PackPaths::from_data_dir(),
            Box::new(move |request: Request| {
                let _ = events.send(ControllerEvent::Request { request, reply: None });
            }),
        )?
    };

    ipc::server::spawn_listener(server, events_tx.clone())?;
    #[cfg(unix)]
    controller::spawn_signal_listener(events_tx.clone())?;

    // Optional: the overlay still runs without live input
    if !hook::check_permissions() {
        hook::print_permission_error();
    }

    let controller = Controller::new(
        store,
        WindowController::new(factory, Platform::current()),
        EvdevHook::new(),
        display,
        SettingsWindow::for_socket(&socket)?,
        events_tx,
    );
    let result = controller.run(events_rx);

    // The listener thread never returns, so its server is never dropped
    let _ = std::fs::remove_file(&socket);
    info!("Overlay stopped");
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let socket = match cli.socket {
        Some(socket) => socket,
        None => ipc::default_socket_path()?,
    };

    if cli.settings {
        info!(socket = %socket.display(), "Starting settings window");
        return gui::run_settings_window(socket, PackPaths::from_data_dir());
    }

    let config = cli.config.unwrap_or_else(default_settings_path);
    info!(config = %config.display(), socket = %socket.display(), "Starting overlay");
    run_overlay(socket, config)
}
