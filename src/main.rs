// Hide console window on Windows in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod charts;
mod config;
mod connection;
mod decoder;
mod device_scanner;
mod error;
mod frame;
mod heart_rate;
mod sensor;
mod simulator;
mod spectrum;
mod timeseries;
mod ui;
mod visualization;

use app::EcgMonitor;
use config::Config;
use connection::{ConnectionCommand, ConnectionManager};
use frame::SAMPLE_RATE_HZ;
use crossbeam_channel::unbounded;
use iced::Theme;
use sensor::SensorUpdate;
use timeseries::SampleWindow;

fn main() -> iced::Result {
    // On Windows, force wgpu to use Vulkan backend instead of DirectX 12
    #[cfg(target_os = "windows")]
    std::env::set_var("WGPU_BACKEND", "vulkan");

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default configuration: {}", e);
            Config::default()
        }
    };

    // Shared between the acquisition thread (writer) and the UI tick (reader)
    let window = SampleWindow::with_duration(config.display_seconds, SAMPLE_RATE_HZ);

    let (sender, receiver) = unbounded::<SensorUpdate>();
    let (manager, connect_sender) = ConnectionManager::new(sender, window.clone(), config.clone());
    let shutdown_sender = connect_sender.clone();

    let manager_thread = std::thread::Builder::new()
        .name("connection-manager".to_string())
        .spawn(move || manager.run())
        .map_err(|e| log::error!("Failed to start connection manager: {}", e))
        .ok();

    let result = iced::application("ECG Monitor", EcgMonitor::update, EcgMonitor::view)
        .subscription(EcgMonitor::subscription)
        .theme(|_| Theme::Light)
        .window_size((1200.0, 800.0))
        .run_with(move || EcgMonitor::new(receiver, connect_sender, window, config));

    // Release the device before the process exits
    if let Some(handle) = manager_thread {
        let _ = shutdown_sender.send(ConnectionCommand::Shutdown);
        if handle.join().is_err() {
            log::error!("Connection manager panicked");
        }
    }

    result
}
