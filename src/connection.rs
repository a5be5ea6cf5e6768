//! # Connection Management Module
//!
//! Handles the device session lifecycle: opening the serial port (or the
//! synthetic device), running the acquisition thread, and tearing it down.
//!
//! ## Key Components
//! - `ConnectionManager`: Manages the acquisition thread and command processing
//! - `ConnectionCommand`: Commands sent from UI to the manager thread
//! - A fresh stop flag per session, checked by the acquisition loop between reads
//!
//! ## Shutdown
//! A disconnect sets the session's stop flag and joins its thread. The thread
//! notices within one read timeout and drops the port, which closes it.
//! `Shutdown` (sent by `main` once the window closes) or a closed command
//! channel stops the active session the same way, then `run` returns so the
//! caller can join the manager thread.

use crate::config::Config;
use crate::device_scanner::SIMULATED_PORT;
use crate::error::AcquisitionError;
use crate::frame::SAMPLE_RATE_HZ;
use crate::sensor::{run_acquisition, ByteSource, ConnectionStatus, SensorUpdate};
use crate::simulator::SyntheticEcg;
use crate::timeseries::SampleWindow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone)]
pub enum ConnectionCommand {
    Connect(String),
    Disconnect,
    /// Stop any session and end `run`
    Shutdown,
}

/// A running acquisition thread
struct Session {
    port: String,
    should_stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Session {
    fn stop(self) {
        log::debug!("Connection manager: Stopping session on {}", self.port);
        self.should_stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            log::error!("Acquisition thread for {} panicked", self.port);
        }
    }
}

/// Manages the device session.
///
/// Runs in a dedicated thread so that opening and closing ports never blocks
/// the UI thread.
pub struct ConnectionManager {
    command_receiver: Receiver<ConnectionCommand>,
    sensor_sender: Sender<SensorUpdate>,
    window: SampleWindow,
    config: Config,
}

impl ConnectionManager {
    /// Creates a new ConnectionManager.
    ///
    /// Returns the manager and a sender for issuing commands from the UI thread.
    pub fn new(
        sensor_sender: Sender<SensorUpdate>,
        window: SampleWindow,
        config: Config,
    ) -> (Self, Sender<ConnectionCommand>) {
        let (command_sender, command_receiver) = unbounded();

        let manager = ConnectionManager {
            command_receiver,
            sensor_sender,
            window,
            config,
        };

        (manager, command_sender)
    }

    /// Runs the connection management loop until the command channel closes.
    pub fn run(self) {
        let mut session: Option<Session> = None;

        while let Ok(command) = self.command_receiver.recv() {
            match command {
                ConnectionCommand::Connect(port) => {
                    log::info!("Connection manager: Connecting to {}", port);

                    if let Some(previous) = session.take() {
                        previous.stop();
                    }
                    self.window.clear();

                    match self.start_session(port) {
                        Ok(started) => session = Some(started),
                        Err(e) => {
                            log::error!("{}", e);
                            self.send_status(ConnectionStatus::Error(e.to_string()));
                        }
                    }
                }
                ConnectionCommand::Disconnect => {
                    log::info!("Connection manager: Disconnect requested");
                    match session.take() {
                        Some(active) => active.stop(),
                        None => self.send_status(ConnectionStatus::Disconnected),
                    }
                }
                ConnectionCommand::Shutdown => {
                    log::info!("Connection manager: Shutdown requested");
                    break;
                }
            }
        }

        if let Some(active) = session.take() {
            active.stop();
        }
        log::info!("Connection manager: Stopped");
    }

    fn start_session(&self, port: String) -> Result<Session, AcquisitionError> {
        self.send_status(ConnectionStatus::Connecting);

        let mut source = open_source(&port, &self.config)?;
        self.send_status(ConnectionStatus::Connected);

        let should_stop = Arc::new(AtomicBool::new(false));
        let stop_flag = should_stop.clone();
        let window = self.window.clone();
        let sender = self.sensor_sender.clone();
        let retry_delay = self.config.retry_delay();

        let handle = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                run_acquisition(&mut *source, &window, &stop_flag, &sender, retry_delay);
                // Close the device before reporting
                drop(source);
                let _ = sender.send(SensorUpdate::ConnectionStatus(ConnectionStatus::Disconnected));
            })
            .map_err(AcquisitionError::ThreadSpawn)?;

        Ok(Session {
            port,
            should_stop,
            handle,
        })
    }

    fn send_status(&self, status: ConnectionStatus) {
        let _ = self.sensor_sender.send(SensorUpdate::ConnectionStatus(status));
    }
}

/// Open the named serial port, or the synthetic device
fn open_source(port: &str, config: &Config) -> Result<Box<dyn ByteSource + Send>, AcquisitionError> {
    if port == SIMULATED_PORT {
        let ecg = SyntheticEcg::new(config.simulated_bpm, SAMPLE_RATE_HZ)
            .corrupt_every(config.simulated_corrupt_every)
            .paced(config.read_timeout());
        return Ok(Box::new(ecg));
    }

    let serial = serialport::new(port, config.baud_rate)
        .timeout(config.read_timeout())
        .open()
        .map_err(|e| AcquisitionError::PortOpen {
            port: port.to_string(),
            reason: e.to_string(),
        })?;
    log::info!("Opened {} at {} baud", port, config.baud_rate);

    Ok(Box::new(serial))
}
