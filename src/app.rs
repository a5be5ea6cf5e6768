//! # Monitor Application
//!
//! The iced front end. Every refresh tick drains `SensorUpdate`s from the
//! acquisition side, snapshots the sample window, runs the heart-rate
//! estimator and rebuilds the chart data.
//!
//! The estimator keeps its last valid reading while the window has too few
//! beats. It is replaced when a new device session reports `Connected`, so a
//! fresh session starts at "no estimate yet" instead of the previous
//! device's value. Between sessions the last reading stays on the idle screen.

use crate::charts::{EcgChart, SpectrumChart};
use crate::config::Config;
use crate::connection::ConnectionCommand;
use crate::device_scanner::{scan_devices, SerialDevice};
use crate::error::ScanError;
use crate::frame::SAMPLE_RATE_HZ;
use crate::heart_rate::HeartRateEstimator;
use crate::sensor::{AcquisitionStats, ConnectionStatus, SensorUpdate};
use crate::spectrum::SpectrumAnalyzer;
use crate::timeseries::{AdcScale, SampleWindow};
use crate::ui::styles;
use crate::visualization::{heart_rate_label, SpectrumView, WaveformView};
use crossbeam_channel::{Receiver, Sender};
use iced::widget::{button, checkbox, column, container, row, scrollable, text};
use iced::{Element, Length, Subscription, Task};
use plotters_iced::ChartWidget;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
}

pub struct EcgMonitor {
    config: Config,
    window: SampleWindow,
    estimator: HeartRateEstimator,
    scale: AdcScale,
    analyzer: SpectrumAnalyzer,
    pub waveform: WaveformView,
    pub spectrum: SpectrumView,
    pub show_spectrum: bool,
    receiver: Receiver<SensorUpdate>,
    pub connection_state: ConnectionState,
    pub available_devices: Vec<SerialDevice>,
    pub selected_device: Option<SerialDevice>,
    connect_sender: Sender<ConnectionCommand>,
    pub stats: AcquisitionStats,
    pub last_fault: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    ScanDevices,
    DevicesScanned(Result<Vec<SerialDevice>, ScanError>),
    SelectDevice(SerialDevice),
    ConnectDevice,
    DisconnectDevice,
    ToggleSpectrum(bool),
}

impl EcgMonitor {
    pub fn new(
        receiver: Receiver<SensorUpdate>,
        connect_sender: Sender<ConnectionCommand>,
        window: SampleWindow,
        config: Config,
    ) -> (Self, Task<Message>) {
        let mut monitor = EcgMonitor {
            estimator: HeartRateEstimator::new(config.estimator_settings()),
            config,
            window,
            scale: AdcScale::default(),
            analyzer: SpectrumAnalyzer::new(),
            waveform: WaveformView::default(),
            spectrum: SpectrumView::default(),
            show_spectrum: false,
            receiver,
            connection_state: ConnectionState::Disconnected,
            available_devices: Vec::new(),
            selected_device: None,
            connect_sender,
            stats: AcquisitionStats::default(),
            last_fault: None,
        };

        if monitor.config.enable_autoconnect {
            let port = monitor.config.serial_port.clone();
            log::info!("Autoconnecting to {}", port);
            monitor.request_connect(port);
        }

        (monitor, Task::done(Message::ScanDevices))
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                while let Ok(update) = self.receiver.try_recv() {
                    self.handle_sensor_update(update);
                }
                self.refresh();
                Task::none()
            }
            Message::ScanDevices => {
                if self.connection_state == ConnectionState::Disconnected {
                    self.connection_state = ConnectionState::Scanning;
                }
                self.available_devices.clear();
                Task::perform(scan_devices(), Message::DevicesScanned)
            }
            Message::DevicesScanned(result) => {
                if self.connection_state == ConnectionState::Scanning {
                    self.connection_state = ConnectionState::Disconnected;
                }
                self.available_devices = result.unwrap_or_else(|e| {
                    log::error!("Error scanning devices: {}", e);
                    vec![SerialDevice::simulated()]
                });
                Task::none()
            }
            Message::SelectDevice(device) => {
                self.selected_device = Some(device);
                Task::none()
            }
            Message::ConnectDevice => {
                if let Some(port) = self.selected_device.as_ref().map(|d| d.port.clone()) {
                    self.request_connect(port);
                }
                Task::none()
            }
            Message::DisconnectDevice => {
                log::debug!("UI: Sending disconnect command");
                if let Err(e) = self.connect_sender.send(ConnectionCommand::Disconnect) {
                    log::error!("Failed to send disconnect request: {}", e);
                }
                // State follows once ConnectionStatus::Disconnected arrives
                Task::none()
            }
            Message::ToggleSpectrum(show) => {
                self.show_spectrum = show;
                if !show {
                    self.spectrum = SpectrumView::default();
                }
                Task::none()
            }
        }
    }

    pub fn subscription(&self) -> Subscription<Message> {
        iced::time::every(self.config.refresh_interval()).map(|_| Message::Tick)
    }

    fn request_connect(&mut self, port: String) {
        self.connection_state = ConnectionState::Connecting;
        if let Err(e) = self.connect_sender.send(ConnectionCommand::Connect(port)) {
            log::error!("Failed to send connection request: {}", e);
            self.connection_state = ConnectionState::Disconnected;
        }
    }

    fn handle_sensor_update(&mut self, update: SensorUpdate) {
        match update {
            SensorUpdate::ConnectionStatus(ConnectionStatus::Connecting) => {
                self.connection_state = ConnectionState::Connecting;
            }
            SensorUpdate::ConnectionStatus(ConnectionStatus::Connected) => {
                self.connection_state = ConnectionState::Connected;
                self.estimator = HeartRateEstimator::new(self.config.estimator_settings());
                self.stats = AcquisitionStats::default();
                self.last_fault = None;
            }
            SensorUpdate::ConnectionStatus(ConnectionStatus::Disconnected) => {
                self.connection_state = ConnectionState::Disconnected;
            }
            SensorUpdate::ConnectionStatus(ConnectionStatus::Error(e)) => {
                log::warn!("Connection error: {}", e);
                self.last_fault = Some(e);
                self.connection_state = ConnectionState::Disconnected;
            }
            SensorUpdate::Stats(stats) => self.stats = stats,
            SensorUpdate::ReadFault { message, consecutive } => {
                self.last_fault = Some(format!("{} (x{})", message, consecutive));
            }
        }
    }

    /// Snapshot the window, run one estimation pass and rebuild the charts
    fn refresh(&mut self) {
        let volts = self.scale.to_volts(&self.window.snapshot());
        let pass = self.estimator.update(&volts);
        self.waveform = WaveformView::build(&volts, &pass, SAMPLE_RATE_HZ, self.config.display_seconds);

        if self.show_spectrum {
            let spectrum = self.analyzer.analyze(&volts, SAMPLE_RATE_HZ);
            self.spectrum = SpectrumView::build(&spectrum, SAMPLE_RATE_HZ);
        }
    }

    pub fn view(&'_ self) -> Element<'_, Message> {
        let sidebar = column![
            section("Serial Devices", self.device_panel()),
            section("Display", self.display_panel()),
            section("Link", self.link_panel()),
        ]
        .spacing(10)
        .padding(10)
        .width(Length::Fixed(300.0))
        .height(Length::Fill);

        let main_content = match self.connection_state {
            ConnectionState::Connected if self.window.is_empty() => {
                self.notice("Waiting for frames...".to_string())
            }
            ConnectionState::Connected => self.monitor_view(),
            ConnectionState::Scanning => self.notice("Scanning for devices...".to_string()),
            ConnectionState::Connecting => self.notice("Connecting to device...".to_string()),
            ConnectionState::Disconnected => self.idle_view(),
        };

        row![sidebar, main_content].height(Length::Fill).into()
    }

    fn device_panel(&self) -> Element<'_, Message> {
        let idle = self.connection_state == ConnectionState::Disconnected;
        let connected = self.connection_state == ConnectionState::Connected;

        let scan_label = if self.connection_state == ConnectionState::Scanning {
            "Scanning..."
        } else {
            "Scan for Ports"
        };
        let scan_button = button(text(scan_label))
            .on_press_maybe(idle.then_some(Message::ScanDevices))
            .padding(10);

        let ports: Element<'_, Message> = if self.available_devices.is_empty() {
            text("No ports listed yet.").size(14).into()
        } else {
            let entries = self.available_devices.iter().map(|device| {
                let is_selected = self.selected_device.as_ref() == Some(device);
                button(text(format!("{}\n{}", device.description, device.port)).size(14))
                    .on_press_maybe((!connected).then(|| Message::SelectDevice(device.clone())))
                    .width(Length::Fill)
                    .padding(10)
                    .style(styles::device_button_style(is_selected))
                    .into()
            });
            scrollable(column(entries).spacing(5)).height(Length::Fixed(220.0)).into()
        };

        let action = match (&self.connection_state, &self.selected_device) {
            (ConnectionState::Connected, _) => button(text("Disconnect"))
                .on_press(Message::DisconnectDevice)
                .style(styles::disconnect_button_style()),
            (ConnectionState::Connecting, _) => button(text("Connecting...")),
            (_, Some(_)) => button(text("Connect"))
                .on_press(Message::ConnectDevice)
                .style(styles::connect_button_style()),
            (_, None) => button(text("Select a port")),
        };

        column![scan_button, ports, action.padding(10).width(Length::Fill)]
            .spacing(10)
            .into()
    }

    fn display_panel(&self) -> Element<'_, Message> {
        checkbox("Show FFT Spectrum", self.show_spectrum)
            .on_toggle(Message::ToggleSpectrum)
            .into()
    }

    fn link_panel(&self) -> Element<'_, Message> {
        let decoder = &self.stats.decoder;
        let last_frame = self
            .stats
            .last_frame_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--".to_string());

        let lines = [
            format!("Frames: {}", decoder.frames),
            format!("Checksum errors: {}", decoder.checksum_errors),
            format!("Length errors: {}", decoder.length_errors),
            format!("Skipped bytes: {}", decoder.skipped_bytes),
            format!("Read faults: {}", self.stats.read_faults),
            format!("Window: {} / {} samples", self.window.len(), self.window.capacity()),
            format!("Last frame: {}", last_frame),
        ];

        let fault = self.last_fault.iter().map(|f| format!("Last fault: {}", f));

        column(lines.into_iter().chain(fault).map(|line| text(line).size(14).into()))
            .spacing(4)
            .into()
    }

    fn notice(&self, message: String) -> Element<'_, Message> {
        container(text(message).size(24))
            .center(Length::Fill)
            .into()
    }

    fn idle_view(&self) -> Element<'_, Message> {
        let mut content = column![text("Select a serial port from the sidebar to begin").size(24)]
            .spacing(10)
            .align_x(iced::alignment::Horizontal::Center);

        let held = self.estimator.estimate();
        if held.bpm.is_some() {
            content = content.push(text(format!("Last reading: {}", heart_rate_label(&held))).size(18));
        }

        container(content).center(Length::Fill).into()
    }

    fn monitor_view(&self) -> Element<'_, Message> {
        let mut charts = column![ChartWidget::new(EcgChart { view: &self.waveform })
            .width(Length::Fill)
            .height(Length::Fill)]
        .spacing(10)
        .width(Length::FillPortion(3));

        if self.show_spectrum {
            charts = charts.push(
                ChartWidget::new(SpectrumChart { view: &self.spectrum })
                    .width(Length::Fill)
                    .height(Length::Fill),
            );
        }

        let mut readout = column![text(self.waveform.heart_rate_label()).size(24)]
            .spacing(6)
            .width(Length::FillPortion(1));

        if self.waveform.estimate.bpm.is_some() && !self.waveform.estimate.is_current {
            readout = readout.push(text("No beats in window, holding last value").size(14));
        }

        if self.show_spectrum {
            readout = readout.push(text("Dominant frequencies").size(18));
            for label in self.spectrum.dominant_labels() {
                readout = readout.push(text(label).size(14));
            }
        }

        row![charts, readout].spacing(20).padding(20).into()
    }
}

/// Titled, bordered sidebar block
fn section<'a>(title: &'a str, body: Element<'a, Message>) -> Element<'a, Message> {
    container(column![text(title).size(18), body].spacing(8))
        .padding(10)
        .width(Length::Fill)
        .style(container::bordered_box)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderStats;
    use crossbeam_channel::unbounded;

    fn monitor() -> (EcgMonitor, Sender<SensorUpdate>, Receiver<ConnectionCommand>, SampleWindow) {
        let (sensor_sender, sensor_receiver) = unbounded();
        let (command_sender, command_receiver) = unbounded();
        let config = Config::default();
        let window = SampleWindow::with_duration(config.display_seconds, SAMPLE_RATE_HZ);
        let (monitor, _task) = EcgMonitor::new(sensor_receiver, command_sender, window.clone(), config);
        (monitor, sensor_sender, command_receiver, window)
    }

    /// 100 BPM: a spike every 120 samples, in raw counts
    fn spikes_every_120() -> Vec<u16> {
        let mut raw = vec![600u16; 1000];
        for i in (30..1000).step_by(120) {
            raw[i] = 3000;
        }
        raw
    }

    #[test]
    fn test_tick_applies_updates_and_estimates() {
        let (mut monitor, sensor_sender, _commands, window) = monitor();

        sensor_sender
            .send(SensorUpdate::ConnectionStatus(ConnectionStatus::Connected))
            .unwrap();
        window.push(&spikes_every_120());
        let _ = monitor.update(Message::Tick);

        assert_eq!(monitor.connection_state, ConnectionState::Connected);
        assert_eq!(monitor.waveform.points.len(), 1000);
        assert_eq!(monitor.waveform.peaks.len(), 9);
        assert_eq!(monitor.waveform.heart_rate_label(), "Heart Rate: 100 BPM");
    }

    #[test]
    fn test_estimate_survives_flat_window() {
        let (mut monitor, _sensor_sender, _commands, window) = monitor();

        window.push(&spikes_every_120());
        let _ = monitor.update(Message::Tick);

        window.push(&[600u16; 1000]);
        let _ = monitor.update(Message::Tick);

        assert!(monitor.waveform.peaks.is_empty());
        assert_eq!(monitor.waveform.heart_rate_label(), "Heart Rate: 100 BPM");
        assert!(!monitor.waveform.estimate.is_current);
    }

    #[test]
    fn test_new_session_starts_without_estimate() {
        let (mut monitor, sensor_sender, _commands, window) = monitor();

        window.push(&spikes_every_120());
        let _ = monitor.update(Message::Tick);
        sensor_sender
            .send(SensorUpdate::ConnectionStatus(ConnectionStatus::Disconnected))
            .unwrap();
        let _ = monitor.update(Message::Tick);
        assert_eq!(monitor.estimator.estimate().bpm.map(f64::round), Some(100.0));

        window.clear();
        sensor_sender
            .send(SensorUpdate::ConnectionStatus(ConnectionStatus::Connected))
            .unwrap();
        let _ = monitor.update(Message::Tick);

        assert_eq!(monitor.estimator.estimate().bpm, None);
        assert_eq!(monitor.waveform.heart_rate_label(), "Heart Rate: -- BPM");
    }

    #[test]
    fn test_stats_and_faults_are_shown() {
        let (mut monitor, sensor_sender, _commands, _window) = monitor();
        let stats = AcquisitionStats {
            decoder: DecoderStats {
                frames: 12,
                checksum_errors: 1,
                ..DecoderStats::default()
            },
            ..AcquisitionStats::default()
        };

        sensor_sender.send(SensorUpdate::Stats(stats)).unwrap();
        sensor_sender
            .send(SensorUpdate::ReadFault {
                message: "Failed to read from device: gone".to_string(),
                consecutive: 3,
            })
            .unwrap();
        let _ = monitor.update(Message::Tick);

        assert_eq!(monitor.stats.decoder.frames, 12);
        assert_eq!(monitor.last_fault.as_deref(), Some("Failed to read from device: gone (x3)"));
    }

    #[test]
    fn test_spectrum_follows_toggle() {
        let (mut monitor, _sensor_sender, _commands, window) = monitor();
        window.push(&spikes_every_120());

        let _ = monitor.update(Message::Tick);
        assert!(monitor.spectrum.points.is_empty());

        let _ = monitor.update(Message::ToggleSpectrum(true));
        let _ = monitor.update(Message::Tick);
        assert_eq!(monitor.spectrum.points.len(), 500);
        assert_eq!(monitor.spectrum.dominant.len(), 3);

        let _ = monitor.update(Message::ToggleSpectrum(false));
        assert_eq!(monitor.spectrum, SpectrumView::default());
    }

    #[test]
    fn test_connect_sends_command() {
        let (mut monitor, _sensor_sender, commands, _window) = monitor();

        let _ = monitor.update(Message::SelectDevice(SerialDevice::simulated()));
        let _ = monitor.update(Message::ConnectDevice);

        assert_eq!(monitor.connection_state, ConnectionState::Connecting);
        assert!(matches!(commands.try_recv(), Ok(ConnectionCommand::Connect(port)) if port == "simulated"));
    }

    #[test]
    fn test_scan_failure_falls_back_to_simulated() {
        let (mut monitor, _sensor_sender, _commands, _window) = monitor();

        let _ = monitor.update(Message::DevicesScanned(Err(ScanError::Enumerate("denied".into()))));

        assert_eq!(monitor.available_devices, vec![SerialDevice::simulated()]);
        assert_eq!(monitor.connection_state, ConnectionState::Disconnected);
    }
}
