use crate::error::ScanError;
use serialport::{SerialPortInfo, SerialPortType};

/// Port name of the built-in synthetic device
pub const SIMULATED_PORT: &str = "simulated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDevice {
    pub port: String,
    pub description: String,
}

impl SerialDevice {
    pub fn new(port: String, description: String) -> Self {
        Self { port, description }
    }

    pub fn simulated() -> Self {
        Self::new(SIMULATED_PORT.to_string(), "Synthetic ECG (no hardware)".to_string())
    }
}

/// Lists serial ports, followed by the synthetic device
pub async fn scan_devices() -> Result<Vec<SerialDevice>, ScanError> {
    let ports = serialport::available_ports().map_err(|e| ScanError::Enumerate(e.to_string()))?;

    let mut devices: Vec<SerialDevice> = ports.iter().map(device_from_info).collect();
    log::info!("Found {} serial port(s)", devices.len());

    devices.push(SerialDevice::simulated());
    Ok(devices)
}

fn device_from_info(info: &SerialPortInfo) -> SerialDevice {
    SerialDevice::new(info.port_name.clone(), describe(&info.port_type))
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let name = match (&usb.manufacturer, &usb.product) {
                (Some(m), Some(p)) => format!("{} {}", m, p),
                (None, Some(p)) => p.clone(),
                (Some(m), None) => m.clone(),
                (None, None) => "USB serial".to_string(),
            };
            format!("{} ({:04x}:{:04x})", name, usb.vid, usb.pid)
        }
        SerialPortType::PciPort => "PCI serial".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
        SerialPortType::Unknown => "Serial port".to_string(),
    }
}
