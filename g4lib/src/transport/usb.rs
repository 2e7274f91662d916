use std::io::{Read, Write};
use std::time::Duration;

use crate::error::{Error, Result};

/// USB vendor/product id the Dexcom G4 receiver enumerates as.
pub const USB_VID: u16 = 0x22A3;
pub const USB_PID: u16 = 0x0047;

pub const BAUD_RATE: u32 = 115200;

/// Blocking USB-serial transport.
pub struct UsbTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl UsbTransport {
    /// Opens a specific serial device path at the receiver's fixed line
    /// settings (115200 8-N-1).
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|e| Error::TransportIo(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(Self { port })
    }

    /// Finds and opens the first serial port reporting the receiver's
    /// USB vendor/product id.
    pub fn find_and_open() -> Result<Self> {
        let infos = serialport::available_ports()
            .map_err(|e| Error::TransportIo(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        for info in infos {
            if let serialport::SerialPortType::UsbPort(usb) = &info.port_type {
                if usb.vid == USB_VID && usb.pid == USB_PID {
                    log::debug!("found Dexcom G4 receiver at {}", info.port_name);
                    return Self::open(&info.port_name);
                }
            }
        }
        Err(Error::TransportIo(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no USB serial device matching the Dexcom G4 receiver was found",
        )))
    }
}

impl super::Transport for UsbTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self, into: &mut [u8]) -> Result<()> {
        self.port
            .read_exact(into)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Error::Timeout,
                _ => Error::TransportIo(e),
            })
    }

    fn close(&mut self) {
        // dropping the port closes the handle; nothing else owns it
    }
}
