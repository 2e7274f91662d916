//! Transport capability: something that can send and receive raw bytes
//! to/from a Dexcom G4 receiver, blocking until the operation completes or
//! times out. The packet layer is written against this trait only; it does
//! not know whether it is talking to USB or BLE.

mod usb;
pub use usb::{UsbTransport, USB_PID, USB_VID};

mod ble;
pub use ble::{BleConfig, BleTransport};

use crate::error::Result;

pub trait Transport {
    /// Sends a complete frame. Must not return until every byte is written
    /// (or an error occurs) -- the receiver does not tolerate partial
    /// writes trickling in.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Fills `into` completely, blocking until that many bytes have
    /// arrived or the transport's timeout elapses.
    fn receive(&mut self, into: &mut [u8]) -> Result<()>;

    fn close(&mut self);
}
