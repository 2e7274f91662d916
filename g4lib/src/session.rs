//! Session facade: opens a transport (USB preferred, BLE fallback),
//! carries a sticky error slot, and exposes the high-level read-only
//! operations the receiver supports.

use chrono::{DateTime, Local};

use crate::byteio::{marshal_i32, unmarshal_i32, unmarshal_u32};
use crate::error::{Error, Result};
use crate::history;
use crate::page::{self, PageType};
use crate::protocol::packet::{self, Cmd};
use crate::record::Record;
use crate::time::{from_epoch_seconds, to_epoch_seconds};
use crate::transport::{BleConfig, BleTransport, Transport, UsbTransport};
use crate::xml::{self, XmlInfo};

/// A short-circuiting result used only to stop internal composition
/// (`iter_records` et al.) as soon as an operation fails. The real error
/// always lives in [`Session::error`]; this carries no information of its
/// own.
type Flow<T> = std::result::Result<T, ()>;

pub struct Session {
    transport: Box<dyn Transport>,
    error: Option<Error>,
}

impl Session {
    /// Opens USB first; if that fails, falls back to BLE (which requires
    /// `DEXCOM_CGM_ID`, and optionally `DEXCOM_G4_RECEIVER_ADDRESS`, to be
    /// set in the environment).
    pub fn open() -> Result<Self> {
        match UsbTransport::find_and_open() {
            Ok(t) => {
                log::debug!("opened Dexcom G4 receiver over USB");
                Ok(Self {
                    transport: Box::new(t),
                    error: None,
                })
            }
            Err(usb_err) => {
                log::warn!("USB open failed ({usb_err}), falling back to BLE");
                let config = BleConfig::from_env()?;
                let t = BleTransport::open(&config)?;
                Ok(Self {
                    transport: Box::new(t),
                    error: None,
                })
            }
        }
    }

    /// Wraps an already-open transport directly (used by tests and by
    /// callers that want to pick a transport explicitly).
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            error: None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    fn cmd(&mut self, cmd: Cmd, params: &[&[u8]]) -> Flow<Vec<u8>> {
        if self.error.is_some() {
            return Err(());
        }
        packet::transact(&mut *self.transport, cmd, params).map_err(|e| {
            self.error = Some(e);
        })
    }

    pub fn ping(&mut self) -> bool {
        self.cmd(Cmd::Ping, &[]).is_ok()
    }

    pub fn read_firmware_header(&mut self) -> Option<XmlInfo> {
        let payload = self.cmd(Cmd::ReadFirmwareHeader, &[]).ok()?;
        Some(xml::parse(&payload))
    }

    /// Reads the single record of an XML-bearing page type (manufacturing,
    /// firmware, or software data), page 0.
    pub fn read_xml_record(&mut self, page_type: PageType) -> Option<Record> {
        self.read_records(page_type, 0)?.into_iter().next()
    }

    pub fn read_display_time(&mut self) -> Option<DateTime<Local>> {
        let offset_payload = self.cmd(Cmd::ReadDisplayTimeOffset, &[]).ok()?;
        let system_payload = self.cmd(Cmd::ReadSystemTime, &[]).ok()?;
        let offset = unmarshal_i32(&offset_payload[0..4]) as i64;
        let system = unmarshal_u32(&system_payload[0..4]) as i64;
        Some(from_epoch_seconds((system + offset) as u32))
    }

    pub fn set_display_time(&mut self, t: DateTime<Local>) -> Option<()> {
        let system_payload = self.cmd(Cmd::ReadSystemTime, &[]).ok()?;
        let system = unmarshal_u32(&system_payload[0..4]) as i64;
        let offset = (to_epoch_seconds(t) - system) as i32;
        self.cmd(Cmd::WriteDisplayTimeOffset, &[&marshal_i32(offset)])
            .ok()?;
        Some(())
    }

    pub fn read_page_range(&mut self, page_type: PageType) -> Option<(i32, i32)> {
        self.read_page_range_inner(page_type).ok()
    }

    fn read_page_range_inner(&mut self, page_type: PageType) -> Flow<(i32, i32)> {
        let payload = self.cmd(Cmd::ReadDatabasePageRange, &[&[page_type as u8]])?;
        page::unmarshal_page_range(&payload).map_err(|e| {
            self.error = Some(e);
        })
    }

    pub fn read_page(&mut self, page_type: PageType, page_number: i32) -> Option<Vec<u8>> {
        self.read_page_inner(page_type, page_number).ok()
    }

    fn read_page_inner(&mut self, page_type: PageType, page_number: i32) -> Flow<Vec<u8>> {
        let number = marshal_i32(page_number);
        self.cmd(
            Cmd::ReadDatabasePages,
            &[&[page_type as u8], &number, &[0x01]],
        )
    }

    pub fn read_records(&mut self, page_type: PageType, page_number: i32) -> Option<Vec<Record>> {
        self.read_records_inner(page_type, page_number).ok()
    }

    fn read_records_inner(&mut self, page_type: PageType, page_number: i32) -> Flow<Vec<Record>> {
        let raw = self.read_page_inner(page_type, page_number)?;
        let header = page::unmarshal(page_type, page_number, &raw).map_err(|e| {
            self.error = Some(e);
        })?;
        crate::record::decode_records(&header, page_type, page_number).map_err(|e| {
            self.error = Some(e);
        })
    }

    /// Scans `page_type`'s whole history, returning records with
    /// `display_time > since` (`since == 0` means everything).
    pub fn read_history(&mut self, page_type: PageType, since: i64) -> Option<Vec<Record>> {
        let (first, last) = self.read_page_range_inner(page_type).ok()?;
        if first < 0 || last < 0 {
            return Some(Vec::new());
        }
        history::read_history(first, last, since, |page| {
            self.read_records_inner(page_type, page)
        })
        .ok()
    }

    /// Returns the `n` most recent records of `page_type`.
    pub fn read_count(&mut self, page_type: PageType, n: usize) -> Option<Vec<Record>> {
        let (first, last) = self.read_page_range_inner(page_type).ok()?;
        if first < 0 || last < 0 {
            return Some(Vec::new());
        }
        history::read_count(first, last, n, |page| self.read_records_inner(page_type, page)).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::crc::crc16;
    use std::collections::VecDeque;

    struct FakeTransport {
        inbound: VecDeque<u8>,
    }

    impl Transport for FakeTransport {
        fn send(&mut self, _frame: &[u8]) -> Result<()> {
            Ok(())
        }
        fn receive(&mut self, into: &mut [u8]) -> Result<()> {
            for slot in into.iter_mut() {
                *slot = self.inbound.pop_front().ok_or(Error::Timeout)?;
            }
            Ok(())
        }
        fn close(&mut self) {}
    }

    fn ack_frame(payload: &[u8]) -> Vec<u8> {
        let len = 6 + payload.len();
        let mut f = vec![0x01];
        f.extend_from_slice(&(len as u16).to_le_bytes());
        f.push(Cmd::Ack.opcode());
        f.extend_from_slice(payload);
        let crc = crc16(&f);
        f.extend_from_slice(&crc.to_le_bytes());
        f
    }

    #[test]
    fn ping_succeeds_against_ack() {
        let mut session = Session::with_transport(Box::new(FakeTransport {
            inbound: ack_frame(&[]).into(),
        }));
        assert!(session.ping());
        assert!(session.error().is_none());
    }

    #[test]
    fn sticky_error_short_circuits_later_ops() {
        let mut session = Session::with_transport(Box::new(FakeTransport {
            inbound: VecDeque::new(),
        }));
        assert!(!session.ping());
        assert!(session.error().is_some());
        // no bytes queued, so a second op would also fail on I/O -- but
        // because the error is sticky, it never attempts the transport.
        assert!(session.read_firmware_header().is_none());
    }
}
