//! BLE Share-link transport.
//!
//! btleplug's API is async; the rest of this crate is deliberately
//! synchronous (the packet layer just wants blocking `send`/`receive`), so
//! this module owns a small dedicated Tokio runtime (one worker thread, so
//! the spawned notification-draining task keeps running between our
//! blocking calls) and drives everything through it with `block_on`.
//! Incoming notification bytes are funneled into a bounded
//! `std::sync::mpsc` channel by a
//! background task; `receive` is the sole consumer, draining it with a
//! 5-second per-byte timeout as required by the notification contract.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::time::Duration;

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Notification channel capacity: large enough to hold one full
/// 1590-byte page plus header/CRC overhead without the producer stalling.
const CHANNEL_CAPACITY: usize = 1600;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const BYTE_TIMEOUT: Duration = Duration::from_secs(5);
const BLE_MTU: usize = 20;
const SEND_PREFIX: [u8; 2] = [0x01, 0x01];

fn service_uuid(short: u16) -> Uuid {
    // f0acXXXX-ebfa-f96f-28da-076c35a521db
    let base = 0xf0ac0000_ebfa_f96f_28da_076c35a521dbu128;
    Uuid::from_u128(base | ((short as u128) << 96))
}

fn char_auth() -> Uuid {
    service_uuid(0xacac)
}
fn char_heartbeat() -> Uuid {
    service_uuid(0x2b18)
}
fn char_send() -> Uuid {
    service_uuid(0xb20a)
}
fn char_receive() -> Uuid {
    service_uuid(0xb20b)
}

const RECEIVER_SERVICE: u16 = 0xa0b1;

const RECEIVER_NAME: &str = "DEXCOMRX";

/// Environment-derived BLE configuration, read once at session open.
#[derive(Debug, Clone)]
pub struct BleConfig {
    pub receiver_address: Option<String>,
    pub cgm_id: String,
}

impl BleConfig {
    pub fn from_env() -> Result<Self> {
        let receiver_address = std::env::var("DEXCOM_G4_RECEIVER_ADDRESS").ok();
        let cgm_id = std::env::var("DEXCOM_CGM_ID")
            .map_err(|_| Error::Config("DEXCOM_CGM_ID is required for BLE".into()))?;
        validate_cgm_id(&cgm_id)?;
        Ok(Self {
            receiver_address,
            cgm_id,
        })
    }

    /// The 16-byte authentication payload: the 10-character CGM id padded
    /// with `"000000"`.
    fn auth_payload(&self) -> Vec<u8> {
        let mut v = self.cgm_id.as_bytes().to_vec();
        v.extend_from_slice(b"000000");
        v
    }
}

fn validate_cgm_id(id: &str) -> Result<()> {
    let bytes = id.as_bytes();
    let ok = bytes.len() == 10
        && bytes[0..2].iter().all(|b| b.is_ascii_alphabetic())
        && bytes[2..10].iter().all(|b| b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "DEXCOM_CGM_ID must be 2 letters followed by 8 digits, got {id:?}"
        )))
    }
}

/// Connection state, tracked mostly for logging -- the open sequence below
/// always drives straight through in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BleState {
    Discovered,
    Connected,
    Paired,
    Authenticated,
    Operational,
}

pub struct BleTransport {
    runtime: tokio::runtime::Runtime,
    peripheral: Peripheral,
    send_char: Characteristic,
    rx: Receiver<u8>,
    state: BleState,
}

impl BleTransport {
    pub fn open(config: &BleConfig) -> Result<Self> {
        // multi-thread so the spawned notification-draining task keeps
        // making progress on a worker thread between our blocking calls
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(Error::TransportIo)?;

        let (peripheral, send_char, receive_char, heartbeat_char, rx) =
            runtime.block_on(Self::connect(config))?;

        let mut transport = Self {
            runtime,
            peripheral,
            send_char,
            rx,
            state: BleState::Paired,
        };

        transport
            .runtime
            .block_on(transport.peripheral.subscribe(&heartbeat_char))
            .map_err(ble_io_err)?;
        transport
            .runtime
            .block_on(transport.peripheral.subscribe(&receive_char))
            .map_err(ble_io_err)?;

        transport.authenticate(config)?;
        transport.state = BleState::Operational;
        Ok(transport)
    }

    async fn connect(
        config: &BleConfig,
    ) -> Result<(
        Peripheral,
        Characteristic,
        Characteristic,
        Characteristic,
        Receiver<u8>,
    )> {
        let manager = Manager::new().await.map_err(ble_io_err)?;
        let adapters = manager.adapters().await.map_err(ble_io_err)?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| Error::TransportIo(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no BLE adapter available",
            )))?;

        let peripheral = Self::discover(&adapter, config).await?;

        // discovered but not connected: drop any stale cached device state
        // first, or the OS may report "Software caused connection abort".
        let _ = peripheral.disconnect().await;
        peripheral.connect().await.map_err(ble_io_err)?;
        peripheral.pair().await.map_err(ble_io_err)?;
        peripheral.discover_services().await.map_err(ble_io_err)?;

        let chars = peripheral.characteristics();
        let find = |uuid: Uuid| -> Result<Characteristic> {
            chars
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| Error::Protocol { code: 0 })
        };
        let send_char = find(char_send())?;
        let receive_char = find(char_receive())?;
        let heartbeat_char = find(char_heartbeat())?;

        let (tx, rx): (SyncSender<u8>, Receiver<u8>) = sync_channel(CHANNEL_CAPACITY);
        let mut notifications = peripheral.notifications().await.map_err(ble_io_err)?;
        let recv_uuid = receive_char.uuid;
        let hb_uuid = heartbeat_char.uuid;
        tokio::spawn(async move {
            while let Some(event) = notifications.next().await {
                if event.uuid == recv_uuid {
                    for b in event.value {
                        // producer never drops bytes: a full channel just
                        // backpressures until receive() drains it.
                        if tx.send(b).is_err() {
                            return;
                        }
                    }
                } else if event.uuid == hb_uuid {
                    // no-op handler; subscribing is required for the
                    // receiver to emit anything at all.
                }
            }
        });

        Ok((peripheral, send_char, receive_char, heartbeat_char, rx))
    }

    async fn discover(adapter: &Adapter, config: &BleConfig) -> Result<Peripheral> {
        if let Some(addr) = &config.receiver_address {
            adapter
                .start_scan(ScanFilter::default())
                .await
                .map_err(ble_io_err)?;
            tokio::time::sleep(DISCOVERY_TIMEOUT).await;
            for p in adapter.peripherals().await.map_err(ble_io_err)? {
                if p.address().to_string().eq_ignore_ascii_case(addr) {
                    return Ok(p);
                }
            }
        } else {
            let filter = ScanFilter {
                services: vec![service_uuid(RECEIVER_SERVICE)],
            };
            adapter.start_scan(filter).await.map_err(ble_io_err)?;
            tokio::time::sleep(DISCOVERY_TIMEOUT).await;
            for p in adapter.peripherals().await.map_err(ble_io_err)? {
                let props = p.properties().await.map_err(ble_io_err)?;
                if let Some(props) = props {
                    if props.local_name.as_deref() == Some(RECEIVER_NAME) {
                        return Ok(p);
                    }
                }
            }
        }
        Err(Error::TransportIo(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "receiver not found within discovery timeout",
        )))
    }

    fn authenticate(&mut self, config: &BleConfig) -> Result<()> {
        let payload = config.auth_payload();
        let auth_char = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == char_auth())
            .ok_or(Error::Protocol { code: 0 })?;

        let existing = self
            .runtime
            .block_on(self.peripheral.read(&auth_char))
            .map_err(ble_io_err)?;
        if existing == payload {
            self.state = BleState::Authenticated;
            return Ok(());
        }

        self.runtime
            .block_on(
                self.peripheral
                    .write(&auth_char, &payload, WriteType::WithResponse),
            )
            .map_err(|_| Error::AuthFailed)?;
        self.state = BleState::Authenticated;
        Ok(())
    }
}

impl super::Transport for BleTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(SEND_PREFIX.len() + frame.len());
        buf.extend_from_slice(&SEND_PREFIX);
        buf.extend_from_slice(frame);
        for chunk in buf.chunks(BLE_MTU) {
            self.runtime
                .block_on(
                    self.peripheral
                        .write(&self.send_char, chunk, WriteType::WithoutResponse),
                )
                .map_err(ble_io_err)?;
        }
        Ok(())
    }

    fn receive(&mut self, into: &mut [u8]) -> Result<()> {
        for slot in into.iter_mut() {
            *slot = self
                .rx
                .recv_timeout(BYTE_TIMEOUT)
                .map_err(|_| Error::Timeout)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.runtime.block_on(self.peripheral.disconnect());
    }
}

fn ble_io_err(e: btleplug::Error) -> Error {
    Error::TransportIo(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_cgm_id() {
        assert!(validate_cgm_id("AB12345678").is_ok());
    }

    #[test]
    fn rejects_malformed_cgm_id() {
        assert!(validate_cgm_id("1234567890").is_err());
        assert!(validate_cgm_id("AB1234567").is_err());
        assert!(validate_cgm_id("ABCDEFGHIJ").is_err());
    }

    #[test]
    fn auth_payload_is_16_bytes() {
        let cfg = BleConfig {
            receiver_address: None,
            cgm_id: "AB12345678".into(),
        };
        assert_eq!(cfg.auth_payload().len(), 16);
    }

    #[test]
    fn service_uuid_pattern() {
        assert_eq!(
            service_uuid(RECEIVER_SERVICE).to_string(),
            "f0aca0b1-ebfa-f96f-28da-076c35a521db"
        );
    }
}
