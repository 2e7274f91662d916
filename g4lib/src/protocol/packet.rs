//! Packet framing: `[SOM][u16 length][cmd][payload][u16 crc]`, little-endian,
//! CRC-16 over every byte before the CRC field.

use crate::byteio::{marshal_u16, unmarshal_u16};
use crate::error::{CrcKind, Error, Result};
use crate::protocol::crc::crc16;
use crate::transport::Transport;

use super::{MAX_PACKET_LEN, MIN_PACKET_LEN, SOM};

/// Command/response opcodes the core issues or recognizes. Only the
/// read-only subset the core actually uses is named; any other code
/// received from the device is surfaced as [`Error::Protocol`] with its
/// raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    Ack = 1,
    Ping = 10,
    ReadFirmwareHeader = 11,
    ReadDatabasePageRange = 16,
    ReadDatabasePages = 17,
    ReadTransmitterId = 25,
    ReadDisplayTimeOffset = 29,
    WriteDisplayTimeOffset = 30,
    ReadRtc = 31,
    ReadSystemTime = 34,
    ReadSystemTimeOffset = 35,
    WriteSystemTime = 36,
}

impl Cmd {
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

/// A decoded response packet: the response code and its payload.
pub struct Packet {
    pub code: u8,
    pub payload: Vec<u8>,
}

/// Composes a request frame: `cmd` followed by the concatenation of
/// `params`, framed and CRC'd.
pub fn marshal(cmd: Cmd, params: &[&[u8]]) -> Result<Vec<u8>> {
    let payload_len: usize = params.iter().map(|p| p.len()).sum();
    let len = MIN_PACKET_LEN + payload_len;
    if len > MAX_PACKET_LEN {
        return Err(Error::Malformed(format!(
            "packet length {len} exceeds maximum {MAX_PACKET_LEN}"
        )));
    }

    let mut frame = Vec::with_capacity(len);
    frame.push(SOM);
    frame.extend_from_slice(&marshal_u16(len as u16));
    frame.push(cmd.opcode());
    for p in params {
        frame.extend_from_slice(p);
    }
    let crc = crc16(&frame);
    frame.extend_from_slice(&marshal_u16(crc));
    Ok(frame)
}

/// Sends a request and reads back one framed response packet.
pub fn transact(transport: &mut dyn Transport, cmd: Cmd, params: &[&[u8]]) -> Result<Vec<u8>> {
    let frame = marshal(cmd, params)?;
    transport.send(&frame)?;
    let packet = receive(transport)?;
    if packet.code != Cmd::Ack.opcode() {
        return Err(Error::Protocol { code: packet.code });
    }
    Ok(packet.payload)
}

/// Reads and validates one framed response packet from the transport.
pub fn receive(transport: &mut dyn Transport) -> Result<Packet> {
    let mut header = [0u8; 4];
    transport.receive(&mut header)?;
    if header[0] != SOM {
        return Err(Error::Malformed(format!(
            "expected SOM {SOM:#04x}, got {:#04x}",
            header[0]
        )));
    }
    let len = unmarshal_u16(&header[1..3]) as usize;
    if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&len) {
        return Err(Error::Malformed(format!(
            "packet length {len} out of range [{MIN_PACKET_LEN}, {MAX_PACKET_LEN}]"
        )));
    }
    let code = header[3];

    let payload_len = len - MIN_PACKET_LEN;
    let mut rest = vec![0u8; payload_len + 2];
    transport.receive(&mut rest)?;
    let payload = rest[..payload_len].to_vec();
    let received_crc = unmarshal_u16(&rest[payload_len..payload_len + 2]);

    let mut full = Vec::with_capacity(len);
    full.extend_from_slice(&header);
    full.extend_from_slice(&payload);
    let computed_crc = crc16(&full);
    if computed_crc != received_crc {
        return Err(Error::Crc {
            kind: CrcKind::Packet,
            received: received_crc,
            computed: computed_crc,
            page_type: None,
            page_number: None,
            data: full,
        });
    }

    Ok(Packet { code, payload })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::Transport;
    use std::collections::VecDeque;

    struct FakeTransport {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
    }

    impl Transport for FakeTransport {
        fn send(&mut self, frame: &[u8]) -> Result<()> {
            self.outbound.extend_from_slice(frame);
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

    #[test]
    fn ping_roundtrip() {
        let request = marshal(Cmd::Ping, &[]).unwrap();
        assert_eq!(request, vec![0x01, 0x06, 0x00, 0x0A, 0x5E, 0x65]);

        let response = marshal(Cmd::Ack, &[]).unwrap();
        let mut transport = FakeTransport {
            inbound: response.into(),
            outbound: Vec::new(),
        };
        let payload = transact(&mut transport, Cmd::Ping, &[]).unwrap();
        assert!(payload.is_empty());
        assert_eq!(transport.outbound, request);
    }

    #[test]
    fn bad_crc_is_rejected() {
        let mut response = marshal(Cmd::Ack, &[]).unwrap();
        *response.last_mut().unwrap() ^= 0xFF;
        let mut transport = FakeTransport {
            inbound: response.into(),
            outbound: Vec::new(),
        };
        let err = receive(&mut transport).unwrap_err();
        assert!(matches!(err, Error::Crc { kind: CrcKind::Packet, .. }));
    }

    #[test]
    fn non_ack_response_is_protocol_error() {
        let response = marshal(Cmd::Ack, &[]).unwrap();
        let mut nak = response.clone();
        nak[3] = 2; // Nak
        let crc = crc16(&nak[..4]);
        nak[4] = (crc & 0xFF) as u8;
        nak[5] = (crc >> 8) as u8;
        let mut transport = FakeTransport {
            inbound: nak.into(),
            outbound: Vec::new(),
        };
        let err = transact(&mut transport, Cmd::Ping, &[]).unwrap_err();
        assert!(matches!(err, Error::Protocol { code: 2 }));
    }
}
