//! Per-record decoding: slicing a page's record table into fixed- or
//! variable-length records, validating each record's own CRC, and
//! unmarshalling the body per page type.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::byteio::{unmarshal_f64, unmarshal_i32, unmarshal_u16, unmarshal_u32};
use crate::error::{CrcKind, Error, Result};
use crate::page::{PageHeader, PageType};
use crate::protocol::crc::crc16;
use crate::time::{from_epoch_seconds, Timestamp};
use crate::xml::{self, XmlInfo};

/// Direction/slope indicator on an EGV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    UpUp,
    Up,
    Up45,
    Flat,
    Down45,
    Down,
    DownDown,
    NotComputable,
    OutOfRange,
}

impl Trend {
    pub fn from_nibble(v: u8) -> Option<Self> {
        Some(match v {
            1 => Self::UpUp,
            2 => Self::Up,
            3 => Self::Up45,
            4 => Self::Flat,
            5 => Self::Down45,
            6 => Self::Down,
            7 => Self::DownDown,
            8 => Self::NotComputable,
            9 => Self::OutOfRange,
            _ => return None,
        })
    }

    /// A single-glyph rendering, for terminal/table display.
    pub fn glyph(self) -> char {
        match self {
            Self::UpUp => '\u{21c8}',
            Self::Up => '\u{2191}',
            Self::Up45 => '\u{2197}',
            Self::Flat => '\u{2192}',
            Self::Down45 => '\u{2198}',
            Self::Down => '\u{2193}',
            Self::DownDown => '\u{21ca}',
            Self::NotComputable => '?',
            Self::OutOfRange => '-',
        }
    }
}

/// An EGV value of 12 or below is not a glucose reading at all but an
/// encoded receiver condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecialGlucose {
    SensorNotActive,
    MinimalDeviation,
    NoAntenna,
    SensorNotCalibrated,
    CountDeviation,
    AbsoluteDeviation,
    PowerDeviation,
    BadRf,
}

impl SpecialGlucose {
    pub fn from_glucose(g: u16) -> Option<Self> {
        Some(match g {
            1 => Self::SensorNotActive,
            2 => Self::MinimalDeviation,
            3 => Self::NoAntenna,
            5 => Self::SensorNotCalibrated,
            6 => Self::CountDeviation,
            9 => Self::AbsoluteDeviation,
            10 => Self::PowerDeviation,
            12 => Self::BadRf,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorChange {
    Stopped = 1,
    Started = 7,
}

impl SensorChange {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Stopped),
            7 => Some(Self::Started),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationDataPoint {
    pub time_entered: DateTime<Local>,
    pub time_applied: DateTime<Local>,
    pub glucose: i32,
    pub raw: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Record {
    SensorInfo {
        timestamp: Timestamp,
        unfiltered: u32,
        filtered: u32,
        rssi: i8,
        unknown: u8,
    },
    EgvInfo {
        timestamp: Timestamp,
        glucose: u16,
        display_only: bool,
        noise: u8,
        trend: Trend,
    },
    CalibrationInfo {
        timestamp: Timestamp,
        slope: f64,
        intercept: f64,
        scale: f64,
        decay: f64,
        /// Three bytes at record offset 32..35 that the firmware never
        /// assigns a field to (the decay field starts at 35, not 32);
        /// kept opaque rather than silently dropped.
        reserved: [u8; 3],
        data: Vec<CalibrationDataPoint>,
    },
    InsertionInfo {
        timestamp: Timestamp,
        system_time: Option<DateTime<Local>>,
        event: Option<SensorChange>,
    },
    MeterInfo {
        timestamp: Timestamp,
        glucose: u16,
        meter_time: DateTime<Local>,
    },
    XmlInfo {
        timestamp: Timestamp,
        info: XmlInfo,
    },
}

impl Record {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Record::SensorInfo { timestamp, .. }
            | Record::EgvInfo { timestamp, .. }
            | Record::CalibrationInfo { timestamp, .. }
            | Record::InsertionInfo { timestamp, .. }
            | Record::MeterInfo { timestamp, .. }
            | Record::XmlInfo { timestamp, .. } => *timestamp,
        }
    }
}

/// Splits a page's record-table bytes into individual record slices,
/// newest first, validating each record's trailing CRC along the way.
pub fn decode_records(header: &PageHeader<'_>, page_type: PageType, page_number: i32) -> Result<Vec<Record>> {
    let mut out = Vec::with_capacity(header.num_records.max(0) as usize);

    if page_type.is_variable_length() {
        if header.num_records != 1 {
            return Err(Error::Malformed(format!(
                "variable-length page {page_type:?} declared {} records, expected 1",
                header.num_records
            )));
        }
        // trimming at the first null byte already isolates the record; a
        // further trailing-0xFF trim is unnecessary for the single-record
        // case (see the ambiguity this leaves for genuinely multi-record
        // variable pages, which the core never encounters).
        let body = xml::slice_until_nul(header.records);
        out.push(unmarshal_record(page_type, page_number, body)?);
        return Ok(out);
    }

    let len = page_type
        .fixed_record_len()
        .ok_or(Error::Unsupported(page_type))?;
    let n = header.num_records.max(0) as usize;
    if header.records.len() < n * len {
        return Err(Error::Malformed(format!(
            "page {page_number} declares {n} records of {len} bytes but only has {} bytes",
            header.records.len()
        )));
    }

    for i in (0..n).rev() {
        let raw = &header.records[i * len..(i + 1) * len];
        let body = &raw[..len - 2];
        let received_crc = unmarshal_u16(&raw[len - 2..len]);
        let computed_crc = crc16(body);
        if received_crc != computed_crc {
            return Err(Error::Crc {
                kind: CrcKind::Record,
                received: received_crc,
                computed: computed_crc,
                page_type: Some(page_type),
                page_number: Some(page_number),
                data: raw.to_vec(),
            });
        }
        out.push(unmarshal_record(page_type, page_number, body)?);
    }

    Ok(out)
}

fn unmarshal_record(page_type: PageType, page_number: i32, body: &[u8]) -> Result<Record> {
    let _ = page_number;
    let timestamp = Timestamp::unmarshal(&body[0..8]);
    let rest = &body[8..];

    Ok(match page_type {
        PageType::SensorData => Record::SensorInfo {
            timestamp,
            unfiltered: unmarshal_u32(&rest[0..4]),
            filtered: unmarshal_u32(&rest[4..8]),
            rssi: rest[8] as i8,
            unknown: rest[9],
        },
        PageType::EgvData => {
            let g = unmarshal_u16(&rest[0..2]);
            let trend_byte = rest[2];
            Record::EgvInfo {
                timestamp,
                glucose: g & 0x3FF,
                display_only: g & 0x8000 != 0,
                noise: (trend_byte & 0x70) >> 4,
                trend: Trend::from_nibble(trend_byte & 0x0F).unwrap_or(Trend::NotComputable),
            }
        }
        PageType::CalibrationData => {
            let slope = unmarshal_f64(&rest[0..8]);
            let intercept = unmarshal_f64(&rest[8..16]);
            let scale = unmarshal_f64(&rest[16..24]);
            let reserved = [rest[24], rest[25], rest[26]];
            let decay = unmarshal_f64(&rest[27..35]);
            let n = rest[35] as usize;
            let offset = timestamp.display_offset();

            let mut data = Vec::with_capacity(n);
            for i in 0..n {
                let sub = &rest[36 + i * 17..36 + (i + 1) * 17];
                let time_entered = unmarshal_u32(&sub[0..4]) as i64 + offset;
                let glucose = unmarshal_i32(&sub[4..8]);
                let raw = unmarshal_i32(&sub[8..12]);
                let time_applied = unmarshal_u32(&sub[12..16]) as i64 + offset;
                data.push(CalibrationDataPoint {
                    time_entered: from_epoch_seconds(time_entered as u32),
                    time_applied: from_epoch_seconds(time_applied as u32),
                    glucose,
                    raw,
                });
            }

            Record::CalibrationInfo {
                timestamp,
                slope,
                intercept,
                scale,
                decay,
                reserved,
                data,
            }
        }
        PageType::InsertionTimeData => {
            let raw_time = unmarshal_u32(&rest[0..4]);
            Record::InsertionInfo {
                timestamp,
                system_time: if raw_time == 0xFFFFFFFF {
                    None
                } else {
                    Some(from_epoch_seconds(raw_time))
                },
                event: SensorChange::from_u8(rest[4]),
            }
        }
        PageType::MeterData => Record::MeterInfo {
            timestamp,
            glucose: unmarshal_u16(&rest[0..2]),
            meter_time: from_epoch_seconds(unmarshal_u32(&rest[2..6])),
        },
        PageType::ManufacturingData | PageType::FirmwareData | PageType::SoftwareData => {
            Record::XmlInfo {
                timestamp,
                info: xml::parse(rest),
            }
        }
        other => return Err(Error::Unsupported(other)),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::page::PAGE_HEADER_LEN;

    fn build_page(page_type: PageType, page_number: i32, records: &[Vec<u8>]) -> Vec<u8> {
        let mut v = vec![0u8; PAGE_HEADER_LEN];
        v[0..4].copy_from_slice(&0i32.to_le_bytes());
        v[4..8].copy_from_slice(&(records.len() as i32).to_le_bytes());
        v[8] = page_type as u8;
        v[9] = 1;
        v[10..14].copy_from_slice(&page_number.to_le_bytes());
        let crc = crc16(&v[0..26]);
        v[26..28].copy_from_slice(&crc.to_le_bytes());
        for r in records {
            v.extend_from_slice(r);
        }
        v
    }

    fn build_fixed_record(timestamp: (u32, u32), body: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&timestamp.0.to_le_bytes());
        v.extend_from_slice(&timestamp.1.to_le_bytes());
        v.extend_from_slice(body);
        let crc = crc16(&v);
        v.extend_from_slice(&crc.to_le_bytes());
        v
    }

    #[test]
    fn decodes_egv_records_newest_first() {
        let mut body0 = vec![0u8; 3];
        let g0 = 100u16 | 0x8000;
        body0[0..2].copy_from_slice(&g0.to_le_bytes());
        body0[2] = (1 << 4) | 4; // noise=1, trend=Flat
        let rec0 = build_fixed_record((100, 100), &body0);

        let mut body1 = vec![0u8; 3];
        let g1 = 224u16;
        body1[0..2].copy_from_slice(&g1.to_le_bytes());
        body1[2] = (1 << 4) | 4;
        let rec1 = build_fixed_record((200, 200), &body1);

        let page = build_page(PageType::EgvData, 312, &[rec0, rec1]);
        let header = crate::page::unmarshal(PageType::EgvData, 312, &page).unwrap();
        let records = decode_records(&header, PageType::EgvData, 312).unwrap();

        assert_eq!(records.len(), 2);
        match &records[0] {
            Record::EgvInfo { glucose, trend, noise, display_only, .. } => {
                assert_eq!(*glucose, 224);
                assert_eq!(*trend, Trend::Flat);
                assert_eq!(*noise, 1);
                assert!(!display_only);
            }
            _ => panic!("expected EgvInfo"),
        }
        assert!(records[0].timestamp().display_time > records[1].timestamp().display_time);
    }

    #[test]
    fn record_crc_mismatch_is_reported() {
        let mut rec = build_fixed_record((1, 1), &[0u8; 10]);
        *rec.last_mut().unwrap() ^= 0xFF;
        let page = build_page(PageType::SensorData, 469, &[rec]);
        let header = crate::page::unmarshal(PageType::SensorData, 469, &page).unwrap();
        let err = decode_records(&header, PageType::SensorData, 469).unwrap_err();
        assert!(matches!(err, Error::Crc { kind: CrcKind::Record, .. }));
    }

    #[test]
    fn insertion_sentinel_system_time_is_null() {
        let mut body = vec![0u8; 5];
        body[0..4].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        body[4] = SensorChange::Started as u8;
        let rec = build_fixed_record((50, 50), &body);
        let page = build_page(PageType::InsertionTimeData, 1, &[rec]);
        let header = crate::page::unmarshal(PageType::InsertionTimeData, 1, &page).unwrap();
        let records = decode_records(&header, PageType::InsertionTimeData, 1).unwrap();
        match &records[0] {
            Record::InsertionInfo { system_time, event, .. } => {
                assert_eq!(*system_time, None);
                assert_eq!(*event, Some(SensorChange::Started));
            }
            _ => panic!("expected InsertionInfo"),
        }
    }
}
