//! Page headers: the 28-byte envelope wrapping a page's record table.

use serde::Serialize;

use crate::byteio::{unmarshal_i32, unmarshal_u16};
use crate::error::{CrcKind, Error, Result};
use crate::protocol::crc::crc16;

/// The 13 record-page kinds the receiver's database is partitioned into,
/// plus the `InvalidPage` sentinel used to mean "no page context" in error
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PageType {
    ManufacturingData = 0,
    FirmwareData = 1,
    SoftwareData = 2,
    SensorData = 3,
    EgvData = 4,
    CalibrationData = 5,
    DeviationData = 6,
    InsertionTimeData = 7,
    ReceiverLogData = 8,
    ReceiverErrorData = 9,
    MeterData = 10,
    UserEventData = 11,
    UserSettingData = 12,
    InvalidPage = 0xFF,
}

impl PageType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::ManufacturingData,
            1 => Self::FirmwareData,
            2 => Self::SoftwareData,
            3 => Self::SensorData,
            4 => Self::EgvData,
            5 => Self::CalibrationData,
            6 => Self::DeviationData,
            7 => Self::InsertionTimeData,
            8 => Self::ReceiverLogData,
            9 => Self::ReceiverErrorData,
            10 => Self::MeterData,
            11 => Self::UserEventData,
            12 => Self::UserSettingData,
            _ => Self::InvalidPage,
        }
    }

    /// Fixed per-record length (including the trailing 2-byte CRC) for
    /// page types whose records are a known constant size, or `None` for
    /// the variable-length families (exactly one record spanning the
    /// whole payload).
    pub fn fixed_record_len(self) -> Option<usize> {
        match self {
            Self::SensorData => Some(20),
            Self::EgvData => Some(13),
            Self::CalibrationData => Some(249),
            Self::InsertionTimeData => Some(15),
            Self::MeterData => Some(16),
            Self::ManufacturingData | Self::FirmwareData | Self::SoftwareData => None,
            _ => None,
        }
    }

    pub fn is_variable_length(self) -> bool {
        matches!(
            self,
            Self::ManufacturingData | Self::FirmwareData | Self::SoftwareData
        )
    }
}

pub const PAGE_HEADER_LEN: usize = 28;

/// A decoded page header plus the raw record-table bytes that follow it.
pub struct PageHeader<'a> {
    pub first_index: i32,
    pub num_records: i32,
    pub page_type: PageType,
    pub revision: u8,
    pub page_number: i32,
    pub records: &'a [u8],
}

/// Decodes and CRC-validates a raw page buffer, asserting it matches the
/// requested type and page number.
pub fn unmarshal<'a>(
    expected_type: PageType,
    expected_number: i32,
    v: &'a [u8],
) -> Result<PageHeader<'a>> {
    if v.len() < PAGE_HEADER_LEN {
        return Err(Error::Malformed(format!(
            "page shorter than header: {} bytes",
            v.len()
        )));
    }

    let received_crc = unmarshal_u16(&v[26..28]);
    let computed_crc = crc16(&v[0..26]);
    if received_crc != computed_crc {
        return Err(Error::Crc {
            kind: CrcKind::Page,
            received: received_crc,
            computed: computed_crc,
            page_type: Some(expected_type),
            page_number: Some(expected_number),
            data: v.to_vec(),
        });
    }

    let first_index = unmarshal_i32(&v[0..4]);
    let num_records = unmarshal_i32(&v[4..8]);
    let page_type = PageType::from_u8(v[8]);
    let revision = v[9];
    let page_number = unmarshal_i32(&v[10..14]);

    if page_type != expected_type || page_number != expected_number {
        return Err(Error::UnexpectedPage {
            expected_type,
            expected_number,
            got_type: page_type,
            got_number: page_number,
        });
    }

    Ok(PageHeader {
        first_index,
        num_records,
        page_type,
        revision,
        page_number,
        records: &v[PAGE_HEADER_LEN..],
    })
}

/// Decodes `first_page`/`last_page` from a `ReadDatabasePageRange`
/// response: `-1` in either slot means an empty page list.
pub fn unmarshal_page_range(v: &[u8]) -> Result<(i32, i32)> {
    if v.len() < 8 {
        return Err(Error::Malformed(format!(
            "page range response too short: {} bytes",
            v.len()
        )));
    }
    Ok((unmarshal_i32(&v[0..4]), unmarshal_i32(&v[4..8])))
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_header(page_type: PageType, page_number: i32, num_records: i32) -> Vec<u8> {
        let mut v = vec![0u8; PAGE_HEADER_LEN];
        v[0..4].copy_from_slice(&0i32.to_le_bytes());
        v[4..8].copy_from_slice(&num_records.to_le_bytes());
        v[8] = page_type as u8;
        v[9] = 1; // revision
        v[10..14].copy_from_slice(&page_number.to_le_bytes());
        let crc = crc16(&v[0..26]);
        v[26..28].copy_from_slice(&crc.to_le_bytes());
        v
    }

    #[test]
    fn decodes_matching_header() {
        let v = build_header(PageType::EgvData, 312, 23);
        let header = unmarshal(PageType::EgvData, 312, &v).unwrap();
        assert_eq!(header.num_records, 23);
        assert_eq!(header.page_number, 312);
    }

    #[test]
    fn rejects_bad_crc() {
        let mut v = build_header(PageType::SensorData, 469, 1);
        v[26] ^= 0xFF;
        let err = unmarshal(PageType::SensorData, 469, &v).unwrap_err();
        assert!(matches!(err, Error::Crc { kind: CrcKind::Page, .. }));
    }

    #[test]
    fn rejects_mismatched_page_number() {
        let v = build_header(PageType::SensorData, 469, 1);
        let err = unmarshal(PageType::SensorData, 999, &v).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPage { .. }));
    }
}
