use crate::page::PageType;

/// Which layer's CRC failed to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcKind {
    Packet,
    Page,
    Record,
}

/// Every error the core can surface, per the cross-cutting kinds the
/// wire/page/history layers are specified against.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("transport I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    #[error("timed out waiting for data")]
    Timeout,

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("CRC mismatch ({kind:?}): received {received:#06x}, computed {computed:#06x}")]
    Crc {
        kind: CrcKind,
        received: u16,
        computed: u16,
        page_type: Option<PageType>,
        page_number: Option<i32>,
        data: Vec<u8>,
    },

    #[error("receiver returned non-ack response code {code}")]
    Protocol { code: u8 },

    #[error("page mismatch: expected {expected_type:?}/{expected_number}, got {got_type:?}/{got_number}")]
    UnexpectedPage {
        expected_type: PageType,
        expected_number: i32,
        got_type: PageType,
        got_number: i32,
    },

    #[error("no decoder for page type {0:?}")]
    Unsupported(PageType),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("BLE authentication failed")]
    AuthFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
