//! The receiver's notion of time: seconds since the Dexcom epoch,
//! re-interpreted as local wall-clock components rather than a real
//! timezone-bearing instant.
//!
//! `SystemTime` is `RTC + SystemTimeOffset`; `DisplayTime` is
//! `SystemTime + DisplayTimeOffset`. Both are decoded the same way: take
//! the epoch-seconds value, add it to the Dexcom epoch as a *naive*
//! (timezone-less) instant, then read back the resulting (Y,M,D,h,m,s)
//! components as if they were already local time. This is precisely
//! backwards from how a real UTC timestamp would be interpreted, but it
//! is what the receiver's firmware does, and round-tripping
//! [`Timestamp::set_display_time`] depends on mirroring it exactly.

use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Midnight 2009-01-01, the origin every on-device clock counts from.
fn dexcom_epoch_naive() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2009, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Converts a raw "seconds since Dexcom epoch" field into a local
/// wall-clock instant, per the naive-component reinterpretation above.
pub fn from_epoch_seconds(seconds: u32) -> DateTime<Local> {
    let naive = dexcom_epoch_naive() + chrono::Duration::seconds(seconds as i64);
    Local
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Inverse of [`from_epoch_seconds`]: reads back `t`'s (Y,M,D,h,m,s)
/// components as a naive instant and measures the offset from the Dexcom
/// epoch, ignoring `t`'s actual timezone.
pub fn to_epoch_seconds(t: DateTime<Local>) -> i64 {
    (t.naive_local() - dexcom_epoch_naive()).num_seconds()
}

/// A record's paired system/display timestamps, as stored on the wire:
/// the first eight bytes of every record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Timestamp {
    pub system_time: i64,
    pub display_time: i64,
}

impl Timestamp {
    pub fn unmarshal(b: &[u8]) -> Self {
        Self {
            system_time: crate::byteio::unmarshal_u32(&b[0..4]) as i64,
            display_time: crate::byteio::unmarshal_u32(&b[4..8]) as i64,
        }
    }

    /// Display time as a local wall-clock instant.
    pub fn display(&self) -> DateTime<Local> {
        from_epoch_seconds(self.display_time as u32)
    }

    /// `display_time - system_time`, used to adjust calibration
    /// sub-record fields that are stored without the display offset.
    pub fn display_offset(&self) -> i64 {
        self.display_time - self.system_time
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn epoch_zero_is_midnight_2009() {
        let t = from_epoch_seconds(0);
        assert_eq!(t.naive_local(), dexcom_epoch_naive());
    }

    #[test]
    fn roundtrip_epoch_seconds() {
        for secs in [0u32, 1, 12345, 0x0E339074, u32::MAX] {
            let t = from_epoch_seconds(secs);
            assert_eq!(to_epoch_seconds(t), secs as i64);
        }
    }

    #[test]
    fn read_display_time_example() {
        // ReadDisplayTimeOffset = 0, ReadSystemTime = 0x0E339074
        // => 2016-07-20 15:25:40 local
        let t = from_epoch_seconds(0x0E339074);
        assert_eq!(t.naive_local().date(), NaiveDate::from_ymd_opt(2016, 7, 20).unwrap());
        assert_eq!(t.naive_local().time().to_string(), "15:25:40");
    }
}
