//! Small shared CLI plumbing: the page-type value enum clap parses
//! `-p`/`--type` arguments into, and the duration/cutoff parsing shared
//! by `show` and `history`.

use chrono::{DateTime, Duration, Local};
use g4lib::PageType;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Manufacturing,
    Firmware,
    Software,
    Sensor,
    Egv,
    Calibration,
    Insertion,
    Meter,
}

impl From<PageKind> for PageType {
    fn from(k: PageKind) -> Self {
        match k {
            PageKind::Manufacturing => PageType::ManufacturingData,
            PageKind::Firmware => PageType::FirmwareData,
            PageKind::Software => PageType::SoftwareData,
            PageKind::Sensor => PageType::SensorData,
            PageKind::Egv => PageType::EgvData,
            PageKind::Calibration => PageType::CalibrationData,
            PageKind::Insertion => PageType::InsertionTimeData,
            PageKind::Meter => PageType::MeterData,
        }
    }
}

/// The default set of record types `history` merges when the caller does
/// not name any explicitly.
pub fn default_history_kinds() -> Vec<PageKind> {
    vec![
        PageKind::Sensor,
        PageKind::Egv,
        PageKind::Calibration,
        PageKind::Insertion,
        PageKind::Meter,
    ]
}

/// Parses a Go-`time.ParseDuration`-style duration: a number followed by
/// `s`, `m`, `h`, or `d`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (num, unit) = s.split_at(s.len() - 1);
    let n: i64 = num
        .parse()
        .map_err(|_| format!("invalid duration {s:?}"))?;
    match unit {
        "s" => Ok(Duration::seconds(n)),
        "m" => Ok(Duration::minutes(n)),
        "h" => Ok(Duration::hours(n)),
        "d" => Ok(Duration::days(n)),
        _ => Err(format!("invalid duration unit in {s:?} (expected s/m/h/d)")),
    }
}

/// Resolves a `(duration, all, since)` argument triple -- as clap
/// guarantees at most one is set via an `ArgGroup` -- into epoch seconds
/// suitable for [`g4lib::session::Session::read_history`]. `0` means
/// "everything".
pub fn resolve_cutoff(
    duration: Option<&str>,
    all: bool,
    since: Option<&str>,
) -> anyhow::Result<i64> {
    if all {
        return Ok(0);
    }
    if let Some(since) = since {
        let t = DateTime::parse_from_rfc3339(since)?.with_timezone(&Local);
        return Ok(g4lib::time::to_epoch_seconds(t));
    }
    if let Some(d) = duration {
        let dur = parse_duration(d).map_err(anyhow::Error::msg)?;
        let cutoff = Local::now() - dur;
        return Ok(g4lib::time::to_epoch_seconds(cutoff));
    }
    // no cutoff flag given: default to the last 24 hours, matching
    // `show`'s and `history`'s "-d/-a" convention of leaning recent
    // rather than dumping the entire on-device database by default.
    let cutoff = Local::now() - Duration::hours(24);
    Ok(g4lib::time::to_epoch_seconds(cutoff))
}
