use crate::cli_types::{default_history_kinds, resolve_cutoff, PageKind};

#[derive(clap::Args, Debug)]
#[command(group(clap::ArgGroup::new("cutoff").args(["duration", "all", "since"])))]
pub struct HistoryOpts {
    /// Record types to include (repeatable). Defaults to sensor, egv,
    /// calibration, insertion, and meter.
    #[arg(short = 'r', long = "record")]
    records: Vec<PageKind>,

    /// Include records from the last DURATION (e.g. "24h", "7d").
    #[arg(short, long)]
    duration: Option<String>,

    /// Include the receiver's entire history.
    #[arg(short, long)]
    all: bool,

    /// Include records strictly after this RFC3339 timestamp.
    #[arg(short = 't', long)]
    since: Option<String>,

    /// Emit JSON instead of a text table.
    #[arg(short, long)]
    json: bool,
}

impl crate::ToolRun for HistoryOpts {
    fn run(&self) -> anyhow::Result<()> {
        let kinds: Vec<PageKind> = if self.records.is_empty() {
            default_history_kinds()
        } else {
            self.records.clone()
        };

        let cutoff = resolve_cutoff(self.duration.as_deref(), self.all, self.since.as_deref())?;

        let mut session = crate::common::open_session()?;
        let mut streams = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            let page_type = (*kind).into();
            let records = session.read_history(page_type, cutoff).unwrap_or_default();
            if let Some(e) = session.error() {
                anyhow::bail!("history failed reading {kind:?}: {e}");
            }
            streams.push(records);
        }

        let merged = g4lib::history::merge_history(&streams);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&merged)?);
        } else {
            for record in &merged {
                println!("{}", describe(record));
            }
        }
        Ok(())
    }
}

fn describe(record: &g4lib::Record) -> String {
    use g4lib::Record::*;
    let t = record.timestamp().display();
    match record {
        SensorInfo { unfiltered, filtered, rssi, .. } => {
            format!("{t} sensor   unfiltered={unfiltered} filtered={filtered} rssi={rssi}")
        }
        EgvInfo { glucose, trend, noise, display_only, .. } => {
            format!(
                "{t} egv      glucose={glucose} trend={} noise={noise} display_only={display_only}",
                trend.glyph()
            )
        }
        CalibrationInfo { slope, intercept, scale, data, .. } => format!(
            "{t} cal      slope={slope:.3} intercept={intercept:.3} scale={scale:.3} points={}",
            data.len()
        ),
        InsertionInfo { event, system_time, .. } => {
            format!("{t} insertion event={event:?} system_time={system_time:?}")
        }
        MeterInfo { glucose, meter_time, .. } => {
            format!("{t} meter    glucose={glucose} meter_time={meter_time}")
        }
        XmlInfo { info, .. } => format!("{t} xml      {info:?}"),
    }
}
