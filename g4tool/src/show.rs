use crate::cli_types::{resolve_cutoff, PageKind};

#[derive(clap::Args, Debug)]
#[command(group(clap::ArgGroup::new("selector").args(["page_number", "duration", "all"])))]
pub struct ShowOpts {
    /// Page type to show.
    #[arg(short = 'p', long = "type")]
    page_type: PageKind,

    /// Show exactly this page number, rather than scanning history.
    #[arg(short = 'n', long)]
    page_number: Option<i32>,

    /// Show records from the last DURATION (e.g. "24h", "7d").
    #[arg(short, long)]
    duration: Option<String>,

    /// Show the receiver's entire history for this page type.
    #[arg(short, long)]
    all: bool,
}

impl crate::ToolRun for ShowOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut session = crate::common::open_session()?;
        let page_type = self.page_type.into();

        let records = if let Some(n) = self.page_number {
            session.read_records(page_type, n)
        } else {
            let since = resolve_cutoff(self.duration.as_deref(), self.all, None)?;
            session.read_history(page_type, since)
        };

        if let Some(e) = session.error() {
            anyhow::bail!("show failed: {e}");
        }
        let records = records.unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&records)?);
        Ok(())
    }
}
