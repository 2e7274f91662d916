use chrono::{DateTime, Local};

#[derive(clap::Args, Debug)]
pub struct SetClockOpts {
    /// Set the display time to this RFC3339 timestamp instead of just
    /// printing the current one.
    #[arg(long)]
    set: Option<String>,
}

impl crate::ToolRun for SetClockOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut session = crate::common::open_session()?;

        if let Some(set) = &self.set {
            let t = DateTime::parse_from_rfc3339(set)?.with_timezone(&Local);
            session.set_display_time(t);
            if let Some(e) = session.error() {
                anyhow::bail!("set-clock failed: {e}");
            }
            println!("set display time to {t}");
        } else {
            let t = session.read_display_time();
            if let Some(e) = session.error() {
                anyhow::bail!("set-clock failed: {e}");
            }
            println!("{}", t.expect("no session error implies a value"));
        }
        Ok(())
    }
}
