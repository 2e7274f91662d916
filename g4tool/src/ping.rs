#[derive(clap::Args, Debug)]
pub struct PingOpts;

impl crate::ToolRun for PingOpts {
    fn run(&self) -> anyhow::Result<()> {
        let mut session = crate::common::open_session()?;
        let ok = session.ping();
        if let Some(e) = session.error() {
            anyhow::bail!("ping failed: {e}");
        }
        if ok {
            println!("ok");
            Ok(())
        } else {
            anyhow::bail!("receiver did not acknowledge ping")
        }
    }
}
