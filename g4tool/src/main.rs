mod cli_types;
mod common;
mod history;
mod list_ports;
mod ping;
mod set_clock;
mod show;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct ToolOptions {
    /// Increase logging verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Check that the receiver is reachable and responding.
    Ping(ping::PingOpts),
    /// Show a single database page, or recent history of one page type.
    Show(show::ShowOpts),
    /// Show merged history across one or more record types.
    History(history::HistoryOpts),
    /// Print or set the receiver's display time.
    SetClock(set_clock::SetClockOpts),
    /// List serial ports, marking the one that looks like the receiver.
    ListPorts(list_ports::ListPortsOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Ping(o) => o.run(),
            Show(o) => o.run(),
            History(o) => o.run(),
            SetClock(o) => o.run(),
            ListPorts(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let opts = ToolOptions::parse();
    common::init_logging(opts.verbose, opts.quiet);

    opts.command.run()
}
