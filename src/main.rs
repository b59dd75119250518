use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod bus;
mod cli;
mod frame;
mod port;
mod proto;
mod rx;
mod session;
mod stats;
mod tx;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let default = if args.debug {
        "info,trinamic_can=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.cmd {
        cli::Cmd::Monitor(opts) => rx::run(&args.bus, opts),
        cli::Cmd::Move(opts) => tx::run(&args.bus, tx::Job::Move(opts)),
        cli::Cmd::Stop(opts) => tx::run(&args.bus, tx::Job::Stop(opts)),
        cli::Cmd::Run(opts) => tx::run(&args.bus, tx::Job::Run(opts)),
        cli::Cmd::Send(opts) => tx::run(&args.bus, tx::Job::Send(opts)),
    }
}
