use anyhow::{Context, Result};
use std::time::Duration;

use crate::cli::{BusOpts, MoveOpts, RunOpts, SendOpts, StopOpts};
use crate::frame::parse_cansend;
use crate::port::open_bus;
use crate::proto::command::Command;
use crate::session::{self, Exchange, Plan};

/// The subcommands that put frames on the bus.
#[derive(Debug, Clone)]
pub enum Job {
    Move(MoveOpts),
    Stop(StopOpts),
    Run(RunOpts),
    Send(SendOpts),
}

/// Open the adapter and run one sending job.
pub fn run(bus_opts: &BusOpts, job: Job) -> Result<()> {
    let mut bus = open_bus(bus_opts).context("opening CAN adapter")?;
    tracing::debug!(
        "[tx] dev={} baud={} bitrate={} id=0x{:X} wait={:?}",
        bus_opts.dev,
        bus_opts.baud,
        bus_opts.bitrate,
        bus_opts.id,
        bus_opts.reply_wait()
    );
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let wait = bus_opts.reply_wait();

    match job {
        Job::Move(m) => {
            let cmd = Command::move_relative(m.value.payload()).with_bank(m.value.bank);
            session::exchange(&mut bus, bus_opts.id, &cmd, wait, &mut out)?;
        }
        Job::Stop(s) => {
            let cmd = Command::stop().with_bank(s.bank);
            session::exchange(&mut bus, bus_opts.id, &cmd, wait, &mut out)?;
        }
        Job::Run(r) => {
            let plan = plan_for(bus_opts, &r);
            let results = session::run_sequence(&mut bus, &plan, &mut out)?;
            log_summary(&results);
        }
        Job::Send(SendOpts { frame }) => {
            let frame = parse_cansend(&frame).with_context(|| format!("parsing {:?}", frame))?;
            session::send_frame(&mut bus, &frame, &mut out)?;
            if let Some(t) = wait {
                session::await_reply(&mut bus, t, &mut out)?;
            }
        }
    }
    Ok(())
}

fn plan_for(bus_opts: &BusOpts, r: &RunOpts) -> Plan {
    Plan {
        id: bus_opts.id,
        payload: r.value.payload(),
        bank: r.value.bank,
        wait: bus_opts.reply_wait(),
        pause: Duration::from_millis(r.pause_ms),
    }
}

fn log_summary(results: &[Exchange]) {
    let answered = results
        .iter()
        .filter(|e| matches!(e, Exchange::Reply(..)))
        .count();
    tracing::info!("sequence done: {}/{} commands answered", answered, results.len());
}
