use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;

use crate::bus::CanBus;
use crate::cli::{BusOpts, MonitorOpts};
use crate::port::open_bus;
use crate::session::report_reply;
use crate::stats::Stats;

const IDLE_POLL: Duration = Duration::from_millis(250);

pub fn run(bus_opts: &BusOpts, opts: MonitorOpts) -> Result<()> {
    let mut bus = open_bus(bus_opts).context("opening CAN adapter")?;
    tracing::info!(dev = %bus_opts.dev, bitrate = bus_opts.bitrate, "monitoring replies");
    let stdout = std::io::stdout();
    let stats = monitor(&mut bus, opts.count, opts.stats, &mut stdout.lock())?;
    stats.print();
    Ok(())
}

/// Report every frame on the bus until `count` frames have been seen.
pub fn monitor<B: CanBus>(
    bus: &mut B,
    count: Option<u64>,
    stats_int: f64,
    out: &mut dyn Write,
) -> Result<Stats> {
    let mut stats = Stats::new();
    loop {
        if let Some(max) = count
            && stats.frames >= max
        {
            break;
        }
        if let Some(frame) = bus.recv(IDLE_POLL).context("receiving")? {
            let ex = report_reply(frame, out)?;
            stats.record(&ex);
        }
        stats.maybe_print(stats_int);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusError;
    use crate::frame::CanFrame;
    use std::collections::VecDeque;

    struct Replay(VecDeque<Option<CanFrame>>);

    impl CanBus for Replay {
        fn send(&mut self, _frame: &CanFrame) -> Result<(), BusError> {
            Ok(())
        }
        fn recv(&mut self, _timeout: Duration) -> Result<Option<CanFrame>, BusError> {
            Ok(self.0.pop_front().flatten())
        }
    }

    #[test]
    fn stops_after_count() {
        let ok = CanFrame::new(0x2, &[2, 100, 4, 0, 0, 0, 0, 0]).unwrap();
        let eeprom = CanFrame::new(0x2, &[2, 5, 4, 0, 0, 0, 0, 0]).unwrap();
        let mut bus = Replay([Some(ok), None, Some(eeprom), Some(ok)].into());
        let mut out = Vec::new();
        let stats = monitor(&mut bus, Some(2), 60.0, &mut out).unwrap();
        assert_eq!((stats.frames, stats.ok, stats.failed), (2, 1, 1));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("EEPROM locked\n"));
        assert_eq!(bus.0.len(), 1);
    }
}
