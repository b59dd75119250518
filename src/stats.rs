use std::time::Instant;

use crate::session::Exchange;

/// Reply counters for `monitor`.
#[derive(Debug, Clone)]
pub struct Stats {
    pub frames: u64,
    pub ok: u64,
    pub failed: u64,
    pub bad: u64,
    t0: Instant,
    last: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            ok: 0,
            failed: 0,
            bad: 0,
            t0: Instant::now(),
            last: Instant::now(),
        }
    }

    /// Count one received frame by how it decoded.
    pub fn record(&mut self, ex: &Exchange) {
        match ex {
            Exchange::Reply(_, r) => {
                self.frames += 1;
                match r.status() {
                    Ok(code) if code.is_success() => self.ok += 1,
                    _ => self.failed += 1,
                }
            }
            Exchange::Undecodable(..) => {
                self.frames += 1;
                self.bad += 1;
            }
            Exchange::Sent | Exchange::NoReply => {}
        }
    }

    pub fn maybe_print(&mut self, stats_int: f64) {
        if self.last.elapsed().as_secs_f64() >= stats_int {
            self.print();
            self.last = Instant::now();
        }
    }

    pub fn print(&self) {
        let dur = self.t0.elapsed().as_secs_f64().max(1e-3);
        tracing::info!(
            "frames={} ok={} failed={} bad={} over {:.1}s ({:.1} frames/s)",
            self.frames,
            self.ok,
            self.failed,
            self.bad,
            dur,
            self.frames as f64 / dur
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CanFrame;
    use crate::proto::reply::{DecodeError, decode};

    #[test]
    fn counts_by_outcome() {
        let f = CanFrame::new(0x2, &[2, 100, 4, 0, 0, 0, 0, 0]).unwrap();
        let err = CanFrame::new(0x2, &[2, 4, 4, 0, 0, 0, 0, 0]).unwrap();
        let mut s = Stats::new();
        s.record(&Exchange::Reply(f, decode(f.data()).unwrap()));
        s.record(&Exchange::Reply(err, decode(err.data()).unwrap()));
        s.record(&Exchange::Undecodable(f, DecodeError::Length(3)));
        s.record(&Exchange::NoReply);
        assert_eq!((s.frames, s.ok, s.failed, s.bad), (3, 1, 1, 1));
    }
}
