use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::frame::CAN_SFF_MASK;
use crate::proto::command::{MOVE_PAYLOAD, Payload};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "trinamic-can",
    version,
    about = "Drive a Trinamic stepper controller over a serial-line CAN adapter"
)]
pub struct Cli {
    #[command(flatten)]
    pub bus: BusOpts,
    /// Verbose adapter logging (RUST_LOG overrides)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Send a relative move
    Move(MoveOpts),
    /// Send a stop
    Stop(StopOpts),
    /// Move, pause, then stop
    Run(RunOpts),
    /// Send a raw frame in cansend notation, e.g. 001#04.01.00.00.0f.ff.e7.00
    Send(SendOpts),
    /// Print replies seen on the bus
    Monitor(MonitorOpts),
}

#[derive(Args, Debug, Clone)]
pub struct BusOpts {
    /// Serial device of the CAN adapter
    #[arg(long, global = true, default_value = "/dev/ttyACM0")]
    pub dev: String,
    /// Serial baud rate towards the adapter
    #[arg(long, global = true, default_value_t = 115_200)]
    pub baud: u32,
    /// CAN bitrate
    #[arg(long, global = true, default_value_t = 500_000)]
    pub bitrate: u32,
    /// Arbitration id of the motor controller (hex)
    #[arg(long, global = true, default_value = "0x1", value_parser = parse_id)]
    pub id: u32,
    /// Reply wait in milliseconds
    #[arg(long, global = true, default_value_t = 1000)]
    pub timeout_ms: u64,
    /// Do not wait for a reply after sending
    #[arg(long, global = true, default_value_t = false)]
    pub no_reply: bool,
}

impl BusOpts {
    /// How long to listen after a send, if at all.
    pub fn reply_wait(&self) -> Option<Duration> {
        (!self.no_reply).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValueOpts {
    /// Value bytes as 8 hex digits
    #[arg(long, conflicts_with = "value")]
    pub payload: Option<Payload>,
    /// Value as a signed integer (sent big-endian)
    #[arg(long, allow_negative_numbers = true)]
    pub value: Option<i32>,
    /// Motor / bank byte
    #[arg(long, default_value_t = 0)]
    pub bank: u8,
}

impl ValueOpts {
    pub fn payload(&self) -> Payload {
        match (self.payload, self.value) {
            (Some(p), _) => p,
            (None, Some(v)) => Payload::from_i32(v),
            (None, None) => MOVE_PAYLOAD,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MoveOpts {
    #[command(flatten)]
    pub value: ValueOpts,
}

#[derive(Args, Debug, Clone)]
pub struct StopOpts {
    /// Motor / bank byte
    #[arg(long, default_value_t = 0)]
    pub bank: u8,
}

#[derive(Args, Debug, Clone)]
pub struct RunOpts {
    #[command(flatten)]
    pub value: ValueOpts,
    /// Pause between move and stop in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub pause_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SendOpts {
    /// Frame in cansend notation
    pub frame: String,
}

#[derive(Args, Debug, Clone)]
pub struct MonitorOpts {
    /// Stop after this many frames
    #[arg(long)]
    pub count: Option<u64>,
    /// Stats print interval in seconds
    #[arg(long, default_value_t = 5.0)]
    pub stats: f64,
}

fn parse_id(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    let id = u32::from_str_radix(digits, 16)
        .map_err(|_| format!("id must be hex (0x1, 001), got {:?}", s))?;
    if id > CAN_SFF_MASK {
        return Err(format!("id 0x{:X} exceeds the standard 11-bit range", id));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["trinamic-can", "move"]).unwrap();
        assert_eq!(cli.bus.id, 0x1);
        assert_eq!(cli.bus.reply_wait(), Some(Duration::from_secs(1)));
        match cli.cmd {
            Cmd::Move(m) => assert_eq!(m.value.payload(), MOVE_PAYLOAD),
            other => panic!("wrong command {:?}", other),
        }
    }

    #[test]
    fn run_options() {
        let cli = Cli::try_parse_from([
            "trinamic-can",
            "run",
            "--value",
            "-200",
            "--pause-ms",
            "10",
            "--id",
            "7ff",
            "--no-reply",
        ])
        .unwrap();
        assert_eq!(cli.bus.id, 0x7ff);
        assert_eq!(cli.bus.reply_wait(), None);
        match cli.cmd {
            Cmd::Run(r) => {
                assert_eq!(r.pause_ms, 10);
                assert_eq!(r.value.payload(), Payload::from_i32(-200));
            }
            other => panic!("wrong command {:?}", other),
        }
    }

    #[test]
    fn payload_and_value_conflict() {
        let res = Cli::try_parse_from([
            "trinamic-can",
            "move",
            "--payload",
            "0fffe700",
            "--value",
            "1",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn bad_id_rejected() {
        assert!(Cli::try_parse_from(["trinamic-can", "--id", "xyz", "stop"]).is_err());
    }

    #[test]
    fn id_outside_standard_range_rejected() {
        assert!(Cli::try_parse_from(["trinamic-can", "--id", "800", "stop"]).is_err());
        let cli = Cli::try_parse_from(["trinamic-can", "--id", "0x7FF", "stop"]).unwrap();
        assert_eq!(cli.bus.id, 0x7ff);
    }
}
