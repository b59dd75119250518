use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use crate::bus::{BusError, CanBus};
use crate::cli::BusOpts;
use crate::frame::{CanFrame, parse_slcan};

/// Serial read timeout; bounds how far `recv` can overshoot its deadline.
const POLL: Duration = Duration::from_millis(20);
/// How long to wait for the adapter to answer a command.
const ACK_WAIT: Duration = Duration::from_millis(100);
const BEL: u8 = 0x07;
/// Longest SLCAN line is 30 bytes (extended id, 8 data bytes, timestamp).
const MAX_LINE: usize = 64;

/// SLCAN `S<n>` code for a CAN bitrate.
pub fn bitrate_code(bitrate: u32) -> Option<u8> {
    Some(match bitrate {
        10_000 => 0,
        20_000 => 1,
        50_000 => 2,
        100_000 => 3,
        125_000 => 4,
        250_000 => 5,
        500_000 => 6,
        800_000 => 7,
        1_000_000 => 8,
        _ => return None,
    })
}

pub fn open_bus(opts: &BusOpts) -> Result<SlcanBus<Box<dyn SerialPort>>, BusError> {
    let code = bitrate_code(opts.bitrate).ok_or(BusError::Bitrate(opts.bitrate))?;
    let unavailable = |reason: String| BusError::Unavailable {
        dev: opts.dev.clone(),
        reason,
    };

    let port = serialport::new(&opts.dev, opts.baud)
        .timeout(POLL)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open()
        .map_err(|e| unavailable(e.to_string()))?;

    let bus = SlcanBus::start(port, code).map_err(|e| unavailable(e.to_string()))?;
    tracing::debug!(dev = %opts.dev, bitrate = opts.bitrate, "slcan channel open");
    Ok(bus)
}

/// CAN bus behind a serial-line (Lawicel) adapter.
pub struct SlcanBus<P: Read + Write> {
    port: P,
    buf: Vec<u8>,
    /// Frames that arrived while waiting for an ack.
    pending: VecDeque<CanFrame>,
}

/// One unit of adapter output.
#[derive(Debug, PartialEq, Eq)]
enum Token {
    /// `\r`, `z\r` or `Z\r`
    Ack,
    Bell,
    Frame(CanFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ack {
    Accepted,
    Rejected,
    Silent,
}

impl<P: Read + Write> SlcanBus<P> {
    /// Close any stale channel, select the bitrate and open the channel.
    pub fn start(port: P, bitrate_code: u8) -> io::Result<Self> {
        let mut bus = Self {
            port,
            buf: Vec::with_capacity(MAX_LINE),
            pending: VecDeque::new(),
        };
        // a channel that is already closed answers C with BEL
        bus.command("C")?;
        bus.await_ack()?;
        for cmd in [format!("S{}", bitrate_code), "O".to_string()] {
            bus.command(&cmd)?;
            if bus.await_ack()? == Ack::Rejected {
                return Err(io::Error::other(format!("adapter rejected {:?}", cmd)));
            }
        }
        Ok(bus)
    }

    fn command(&mut self, cmd: &str) -> io::Result<()> {
        self.port.write_all(cmd.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()
    }

    /// Read one chunk into the buffer; a serial timeout is not an error.
    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 64];
        match self.port.read(&mut chunk) {
            Ok(0) => std::thread::sleep(Duration::from_millis(1)),
            Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Next complete token in the buffer. Noise lines are skipped and an
    /// unterminated run longer than any SLCAN line is discarded.
    fn next_token(&mut self) -> Option<Token> {
        loop {
            let Some(end) = self.buf.iter().position(|&b| b == b'\r' || b == BEL) else {
                if self.buf.len() > MAX_LINE {
                    tracing::debug!("dropping {} unterminated adapter bytes", self.buf.len());
                    self.buf.clear();
                }
                return None;
            };
            if self.buf[end] == BEL {
                if end > 0 {
                    tracing::debug!("dropping {} bytes before BEL", end);
                }
                self.buf.drain(..=end);
                return Some(Token::Bell);
            }
            let raw: Vec<u8> = self.buf.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw[..end]);
            let line = line.trim_matches(|c| c == '\n' || c == ' ');
            match line {
                "" | "z" | "Z" => return Some(Token::Ack),
                _ => match parse_slcan(line) {
                    Ok(f) => return Some(Token::Frame(f)),
                    Err(e) => tracing::debug!("skipping adapter line {:?}: {}", line, e),
                },
            }
        }
    }

    /// Wait briefly for the adapter to accept or reject the last command.
    fn await_ack(&mut self) -> io::Result<Ack> {
        let deadline = Instant::now() + ACK_WAIT;
        loop {
            match self.next_token() {
                Some(Token::Ack) => return Ok(Ack::Accepted),
                Some(Token::Bell) => return Ok(Ack::Rejected),
                Some(Token::Frame(f)) => self.pending.push_back(f),
                None => {
                    if Instant::now() >= deadline {
                        tracing::debug!("no ack from adapter");
                        return Ok(Ack::Silent);
                    }
                    self.fill()?;
                }
            }
        }
    }

    #[cfg(test)]
    fn get_ref(&self) -> &P {
        &self.port
    }
}

impl<P: Read + Write> CanBus for SlcanBus<P> {
    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        let line = frame.to_slcan();
        self.command(&line).map_err(BusError::Send)?;
        match self.await_ack().map_err(BusError::Send)? {
            Ack::Rejected => Err(BusError::Rejected(line)),
            Ack::Accepted | Ack::Silent => Ok(()),
        }
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(f) = self.pending.pop_front() {
                return Ok(Some(f));
            }
            match self.next_token() {
                Some(Token::Frame(f)) => return Ok(Some(f)),
                Some(Token::Ack) => continue,
                Some(Token::Bell) => {
                    tracing::warn!("adapter signalled an error (BEL)");
                    continue;
                }
                None => {}
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.fill().map_err(BusError::Receive)?;
        }
    }
}

impl<P: Read + Write> Drop for SlcanBus<P> {
    fn drop(&mut self) {
        if let Err(e) = self.command("C") {
            tracing::debug!("closing slcan channel: {}", e);
        }
    }
}
