use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;

use crate::bus::CanBus;
use crate::frame::CanFrame;
use crate::proto::command::{Command, Payload, encode};
use crate::proto::reply::{DecodeError, StatusReply, decode, lookup_status};

/// What came of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Sent without listening for a reply.
    Sent,
    Reply(CanFrame, StatusReply),
    NoReply,
    Undecodable(CanFrame, DecodeError),
}

/// Move, pause, stop.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: u32,
    pub payload: Payload,
    pub bank: u8,
    pub wait: Option<Duration>,
    pub pause: Duration,
}

pub fn send_frame<B: CanBus>(bus: &mut B, frame: &CanFrame, out: &mut dyn Write) -> Result<()> {
    bus.send(frame)
        .with_context(|| format!("sending {}", frame))?;
    writeln!(out, "tx: {}", frame)?;
    writeln!(out, "Message sent")?;
    Ok(())
}

/// Wait once for a frame and report it; silence is not an error.
pub fn await_reply<B: CanBus>(bus: &mut B, wait: Duration, out: &mut dyn Write) -> Result<Exchange> {
    match bus.recv(wait).context("waiting for reply")? {
        None => {
            writeln!(out, "no reply")?;
            Ok(Exchange::NoReply)
        }
        Some(frame) => Ok(report_reply(frame, out)?),
    }
}

pub fn report_reply(frame: CanFrame, out: &mut dyn Write) -> std::io::Result<Exchange> {
    let reply = match decode(frame.data()) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(id = frame.id(), "undecodable reply: {}", e);
            writeln!(out, "rx: {} ({})", frame, e)?;
            return Ok(Exchange::Undecodable(frame, e));
        }
    };
    match lookup_status(reply.return_code) {
        Some(text) => {
            tracing::debug!(
                address = reply.address,
                echo = ?reply.echoed_opcode(),
                value = reply.value,
                "reply"
            );
            writeln!(out, "rx: {} {}", frame, text)?;
            Ok(Exchange::Reply(frame, reply))
        }
        None => {
            let e = DecodeError::UnknownStatus(reply.return_code);
            tracing::warn!(address = reply.address, "{}", e);
            writeln!(out, "rx: {} ({})", frame, e)?;
            Ok(Exchange::Undecodable(frame, e))
        }
    }
}

pub fn exchange<B: CanBus>(
    bus: &mut B,
    id: u32,
    cmd: &Command,
    wait: Option<Duration>,
    out: &mut dyn Write,
) -> Result<Exchange> {
    let frame = CanFrame::new(id, &encode(cmd)).context("building command frame")?;
    tracing::debug!(
        opcode = ?cmd.opcode,
        bank = cmd.bank,
        value = cmd.value.as_i32(),
        "command"
    );
    send_frame(bus, &frame, out)?;
    match wait {
        Some(t) => await_reply(bus, t, out),
        None => Ok(Exchange::Sent),
    }
}

pub fn run_sequence<B: CanBus>(
    bus: &mut B,
    plan: &Plan,
    out: &mut dyn Write,
) -> Result<[Exchange; 2]> {
    let mv = Command::move_relative(plan.payload).with_bank(plan.bank);
    let moved = exchange(bus, plan.id, &mv, plan.wait, out)?;

    tracing::info!("pausing {:?} before stop", plan.pause);
    std::thread::sleep(plan.pause);

    let stop = Command::stop().with_bank(plan.bank);
    let stopped = exchange(bus, plan.id, &stop, plan.wait, out)?;
    Ok([moved, stopped])
}
