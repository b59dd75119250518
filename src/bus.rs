use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::frame::CanFrame;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unavailable: {dev}: {reason}")]
    Unavailable { dev: String, reason: String },
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("adapter rejected transmit {0}")]
    Rejected(String),
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
    #[error("unsupported bitrate {0}")]
    Bitrate(u32),
}

/// A handle on a CAN bus.
///
/// `recv` returns `Ok(None)` when nothing arrived before `timeout`.
pub trait CanBus {
    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError>;
    fn recv(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError>;
}
