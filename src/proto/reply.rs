use std::fmt;

use thiserror::Error;

use super::command::{FRAME_LEN, Opcode};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("reply must be 8 bytes, got {0}")]
    Length(usize),
    #[error("unknown status code {0}")]
    UnknownStatus(u8),
}

/// Return codes the controller reports in byte 1 of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    NoError,
    LoadedIntoEeprom,
    ChecksumError,
    InvalidCommand,
    WrongType,
    InvalidValue,
    EepromLocked,
    CommandNotAvailable,
}

impl StatusCode {
    pub fn from_code(code: u8) -> Option<Self> {
        use StatusCode::*;
        Some(match code {
            100 => NoError,
            101 => LoadedIntoEeprom,
            1 => ChecksumError,
            2 => InvalidCommand,
            3 => WrongType,
            4 => InvalidValue,
            5 => EepromLocked,
            6 => CommandNotAvailable,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        use StatusCode::*;
        match self {
            NoError => "no error",
            LoadedIntoEeprom => "loaded into EEPROM",
            ChecksumError => "checksum error",
            InvalidCommand => "invalid command",
            WrongType => "wrong type",
            InvalidValue => "invalid value",
            EepromLocked => "EEPROM locked",
            CommandNotAvailable => "command not available",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::NoError | StatusCode::LoadedIntoEeprom)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn lookup_status(code: u8) -> Option<&'static str> {
    StatusCode::from_code(code).map(StatusCode::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReply {
    pub address: u8,
    pub return_code: u8,
    pub command_echo: u8,
    pub value: i32,
}

impl StatusReply {
    pub fn status(&self) -> Result<StatusCode, DecodeError> {
        StatusCode::from_code(self.return_code).ok_or(DecodeError::UnknownStatus(self.return_code))
    }

    pub fn echoed_opcode(&self) -> Opcode {
        Opcode::from(self.command_echo)
    }
}

/// Unpack `[address, status, echo, pad, value(4, big-endian)]`.
pub fn decode(bytes: &[u8]) -> Result<StatusReply, DecodeError> {
    let b: &[u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| DecodeError::Length(bytes.len()))?;
    Ok(StatusReply {
        address: b[0],
        return_code: b[1],
        command_echo: b[2],
        value: i32::from_be_bytes([b[4], b[5], b[6], b[7]]),
    })
}
