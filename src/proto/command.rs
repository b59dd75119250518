use std::str::FromStr;

use thiserror::Error;

pub const FRAME_LEN: usize = 8;

/// Value bytes the motor controller has always been sent for a relative move.
/// Kept verbatim; their numeric meaning on the controller side is not documented.
pub const MOVE_PAYLOAD: Payload = Payload([0x0f, 0xff, 0xe7, 0x00]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Stop,
    MoveRelative,
    Other(u8),
}

impl Opcode {
    pub fn code(self) -> u8 {
        match self {
            Opcode::Stop => 3,
            Opcode::MoveRelative => 4,
            Opcode::Other(c) => c,
        }
    }
}

impl From<u8> for Opcode {
    fn from(c: u8) -> Self {
        match c {
            3 => Opcode::Stop,
            4 => Opcode::MoveRelative,
            c => Opcode::Other(c),
        }
    }
}

/// Four value bytes, sent as-is in bytes 4..8 of a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Payload(pub [u8; 4]);

impl Payload {
    pub const ZERO: Payload = Payload([0; 4]);

    pub fn from_i32(v: i32) -> Self {
        Payload(v.to_be_bytes())
    }

    pub fn as_i32(self) -> i32 {
        i32::from_be_bytes(self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("payload must be 8 hex digits (e.g. 0fffe700), got {0:?}")]
pub struct PayloadError(String);

impl FromStr for Payload {
    type Err = PayloadError;

    /// Accepts `0fffe700`, `0f.ff.e7.00` or `0x0fffe700`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim()
            .trim_start_matches("0x")
            .chars()
            .filter(|c| *c != '.')
            .collect();
        if hex.len() != 8 || !hex.is_ascii() {
            return Err(PayloadError(s.to_string()));
        }
        let mut out = [0u8; 4];
        for (i, b) in out.iter_mut().enumerate() {
            *b = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
                .map_err(|_| PayloadError(s.to_string()))?;
        }
        Ok(Payload(out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: Opcode,
    /// 1 when the command carries a typed value, 0 otherwise
    pub type_byte: u8,
    pub bank: u8,
    pub value: Payload,
}

impl Command {
    pub fn move_relative(value: Payload) -> Self {
        Self {
            opcode: Opcode::MoveRelative,
            type_byte: 1,
            bank: 0,
            value,
        }
    }

    pub fn stop() -> Self {
        Self {
            opcode: Opcode::Stop,
            type_byte: 0,
            bank: 0,
            value: Payload::ZERO,
        }
    }

    pub fn with_bank(mut self, bank: u8) -> Self {
        self.bank = bank;
        self
    }
}

/// Lay a command out as `[opcode, type, bank, 0, value0..value3]`.
pub fn encode(cmd: &Command) -> [u8; FRAME_LEN] {
    let v = cmd.value.0;
    [
        cmd.opcode.code(),
        cmd.type_byte,
        cmd.bank,
        0,
        v[0],
        v[1],
        v[2],
        v[3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_frame_bytes() {
        let bytes = encode(&Command::move_relative(MOVE_PAYLOAD));
        assert_eq!(bytes, [0x04, 0x01, 0x00, 0x00, 0x0f, 0xff, 0xe7, 0x00]);
    }

    #[test]
    fn stop_frame_bytes() {
        assert_eq!(encode(&Command::stop()), [0x03, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn bank_goes_in_byte_two() {
        let bytes = encode(&Command::stop().with_bank(2));
        assert_eq!(bytes[2], 2);
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn payload_from_value() {
        assert_eq!(Payload::from_i32(-2).0, [0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(Payload::from_i32(1000).as_i32(), 1000);
        assert_eq!(MOVE_PAYLOAD.as_i32(), 0x0fff_e700);
    }

    #[test]
    fn payload_parse() {
        assert_eq!("0fffe700".parse::<Payload>().unwrap(), MOVE_PAYLOAD);
        assert_eq!("0f.ff.e7.00".parse::<Payload>().unwrap(), MOVE_PAYLOAD);
        assert_eq!("0x0FFFE700".parse::<Payload>().unwrap(), MOVE_PAYLOAD);
        assert!("0fffe7".parse::<Payload>().is_err());
        assert!("0fffe7zz".parse::<Payload>().is_err());
    }

    #[test]
    fn opcode_codes() {
        assert_eq!(Opcode::from(4), Opcode::MoveRelative);
        assert_eq!(Opcode::from(3), Opcode::Stop);
        assert_eq!(Opcode::from(9).code(), 9);
    }
}
