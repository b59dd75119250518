use std::fmt;
use std::fmt::Write;

use thiserror::Error;

pub const CAN_MAX_DLC: usize = 8;
pub const CAN_SFF_MASK: u32 = 0x7FF;
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("id 0x{0:X} out of range for a standard frame")]
    StdIdRange(u32),
    #[error("id 0x{0:X} out of range for an extended frame")]
    ExtIdRange(u32),
    #[error("data length {0} exceeds 8")]
    TooLong(usize),
    #[error("missing '#' separator")]
    MissingSeparator,
    #[error("bad id: {0}")]
    BadId(String),
    #[error("bad hex in data: {0}")]
    BadHex(String),
    #[error("dlc {dlc} does not match {got} data bytes")]
    DlcMismatch { dlc: usize, got: usize },
    #[error("unknown frame tag {0:?}")]
    UnknownTag(char),
}

/// Classic CAN frame with up to eight data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    len: u8,
    data: [u8; CAN_MAX_DLC],
}

impl CanFrame {
    pub fn new(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        if id > CAN_SFF_MASK {
            return Err(FrameError::StdIdRange(id));
        }
        Self::build(id, false, data)
    }

    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        if id > CAN_EFF_MASK {
            return Err(FrameError::ExtIdRange(id));
        }
        Self::build(id, true, data)
    }

    fn build(id: u32, extended: bool, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > CAN_MAX_DLC {
            return Err(FrameError::TooLong(data.len()));
        }
        let mut buf = [0u8; CAN_MAX_DLC];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            extended,
            len: data.len() as u8,
            data: buf,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// SLCAN line for this frame, without the trailing `\r`.
    pub fn to_slcan(&self) -> String {
        let mut s = String::with_capacity(10 + 2 * CAN_MAX_DLC);
        if self.extended {
            let _ = write!(s, "T{:08X}", self.id);
        } else {
            let _ = write!(s, "t{:03X}", self.id);
        }
        let _ = write!(s, "{}", self.len);
        for b in self.data() {
            let _ = write!(s, "{:02X}", b);
        }
        s
    }
}

impl fmt::Display for CanFrame {
    /// candump style: `001   [8]  04 01 00 00 0F FF E7 00`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "{:08X}", self.id)?;
        } else {
            write!(f, "{:03X}", self.id)?;
        }
        write!(f, "   [{}] ", self.len)?;
        for b in self.data() {
            write!(f, " {:02X}", b)?;
        }
        Ok(())
    }
}

fn hex_bytes(hex: &str) -> Result<Vec<u8>, FrameError> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(FrameError::BadHex(hex.to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| FrameError::BadHex(hex.to_string()))
        })
        .collect()
}

/// Parse the `cansend` notation, e.g. `001#04.01.00.00.0f.ff.e7.00`.
///
/// Three id digits select a standard frame, eight an extended one.
pub fn parse_cansend(s: &str) -> Result<CanFrame, FrameError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FrameError::Empty);
    }
    let (id_str, data_str) = s.split_once('#').ok_or(FrameError::MissingSeparator)?;
    let id = u32::from_str_radix(id_str, 16).map_err(|_| FrameError::BadId(id_str.to_string()))?;
    let data = hex_bytes(&data_str.replace('.', ""))?;
    match id_str.len() {
        3 => CanFrame::new(id, &data),
        8 => CanFrame::new_extended(id, &data),
        _ => Err(FrameError::BadId(id_str.to_string())),
    }
}

/// Parse one SLCAN frame line (`tIIIL..` / `TIIIIIIIIL..`), terminator already stripped.
pub fn parse_slcan(line: &str) -> Result<CanFrame, FrameError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let tag = line.chars().next().ok_or(FrameError::Empty)?;
    let id_len = match tag {
        't' => 3,
        'T' => 8,
        other => return Err(FrameError::UnknownTag(other)),
    };
    let rest = &line[1..];
    if rest.len() < id_len + 1 || !rest.is_ascii() {
        return Err(FrameError::BadId(rest.to_string()));
    }
    let id_str = &rest[..id_len];
    let id = u32::from_str_radix(id_str, 16).map_err(|_| FrameError::BadId(id_str.to_string()))?;
    let dlc = rest[id_len..id_len + 1]
        .parse::<usize>()
        .map_err(|_| FrameError::BadId(rest.to_string()))?;
    if dlc > CAN_MAX_DLC {
        return Err(FrameError::TooLong(dlc));
    }
    let body = &rest[id_len + 1..];
    // adapters with timestamps enabled append four hex digits
    let data_hex = match body.len() {
        n if n == 2 * dlc => body,
        n if n == 2 * dlc + 4 => &body[..2 * dlc],
        n => return Err(FrameError::DlcMismatch { dlc, got: n / 2 }),
    };
    let data = hex_bytes(data_hex)?;
    if tag == 'T' {
        CanFrame::new_extended(id, &data)
    } else {
        CanFrame::new(id, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVE: [u8; 8] = [0x04, 0x01, 0x00, 0x00, 0x0f, 0xff, 0xe7, 0x00];

    #[test]
    fn cansend_move_frame() {
        let f = parse_cansend("001#04.01.00.00.0f.ff.e7.00").unwrap();
        assert_eq!(f.id(), 0x1);
        assert!(!f.is_extended());
        assert_eq!(f.data(), &MOVE);
    }

    #[test]
    fn cansend_extended_and_undotted() {
        let f = parse_cansend("12345678#0300000000000000").unwrap();
        assert!(f.is_extended());
        assert_eq!(f.id(), 0x1234_5678);
        assert_eq!(f.data(), &[3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn slcan_line_for_move() {
        let f = CanFrame::new(0x1, &MOVE).unwrap();
        assert_eq!(f.to_slcan(), "t0018040100000FFFE700");
        assert_eq!(parse_slcan(&f.to_slcan()).unwrap(), f);
    }

    #[test]
    fn slcan_timestamp_is_ignored() {
        let f = parse_slcan("t0028020164040000000A1B2C\r").unwrap();
        assert_eq!(f.id(), 0x2);
        assert_eq!(f.data(), &[0x02, 0x01, 0x64, 0x04, 0x00, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn slcan_extended_roundtrip() {
        let f = CanFrame::new_extended(0x1234_5678, &[0x01, 0x02]).unwrap();
        assert_eq!(f.to_slcan(), "T1234567820102");
        let back = parse_slcan("T1234567820102").unwrap();
        assert!(back.is_extended());
        assert_eq!(back, f);
    }

    #[test]
    fn display_matches_candump() {
        let f = CanFrame::new(0x1, &MOVE).unwrap();
        assert_eq!(f.to_string(), "001   [8]  04 01 00 00 0F FF E7 00");
        let ext = CanFrame::new_extended(0x1234_5678, &[0x01, 0x02]).unwrap();
        assert_eq!(ext.to_string(), "12345678   [2]  01 02");
    }

    #[test]
    fn test_error_cases() {
        assert_eq!(CanFrame::new(0x800, &[]), Err(FrameError::StdIdRange(0x800)));
        assert_eq!(
            CanFrame::new_extended(0x2000_0000, &[]),
            Err(FrameError::ExtIdRange(0x2000_0000))
        );
        assert_eq!(CanFrame::new(1, &[0; 9]), Err(FrameError::TooLong(9)));
        assert_eq!(parse_cansend(""), Err(FrameError::Empty));
        assert_eq!(parse_cansend("001"), Err(FrameError::MissingSeparator));
        assert!(matches!(parse_cansend("0x1#00"), Err(FrameError::BadId(_))));
        assert!(matches!(parse_cansend("001#0g"), Err(FrameError::BadHex(_))));
        assert_eq!(parse_slcan("z"), Err(FrameError::UnknownTag('z')));
        assert!(matches!(
            parse_slcan("t0012AA"),
            Err(FrameError::DlcMismatch { dlc: 2, got: 1 })
        ));
        assert_eq!(parse_slcan("t0019"), Err(FrameError::TooLong(9)));
    }
}
