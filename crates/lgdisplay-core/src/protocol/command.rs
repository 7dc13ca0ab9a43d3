//! Framing and parsing for the LG control protocol.
//!
//! Wire format (ASCII, one command per carriage return):
//! ```text
//! <opcode:2> <set_id:hex> <value:2>\r
//! ka 01 01\r      power on set 1
//! xb 0a D0\r      switch set 10 to DisplayPort 1
//! ```
//!
//! Decoding happens in two steps.  [`decode_frame`] splits one complete frame
//! off a stream buffer and checks its shape; a shape violation is a
//! [`FrameError`] and ends the connection.  [`RawCommand::interpret`] then
//! maps the opcode and value onto a [`ControlCommand`]; codes outside the
//! modelled subset yield a [`CommandError`], which callers log and skip.

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::domain::display::{DisplayId, InputSource};

/// Frame delimiter.
pub const CR: u8 = 0x0D;

/// Longest frame accepted before a carriage return must appear.
pub const MAX_FRAME_LEN: usize = 64;

/// Power control opcode.
pub const OPCODE_POWER: &str = "ka";
/// Input select opcode.
pub const OPCODE_INPUT: &str = "xb";

/// Errors in the shape of a frame.  Fatal to the owning connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// No carriage return within [`MAX_FRAME_LEN`] bytes.
    #[error("no carriage return within {max} bytes")]
    TooLong { max: usize },

    /// The frame contains a byte outside 7-bit ASCII.
    #[error("non-ASCII byte 0x{0:02X} in command")]
    NonAscii(u8),

    /// The frame does not match `<opcode> <id> <value>`.
    #[error("malformed command {command:?}: {reason}")]
    Malformed {
        command: String,
        reason: &'static str,
    },

    /// The peer closed the connection in the middle of a command.
    #[error("connection closed with {0} unterminated byte(s)")]
    Unterminated(usize),
}

/// A well-formed command whose codes are outside the modelled subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unsupported opcode {0:?}")]
    UnknownOpcode(String),

    #[error("unsupported value {value:?} for opcode {opcode:?}")]
    UnknownValue { opcode: String, value: String },
}

/// A syntactically valid command, before its codes are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    /// Two-character opcode, lowercased.
    pub opcode: String,
    /// Target set id.
    pub set_id: DisplayId,
    /// Two-character value code, uppercased.
    pub value: String,
}

/// Power sub-commands of the `ka` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Off,
    On,
    Restart,
}

/// A command the emulator knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Power {
        set_id: DisplayId,
        action: PowerAction,
    },
    Input {
        set_id: DisplayId,
        input: InputSource,
    },
}

impl RawCommand {
    /// Parses the bytes of one frame, without its trailing carriage return.
    ///
    /// Fields are separated by ASCII whitespace; surrounding whitespace (for
    /// example a stray line feed) is ignored.  The set id is hexadecimal.
    ///
    /// # Errors
    ///
    /// [`FrameError::NonAscii`] or [`FrameError::Malformed`].
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        if let Some(&byte) = frame.iter().find(|b| !b.is_ascii()) {
            return Err(FrameError::NonAscii(byte));
        }
        // All bytes are ASCII, so this cannot fail.
        let text = String::from_utf8_lossy(frame);
        let malformed = |reason| FrameError::Malformed {
            command: text.trim().to_string(),
            reason,
        };

        let fields: Vec<&str> = text.split_ascii_whitespace().collect();
        let [opcode, set_id, value] = fields.as_slice() else {
            return Err(malformed("expected three fields"));
        };

        if opcode.len() != 2 {
            return Err(malformed("opcode must be two characters"));
        }
        if value.len() != 2 {
            return Err(malformed("value must be two characters"));
        }
        if set_id.is_empty() || set_id.len() > 2 {
            return Err(malformed("set id must be one or two hex digits"));
        }
        let set_id = u8::from_str_radix(set_id, 16)
            .map_err(|_| malformed("set id must be hexadecimal"))?;

        Ok(Self {
            opcode: opcode.to_ascii_lowercase(),
            set_id: DisplayId::from(set_id),
            value: value.to_ascii_uppercase(),
        })
    }

    /// Maps the opcode and value onto a [`ControlCommand`].
    ///
    /// # Errors
    ///
    /// [`CommandError`] when either code is outside the supported subset.
    pub fn interpret(&self) -> Result<ControlCommand, CommandError> {
        let unknown_value = || CommandError::UnknownValue {
            opcode: self.opcode.clone(),
            value: self.value.clone(),
        };
        match self.opcode.as_str() {
            OPCODE_POWER => {
                let action = match self.value.as_str() {
                    "00" => PowerAction::Off,
                    "01" => PowerAction::On,
                    "02" => PowerAction::Restart,
                    _ => return Err(unknown_value()),
                };
                Ok(ControlCommand::Power {
                    set_id: self.set_id,
                    action,
                })
            }
            OPCODE_INPUT => {
                let input = match self.value.as_str() {
                    "A0" => InputSource::Hdmi1,
                    "A1" => InputSource::Hdmi2,
                    "A7" => InputSource::Hdmi3,
                    "D0" => InputSource::DisplayPort1,
                    _ => return Err(unknown_value()),
                };
                Ok(ControlCommand::Input {
                    set_id: self.set_id,
                    input,
                })
            }
            other => Err(CommandError::UnknownOpcode(other.to_string())),
        }
    }
}

impl fmt::Display for RawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02x} {}", self.opcode, self.set_id, self.value)
    }
}

/// Decodes the first command from the front of a stream buffer.
///
/// Returns the command and the number of bytes consumed (up to and including
/// its carriage return), or `Ok(None)` if no complete command is buffered
/// yet.  Blank frames (a bare `\r`, or `\n\r`) are skipped and counted in
/// the consumed total.
///
/// # Errors
///
/// [`FrameError`] when the next frame is malformed, or when more than
/// [`MAX_FRAME_LEN`] bytes are buffered without a carriage return.
///
/// # Examples
///
/// ```rust
/// use lgdisplay_core::protocol::decode_frame;
///
/// let (cmd, consumed) = decode_frame(b"ka 01 01\rxb").unwrap().unwrap();
/// assert_eq!(cmd.opcode, "ka");
/// assert_eq!(consumed, 9);
/// ```
pub fn decode_frame(buf: &[u8]) -> Result<Option<(RawCommand, usize)>, FrameError> {
    let mut start = 0;
    while let Some(offset) = buf[start..].iter().position(|&b| b == CR) {
        let frame = &buf[start..start + offset];
        let consumed = start + offset + 1;
        if frame.iter().all(u8::is_ascii_whitespace) {
            trace!("skipping blank frame");
            start = consumed;
            continue;
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLong { max: MAX_FRAME_LEN });
        }
        return RawCommand::parse(frame).map(|cmd| Some((cmd, consumed)));
    }
    if buf.len() - start > MAX_FRAME_LEN {
        return Err(FrameError::TooLong { max: MAX_FRAME_LEN });
    }
    Ok(None)
}

/// Encodes the acknowledgement frame `<opcode> <id> OK\r` (or `NG`).
pub fn encode_ack(opcode: &str, set_id: DisplayId, applied: bool) -> Vec<u8> {
    let status = if applied { "OK" } else { "NG" };
    format!("{opcode} {set_id:02x} {status}\r").into_bytes()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(frame: &[u8]) -> Result<ControlCommand, CommandError> {
        RawCommand::parse(frame).unwrap().interpret()
    }

    #[test]
    fn test_parse_power_on() {
        let cmd = RawCommand::parse(b"ka 01 01").unwrap();
        assert_eq!(
            cmd,
            RawCommand {
                opcode: "ka".to_string(),
                set_id: 1,
                value: "01".to_string()
            }
        );
    }

    #[test]
    fn test_set_id_is_hexadecimal() {
        assert_eq!(RawCommand::parse(b"ka 0a 01").unwrap().set_id, 10);
        assert_eq!(RawCommand::parse(b"ka FF 01").unwrap().set_id, 255);
        assert_eq!(RawCommand::parse(b"ka 7 01").unwrap().set_id, 7);
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        let cmd = RawCommand::parse(b"\n ka  02\t00 ").unwrap();
        assert_eq!(cmd.set_id, 2);
        assert_eq!(cmd.value, "00");
    }

    #[test]
    fn test_parse_normalises_case() {
        let cmd = RawCommand::parse(b"XB 01 d0").unwrap();
        assert_eq!(cmd.opcode, "xb");
        assert_eq!(cmd.value, "D0");
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(matches!(
            RawCommand::parse(b"ka 01"),
            Err(FrameError::Malformed { .. })
        ));
        assert!(matches!(
            RawCommand::parse(b"ka 01 01 01"),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_field_widths() {
        assert!(RawCommand::parse(b"k 01 01").is_err());
        assert!(RawCommand::parse(b"ka 01 1").is_err());
        assert!(RawCommand::parse(b"ka 001 01").is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex_id() {
        let err = RawCommand::parse(b"ka zz 01").unwrap_err();
        assert_eq!(
            err,
            FrameError::Malformed {
                command: "ka zz 01".to_string(),
                reason: "set id must be hexadecimal"
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_ascii() {
        assert_eq!(
            RawCommand::parse(b"ka 01 \xC3\xA9"),
            Err(FrameError::NonAscii(0xC3))
        );
    }

    #[test]
    fn test_interpret_power_values() {
        assert_eq!(
            interpret(b"ka 01 00"),
            Ok(ControlCommand::Power {
                set_id: 1,
                action: PowerAction::Off
            })
        );
        assert_eq!(
            interpret(b"ka 01 01"),
            Ok(ControlCommand::Power {
                set_id: 1,
                action: PowerAction::On
            })
        );
        assert_eq!(
            interpret(b"ka 01 02"),
            Ok(ControlCommand::Power {
                set_id: 1,
                action: PowerAction::Restart
            })
        );
    }

    #[test]
    fn test_interpret_input_values() {
        let expected = [
            (b"xb 03 A0", InputSource::Hdmi1),
            (b"xb 03 A1", InputSource::Hdmi2),
            (b"xb 03 A7", InputSource::Hdmi3),
            (b"xb 03 D0", InputSource::DisplayPort1),
        ];
        for (frame, input) in expected {
            assert_eq!(
                interpret(frame),
                Ok(ControlCommand::Input { set_id: 3, input })
            );
        }
    }

    #[test]
    fn test_interpret_unknown_opcode() {
        assert_eq!(
            interpret(b"fy 01 FF"),
            Err(CommandError::UnknownOpcode("fy".to_string()))
        );
    }

    #[test]
    fn test_interpret_unknown_value() {
        assert_eq!(
            interpret(b"ka 01 05"),
            Err(CommandError::UnknownValue {
                opcode: "ka".to_string(),
                value: "05".to_string()
            })
        );
        assert!(interpret(b"xb 01 90").is_err());
    }

    #[test]
    fn test_decode_frame_waits_for_cr() {
        assert_eq!(decode_frame(b"ka 01 0"), Ok(None));
        assert_eq!(decode_frame(b""), Ok(None));
    }

    #[test]
    fn test_decode_frame_returns_first_of_many() {
        let buf = b"ka 01 01\rxb 01 A1\r";
        let (first, consumed) = decode_frame(buf).unwrap().unwrap();
        assert_eq!(first.opcode, "ka");
        let (second, rest) = decode_frame(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(second.opcode, "xb");
        assert_eq!(consumed + rest, buf.len());
    }

    #[test]
    fn test_decode_frame_skips_blank_frames() {
        let buf = b"\r\n\rka 01 01\r";
        let (cmd, consumed) = decode_frame(buf).unwrap().unwrap();
        assert_eq!(cmd.value, "01");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_decode_frame_only_blank_frames_is_incomplete() {
        assert_eq!(decode_frame(b"\r\r"), Ok(None));
    }

    #[test]
    fn test_decode_frame_rejects_oversized_partial() {
        let buf = vec![b'a'; MAX_FRAME_LEN + 1];
        assert_eq!(
            decode_frame(&buf),
            Err(FrameError::TooLong { max: MAX_FRAME_LEN })
        );
    }

    #[test]
    fn test_decode_frame_propagates_malformed() {
        assert!(matches!(
            decode_frame(b"hello\r"),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn test_encode_ack() {
        assert_eq!(encode_ack("ka", 1, true), b"ka 01 OK\r".to_vec());
        assert_eq!(encode_ack("xb", 10, false), b"xb 0a NG\r".to_vec());
    }

    #[test]
    fn test_raw_command_display_round_trips() {
        let cmd = RawCommand::parse(b"xb 0c a7").unwrap();
        assert_eq!(cmd.to_string(), "xb 0c A7");
    }
}
