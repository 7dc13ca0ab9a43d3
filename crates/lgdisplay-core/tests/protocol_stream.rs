//! Integration tests for control-protocol stream decoding.
//!
//! These tests feed byte chunks through [`decode_frame`] the way the command
//! server does: bytes arrive in arbitrary pieces, are appended to a buffer,
//! and complete commands are drained from the front.

use lgdisplay_core::{
    decode_frame, ControlCommand, FrameError, InputSource, PowerAction, RawCommand,
};

/// Appends each chunk to a buffer and drains every complete command.
fn drain_chunks(chunks: &[&[u8]]) -> Result<(Vec<RawCommand>, Vec<u8>), FrameError> {
    let mut buf = Vec::new();
    let mut commands = Vec::new();
    for chunk in chunks {
        buf.extend_from_slice(chunk);
        while let Some((cmd, consumed)) = decode_frame(&buf)? {
            buf.drain(..consumed);
            commands.push(cmd);
        }
    }
    Ok((commands, buf))
}

#[test]
fn test_command_split_across_reads() {
    let (commands, rest) = drain_chunks(&[b"k", b"a 0", b"1 0", b"1", b"\r"]).unwrap();

    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].interpret(),
        Ok(ControlCommand::Power {
            set_id: 1,
            action: PowerAction::On
        })
    );
    assert!(rest.is_empty());
}

#[test]
fn test_coalesced_commands_in_one_read() {
    let (commands, rest) = drain_chunks(&[b"ka 01 01\rxb 01 A1\rka 02 0"]).unwrap();

    assert_eq!(commands.len(), 2);
    assert_eq!(
        commands[1].interpret(),
        Ok(ControlCommand::Input {
            set_id: 1,
            input: InputSource::Hdmi2
        })
    );
    // The partial third command stays buffered.
    assert_eq!(rest, b"ka 02 0");
}

#[test]
fn test_crlf_terminated_clients_are_accepted() {
    let (commands, rest) = drain_chunks(&[b"ka 01 01\r\n", b"ka 01 00\r\n"]).unwrap();

    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1].value, "00");
    // Only the trailing line feed remains, which is blank.
    assert!(rest.iter().all(u8::is_ascii_whitespace));
}

#[test]
fn test_unknown_codes_are_framed_but_not_interpreted() {
    let (commands, _) = drain_chunks(&[b"dn 01 FF\rka 01 09\r"]).unwrap();

    assert_eq!(commands.len(), 2);
    assert!(commands[0].interpret().is_err());
    assert!(commands[1].interpret().is_err());
}

#[test]
fn test_malformed_frame_stops_decoding() {
    let result = drain_chunks(&[b"ka 01 01\rgarbage\rka 01 00\r"]);
    assert!(matches!(result, Err(FrameError::Malformed { .. })));
}

#[test]
fn test_runaway_line_is_rejected() {
    let long = [b'x'; 100];
    let result = drain_chunks(&[&long]);
    assert!(matches!(result, Err(FrameError::TooLong { .. })));
}
