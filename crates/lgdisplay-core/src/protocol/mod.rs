//! Protocol module containing the control-port command framing and grammar.

pub mod command;

pub use command::{
    decode_frame, encode_ack, CommandError, ControlCommand, FrameError, PowerAction, RawCommand,
    CR, MAX_FRAME_LEN,
};
