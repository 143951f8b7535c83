//! Wire protocol: request/response shapes and the JSON codec.

pub mod codec;
pub mod command;

pub use codec::{decode_command, decode_frame, encode_response, DecodeError, DecodeProgress};
pub use command::{Command, ParamMap, Response};
