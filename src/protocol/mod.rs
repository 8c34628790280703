//! Protocol Module
//!
//! Defines the wire protocol for client-server and peer-to-peer communication.
//! Everything is ASCII.
//!
//! ## Request Format
//! ```text
//! ┌──────────┬──────────────┬──────────────┐
//! │ Cmd (3)  │   Arg ...    │   Arg ...    │
//! └──────────┴──────────────┴──────────────┘
//! ```
//!
//! ### Commands
//! - `get`: key
//! - `put`: key, value
//! - `del`: key
//! - `bye`: no arguments
//!
//! ### Arguments
//! `<digit count><length><payload>`, e.g. `11k` is the one-byte string `k`
//! and `213hello, world!` is a 13-byte string.
//!
//! ### Responses
//! - `ack`: mutation accepted
//! - `nil`: key not found
//! - `err`: malformed request
//! - `val<arg>`: value for a `get`
//!
//! ```text
//! put11k11v  -> ack
//! get11k     -> val11v
//! get11x     -> nil
//! get21v     -> err
//! ```

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::Response;
pub use codec::{
    decode_command, decode_response, digit_count, encode_argument, encode_command,
    encode_response, parse_argument, validate_argument, write_command, write_response,
    INVALID_DIGIT_COUNT, MAX_ARGUMENT_LEN, MAX_DIGIT_COUNT, TOKEN_LEN,
};
