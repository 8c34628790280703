//! Response definitions
//!
//! Represents responses to clients.

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Mutation accepted (`ack`)
    Ack,

    /// Key not present (`nil`)
    Nil,

    /// Malformed request or unavailable store (`err`)
    Error,

    /// Value for a `get` (`val<arg>`)
    Value(String),
}

impl Response {
    /// Wire token for this response
    pub fn token(&self) -> &'static [u8; 3] {
        match self {
            Response::Ack => b"ack",
            Response::Nil => b"nil",
            Response::Error => b"err",
            Response::Value(_) => b"val",
        }
    }
}
