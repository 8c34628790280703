//! Command definitions
//!
//! Represents commands from clients and replicated mutations from peers.

/// Command types, identified on the wire by a 3-byte ASCII token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    Put,
    Delete,
    Bye,
}

impl CommandType {
    /// Wire token for this command
    pub fn token(self) -> &'static [u8; 3] {
        match self {
            CommandType::Get => b"get",
            CommandType::Put => b"put",
            CommandType::Delete => b"del",
            CommandType::Bye => b"bye",
        }
    }

    /// Look up a command type by its wire token
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"get" => Some(CommandType::Get),
            b"put" => Some(CommandType::Put),
            b"del" => Some(CommandType::Delete),
            b"bye" => Some(CommandType::Bye),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Put a key-value pair
    Put { key: String, value: String },

    /// Delete a key
    Delete { key: String },

    /// Shut the server down
    Bye,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::Bye => CommandType::Bye,
        }
    }

    /// Commands that change the store and are replicated to peers
    pub fn is_mutation(&self) -> bool {
        matches!(self, Command::Put { .. } | Command::Delete { .. })
    }
}
