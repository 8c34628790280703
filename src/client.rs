//! Blocking client
//!
//! Sends one command at a time and waits for its response.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::error::{RelayError, Result};
use crate::protocol::{decode_response, encode_command, write_command, Command, Response};

const READ_CHUNK: usize = 4096;

/// Client connection to a RelayKV server
pub struct Client {
    stream: TcpStream,
    buffer: BytesMut,
    max_frame_len: usize,
}

impl Client {
    /// Connect to `addr`
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_frame_len: DEFAULT_READ_BUFFER_SIZE,
        })
    }

    /// Largest frame this client will send
    ///
    /// The server treats each read as one frame, so this must not exceed the
    /// server's `read_buffer_size`. Larger frames are refused before any byte
    /// is written, which keeps requests and responses paired.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Bound how long a response may take
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Look up `key`; `None` if the server answered `nil`
    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.execute(&Command::Get { key: key.to_string() })? {
            Response::Value(value) => Ok(Some(value)),
            Response::Nil => Ok(None),
            other => Err(unexpected(&other)),
        }
    }

    /// Store `value` under `key`
    pub fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let command = Command::Put {
            key: key.to_string(),
            value: value.to_string(),
        };
        match self.execute(&command)? {
            Response::Ack => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Remove `key`; succeeds whether or not it existed
    pub fn delete(&mut self, key: &str) -> Result<()> {
        match self.execute(&Command::Delete { key: key.to_string() })? {
            Response::Ack => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Ask the server to shut down; it closes without answering
    pub fn bye(mut self) -> Result<()> {
        write_command(&mut self.stream, &Command::Bye)
    }

    /// Send a command and read its response
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        if let Command::Bye = command {
            return Err(RelayError::Protocol(
                "bye has no response; use Client::bye".to_string(),
            ));
        }
        let frame = encode_command(command)?;
        self.send_raw(&frame)
    }

    /// Send arbitrary bytes and read one response
    pub fn send_raw(&mut self, frame: &[u8]) -> Result<Response> {
        if frame.len() > self.max_frame_len {
            return Err(RelayError::Protocol(format!(
                "frame of {} bytes exceeds the {} byte limit",
                frame.len(),
                self.max_frame_len
            )));
        }
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Response> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some((response, len)) = decode_response(&self.buffer)? {
                self.buffer.advance(len);
                return Ok(response);
            }

            let read = self.stream.read(&mut chunk)?;
            if read == 0 {
                return Err(RelayError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

fn unexpected(response: &Response) -> RelayError {
    match response {
        Response::Error => RelayError::Protocol("server rejected the request".to_string()),
        other => RelayError::UnexpectedResponse(format!("{other:?}")),
    }
}
