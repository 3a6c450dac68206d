use minesweeper_common::protocol::{Command, ProtocolError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Connection closed")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Got a {got} response to a {expected} request")]
    UnexpectedResponse { expected: Command, got: Command },
    #[error("Level {0} is not one of 1..=4")]
    InvalidLevel(u8),
    #[error("Server refused a new game at level {0}")]
    NewGameRefused(u8),
    #[error("Token storage failed: {0}")]
    Storage(String),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
