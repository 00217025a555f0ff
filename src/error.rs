//!
//! Error taxonomy.
//!

use thiserror::Error;

/// One variant per wire-level error kind. `IO_ERROR` is deliberately not a
/// variant here: I/O failures tear the connection down before a `Response`
/// is ever produced, they are never surfaced as a `-ERR ...` reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RudisError {
    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR invalid DB index")]
    InvalidDbIndex,

    #[error("NOAUTH Authentication required")]
    NoAuth,

    #[error("ERR invalid password")]
    InvalidPassword,

    #[error("ERR Client sent AUTH, but no password is set")]
    AuthNotSet,

    #[error("ERR syntax error")]
    Syntax,

    #[error("{0}")]
    Custom(String),
}

impl RudisError {
    /// Wire-format error body, without the leading '-' or trailing CRLF.
    pub fn wire_message(&self) -> String {
        self.to_string()
    }
}
