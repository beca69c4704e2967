//! Error types shared across the worker, supervisor, and console layers.

use std::fmt;

use crate::store::NodeError;

#[derive(Debug)]
pub enum ServerError {
    /// An interpreter-level command could not be parsed.
    IllFormedCommand,
    /// A `q`/`a`/`d` operand was rejected by the store (key or value too
    /// long).
    Node(NodeError),
    /// The client closed the connection, or the supervisor shut it down
    /// from its side to interrupt a blocking read.
    ConnectionClosed,
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllFormedCommand => write!(f, "ill-formed command"),
            Self::Node(e) => write!(f, "{e}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Node(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NodeError> for ServerError {
    fn from(e: NodeError) -> Self {
        ServerError::Node(e)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Io(e)
    }
}
