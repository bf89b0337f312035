use std::io;
use thiserror::Error;

/// Startup and transport level failures. Protocol level errors never travel
/// through this type: they are answered on the wire with the matching
/// numeric reply and the connection stays up.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("cannot read configuration file '{path}': {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse configuration file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// A protocol line that could not be framed into prefix/command/arguments.
/// Malformed lines are dropped without touching the connection state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessageError {
    #[error("empty line")]
    EmptyLine,

    #[error("line has a prefix but no command")]
    MissingCommand,
}
