//! SkyIRC, a small RFC 1459 client-to-server IRC daemon on tokio.
//!
//! Bytes flow from the socket through the line codec into the command
//! dispatcher, which mutates the two process-wide directories (users by
//! nickname, channels by name) and answers through the reply formatter.

pub mod channels;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod message;
pub mod replies;
pub mod sanity;
pub mod server;
pub mod users;
