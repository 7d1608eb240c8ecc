//! Async client for the ClamAV daemon (clamd) TCP wire protocol.
//!
//! Clamd speaks a line/command-oriented protocol: each command is a fixed
//! literal byte sequence with either a NUL or newline terminator, and every
//! reply is terminator-delimited text with no structured status field.
//! This crate frames commands and streamed scan payloads bit-exactly, reads
//! and classifies replies into a typed error taxonomy ([`ClamdError`]) and
//! shells out to `freshclam` for definition updates.
//!
//! One TCP connection is opened and fully consumed per operation; nothing is
//! pooled, retried, or shared between calls, so a [`ClamdClient`] can be
//! used from any number of concurrent tasks.
//!
//! ```no_run
//! use clamd_client::{Clamav, ClamdClient, Config};
//!
//! # async fn example() -> clamd_client::Result<()> {
//! let client = ClamdClient::from_config(&Config::default());
//! let version = client.version().await?;
//! println!("{}", String::from_utf8_lossy(&version));
//! # Ok(())
//! # }
//! ```

pub mod clamav;
pub mod config;
pub mod error;

pub use clamav::client::ClamdClient;
pub use clamav::commands::parse_signature;
pub use clamav::Clamav;
pub use config::{Config, Network};
pub use error::{ClamdError, Result};
