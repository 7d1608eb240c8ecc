pub mod client;
pub mod commands;
mod freshclam;

use crate::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Clamd operations, one per daemon command plus the external update.
///
/// [`client::ClamdClient`] is the production implementation; the trait exists
/// so the embedding layer can substitute a test double via dependency
/// injection.
#[async_trait]
pub trait Clamav: Send + Sync {
    /// Test daemon connectivity; a healthy daemon replies `PONG`.
    async fn ping(&self) -> Result<Vec<u8>>;

    /// Daemon and virus-database version information.
    async fn version(&self) -> Result<Vec<u8>>;

    /// Reload the daemon's virus databases.
    async fn reload(&self) -> Result<()>;

    /// Daemon statistics (scan queue, thread pool, memory usage).
    async fn stats(&self) -> Result<Vec<u8>>;

    /// Daemon version plus the list of commands it supports.
    async fn version_commands(&self) -> Result<Vec<u8>>;

    /// Shut the daemon down gracefully.
    async fn shutdown(&self) -> Result<()>;

    /// Stream `size` bytes from `reader` for scanning (INSTREAM).
    async fn instream(&self, reader: &mut (dyn AsyncRead + Unpin + Send), size: u64) -> Result<Vec<u8>>;

    /// Update virus definitions via the external `freshclam` utility.
    async fn freshclam(&self) -> Result<Vec<u8>>;
}
