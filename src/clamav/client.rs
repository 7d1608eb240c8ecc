use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, trace, warn};

use crate::clamav::commands::{self, Command};
use crate::clamav::{freshclam, Clamav};
use crate::config::{Config, Network};
use crate::error::{ClamdError, Result};

/// INSTREAM 전송용 내부 버퍼 크기 (정확한 크기는 의미 없음)
const STREAM_CHUNK_SIZE: usize = 2048;

/// One clamd session: an exclusively-owned byte stream, created by
/// [`ClamdClient::connect`] and dropped (closed) before the owning operation
/// returns, on every exit path.
enum Session {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Session {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Session::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Session::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Session {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Session::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Session::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Session::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Session::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Session::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Session::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// TCP/Unix-socket client for the clamd daemon.
///
/// Every operation dials a fresh connection, performs exactly one protocol
/// exchange and closes the connection before returning. No connection is
/// reused or shared across operations, so any number of operations may run
/// concurrently over a shared `&ClamdClient`.
#[derive(Debug, Clone)]
pub struct ClamdClient {
    address: String,
    network: Network,
    timeout: Duration,
    keepalive: Duration,
    freshclam_path: String,
}

impl ClamdClient {
    /// Create a client for the daemon at `address` over the given transport.
    ///
    /// `timeout` bounds the dial and every in-flight read/write;
    /// `keepalive` is the TCP keep-alive idle time (ignored for unix
    /// sockets, disabled when zero).
    pub fn new(address: impl Into<String>, network: Network, timeout: Duration, keepalive: Duration) -> Self {
        Self {
            address: address.into(),
            network,
            timeout,
            keepalive,
            freshclam_path: "freshclam".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            address: config.address.clone(),
            network: config.network,
            timeout: config.timeout(),
            keepalive: config.keepalive(),
            freshclam_path: config.freshclam_path.clone(),
        }
    }

    /// Dial a fresh session. No retry: a failed dial surfaces as
    /// [`ClamdError::Network`] and retrying is the caller's decision.
    async fn connect(&self) -> Result<Session> {
        trace!(address = %self.address, network = ?self.network, "dialing clamd");
        match self.network {
            Network::Tcp => {
                let stream = self
                    .bounded("dial", TcpStream::connect(self.address.as_str()))
                    .await?;
                if !self.keepalive.is_zero() {
                    let ka = socket2::TcpKeepalive::new().with_time(self.keepalive);
                    socket2::SockRef::from(&stream)
                        .set_tcp_keepalive(&ka)
                        .map_err(ClamdError::Network)?;
                }
                Ok(Session::Tcp(stream))
            }
            #[cfg(unix)]
            Network::Unix => {
                let stream = self
                    .bounded("dial", UnixStream::connect(self.address.as_str()))
                    .await?;
                Ok(Session::Unix(stream))
            }
            #[cfg(not(unix))]
            Network::Unix => Err(ClamdError::ConfigError(
                "unix socket transport is not available on this platform".to_string(),
            )),
        }
    }

    /// Run one I/O future under the configured deadline. Expiry and transport
    /// failure both surface as [`ClamdError::Network`].
    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = io::Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(ClamdError::Network(e)),
            Err(_) => Err(ClamdError::Network(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{what} timed out after {:?}", self.timeout),
            ))),
        }
    }

    async fn write_frame(&self, session: &mut Session, what: &str, bytes: &[u8]) -> Result<()> {
        self.bounded(what, session.write_all(bytes)).await?;
        self.bounded(what, session.flush()).await
    }

    /// Read the daemon's reply up to `terminator` (or end-of-stream) and
    /// trim the terminator. Clamd delimits every reply with the terminator
    /// requested by the command prefix.
    async fn read_reply(&self, session: &mut Session, terminator: u8) -> Result<Vec<u8>> {
        let mut reply = Vec::new();
        let mut reader = BufReader::new(session);
        self.bounded("read reply", reader.read_until(terminator, &mut reply))
            .await?;
        if reply.last() == Some(&terminator) {
            reply.pop();
        }
        trace!(reply = %String::from_utf8_lossy(&reply), "clamd reply");
        Ok(reply)
    }

    /// Execute one fixed-shape command/response exchange: write the full
    /// command, read the terminated reply, classify it. Exactly one TCP
    /// round trip; the session is closed on every exit path.
    async fn command(&self, cmd: Command) -> Result<Vec<u8>> {
        debug!(command = cmd.name(), "sending clamd command");
        let mut session = self.connect().await?;
        self.write_frame(&mut session, "write command", cmd.bytes()).await?;
        let reply = self.read_reply(&mut session, cmd.terminator()).await?;
        match classify(&reply) {
            Some(err) => {
                warn!(command = cmd.name(), error = %err, "clamd returned an error reply");
                Err(err)
            }
            None => Ok(reply),
        }
    }

    /// On a failed INSTREAM copy, the daemon may already have replied (it
    /// aborts early on a size-limit violation before consuming all bytes).
    /// A reply that classifies to a known error is more actionable than the
    /// raw copy failure, so it takes priority.
    async fn early_reply(&self, session: &mut Session, copy_err: io::Error) -> ClamdError {
        match self.read_reply(session, commands::INSTREAM.terminator()).await {
            Ok(reply) => match classify(&reply) {
                Some(err) => err,
                None => ClamdError::Network(copy_err),
            },
            Err(_) => ClamdError::Network(copy_err),
        }
    }
}

#[async_trait]
impl Clamav for ClamdClient {
    /// Send a PING to test daemon connectivity. A healthy daemon replies
    /// `PONG`.
    async fn ping(&self) -> Result<Vec<u8>> {
        self.command(commands::PING).await
    }

    /// Get daemon and virus-database version information.
    async fn version(&self) -> Result<Vec<u8>> {
        self.command(commands::VERSION).await
    }

    /// Instruct the daemon to reload its virus databases. The daemon must
    /// acknowledge with exactly `RELOADING`; anything else that is not a
    /// classified error is [`ClamdError::UnexpectedResponse`].
    async fn reload(&self) -> Result<()> {
        let reply = self.command(commands::RELOAD).await?;
        if reply != commands::RESP_RELOAD {
            return Err(ClamdError::UnexpectedResponse {
                expected: String::from_utf8_lossy(commands::RESP_RELOAD).into_owned(),
                actual: String::from_utf8_lossy(&reply).into_owned(),
            });
        }
        Ok(())
    }

    /// Get daemon statistics (scan queue, thread pool, memory usage).
    async fn stats(&self) -> Result<Vec<u8>> {
        self.command(commands::STATS).await
    }

    /// Get the daemon version along with the list of supported commands.
    async fn version_commands(&self) -> Result<Vec<u8>> {
        self.command(commands::VERSION_COMMANDS).await
    }

    /// Instruct the daemon to shut down gracefully. The daemon usually
    /// closes the connection without a reply.
    async fn shutdown(&self) -> Result<()> {
        self.command(commands::SHUTDOWN).await.map(|_| ())
    }

    /// Stream `size` bytes from `reader` to the daemon for scanning via the
    /// INSTREAM sub-protocol.
    ///
    /// Wire format: `zINSTREAM\0`, then the total length as a 4-byte
    /// big-endian unsigned integer, then the raw content bytes, then a
    /// 4-byte all-zero end-of-stream marker. The daemon replies with
    /// `stream: OK` for clean content or `stream: <signature> FOUND` for a
    /// detection, which surfaces as [`ClamdError::VirusFound`] carrying the
    /// raw reply.
    ///
    /// `size` must fit a non-zero u32; violations fail locally before any
    /// byte is written to the network.
    async fn instream(&self, reader: &mut (dyn AsyncRead + Unpin + Send), size: u64) -> Result<Vec<u8>> {
        if size == 0 || size > u64::from(u32::MAX) {
            return Err(ClamdError::InvalidStreamSize(size));
        }

        debug!(size, "starting INSTREAM scan");
        let mut session = self.connect().await?;

        self.write_frame(&mut session, "write command", commands::INSTREAM.bytes())
            .await?;

        // 전체 길이를 4바이트 big-endian (network byte order)으로 먼저 전송
        let size = size as u32;
        self.write_frame(&mut session, "write stream length", &size.to_be_bytes())
            .await?;

        let mut buf = [0u8; STREAM_CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "content reader failed mid-stream");
                    return Err(self.early_reply(&mut session, e).await);
                }
            };
            if n == 0 {
                break;
            }
            if let Err(err) = self.bounded("write stream content", session.write_all(&buf[..n])).await {
                let ClamdError::Network(e) = err else {
                    return Err(err);
                };
                warn!(error = %e, "connection failed mid-stream");
                return Err(self.early_reply(&mut session, e).await);
            }
        }

        // 4바이트 zero chunk로 전송 종료를 알림
        self.write_frame(&mut session, "write end-of-stream marker", &[0, 0, 0, 0])
            .await?;

        let reply = self
            .read_reply(&mut session, commands::INSTREAM.terminator())
            .await?;
        match classify(&reply) {
            Some(err) => {
                debug!(error = %err, "INSTREAM scan finished with an error reply");
                Err(err)
            }
            None => Ok(reply),
        }
    }

    /// Update virus definitions by invoking the external `freshclam`
    /// utility; clamd itself has no update command. Returns the combined
    /// stdout/stderr output; failures carry it too.
    async fn freshclam(&self) -> Result<Vec<u8>> {
        freshclam::run_update(&self.freshclam_path).await
    }
}

/// Classify a terminator-trimmed daemon reply.
///
/// Clamd has no structured status field, so errors are recognized purely by
/// reply text. The size-limit match is case-insensitive while the others are
/// case-sensitive; the daemon's own casing is inconsistent and the asymmetry
/// is preserved as-is so genuine protocol drift is not masked.
fn classify(reply: &[u8]) -> Option<ClamdError> {
    if reply.eq_ignore_ascii_case(commands::RESP_SIZE_LIMIT_EXCEEDED) {
        return Some(ClamdError::SizeLimitExceeded);
    }

    if reply.starts_with(commands::DETECTION_PREFIX) && reply.ends_with(commands::DETECTION_SUFFIX) {
        return Some(ClamdError::VirusFound {
            reply: String::from_utf8_lossy(reply).into_owned(),
        });
    }

    if reply == commands::RESP_UNKNOWN_COMMAND {
        return Some(ClamdError::UnknownCommand);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_clean_replies() {
        assert!(classify(b"PONG").is_none());
        assert!(classify(b"stream: OK").is_none());
        assert!(classify(b"RELOADING").is_none());
        assert!(classify(b"").is_none());
    }

    #[test]
    fn test_classify_size_limit_is_case_insensitive() {
        // 대소문자 무관 매칭은 데몬 자체의 비일관적인 casing에서 온 quirk
        for reply in [
            b"INSTREAM size limit exceeded. ERROR".as_slice(),
            b"instream size limit exceeded. error".as_slice(),
            b"InStream SIZE limit Exceeded. Error".as_slice(),
        ] {
            assert!(matches!(classify(reply), Some(ClamdError::SizeLimitExceeded)));
        }
    }

    #[test]
    fn test_classify_unknown_command_is_case_sensitive() {
        assert!(matches!(
            classify(b"UNKNOWN COMMAND"),
            Some(ClamdError::UnknownCommand)
        ));
        // lowercase does not match; the reply passes through unclassified
        assert!(classify(b"unknown command").is_none());
    }

    #[test]
    fn test_classify_detection_is_case_sensitive() {
        let reply = b"stream: Win.Test.EICAR_HDB-1 FOUND";
        match classify(reply) {
            Some(ClamdError::VirusFound { reply: text }) => {
                assert_eq!(text, "stream: Win.Test.EICAR_HDB-1 FOUND");
                assert_eq!(commands::parse_signature(&text), "Win.Test.EICAR_HDB-1");
            }
            other => panic!("expected VirusFound, got {other:?}"),
        }

        assert!(classify(b"STREAM: Eicar FOUND").is_none());
        assert!(classify(b"stream: Eicar found").is_none());
    }

    #[test]
    fn test_classify_size_limit_match_is_exact_not_substring() {
        // the size-limit literal only matches whole replies; wrapped in
        // detection markers it classifies as a detection instead
        let reply = b"stream: INSTREAM size limit exceeded. FOUND";
        assert!(matches!(classify(reply), Some(ClamdError::VirusFound { .. })));
    }

    #[tokio::test]
    async fn test_instream_rejects_zero_size_before_dialing() {
        // 유효하지 않은 주소: 검증이 dial 전에 일어나므로 에러는 InvalidStreamSize
        let client = ClamdClient::new(
            "240.0.0.1:1",
            Network::Tcp,
            Duration::from_secs(1),
            Duration::ZERO,
        );
        let mut content = std::io::Cursor::new(b"data".to_vec());
        match client.instream(&mut content, 0).await {
            Err(ClamdError::InvalidStreamSize(0)) => {}
            other => panic!("expected InvalidStreamSize, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_instream_rejects_oversized_declaration_before_dialing() {
        let client = ClamdClient::new(
            "240.0.0.1:1",
            Network::Tcp,
            Duration::from_secs(1),
            Duration::ZERO,
        );
        let mut content = std::io::Cursor::new(b"data".to_vec());
        let too_big = u64::from(u32::MAX) + 1;
        match client.instream(&mut content, too_big).await {
            Err(ClamdError::InvalidStreamSize(s)) => assert_eq!(s, too_big),
            other => panic!("expected InvalidStreamSize, got {other:?}"),
        }
    }
}
