//! Command and response vocabulary for the clamd wire protocol.
//!
//! Clamd commands prefixed with `z` (e.g. `zSCAN`) are delimited by a NUL
//! character: clamd keeps reading command data until it sees `\0`, and its
//! reply is NUL-terminated in turn. Commands prefixed with `n` (e.g. `nSCAN`)
//! use a newline delimiter instead. Using the wrong terminator makes the
//! daemon reject the command and close the connection, so each command pins
//! its own terminator here.
//!
//! See clamd(8) for the full protocol description.

/// A clamd instruction: the literal bytes to send (terminator included) and
/// the terminator byte its reply will carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    bytes: &'static [u8],
    terminator: u8,
}

impl Command {
    /// Full wire bytes, including the trailing terminator.
    pub const fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    /// The byte that delimits the daemon's reply to this command.
    pub const fn terminator(&self) -> u8 {
        self.terminator
    }

    /// Command name for log messages, without prefix letter or terminator.
    pub fn name(&self) -> &'static str {
        // bytes are always "<prefix letter><NAME><terminator>"
        std::str::from_utf8(&self.bytes[1..self.bytes.len() - 1]).unwrap_or("?")
    }
}

/// Tests daemon connectivity.
pub const PING: Command = Command { bytes: b"zPING\0", terminator: b'\0' };
/// Requests daemon and database version information.
pub const VERSION: Command = Command { bytes: b"zVERSION\0", terminator: b'\0' };
/// Instructs the daemon to reload its virus databases.
pub const RELOAD: Command = Command { bytes: b"zRELOAD\0", terminator: b'\0' };
/// Begins an INSTREAM scan session.
pub const INSTREAM: Command = Command { bytes: b"zINSTREAM\0", terminator: b'\0' };
/// Requests daemon statistics (thread pool, queue, memory).
pub const STATS: Command = Command { bytes: b"zSTATS\0", terminator: b'\0' };
/// Requests the daemon version plus the list of supported commands.
/// clamd(8) recommends the newline-delimited form for this one.
pub const VERSION_COMMANDS: Command = Command { bytes: b"nVERSIONCOMMANDS\n", terminator: b'\n' };
/// Instructs the daemon to shut down gracefully.
pub const SHUTDOWN: Command = Command { bytes: b"zSHUTDOWN\0", terminator: b'\0' };

/// Expected reply to [`PING`].
pub const RESP_PING: &[u8] = b"PONG";
/// Expected reply to [`RELOAD`].
pub const RESP_RELOAD: &[u8] = b"RELOADING";
/// Reply for a clean INSTREAM scan.
pub const RESP_SCAN_OK: &[u8] = b"stream: OK";
/// Reply when the daemon does not recognize a command.
pub const RESP_UNKNOWN_COMMAND: &[u8] = b"UNKNOWN COMMAND";
/// Reply when streamed content exceeds the daemon's StreamMaxLength.
pub const RESP_SIZE_LIMIT_EXCEEDED: &[u8] = b"INSTREAM size limit exceeded. ERROR";

/// Prefix of every INSTREAM detection reply.
pub const DETECTION_PREFIX: &[u8] = b"stream: ";
/// Suffix of every INSTREAM detection reply.
pub const DETECTION_SUFFIX: &[u8] = b"FOUND";

/// Extracts the signature name from a detection reply.
///
/// A detection reply looks like `stream: Eicar-Signature FOUND`; the
/// signature is whatever sits between the fixed prefix and suffix. Returns
/// the input unchanged if it does not carry both markers.
pub fn parse_signature(reply: &str) -> &str {
    reply
        .strip_prefix("stream: ")
        .and_then(|s| s.strip_suffix(" FOUND"))
        .unwrap_or(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_terminated_commands() {
        for cmd in [PING, VERSION, RELOAD, INSTREAM, STATS, SHUTDOWN] {
            assert_eq!(*cmd.bytes().last().unwrap(), b'\0');
            assert_eq!(cmd.terminator(), b'\0');
        }
    }

    #[test]
    fn test_exact_command_bytes() {
        assert_eq!(PING.bytes(), b"zPING\0");
        assert_eq!(VERSION.bytes(), b"zVERSION\0");
        assert_eq!(RELOAD.bytes(), b"zRELOAD\0");
        assert_eq!(INSTREAM.bytes(), b"zINSTREAM\0");
        assert_eq!(STATS.bytes(), b"zSTATS\0");
        assert_eq!(SHUTDOWN.bytes(), b"zSHUTDOWN\0");
    }

    #[test]
    fn test_version_commands_is_newline_terminated() {
        assert_eq!(VERSION_COMMANDS.bytes(), b"nVERSIONCOMMANDS\n");
        assert_eq!(VERSION_COMMANDS.terminator(), b'\n');
    }

    #[test]
    fn test_command_name() {
        assert_eq!(PING.name(), "PING");
        assert_eq!(VERSION_COMMANDS.name(), "VERSIONCOMMANDS");
    }

    #[test]
    fn test_parse_signature() {
        assert_eq!(
            parse_signature("stream: Win.Test.EICAR_HDB-1 FOUND"),
            "Win.Test.EICAR_HDB-1"
        );
        assert_eq!(parse_signature("stream: Eicar-Signature FOUND"), "Eicar-Signature");
    }

    #[test]
    fn test_parse_signature_passthrough_without_markers() {
        assert_eq!(parse_signature("stream: OK"), "stream: OK");
        assert_eq!(parse_signature("PONG"), "PONG");
    }
}
