//! External virus-definition update via the `freshclam` utility.
//!
//! Clamd has no wire command for updating its databases; updates go through
//! the separate `freshclam` program. Its exit code alone is not a reliable
//! success signal (warnings such as "already up to date" exit non-zero), so
//! the captured output is inspected for known success phrases before a
//! failure is declared.

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ClamdError, Result};

/// Output phrases that count as success even on a non-zero exit status.
const SUCCESS_PHRASES: &[&str] = &[
    "Database updated",
    "up to date",
    "Your ClamAV installation is OUTDATED",
];

/// Run `<program> --verbose --stdout` and return its combined stdout/stderr.
///
/// The child is killed if the returned future is dropped, so callers cancel
/// an update by dropping (or timing out) the call. Failures carry the
/// captured output in [`ClamdError::FreshclamFailed`]; it is diagnostically
/// useful either way.
pub(crate) async fn run_update(program: &str) -> Result<Vec<u8>> {
    debug!(program, "running virus definition update");

    let result = Command::new(program)
        .args(["--verbose", "--stdout"])
        .kill_on_drop(true)
        .output()
        .await;

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            warn!(program, error = %e, "failed to spawn freshclam");
            return Err(ClamdError::FreshclamFailed {
                status: None,
                output: format!("failed to run {program}: {e}"),
            });
        }
    };

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);

    if output.status.success() {
        debug!("freshclam completed successfully");
        return Ok(combined);
    }

    // 비정상 종료 코드라도 출력에 성공 문구가 있으면 성공으로 간주
    let text = String::from_utf8_lossy(&combined);
    if SUCCESS_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        debug!(status = ?output.status.code(), "freshclam exited non-zero but reported success");
        return Ok(combined);
    }

    warn!(status = ?output.status.code(), "freshclam failed");
    Err(ClamdError::FreshclamFailed {
        status: output.status.code(),
        output: text.into_owned(),
    })
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-freshclam");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh\n{body}").unwrap();
        drop(f);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'Database updated successfully'\nexit 0");
        let output = run_update(&script).await.unwrap();
        assert!(String::from_utf8_lossy(&output).contains("Database updated successfully"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_with_up_to_date_phrase_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'daily.cvd database is up to date' >&2\nexit 1");
        let output = run_update(&script).await.unwrap();
        assert!(String::from_utf8_lossy(&output).contains("up to date"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_success_phrase_fails_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'ERROR: Connection refused'\nexit 2");
        match run_update(&script).await {
            Err(ClamdError::FreshclamFailed { status, output }) => {
                assert_eq!(status, Some(2));
                assert!(output.contains("Connection refused"));
            }
            other => panic!("expected FreshclamFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_fails_with_diagnostic() {
        match run_update("/nonexistent/freshclam").await {
            Err(ClamdError::FreshclamFailed { status: None, output }) => {
                assert!(output.contains("/nonexistent/freshclam"));
            }
            other => panic!("expected FreshclamFailed, got {other:?}"),
        }
    }
}
