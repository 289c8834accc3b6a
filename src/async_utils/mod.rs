//! Asynchronous utilities for use with Tokio.
//!
//! We keep the small amount of Tokio plumbing that the rest of the program
//! needs here: running external commands, and moving CPU-bound work off the
//! async executor.

use regex::Regex;

use crate::prelude::*;

pub mod io;

/// Report any command failures, and include any error output.
///
/// Standard output and standard error are logged at debug level, because
/// tools like `tesseract` chat on stderr even when everything went fine.
/// When the command fails, stderr is included in the error. Standard error
/// may also be checked against a regex to catch tools that report failure
/// without a non-zero exit code.
pub fn check_for_command_failure(
    command_name: &str,
    output: &std::process::Output,
    error_regex: Option<&Regex>,
) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %stdout,
        "Standard output from command"
    );
    debug!(
        command_name = command_name,
        output = %stderr,
        "Standard error from command",
    );

    if output.status.success() {
        if let Some(regex) = error_regex {
            if regex.is_match(&stderr) {
                return Err(anyhow!(
                    "{} printed error output:\n{}",
                    command_name,
                    stderr,
                ));
            }
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics from
/// the background task.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(err) => std::panic::resume_unwind(err.into_panic()),
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    #[test]
    fn test_check_for_command_failure() {
        let ok = Command::new("sh").args(["-c", "echo hi"]).output().unwrap();
        assert!(check_for_command_failure("sh", &ok, None).is_ok());

        let noisy = Command::new("sh")
            .args(["-c", "echo 'Error: bad input' >&2"])
            .output()
            .unwrap();
        assert!(check_for_command_failure("sh", &noisy, None).is_ok());
        let regex = Regex::new(r"(?i)error").unwrap();
        assert!(check_for_command_failure("sh", &noisy, Some(&regex)).is_err());

        let failed = Command::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .output()
            .unwrap();
        let err = check_for_command_failure("sh", &failed, None).unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn test_spawn_blocking_returns_value() {
        let value = spawn_blocking_propagating_panics(|| 6 * 7).await;
        assert_eq!(value, 42);
    }
}
