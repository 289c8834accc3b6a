//! Copying text to the system clipboard.
//!
//! There is no portable clipboard API on the command line, so we pipe the
//! text into whichever platform tool is installed.

use std::process::Stdio;

use tokio::{io::AsyncWriteExt as _, process::Command};

use crate::{
    notify::{Notification, Observer},
    prelude::*,
};

/// Clipboard tools to try, in order, as `(program, args)`.
#[cfg(target_os = "macos")]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[("pbcopy", &[])];

#[cfg(target_os = "windows")]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[("clip", &[])];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Copy `text` to the clipboard and tell the observer how it went.
pub async fn copy_to_clipboard(text: &str, observer: &dyn Observer) -> Result<()> {
    copy_and_notify(CLIPBOARD_COMMANDS, text, observer).await
}

async fn copy_and_notify(
    commands: &[(&str, &[&str])],
    text: &str,
    observer: &dyn Observer,
) -> Result<()> {
    match copy_with_commands(commands, text).await {
        Ok(()) => {
            observer.on_notification(&Notification::CopySucceeded);
            Ok(())
        }
        Err(err) => {
            observer.on_notification(&Notification::CopyFailed {
                error: format!("{:#}", err),
            });
            Err(err)
        }
    }
}

/// Try each command until one accepts our text.
///
/// A command that isn't installed is skipped. A command that runs and fails
/// is an error: we don't retry with another tool.
///
/// Output is discarded rather than captured, because `xclip` leaves a child
/// process holding its output open to serve the selection.
async fn copy_with_commands(commands: &[(&str, &[&str])], text: &str) -> Result<()> {
    for (program, args) in commands {
        let child = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(program = %program, "Clipboard tool not installed");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("cannot run {}", program));
            }
        };

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("cannot open stdin of {}", program))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .with_context(|| format!("cannot write to {}", program))?;
        drop(stdin);

        let status = child
            .wait()
            .await
            .with_context(|| format!("cannot wait for {}", program))?;
        if !status.success() {
            bail!("{} failed with {}", program, status);
        }
        return Ok(());
    }
    Err(anyhow!(
        "no clipboard tool found (tried {})",
        commands
            .iter()
            .map(|(program, _)| *program)
            .collect::<Vec<_>>()
            .join(", ")
    ))
}
