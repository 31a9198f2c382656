#[cfg(test)]
#[path = "command_test.rs"]
mod tests;

use std::path;
use std::process::Stdio;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use crate::domain::models::AudioPlayer;
use crate::domain::models::ChatError;

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

/// Audio written to disk for the player. Removed once playback ends or is
/// cancelled.
struct TempAudio {
    path: path::PathBuf,
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::debug!(error = ?err, path = ?self.path, "Failed to remove temporary audio");
        }
    }
}

/// Plays audio by handing a temporary file to an external program such as
/// `ffplay` or `afplay`.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    dir: path::PathBuf,
}

impl CommandPlayer {
    /// Parses a command line like `ffplay -nodisp -autoexit`. The audio file
    /// path is appended as the last argument.
    pub fn parse(command: &str) -> Result<CommandPlayer> {
        let mut parts = command
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if parts.is_empty() {
            bail!("No audio player configured");
        }
        let program = parts.remove(0);

        return Ok(CommandPlayer {
            program,
            args: parts,
            dir: std::env::temp_dir(),
        });
    }

    fn next_path(&self) -> path::PathBuf {
        let idx = NEXT_FILE.fetch_add(1, Ordering::Relaxed);
        return self
            .dir
            .join(format!("ochat-{}-{idx}.wav", std::process::id()));
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    #[allow(clippy::implicit_return)]
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        let file = TempAudio {
            path: self.next_path(),
        };
        fs::write(&file.path, audio)
            .await
            .map_err(|err| return ChatError::VoicePlayback(err.to_string()))?;

        // Dropping this future kills the player, which is how playback stops.
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&file.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|err| {
                return ChatError::VoicePlayback(format!("could not start {}: {err}", self.program));
            })?;

        if !status.success() {
            tracing::error!(program = %self.program, status = ?status, "Audio player failed");
            return Err(
                ChatError::VoicePlayback(format!("{} exited with {status}", self.program)).into(),
            );
        }

        return Ok(());
    }
}
