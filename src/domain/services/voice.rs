#[cfg(test)]
#[path = "voice_test.rs"]
mod tests;

use anyhow::Result;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::models::ChatError;
use crate::domain::models::SharedAudioPlayer;
use crate::domain::models::SharedSpeech;

pub const MAX_SEGMENT_LENGTH: usize = 100;

/// Splits `text` into segments of at most `max` characters. Cuts land on the
/// nearest preceding space, which is consumed. A word with no space before
/// it in the window is cut hard at `max`.
pub fn split_segments(text: &str, max: usize) -> Vec<String> {
    let chars = text.chars().collect::<Vec<char>>();
    let mut segments = vec![];
    let mut start = 0;

    while max > 0 && chars.len() - start > max {
        let window = &chars[start..=start + max];
        let space = window
            .iter()
            .rposition(|c| return *c == ' ')
            .filter(|pos| return *pos > 0);

        match space {
            Some(pos) => {
                segments.push(chars[start..start + pos].iter().collect());
                start += pos + 1;
            }
            None => {
                segments.push(chars[start..start + max].iter().collect());
                start += max;
            }
        }
    }

    if start < chars.len() {
        segments.push(chars[start..].iter().collect());
    }

    return segments;
}

/// Reads a text aloud segment by segment with one voice seed. Synthesis is
/// sequential, and playback runs strictly in order on its own task while
/// later segments are fetched.
pub struct VoiceController {
    segments: Vec<String>,
    speech: SharedSpeech,
    player: SharedAudioPlayer,
    cancel: CancellationToken,
    seed: u32,
}

impl VoiceController {
    pub fn new(text: &str, speech: SharedSpeech, player: SharedAudioPlayer) -> VoiceController {
        let segments = split_segments(text, MAX_SEGMENT_LENGTH)
            .into_iter()
            .filter(|segment| return !segment.trim().is_empty())
            .collect();

        return VoiceController {
            segments,
            speech,
            player,
            cancel: CancellationToken::new(),
            seed: rand::rng().random_range(10..=100_000),
        };
    }

    pub fn sentences(&self) -> &[String] {
        return &self.segments;
    }

    /// False once the controller has finished, failed or been stopped.
    pub fn is_active(&self) -> bool {
        return !self.cancel.is_cancelled();
    }

    /// Halts playback. Pending fetches finish but their audio is discarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the last segment has played, or on the first failure.
    /// A stopped controller resolves with `Ok`.
    pub async fn run(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let player = self.player.clone();
        let cancel = self.cancel.clone();
        let playback = tokio::spawn(async move {
            while let Some(audio) = rx.recv().await {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    res = player.play(audio) => res?,
                }
            }
            return Ok::<(), anyhow::Error>(());
        });

        if let Err(err) = self.fetch_all(tx).await {
            self.cancel.cancel();
            let _ = playback.await;
            return Err(err);
        }

        let res = match playback.await {
            Ok(res) => res,
            Err(err) => Err(ChatError::VoicePlayback(err.to_string()).into()),
        };
        self.cancel.cancel();

        return res;
    }

    async fn fetch_all(&self, tx: mpsc::UnboundedSender<Vec<u8>>) -> Result<()> {
        for (idx, segment) in self.segments.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }

            let audio = self.speech.synthesize(segment, self.seed).await?;

            if self.cancel.is_cancelled() {
                tracing::debug!(idx, "Discarding audio fetched after stop");
                break;
            }

            // Playback ended early, its result is reported by `run`.
            if tx.send(audio).is_err() {
                break;
            }
        }

        return Ok(());
    }
}
