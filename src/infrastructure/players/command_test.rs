use std::time::Duration;

use anyhow::Result;

use super::CommandPlayer;
use crate::domain::models::AudioPlayer;
use crate::domain::models::ChatError;

fn leftover_audio(dir: &std::path::Path) -> usize {
    return std::fs::read_dir(dir).unwrap().count();
}

#[test]
fn it_parses_player_commands() -> Result<()> {
    let player = CommandPlayer::parse("ffplay -nodisp  -autoexit")?;
    assert_eq!(player.program, "ffplay");
    assert_eq!(player.args, vec!["-nodisp".to_string(), "-autoexit".to_string()]);

    return Ok(());
}

#[test]
fn it_rejects_empty_player_commands() {
    assert!(CommandPlayer::parse("  ").is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn it_plays_and_cleans_up() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let player = CommandPlayer {
        dir: dir.path().to_path_buf(),
        ..CommandPlayer::parse("true")?
    };

    player.play(b"audio".to_vec()).await?;
    assert_eq!(leftover_audio(dir.path()), 0);

    return Ok(());
}

#[cfg(unix)]
#[tokio::test]
async fn it_reports_failed_playback() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let player = CommandPlayer {
        dir: dir.path().to_path_buf(),
        ..CommandPlayer::parse("false")?
    };

    let err = player.play(b"audio".to_vec()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChatError>(),
        Some(ChatError::VoicePlayback(_))
    ));
    assert_eq!(leftover_audio(dir.path()), 0);

    return Ok(());
}

#[tokio::test]
async fn it_reports_missing_players() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let player = CommandPlayer {
        dir: dir.path().to_path_buf(),
        ..CommandPlayer::parse("ochat-no-such-player")?
    };

    let err = player.play(b"audio".to_vec()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChatError>(),
        Some(ChatError::VoicePlayback(_))
    ));

    return Ok(());
}

#[cfg(unix)]
#[tokio::test]
async fn it_stops_when_dropped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // `sh -c` takes the script as a single argument, so build it directly.
    let player = CommandPlayer {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "sleep 5".to_string(), "sh".to_string()],
        dir: dir.path().to_path_buf(),
    };

    let res = tokio::time::timeout(Duration::from_millis(200), player.play(b"audio".to_vec())).await;
    assert!(res.is_err());
    assert_eq!(leftover_audio(dir.path()), 0);

    return Ok(());
}
