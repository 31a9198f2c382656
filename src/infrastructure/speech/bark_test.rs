use anyhow::Result;
use mockito::Matcher;
use serde_json::json;

use super::Bark;
use crate::domain::models::ChatError;
use crate::domain::models::Speech;

#[tokio::test]
async fn it_synthesizes_and_releases_audio() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let render = server
        .mock("POST", "/bark")
        .match_body(Matcher::Json(json!({"prompt": "Hello there", "seed": 42})))
        .with_status(200)
        .with_body(r#"{"prompt":"Hello there","filename":"out-1.wav"}"#)
        .create_async()
        .await;
    let download = server
        .mock("GET", "/bark-out/out-1.wav")
        .with_status(200)
        .with_body(b"RIFF....WAVE")
        .create_async()
        .await;
    let release = server
        .mock("DELETE", "/bark-out/out-1.wav")
        .with_status(200)
        .create_async()
        .await;

    let bark = Bark::new(&server.url());
    let audio = bark.synthesize("Hello there", 42).await?;

    assert_eq!(audio, b"RIFF....WAVE".to_vec());
    render.assert_async().await;
    download.assert_async().await;
    release.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_ignores_failed_releases() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _render = server
        .mock("POST", "/bark")
        .with_status(200)
        .with_body(r#"{"prompt":"Hi","filename":"out-2.wav"}"#)
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/bark-out/out-2.wav")
        .with_status(200)
        .with_body("audio")
        .create_async()
        .await;
    let _release = server
        .mock("DELETE", "/bark-out/out-2.wav")
        .with_status(500)
        .create_async()
        .await;

    let audio = Bark::new(&server.url()).synthesize("Hi", 7).await?;
    assert_eq!(audio, b"audio".to_vec());

    return Ok(());
}

#[tokio::test]
async fn it_fails_when_rendering_fails() {
    let mut server = mockito::Server::new_async().await;
    let _render = server
        .mock("POST", "/bark")
        .with_status(500)
        .create_async()
        .await;

    let err = Bark::new(&server.url())
        .synthesize("Hi", 7)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ChatError>(),
        Some(ChatError::VoiceFetch(_))
    ));
}

#[tokio::test]
async fn it_fails_when_downloading_fails() {
    let mut server = mockito::Server::new_async().await;
    let _render = server
        .mock("POST", "/bark")
        .with_status(200)
        .with_body(r#"{"prompt":"Hi","filename":"gone.wav"}"#)
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/bark-out/gone.wav")
        .with_status(404)
        .create_async()
        .await;

    let err = Bark::new(&server.url())
        .synthesize("Hi", 7)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ChatError>(),
        Some(ChatError::VoiceFetch(_))
    ));
}
