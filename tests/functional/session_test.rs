//! Functional tests for the generate / abort / restore workflow

use std::sync::Arc;
use std::time::Duration;
use studio_mini::client::Style;
use studio_mini::history::{KeyValueStore, MemoryStore};
use studio_mini::orchestrator::OrchestratorState;
use studio_mini::preparation::{PrepareOptions, RawImage};
use studio_mini::timer::RecordingClock;
use studio_mini::{AppError, GenerationError};

use crate::support::{
    entry, ids, png_bytes, studio, studio_with, ScriptedClient, Step, HISTORY_KEY,
};

fn overloaded() -> Step {
    Step::Fail(GenerationError::overloaded())
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let client = ScriptedClient::new(vec![overloaded(), overloaded()]);
    let clock = RecordingClock::new();
    let mut studio = studio(client.clone(), clock.clone());

    studio
        .select_image(RawImage::new("shoe.png", png_bytes(32, 32)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");
    studio.set_style(Style::Minimal);
    assert!(studio.can_generate());

    let state = studio.generate().await.unwrap();
    let result = match state {
        OrchestratorState::Succeeded(result) => result,
        other => panic!("unexpected state: {:?}", other),
    };

    assert_eq!(
        studio.status_log(),
        [
            "Generating…",
            "Error: Model overloaded. Retrying in 500ms…",
            "Error: Model overloaded. Retrying in 1000ms…",
            "Done",
        ]
    );
    assert_eq!(studio.status(), "Done");
    assert_eq!(studio.error(), "");
    assert_eq!(client.calls(), 3);
    assert_eq!(clock.delays_ms(), vec![500, 1000]);

    assert_eq!(studio.history()[0].id, result.id);
    assert_eq!(studio.history()[0].prompt, "red sneaker");
    assert_eq!(studio.history()[0].style, Style::Minimal);
    assert!(!studio.is_generating());
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_error() {
    let client = ScriptedClient::new(vec![
        overloaded(),
        overloaded(),
        Step::Fail(GenerationError::Unknown("upstream reset".into())),
    ]);
    let mut studio = studio(client.clone(), RecordingClock::new());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");

    let state = studio.generate().await.unwrap();
    assert!(matches!(state, OrchestratorState::Failed(_)));
    assert_eq!(studio.status(), "Failed after retries");
    assert_eq!(studio.error(), "upstream reset");
    assert!(studio.history().is_empty());
}

#[tokio::test]
async fn test_abort_right_after_start() {
    let client = ScriptedClient::new(vec![Step::Hang]);
    let store = Arc::new(MemoryStore::new());
    let mut studio = studio_with(client.clone(), RecordingClock::new(), store.clone());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");

    let abort = studio.abort_handle();
    let (state, _) = tokio::join!(studio.generate(), async {
        tokio::task::yield_now().await;
        abort.abort();
    });

    assert_eq!(state.unwrap(), OrchestratorState::Aborted);
    assert_eq!(studio.status(), "Aborted");
    assert_eq!(studio.error(), "");
    assert!(studio.history().is_empty());
    assert_eq!(store.get(HISTORY_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_abort_without_generation_is_noop() {
    let client = ScriptedClient::new(vec![]);
    let mut studio = studio(client, RecordingClock::new());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");

    studio.abort();
    let state = studio.generate().await.unwrap();
    assert!(matches!(state, OrchestratorState::Succeeded(_)));
}

#[tokio::test]
async fn test_generate_requires_image_and_prompt() {
    let client = ScriptedClient::new(vec![]);
    let mut studio = studio(client.clone(), RecordingClock::new());

    studio.set_prompt("red sneaker");
    assert!(matches!(studio.generate().await, Err(AppError::Validation(_))));

    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("   ");
    assert!(!studio.can_generate());
    assert!(matches!(studio.generate().await, Err(AppError::Validation(_))));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_select_image_failures_set_error() {
    let mut studio = studio(ScriptedClient::new(vec![]), RecordingClock::new());

    let err = studio
        .select_image(RawImage::new("report.pdf", vec![1, 2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(studio.error(), "Please upload a PNG or JPG file.");
    assert!(studio.image().is_none());

    studio.set_prepare_options(PrepareOptions {
        max_bytes: 4,
        ..PrepareOptions::default()
    });
    let err = studio
        .select_image(RawImage::new("broken.jpg", vec![0u8; 32]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Decode(_)));
    assert_eq!(studio.error(), "Failed to load image.");
    assert!(studio.image().is_none());
}

#[tokio::test]
async fn test_oversized_selection_is_downscaled() {
    let mut studio = studio(ScriptedClient::new(vec![]), RecordingClock::new());
    studio.set_prepare_options(PrepareOptions {
        max_bytes: 0,
        max_dim: 16,
        ..PrepareOptions::default()
    });

    let prepared = studio
        .select_image(RawImage::new("big.png", png_bytes(64, 32)))
        .await
        .unwrap();
    assert!(prepared.was_downscaled);
    assert_eq!((prepared.width, prepared.height), (Some(16), Some(8)));
}

#[tokio::test]
async fn test_restore_from_history() {
    let store = Arc::new(MemoryStore::new());
    let stored = vec![entry("B"), entry("A")];
    store
        .set(HISTORY_KEY, &serde_json::to_string(&stored).unwrap())
        .await
        .unwrap();

    let mut studio = studio_with(ScriptedClient::new(vec![]), RecordingClock::new(), store);
    assert_eq!(ids(studio.load_history().await), vec!["B", "A"]);

    let target = studio.history()[1].clone();
    studio.restore_from_history(&target);

    assert_eq!(studio.prompt(), "prompt A");
    assert_eq!(studio.style(), Style::Vintage);
    assert_eq!(studio.image().unwrap().data_url, target.image_url);
    assert!(studio.status().starts_with("Restored item from "));
    assert_eq!(studio.error(), "");
    assert_eq!(ids(studio.history()), vec!["B", "A"]);
    assert!(studio.can_generate());
}

#[tokio::test]
async fn test_live_summary() {
    let mut studio = studio(ScriptedClient::new(vec![]), RecordingClock::new());
    let summary = studio.live_summary();
    assert_eq!(summary.prompt, "(no prompt)");
    assert_eq!(summary.style, Style::Editorial);
    assert!(!summary.has_image);
    assert!(!summary.ready);

    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("  neon jacket ");
    let summary = studio.live_summary();
    assert_eq!(summary.prompt, "neon jacket");
    assert!(summary.ready);
}

#[tokio::test]
async fn test_history_caps_across_generations() {
    let mut studio = studio(ScriptedClient::new(vec![]), RecordingClock::new());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");

    for _ in 0..6 {
        studio.generate().await.unwrap();
    }
    assert_eq!(
        ids(studio.history()),
        vec!["gen-6", "gen-5", "gen-4", "gen-3", "gen-2"]
    );
}

#[tokio::test]
async fn test_status_log_covers_latest_generation_only() {
    let client = ScriptedClient::new(vec![overloaded()]);
    let mut studio = studio(client, RecordingClock::new());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");

    studio.generate().await.unwrap();
    assert_eq!(studio.status_log().len(), 3);

    studio.generate().await.unwrap();
    assert_eq!(studio.status_log(), ["Generating…", "Done"]);
}

#[tokio::test]
async fn test_dropped_generation_frees_session() {
    let client = ScriptedClient::new(vec![Step::Hang]);
    let mut studio = studio(client.clone(), RecordingClock::new());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");

    let timed_out = tokio::time::timeout(Duration::from_millis(50), studio.generate()).await;
    assert!(timed_out.is_err());
    assert!(!studio.is_generating());
    assert!(studio.can_generate());

    let state = studio.generate().await.unwrap();
    assert!(matches!(state, OrchestratorState::Succeeded(_)));
    assert_eq!(client.calls(), 2);
    assert_eq!(ids(studio.history()), vec!["gen-2"]);
}

#[tokio::test]
async fn test_generate_without_loading_keeps_stored_history() {
    let store = Arc::new(MemoryStore::new());
    let stored = vec![entry("B"), entry("A")];
    store
        .set(HISTORY_KEY, &serde_json::to_string(&stored).unwrap())
        .await
        .unwrap();

    let mut studio = studio_with(ScriptedClient::new(vec![]), RecordingClock::new(), store.clone());
    studio
        .select_image(RawImage::new("shoe.png", png_bytes(8, 8)))
        .await
        .unwrap();
    studio.set_prompt("red sneaker");
    studio.generate().await.unwrap();

    assert_eq!(ids(studio.history()), vec!["gen-1", "B", "A"]);
    let raw = store.get(HISTORY_KEY).await.unwrap().unwrap();
    let persisted: Vec<studio_mini::history::HistoryEntry> = serde_json::from_str(&raw).unwrap();
    assert_eq!(ids(&persisted), vec!["gen-1", "B", "A"]);
}
