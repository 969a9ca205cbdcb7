//! End-to-end runs of the pipeline over real adapters and mocked HTTP services

use digest_press_adapters::{
    delivery::StubDelivery,
    ledger::InMemoryLedger,
    llm::StubRewriter,
    render::MarkdownDigestRenderer,
    secrets::EnvCredential,
    store::{FsDigestArchive, FsTemplateStore, InMemoryRunLock, TomlSourceCatalog},
    supadata::SupadataTranscripts,
    youtube::YoutubeDiscovery,
};
use digest_press_domain::{
    DigestArchive, Ledger, LedgerEntry, RunOutcome, Source, SourceCatalog, SourceKind,
    SystemClock,
    usecases::{Pipeline, PipelineConfig, PipelineDeps, SourceAdapters},
};
use secrecy::SecretString;
use std::sync::Arc;
use tempfile::TempDir;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    _dir: TempDir,
    archive: Arc<FsDigestArchive>,
    ledger: Arc<InMemoryLedger>,
    delivery: Arc<StubDelivery>,
    pipeline: Pipeline,
}

fn days_ago(days: i64) -> String {
    (OffsetDateTime::now_utc() - Duration::days(days))
        .format(&Rfc3339)
        .unwrap()
}

async fn mount_channel(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .and(query_param("forHandle", "@engineering"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{
                "snippet": {"title": "Practical Engineering"},
                "contentDetails": {"relatedPlaylists": {"uploads": "UUengineering"}}
            }]
        })))
        .mount(server)
        .await;

    let video = |id: &str, title: &str, published: String| {
        serde_json::json!({
            "snippet": {
                "title": title,
                "description": format!("About {}", title),
                "publishedAt": published,
                "resourceId": {"videoId": id}
            },
            "contentDetails": {"videoPublishedAt": published}
        })
    };

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", "UUengineering"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                video("dam", "Why dams fail", days_ago(1)),
                video("bridge", "Why bridges sing", days_ago(2)),
                video("old", "Roman concrete", days_ago(30)),
                video("seen", "Already covered", days_ago(3)),
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_transcripts(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/transcript"))
        .and(query_param("url", "https://www.youtube.com/watch?v=bridge"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"content": "Bridges resonate with wind."})),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/transcript"))
        .and(query_param("url", "https://www.youtube.com/watch?v=dam"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

async fn harness(server: &MockServer, delivery: StubDelivery) -> Harness {
    let dir = TempDir::new().unwrap();

    let catalog = TomlSourceCatalog::new(dir.path().join("sources.toml"));
    catalog
        .save(&[Source::new("@engineering", SourceKind::Youtube)])
        .await
        .unwrap();

    let ledger = Arc::new(InMemoryLedger::new());
    ledger
        .record(
            "seen",
            &LedgerEntry {
                title: "Already covered".to_string(),
                source: "Practical Engineering".to_string(),
                url: None,
                processed_at: OffsetDateTime::now_utc(),
            },
        )
        .await
        .unwrap();

    let youtube = YoutubeDiscovery::with_base_url(
        EnvCredential::new("YOUTUBE_API_KEY", SecretString::new("yt-key".into())),
        10,
        server.uri(),
    )
    .unwrap();
    let transcripts = SupadataTranscripts::with_base_url(
        EnvCredential::new("SUPADATA_API_KEY", SecretString::new("sd-key".into())),
        server.uri(),
    )
    .unwrap();

    let archive = Arc::new(FsDigestArchive::new(dir.path().join("newsletters")));
    let delivery = Arc::new(delivery);

    let deps = PipelineDeps {
        catalog: Arc::new(catalog),
        templates: Arc::new(FsTemplateStore::new(dir.path().join("prompt.md"))),
        sources: SourceAdapters::new().with(
            SourceKind::Youtube,
            Arc::new(youtube),
            Arc::new(transcripts),
        ),
        ledger: ledger.clone(),
        rewriter: Arc::new(StubRewriter::with_response(
            "# The Singing Bridge\n\nWind makes steel hum.",
        )),
        renderer: Arc::new(MarkdownDigestRenderer::new()),
        delivery: delivery.clone(),
        archive: archive.clone(),
        lock: Arc::new(InMemoryRunLock::new()),
        clock: Arc::new(SystemClock),
    };

    let config = PipelineConfig {
        recipient: "reader@example.com".to_string(),
        ..PipelineConfig::default()
    };

    Harness {
        _dir: dir,
        archive,
        ledger,
        delivery,
        pipeline: Pipeline::new(deps, config),
    }
}

#[tokio::test]
async fn run_delivers_digest_of_new_items_with_transcripts() {
    let server = MockServer::start().await;
    mount_channel(&server).await;
    mount_transcripts(&server).await;

    let h = harness(&server, StubDelivery::new()).await;
    let summary = h.pipeline.run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Delivered);
    assert_eq!(summary.sources_checked, 1);
    assert_eq!(summary.items_discovered, 3);
    assert_eq!(summary.items_already_processed, 1);
    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.articles_written, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].item_id, "dam");

    let sent = h.delivery.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "reader@example.com");

    assert!(h.ledger.contains("bridge").await.unwrap());
    assert!(!h.ledger.contains("dam").await.unwrap());

    let records = h.archive.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].manifest.article_titles, vec!["Why bridges sing"]);
    assert_eq!(records[0].channel, "stub");
}

#[tokio::test]
async fn failed_delivery_keeps_files_for_resend() {
    let server = MockServer::start().await;
    mount_channel(&server).await;
    mount_transcripts(&server).await;

    let h = harness(&server, StubDelivery::failing("relay refused")).await;
    let summary = h.pipeline.run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::DeliveryFailed);
    assert!(summary.delivery_error.as_deref().unwrap().contains("relay refused"));

    let files = summary.unsent_files.expect("unsent files");
    assert!(files.html_file.ends_with(".html"));
    assert!(files.ebook_file.ends_with(".epub"));

    assert!(h.archive.list().await.unwrap().is_empty());
    assert!(h.ledger.contains("bridge").await.unwrap());
}

#[tokio::test]
async fn second_run_finds_nothing_new() {
    let server = MockServer::start().await;
    mount_channel(&server).await;
    mount_transcripts(&server).await;

    let h = harness(&server, StubDelivery::new()).await;
    h.pipeline.run().await.unwrap();

    // "dam" still has no transcript, so it is attempted again
    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.outcome, RunOutcome::NoArticles);
    assert_eq!(summary.items_already_processed, 2);
    assert_eq!(summary.items_processed, 1);
    assert_eq!(h.delivery.sent().len(), 1);
}
