//! Integration tests for the build pipeline.
//!
//! These tests run the fetch-extract-localize-bundle flow against mock HTTP
//! servers standing in for the article mirrors.

use std::time::Duration;

use paperbundle::build::{build_article, BatchBuilder, BuildOptions, BuildOutcome};
use paperbundle::bundle::ArticleBundle;
use paperbundle::config::{ArticleRecord, Manifest};
use paperbundle::fetch::{FetchClient, FetchError, FetchPolicy};
use paperbundle::mirror::{ArxivLabsMirror, ArxivNativeMirror, MirrorResolver};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE_ID: &str = "2101.00001";

/// Article page in the primary mirror's shape: path-qualified asset refs.
fn primary_page(asset_refs: &[&str]) -> String {
    let figures: String = asset_refs
        .iter()
        .map(|file| format!(r#"<img src="/html/{ARTICLE_ID}/assets/{file}" alt=""/>"#))
        .collect();
    format!(
        concat!(
            r#"<html><head><style>.ltx_document{{margin:0}}</style></head><body>"#,
            r#"<div class="ar5iv-logo">logo</div>"#,
            r#"<article class="ltx_document ltx_authors_1line">"#,
            r#"<h1 class="ltx_title">Ignored preamble title</h1>"#,
            r#"<section class="ltx_section" id="S1">"#,
            r#"<h2 class="ltx_title ltx_title_section">1 Introduction</h2>"#,
            "{figures}",
            r#"</section>"#,
            r#"</article>"#,
            r#"<footer class="ltx_page_footer">generated</footer>"#,
            r#"</body></html>"#,
        ),
        figures = figures,
    )
}

/// Article page in the secondary mirror's shape: bare relative asset refs.
fn secondary_page(asset_refs: &[&str]) -> String {
    let figures: String = asset_refs
        .iter()
        .map(|file| format!(r#"<img src="{file}" alt=""/>"#))
        .collect();
    format!(
        concat!(
            r#"<article class="ltx_document">"#,
            r#"<section class="ltx_section" id="S1">"#,
            r#"<h2 class="ltx_title ltx_title_section">1 Results</h2>"#,
            "{figures}",
            r#"</section>"#,
            r#"</article>"#,
        ),
        figures = figures,
    )
}

fn fast_client() -> FetchClient {
    FetchClient::new(FetchPolicy::new(0, Duration::from_millis(10)))
}

fn resolver_for(primary: &MockServer, secondary: &MockServer, client: FetchClient) -> MirrorResolver {
    MirrorResolver::new(
        Box::new(ArxivLabsMirror::new(primary.uri())),
        Box::new(ArxivNativeMirror::new(secondary.uri())),
        client,
    )
}

fn record_in(dir: &TempDir) -> ArticleRecord {
    ArticleRecord {
        id: ARTICLE_ID.to_string(),
        output_dir: dir.path().join("paper"),
        enabled: true,
        latex_dir: None,
    }
}

#[tokio::test]
async fn test_full_build_writes_selfcontained_bundle() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(primary_page(&["fig1.png"])))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}/assets/fig1.png")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
        .mount(&primary)
        .await;

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());
    let record = record_in(&temp_dir);

    let outcome = build_article(&resolver, &client, &record, false)
        .await
        .expect("build should succeed");

    let BuildOutcome::Built { bundle_path, assets } = outcome else {
        panic!("expected a built bundle");
    };
    assert!(bundle_path.exists());
    assert_eq!(assets.fetched.len(), 1);
    assert!(assets.failed.is_empty());

    let bundle = ArticleBundle::load(&bundle_path)
        .await
        .expect("bundle should deserialize");
    assert_eq!(bundle.article_id, ARTICLE_ID);
    assert_eq!(bundle.mirror_used, "primary");

    // Chrome stripped, content trimmed to the first section.
    assert!(!bundle.body_markup.contains("ar5iv-logo"));
    assert!(!bundle.body_markup.contains("ltx_page_footer"));
    assert!(!bundle.body_markup.contains("Ignored preamble title"));

    // Asset reference points at the local copy, which exists on disk.
    assert!(bundle.body_markup.contains(r#"src="./assets/fig1.png""#));
    assert!(record.output_dir.join("assets/fig1.png").exists());

    assert_eq!(bundle.stylesheet_text, ".ltx_document{margin:0}");
}

#[tokio::test]
async fn test_repeated_asset_reference_downloaded_once() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(primary_page(&["plot.png", "plot.png", "other.png"])),
        )
        .mount(&primary)
        .await;
    // The duplicated figure must be requested exactly once.
    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}/assets/plot.png")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG1".to_vec()))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}/assets/other.png")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG2".to_vec()))
        .expect(1)
        .mount(&primary)
        .await;

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());
    let record = record_in(&temp_dir);

    let outcome = build_article(&resolver, &client, &record, false)
        .await
        .expect("build should succeed");

    let BuildOutcome::Built { bundle_path, assets } = outcome else {
        panic!("expected a built bundle");
    };
    assert_eq!(assets.fetched.len(), 2);

    // Every occurrence rewritten, including the duplicate.
    let bundle = ArticleBundle::load(&bundle_path).await.unwrap();
    assert_eq!(
        bundle
            .body_markup
            .matches(r#"src="./assets/plot.png""#)
            .count(),
        2
    );
    assert_eq!(
        bundle
            .body_markup
            .matches(r#"src="./assets/other.png""#)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_fallback_to_secondary_mirror_switches_convention() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(secondary_page(&["figs/plot.png"])))
        .mount(&secondary)
        .await;
    // Bare refs resolve against the secondary page's directory.
    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}/figs/plot.png")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
        .mount(&secondary)
        .await;

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());
    let record = record_in(&temp_dir);

    let outcome = build_article(&resolver, &client, &record, false)
        .await
        .expect("fallback build should succeed");

    let BuildOutcome::Built { bundle_path, assets } = outcome else {
        panic!("expected a built bundle");
    };
    assert_eq!(assets.fetched.len(), 1);

    let bundle = ArticleBundle::load(&bundle_path).await.unwrap();
    assert_eq!(bundle.mirror_used, "secondary");
    // Nested subdirectories implied by the reference are preserved locally.
    assert!(bundle.body_markup.contains(r#"src="./assets/figs/plot.png""#));
    assert!(record.output_dir.join("assets/figs/plot.png").exists());
}

#[tokio::test]
async fn test_failed_asset_still_rewritten_and_reported() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(primary_page(&["gone.png"])))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}/assets/gone.png")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&primary)
        .await;

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());
    let record = record_in(&temp_dir);

    let outcome = build_article(&resolver, &client, &record, false)
        .await
        .expect("asset failure must not fail the build");

    let BuildOutcome::Built { bundle_path, assets } = outcome else {
        panic!("expected a built bundle");
    };
    assert!(assets.fetched.is_empty());
    assert_eq!(assets.failed.len(), 1);

    // Reference rewritten anyway; the bundle is structurally complete.
    let bundle = ArticleBundle::load(&bundle_path).await.unwrap();
    assert!(bundle.body_markup.contains(r#"src="./assets/gone.png""#));
    assert!(!record.output_dir.join("assets/gone.png").exists());
}

#[tokio::test]
async fn test_fetch_retries_are_bounded() {
    let server = MockServer::start().await;

    // retries = 2 means exactly three attempts, then the error surfaces.
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = FetchClient::new(FetchPolicy::new(2, Duration::from_millis(10)));
    let result = client.fetch_text(&format!("{}/flaky", server.uri())).await;

    match result {
        Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected an HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_follows_redirects_to_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/here", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/here"))
        .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
        .mount(&server)
        .await;

    let client = fast_client();
    let text = client
        .fetch_text(&format!("{}/moved", server.uri()))
        .await
        .expect("redirect should be followed");
    assert_eq!(text, "arrived");
}

#[tokio::test]
async fn test_existing_bundle_skipped_unless_forced() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(primary_page(&[])))
        .mount(&primary)
        .await;

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());
    let record = record_in(&temp_dir);

    let first = build_article(&resolver, &client, &record, false).await.unwrap();
    assert!(matches!(first, BuildOutcome::Built { .. }));

    let second = build_article(&resolver, &client, &record, false).await.unwrap();
    assert!(matches!(second, BuildOutcome::Skipped));

    let forced = build_article(&resolver, &client, &record, true).await.unwrap();
    assert!(matches!(forced, BuildOutcome::Built { .. }));
}

#[tokio::test]
async fn test_page_without_article_container_fails_extraction() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    for server in [&primary, &secondary] {
        Mock::given(method("GET"))
            .and(path(format!("/html/{ARTICLE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>404 page in disguise</body></html>"))
            .mount(server)
            .await;
    }

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());
    let record = record_in(&temp_dir);

    let err = build_article(&resolver, &client, &record, false)
        .await
        .expect_err("extraction should fail");
    assert_eq!(err.stage(), "extraction");
    assert!(!ArticleBundle::exists_in(&record.output_dir));
}

#[tokio::test]
async fn test_batch_run_processes_only_enabled_records() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(format!("/html/{ARTICLE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(primary_page(&[])))
        .mount(&primary)
        .await;

    let client = fast_client();
    let resolver = resolver_for(&primary, &secondary, client.clone());

    let manifest = Manifest {
        articles: vec![
            ArticleRecord {
                id: ARTICLE_ID.to_string(),
                output_dir: temp_dir.path().join("enabled-paper"),
                enabled: true,
                latex_dir: None,
            },
            ArticleRecord {
                id: "9999.99999".to_string(),
                output_dir: temp_dir.path().join("disabled-paper"),
                enabled: false,
                latex_dir: None,
            },
        ],
    };

    let builder = BatchBuilder::new(resolver, client, BuildOptions::default());
    let stats = builder.run(&manifest).await;

    assert_eq!(stats.built(), 1);
    assert_eq!(stats.failed(), 0);
    assert_eq!(stats.total(), 1);
    assert!(ArticleBundle::exists_in(&temp_dir.path().join("enabled-paper")));
    assert!(!ArticleBundle::exists_in(&temp_dir.path().join("disabled-paper")));
}
