//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl cycle end-to-end against a temporary output directory.

use harvest_crawler::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use harvest_crawler::crawler::{run_crawl, Coordinator};
use harvest_crawler::output::{read_rows, ImageManifestRow, OutputLayout, PageLogRow};
use harvest_crawler::storage::{open_storage, RunStatus, Storage};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for a crawl of `start_url`
fn create_test_config(start_url: &str, output_dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            start_url: start_url.to_string(),
            max_pages: 20,
            max_depth: 1,
            allow_external: false,
            workers: 2,
            image_workers: 2,
            resume: false,
            sitemap: false,
            graceful_shutdown_secs: 2,
            default_delay_ms: 100,
            request_timeout_secs: 10,
            image_timeout_secs: 10,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        },
        output: OutputConfig {
            output_dir: output_dir.to_string_lossy().into_owned(),
            database_name: "crawl_state.db".to_string(),
        },
    }
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

fn page_rows(output_dir: &Path) -> Vec<PageLogRow> {
    read_rows(&OutputLayout::new(output_dir).page_log_path()).unwrap()
}

#[tokio::test]
async fn test_seed_with_two_links_and_one_image() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(
        &server,
        "/",
        r#"<html><body>
            <p>Welcome</p>
            <a href="/a">A</a>
            <a href="/b">B</a>
            <img src="/logo.png">
        </body></html>"#,
    )
    .await;
    mount_html(&server, "/a", "<p>Page A</p>").await;
    mount_html(&server, "/b", "<p>Page B</p>").await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89u8, 0x50, 0x4e, 0x47, 1, 2, 3, 4]),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&format!("{}/", base), dir.path());
    config.crawler.max_pages = 3;
    config.crawler.max_depth = 1;
    let db_path = config.output.database_path();

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.pages_processed, 3);
    assert_eq!(report.images_saved, 1);

    let rows = page_rows(dir.path());
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.status, "200");
        assert!(row.depth <= 1);
        if row.depth > 0 {
            assert_eq!(row.parent, format!("{}/", base));
        }
    }

    let layout = OutputLayout::new(dir.path());
    let images: Vec<ImageManifestRow> = read_rows(&layout.image_manifest_path()).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].image_url, format!("{}/logo.png", base));
    assert_eq!(images[0].size_bytes, 8);
    assert!(layout.image_path(&images[0].image_file).is_file());

    let store = open_storage(&db_path).unwrap();
    assert_eq!(store.frontier_len().unwrap(), 0);
    assert_eq!(store.stats().unwrap().visited, 3);

    assert!(layout.health_path().is_file());
}

#[tokio::test]
async fn test_identical_bodies_across_resumed_sessions() {
    let server = MockServer::start().await;
    let base = server.uri();
    let body = "<html><body><p>Exactly the same   content</p></body></html>";
    mount_html(&server, "/first", body).await;
    mount_html(&server, "/second", body).await;

    let dir = tempfile::tempdir().unwrap();
    let first = format!("{}/first", base);
    let second = format!("{}/second", base);

    let mut config = create_test_config(&first, dir.path());
    config.crawler.max_depth = 0;
    let db_path = config.output.database_path();
    run_crawl(config).await.unwrap();

    let mut config = create_test_config(&second, dir.path());
    config.crawler.max_depth = 0;
    config.crawler.resume = true;
    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.duplicates, 1);

    let store = open_storage(&db_path).unwrap();
    assert_eq!(store.stats().unwrap().fingerprints, 1);

    let canonical = store.get_page(&first).unwrap().unwrap();
    let duplicate = store.get_page(&second).unwrap().unwrap();
    assert!(!canonical.is_duplicate);
    assert!(duplicate.is_duplicate);
    assert_eq!(duplicate.duplicate_of, first);
    assert_eq!(duplicate.content_hash, canonical.content_hash);

    // The resumed session appended to the page log
    let urls: Vec<String> = page_rows(dir.path()).into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec![first.clone(), second.clone()]);

    let layout = OutputLayout::new(dir.path());
    assert!(layout.text_path(&first).is_file());
    assert!(!layout.text_path(&second).exists());
}

#[tokio::test]
async fn test_external_links_are_not_followed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(
        &server,
        "/",
        r#"<a href="/inside">in</a><a href="https://external.example.org/page">out</a>"#,
    )
    .await;
    mount_html(&server, "/inside", "<p>inside</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&format!("{}/", base), dir.path());
    let db_path = config.output.database_path();
    run_crawl(config).await.unwrap();

    let external = "https://external.example.org/page";
    let rows = page_rows(dir.path());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.url != external));

    let store = open_storage(&db_path).unwrap();
    assert!(store.get_page(external).unwrap().is_none());
    assert!(store.get_page(&format!("{}/inside", base)).unwrap().is_some());
}

#[tokio::test]
async fn test_robots_disallowed_page_is_denied() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;
    mount_html(&server, "/", r#"<a href="/private/secret">secret</a><a href="/open">open</a>"#).await;
    mount_html(&server, "/open", "<p>open</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&format!("{}/", base), dir.path());
    run_crawl(config).await.unwrap();

    let rows = page_rows(dir.path());
    let secret = rows
        .iter()
        .find(|r| r.url == format!("{}/private/secret", base))
        .expect("denied page is logged");
    assert_eq!(secret.status, "denied");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/private/secret"));
}

#[tokio::test]
async fn test_shutdown_mid_run_persists_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: Vec<String> = (1..=6).map(|i| format!("{}/slow{}", base, i)).collect();
    let seed_body: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">x</a>"#, link))
        .collect();
    mount_html(&server, "/", &seed_body).await;
    for i in 1..=6 {
        Mock::given(method("GET"))
            .and(path(format!("/slow{}", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(format!("<p>slow page {}</p>", i))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&format!("{}/", base), dir.path());
    config.crawler.graceful_shutdown_secs = 1;
    let db_path = config.output.database_path();

    let coordinator = Coordinator::new(config);
    let cancel = coordinator.cancel_token();
    let handle = tokio::spawn(coordinator.run());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();

    let started = std::time::Instant::now();
    let report = handle.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.status, RunStatus::Interrupted);
    assert!(report.frontier_remaining > 0);

    // Logs are closed and readable
    let rows = page_rows(dir.path());
    assert!(rows.iter().any(|r| r.url == format!("{}/", base)));
    let layout = OutputLayout::new(dir.path());
    let _: Vec<ImageManifestRow> = read_rows(&layout.image_manifest_path()).unwrap();

    // Every discovered link is either visited or still pending
    let store = open_storage(&db_path).unwrap();
    let pending: HashSet<String> = store
        .pop_frontier_batch(100)
        .unwrap()
        .into_iter()
        .map(|entry| entry.url)
        .collect();
    assert!(!pending.is_empty());
    for link in &links {
        let visited = store
            .get_page(link)
            .unwrap()
            .map(|page| page.visited)
            .unwrap_or(false);
        assert!(visited || pending.contains(link), "{} was dropped", link);
    }

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_resume_continues_from_saved_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", r#"<a href="/next">next</a>"#).await;
    mount_html(&server, "/next", "<p>next page</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let seed = format!("{}/", base);

    // Budget of one page leaves the discovered link pending
    let mut config = create_test_config(&seed, dir.path());
    config.crawler.max_pages = 1;
    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.pages_processed, 1);

    let mut config = create_test_config(&seed, dir.path());
    config.crawler.resume = true;
    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.pages_processed, 1);

    let urls: Vec<String> = page_rows(dir.path()).into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec![seed, format!("{}/next", base)]);
}

#[tokio::test]
async fn test_unreadable_frontier_store_falls_back_to_seed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", "<p>seed page</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let seed = format!("{}/", base);
    let mut config = create_test_config(&seed, dir.path());
    config.crawler.max_depth = 0;
    config.crawler.resume = true;

    // A frontier table from an incompatible layout makes every frontier query fail
    let conn = rusqlite::Connection::open(config.output.database_path()).unwrap();
    conn.execute(
        "CREATE TABLE frontier (url TEXT PRIMARY KEY, depth INTEGER NOT NULL)",
        [],
    )
    .unwrap();
    drop(conn);

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.pages_processed, 1);

    let rows = page_rows(dir.path());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, seed);
    assert_eq!(rows[0].status, "200");
}
