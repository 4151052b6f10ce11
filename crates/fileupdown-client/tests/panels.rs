use fileupdown_client::cache::{keys, QueryCache};
use fileupdown_client::notify::{Level, NotificationLog};
use fileupdown_client::resources::files::UploadFile;
use fileupdown_client::ui::{
    FileListPanel, Shell, StatsPanel, Tab, UploadOptions, UploadPanel, UploadStatus,
};
use fileupdown_client::{ClientOptions, FileManager};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn client_for(server: &MockServer) -> FileManager {
    FileManager::new(ClientOptions {
        base_url: Some(server.uri()),
        timeout: Some(Duration::from_secs(5)),
        default_headers: HeaderMap::new(),
    })
    .unwrap()
}

fn record(file_id: &str, name: &str, description: Option<&str>) -> Value {
    json!({
      "id": 1,
      "file_id": file_id,
      "filename": format!("{file_id}.bin"),
      "original_filename": name,
      "file_size": 4096,
      "mime_type": "application/octet-stream",
      "file_extension": ".txt",
      "upload_date": "2024-03-01T10:00:00",
      "description": description,
      "download_url": format!("/api/v1/download/{file_id}")
    })
}

fn stats_body(total_files: u64) -> Value {
    json!({
      "total_files": total_files,
      "total_size_bytes": 4096 * total_files,
      "total_size_formatted": "4.0 KB",
      "max_file_size": 104857600,
      "allowed_extensions": [".txt", ".pdf", ".png"]
    })
}

async fn mount_listing(server: &MockServer, files: Vec<Value>) {
    let total = files.len();
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "files": files,
          "total": total,
          "page": 1,
          "per_page": 20,
          "total_pages": 1
        })))
        .mount(server)
        .await;
}

async fn mount_stats(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats_body(2)))
        .mount(server)
        .await;
}

async fn count(server: &MockServer, verb: &str, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .count()
}

fn sparse_file(dir: &tempfile::TempDir, name: &str, len: u64) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(len).unwrap();
    path
}

#[tokio::test]
async fn drop_batch_rejects_oversized_and_refreshes_views() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![record("a", "report.pdf", None)]).await;
    mount_stats(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record(
            "new",
            "small.txt",
            Some("batch A"),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cache = QueryCache::new();
    let log = NotificationLog::new();
    let mut upload = UploadPanel::new(
        client.files.clone(),
        cache.clone(),
        Arc::new(log.clone()),
        UploadOptions::default(),
    );
    let mut list = FileListPanel::new(client.files.clone(), cache.clone(), Arc::new(log.clone()));
    let stats = StatsPanel::new(client.stats.clone(), cache.clone());

    list.load().await.unwrap();
    stats.load().await.unwrap();
    // fresh reads are served from the cache
    list.load().await.unwrap();
    stats.load().await.unwrap();
    assert_eq!(count(&server, "GET", "/api/v1/files").await, 1);
    assert_eq!(count(&server, "GET", "/api/v1/stats").await, 1);

    let dir = tempfile::tempdir().unwrap();
    let huge = UploadFile::from_path(sparse_file(&dir, "huge.iso", 110 * 1024 * 1024))
        .await
        .unwrap();
    let small = UploadFile::from_bytes("small.txt", vec![7u8; 4 * 1024 * 1024]);

    upload.set_description("batch A");
    let batch = upload.drop_files(vec![small, huge]);
    assert_eq!(batch.accepted.len(), 1);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].filename, "huge.iso");

    let id = batch.accepted[0];
    assert_eq!(upload.task(id).unwrap().status, UploadStatus::Uploading);
    batch.join().await;

    let task = upload.task(id).unwrap();
    assert_eq!(task.status, UploadStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.record.unwrap().file_id, "new");

    let posts: Vec<Request> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    assert_eq!(posts.len(), 1);
    let body = String::from_utf8_lossy(&posts[0].body);
    assert!(body.contains("filename=\"small.txt\""));
    assert!(body.contains("batch A"));
    assert!(!body.contains("huge.iso"));

    list.load().await.unwrap();
    stats.load().await.unwrap();
    assert_eq!(count(&server, "GET", "/api/v1/files").await, 2);
    assert_eq!(count(&server, "GET", "/api/v1/stats").await, 2);

    let entries = log.entries();
    assert!(entries
        .iter()
        .any(|n| n.level == Level::Success && n.message == "File \"small.txt\" uploaded successfully!"));
    assert!(entries
        .iter()
        .any(|n| n.level == Level::Error && n.message.contains("huge.iso")));
}

#[tokio::test]
async fn upload_413_marks_task_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cache = QueryCache::new();
    let mut events = cache.subscribe();
    let log = NotificationLog::new();
    let upload = UploadPanel::new(
        client.files.clone(),
        cache,
        Arc::new(log.clone()),
        UploadOptions::default(),
    );

    let batch = upload.drop_files(vec![UploadFile::from_bytes("movie.mp4", vec![0u8; 2048])]);
    let id = batch.accepted[0];
    batch.join().await;

    let task = upload.task(id).unwrap();
    assert_eq!(task.status, UploadStatus::Error);
    assert_eq!(
        task.error.as_deref(),
        Some("File too large. Please choose a smaller file.")
    );
    assert_eq!(
        log.errors(),
        ["Failed to upload \"movie.mp4\": File too large. Please choose a smaller file."]
    );
    // failures never invalidate
    assert!(events.try_recv().is_err());
}

struct ByFilename;

impl Respond for ByFilename {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if String::from_utf8_lossy(&request.body).contains("filename=\"bad.txt\"") {
            ResponseTemplate::new(500).set_body_json(json!({"detail": "disk full"}))
        } else {
            ResponseTemplate::new(200).set_body_json(record("ok", "good.txt", None))
        }
    }
}

#[tokio::test]
async fn batch_outcomes_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(ByFilename)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let upload = UploadPanel::new(
        client.files.clone(),
        QueryCache::new(),
        Arc::new(NotificationLog::new()),
        UploadOptions::default(),
    );

    let batch = upload.drop_files(vec![
        UploadFile::from_bytes("good.txt", b"fine".to_vec()),
        UploadFile::from_bytes("bad.txt", b"broken".to_vec()),
    ]);
    let (good, bad) = (batch.accepted[0], batch.accepted[1]);
    batch.join().await;

    assert_eq!(upload.task(good).unwrap().status, UploadStatus::Completed);
    let failed = upload.task(bad).unwrap();
    assert_eq!(failed.status, UploadStatus::Error);
    assert_eq!(
        failed.error.as_deref(),
        Some("Server error. Please try again later.")
    );

    upload.clear_completed();
    assert!(upload.tasks().is_empty());
}

#[tokio::test]
async fn description_is_sent_as_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record("d", "notes.txt", None)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut upload = UploadPanel::new(
        client.files.clone(),
        QueryCache::new(),
        Arc::new(NotificationLog::new()),
        UploadOptions::default(),
    );

    upload.set_description("  batch A  ");
    upload
        .drop_files(vec![UploadFile::from_bytes("notes.txt", b"n".to_vec())])
        .join()
        .await;
    upload.set_description("   ");
    upload
        .drop_files(vec![UploadFile::from_bytes("blank.txt", b"b".to_vec())])
        .join()
        .await;
    upload.set_description("");
    upload
        .drop_files(vec![UploadFile::from_bytes("none.txt", b"x".to_vec())])
        .join()
        .await;

    let bodies: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect();
    assert_eq!(bodies.len(), 3);
    assert!(bodies[0].contains("name=\"description\"\r\n\r\n  batch A  \r\n"));
    assert!(bodies[1].contains("name=\"description\"\r\n\r\n   \r\n"));
    assert!(!bodies[2].contains("name=\"description\""));
}

#[tokio::test]
async fn removing_a_row_does_not_cancel_the_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(record("late", "late.txt", None)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cache = QueryCache::new();
    let mut events = cache.subscribe();
    let log = NotificationLog::new();
    let upload = UploadPanel::new(
        client.files.clone(),
        cache,
        Arc::new(log.clone()),
        UploadOptions {
            max_concurrent: Some(1),
            ..UploadOptions::default()
        },
    );

    let batch = upload.drop_files(vec![UploadFile::from_bytes("late.txt", b"x".to_vec())]);
    assert!(upload.remove_task(batch.accepted[0]));
    batch.join().await;

    assert!(upload.tasks().is_empty());
    assert_eq!(count(&server, "POST", "/api/v1/upload").await, 1);
    assert_eq!(events.recv().await.unwrap().scope, keys::LISTING);
    assert_eq!(log.entries()[0].level, Level::Success);
}

#[tokio::test]
async fn delete_not_found_leaves_listing_untouched() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        vec![
            record("a", "report.pdf", None),
            record("gone", "notes.txt", None),
        ],
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "File not found"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let log = NotificationLog::new();
    let mut list = FileListPanel::new(client.files.clone(), QueryCache::new(), Arc::new(log.clone()));
    list.load().await.unwrap();
    let before = list.listing().unwrap().clone();

    let target = list.visible_files()[1].clone();
    let err = list.delete(&target, &|_: &str| true).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(log.errors(), ["Failed to delete file: File not found"]);
    assert_eq!(list.listing().unwrap(), &before);
    assert_eq!(count(&server, "GET", "/api/v1/files").await, 1);
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![record("a", "report.pdf", None)]).await;

    let client = client_for(&server);
    let mut list = FileListPanel::new(
        client.files.clone(),
        QueryCache::new(),
        Arc::new(NotificationLog::new()),
    );
    list.load().await.unwrap();

    let target = list.visible_files()[0].clone();
    let prompt = std::cell::RefCell::new(String::new());
    let outcome = list
        .delete(&target, &|p: &str| {
            prompt.borrow_mut().push_str(p);
            false
        })
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(
        *prompt.borrow(),
        "Are you sure you want to delete \"report.pdf\"?"
    );
    assert_eq!(count(&server, "DELETE", "/api/v1/files/a").await, 0);
}

#[tokio::test]
async fn confirmed_delete_refreshes_listing() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![record("a", "report.pdf", None)]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "message": "File deleted successfully",
          "file_id": "a"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cache = QueryCache::new();
    let log = NotificationLog::new();
    let mut list = FileListPanel::new(client.files.clone(), cache.clone(), Arc::new(log.clone()));
    list.load().await.unwrap();

    let target = list.visible_files()[0].clone();
    let deleted = list.delete(&target, &|_: &str| true).await.unwrap();
    assert_eq!(deleted.unwrap().file_id, "a");
    assert_eq!(count(&server, "GET", "/api/v1/files").await, 2);
    assert_eq!(log.entries()[0].message, "File deleted successfully!");
}

#[tokio::test]
async fn paging_keeps_previous_data_and_respects_bounds() {
    let server = MockServer::start().await;
    for page in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path("/api/v1/files"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
              "files": [record(&format!("p{page}"), &format!("page{page}.txt"), None)],
              "total": 25,
              "page": page.parse::<u32>().unwrap(),
              "per_page": 20,
              "total_pages": 2
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut list = FileListPanel::new(
        client.files.clone(),
        QueryCache::new(),
        Arc::new(NotificationLog::new()),
    );
    list.load().await.unwrap();

    let nav = list.pagination().unwrap();
    assert!(!nav.has_previous());
    assert!(nav.has_next());
    assert!(!list.previous_page().await.unwrap());

    assert!(list.next_page().await.unwrap());
    assert_eq!(list.page(), 2);
    let nav = list.pagination().unwrap();
    assert!(nav.has_previous());
    assert!(!nav.has_next());
    assert_eq!(nav.summary(), "Showing 21 to 25 of 25 files");
    assert!(!list.next_page().await.unwrap());

    // a failing page leaves the last good one on screen
    assert!(list.set_page(3).await.is_err());
    assert_eq!(list.visible_files()[0].file_id, "p2");
    assert_eq!(list.page(), 2);
    let nav = list.pagination().unwrap();
    assert_eq!(nav.page, 2);
    assert_eq!(nav.summary(), "Showing 21 to 25 of 25 files");
    assert!(nav.has_previous());
    assert!(!nav.has_next());

    list.set_search("PAGE2");
    assert_eq!(list.visible_files().len(), 1);
    list.set_search("page1");
    assert!(list.visible_files().is_empty());
    assert_eq!(list.empty_message(), Some("No files match your search."));
}

#[tokio::test]
async fn download_saves_under_original_name() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![record("a", "report.pdf", None)]).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/download/a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"content".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/download/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let log = NotificationLog::new();
    let mut list = FileListPanel::new(client.files.clone(), QueryCache::new(), Arc::new(log.clone()));
    list.load().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let target = list.visible_files()[0].clone();
    let saved = list.download(&target, dir.path()).await.unwrap();
    assert_eq!(saved, dir.path().join("report.pdf"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"content");

    let mut missing = target.clone();
    missing.file_id = "missing".to_string();
    assert!(list.download(&missing, dir.path()).await.is_err());
    assert_eq!(log.errors(), ["Failed to download file: File not found"]);
    assert_eq!(list.listing().unwrap().files.len(), 1);
}

#[tokio::test]
async fn stats_refresher_follows_interval_and_invalidations() {
    let server = MockServer::start().await;
    mount_stats(&server).await;

    let client = client_for(&server);
    let cache = QueryCache::new();
    let stats = StatsPanel::new(client.stats.clone(), cache.clone());
    let handle = stats.spawn_refresher(Duration::from_secs(3600));

    let mut view = None;
    for _ in 0..200 {
        view = stats.view();
        if view.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let view = view.expect("stats never loaded");
    assert_eq!(view.total_files, 2);
    assert_eq!(view.max_file_size_formatted, "100 MB");
    assert_eq!(view.extension_count(), 3);

    cache.invalidate(keys::LISTING);
    cache.invalidate(keys::STATS);
    wait_for(&server, "/api/v1/stats", 2).await;
    handle.stop().await;

    let fast = stats.spawn_refresher(Duration::from_millis(20));
    wait_for(&server, "/api/v1/stats", 4).await;
    fast.stop().await;
}

async fn wait_for(server: &MockServer, route: &str, at_least: usize) {
    for _ in 0..200 {
        if count(server, "GET", route).await >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected at least {at_least} requests to {route}");
}

#[tokio::test]
async fn shell_switches_tabs_over_shared_cache() {
    let server = MockServer::start().await;
    mount_listing(&server, vec![]).await;

    let client = client_for(&server);
    let mut shell = Shell::new(&client, Arc::new(NotificationLog::new()), UploadOptions::default());
    assert_eq!(shell.active(), Tab::Upload);

    shell.select(Tab::Files);
    assert_eq!(shell.active(), Tab::Files);
    shell.files.load().await.unwrap();
    assert_eq!(shell.files.empty_message(), Some("No files uploaded yet."));

    let titles: Vec<_> = Tab::ALL.iter().map(|t| t.title()).collect();
    assert_eq!(titles, ["Upload", "Files", "Stats"]);
}
