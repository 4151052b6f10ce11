use fileupdown_client::format::{file_icon, format_date, format_size};
use fileupdown_client::notify::TracingNotifier;
use fileupdown_client::ui::{Shell, Tab, UploadOptions};
use fileupdown_client::{ClientOptions, FileManager};
use reqwest::header::HeaderMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "files": [{
            "file_id": "3f1c",
            "original_filename": "report.pdf",
            "file_extension": ".pdf",
            "file_size": 1536,
            "upload_date": "2024-03-01T10:00:00",
            "description": "Q1 numbers"
          }],
          "total": 1,
          "page": 1,
          "per_page": 20,
          "total_pages": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "total_files": 1,
          "total_size_bytes": 1536,
          "total_size_formatted": "1.5 KB",
          "max_file_size": 104857600,
          "allowed_extensions": [".pdf", ".txt"]
        })))
        .mount(&server)
        .await;

    let client = FileManager::new(ClientOptions {
        base_url: Some(server.uri()),
        timeout: Some(Duration::from_secs(2)),
        default_headers: HeaderMap::new(),
    })?;
    let mut shell = Shell::new(&client, Arc::new(TracingNotifier), UploadOptions::default());

    shell.select(Tab::Files);
    shell.files.load().await?;
    for file in shell.files.visible_files() {
        println!(
            "{} {} {} {}",
            file_icon(&file.file_extension),
            file.original_filename,
            format_size(file.file_size),
            format_date(&file.upload_date)
        );
    }

    shell.select(Tab::Stats);
    shell.stats.load().await?;
    if let Some(view) = shell.stats.view() {
        println!(
            "files={} used={} max={}",
            view.total_files, view.total_size_formatted, view.max_file_size_formatted
        );
    }

    Ok(())
}
