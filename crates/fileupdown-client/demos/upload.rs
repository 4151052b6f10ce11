use fileupdown_client::cache::QueryCache;
use fileupdown_client::format::format_size;
use fileupdown_client::notify::TracingNotifier;
use fileupdown_client::resources::files::UploadFile;
use fileupdown_client::ui::{UploadOptions, UploadPanel, UploadStatus};
use fileupdown_client::{ClientOptions, FileManager};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("usage: cargo run -p fileupdown-client --example upload -- <path>... [--description <text>]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut paths = Vec::new();
    let mut description = String::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--description" {
            description = args.next().unwrap_or_else(|| usage());
        } else {
            paths.push(arg);
        }
    }
    if paths.is_empty() {
        usage();
    }

    let client = FileManager::new(ClientOptions::default())?;
    let mut panel = UploadPanel::new(
        client.files.clone(),
        QueryCache::new(),
        Arc::new(TracingNotifier),
        UploadOptions::default(),
    );
    panel.set_description(description);

    let mut files = Vec::new();
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }

    let batch = panel.drop_files(files);
    for rejected in &batch.rejected {
        println!("rejected {} ({})", rejected.filename, format_size(rejected.size));
    }
    batch.join().await;

    for task in panel.tasks() {
        match task.status {
            UploadStatus::Completed => {
                let id = task.record.map(|r| r.file_id).unwrap_or_default();
                println!("uploaded {} id={id}", task.filename);
            }
            _ => println!(
                "failed {}: {}",
                task.filename,
                task.error.unwrap_or_default()
            ),
        }
    }
    Ok(())
}
