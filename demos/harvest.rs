//! Harvest example
//!
//! This example demonstrates the core functionality of timeline-dl:
//! - Loading session credentials from the environment
//! - Creating a harvester instance
//! - Subscribing to events
//! - Collecting a subject's stream with Ctrl+C cancellation
//! - Exporting and, optionally, uploading the result
//!
//! ```bash
//! TIMELINE_BEARER=... TIMELINE_CSRF_TOKEN=... TIMELINE_COOKIE=... \
//!     cargo run --example harvest -- rustlang 200
//! ```

use std::sync::Arc;
use timeline_dl::config::Config;
use timeline_dl::export::{self, SubjectMeta};
use timeline_dl::{
    CancellationToken, Credentials, Event, Harvester, HttpUploader, StaticSession,
    cancel_on_signal,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let handle = args.next().ok_or("usage: harvest <handle> [count]")?;
    let target: usize = args.next().map(|c| c.parse()).transpose()?.unwrap_or(100);

    // Session credentials of a logged-in web client
    let credentials = Credentials::new(
        std::env::var("TIMELINE_BEARER")?,
        std::env::var("TIMELINE_CSRF_TOKEN")?,
    )
    .with_cookie(std::env::var("TIMELINE_COOKIE")?);
    let session = StaticSession::new(credentials).with_handle(handle.clone());

    // Optional JSON config file
    let config = match std::env::var("TIMELINE_CONFIG") {
        Ok(path) => Config::from_json_file(path)?,
        Err(_) => Config::default(),
    };
    let upload_config = config.upload.clone();

    let harvester = Harvester::with_http(config, Arc::new(session))?;

    // Subscribe to events
    let mut events = harvester.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::PageFetched { page, items, total } => {
                    println!("✓ Page {}: {} items ({} total)", page, items, total);
                }
                Event::RetryScheduled {
                    page,
                    class,
                    delay_ms,
                    ..
                } => {
                    println!("⏳ Page {} {}, retrying in {}ms", page, class, delay_ms);
                }
                Event::PageFailed { page, error } => {
                    println!("✗ Page {} failed: {}", page, error);
                }
                Event::Stopped { reason, total } => {
                    println!("■ Stopped ({}) after {} items", reason, total);
                }
                Event::Uploaded { url, .. } => {
                    println!("📤 Uploaded to {}", url);
                }
                _ => {}
            }
        }
    });

    // Ctrl+C stops collection and keeps what was gathered
    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    match (upload_config.endpoint.is_some(), std::env::var("TIMELINE_UPLOAD_TOKEN")) {
        (true, Ok(token)) => {
            let uploader = HttpUploader::new(&upload_config)?;
            let outcome = harvester
                .harvest_with_cancel(target, &uploader, &token, cancel)
                .await?;
            if let Err(e) = &outcome.delivery {
                eprintln!("upload failed: {}", e);
                let path = outcome.payload.filename();
                std::fs::write(&path, outcome.payload.to_json()?)?;
                println!("saved locally to {}", path);
            }
        }
        _ => {
            let subject = harvester.resolve_subject(&handle).await?;
            let report = harvester
                .fetch_all_with_cancel(&subject, target, cancel)
                .await?
                .truncated(target);

            for item in report.newest(5) {
                println!("{}  ❤ {:>6}  {}", item.created_at, item.engagement.likes, item.text);
            }

            let meta = SubjectMeta::new(subject).with_username(handle);
            let payload = export::export(&report.items, &meta, chrono::Utc::now());
            let path = payload.filename();
            std::fs::write(&path, payload.to_json()?)?;
            println!("saved {} items to {}", report.items.len(), path);
        }
    }

    Ok(())
}
