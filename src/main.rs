use anyhow::Result;
use dotenvy::dotenv;
use futures::StreamExt;
use motorhub::notifications::LogSender;
use motorhub::search::TantivyIndex;
use motorhub::storage::MySqlStore;
use motorhub::{CommunityEngine, PostEvent};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let store = MySqlStore::connect(&database_url).await?;
    let index = TantivyIndex::new()?;
    let engine = Arc::new(CommunityEngine::new(store, index, Arc::new(LogSender)));

    // Log content events as they reach the index.
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Some(Ok(event)) = events.next().await {
            match event {
                PostEvent::Created(post) => info!(id = post.id, title = %post.title, "post indexed"),
                PostEvent::Updated(post) => info!(id = post.id, title = %post.title, "post re-indexed"),
                PostEvent::Deleted(id) => info!(id, "post dropped from index"),
            }
        }
    });

    let indexed = engine.rebuild_index().await?;
    info!(indexed, "index rebuilt from active posts");

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "brake pads".to_string());

    let results = engine.search(&query, 10).await;
    println!("Search results for {query:?}:");
    if results.is_empty() {
        println!("No posts found.");
    } else {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    Ok(())
}
