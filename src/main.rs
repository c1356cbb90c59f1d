use clap::Parser;
use conftrack::{
    ConferenceDraft, ConferenceEngine, DevEventsSource, EngineConfig, FeedFilter, SortKey,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "conftrack", about = "Conference engagement and aggregation engine")]
struct Args {
    /// External conference feed to ingest on startup.
    #[arg(long, default_value = DevEventsSource::DEFAULT_URL)]
    feed_url: String,

    /// Skip the feed pull and only seed the demo data.
    #[arg(long)]
    skip_feed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("starting conference engine");
    let config = EngineConfig::default();
    let fetch_config = config.fetch.clone();
    let engine = Arc::new(ConferenceEngine::new(config));

    // Seed a native record so the feed has something to merge alongside.
    let organizer = 1;
    let seeded = engine
        .create_conference(
            organizer,
            ConferenceDraft {
                name: "International Conference on Machine Learning".to_string(),
                acronym: Some("ICML".to_string()),
                publisher: Some("ACM".to_string()),
                location: Some("Vienna, Austria".to_string()),
                topics: Some("machine learning, AI".to_string()),
                ..Default::default()
            },
        )
        .await?;
    info!(
        "seeded native conference {} ({})",
        seeded.conference.id, seeded.conference.name
    );

    if !args.skip_feed {
        let mut source = DevEventsSource::new(args.feed_url.clone(), fetch_config)?;
        match engine.refresh_from(&mut source).await {
            Ok(summary) => info!(
                "feed ingestion: {} received, {} stored, {} replaced, {} failed",
                summary.received,
                summary.stored,
                summary.replaced,
                summary.failed.len()
            ),
            Err(e) => error!("feed ingestion failed: {}", e),
        }
    }

    let stats = engine.stats().await;
    info!(
        "engine holds {} conferences ({} native, {} external)",
        stats.total_conferences, stats.native_conferences, stats.external_conferences
    );

    let top = engine
        .get_conferences(&FeedFilter::default(), Some(SortKey::NameAsc))
        .await?;
    for view in top.iter().take(10) {
        info!(
            "  {} [{}] rating={:?} credibility={:.1}",
            view.conference.name,
            view.category,
            view.display_rating(),
            view.display_credibility()
        );
    }

    engine.shutdown();
    Ok(())
}
