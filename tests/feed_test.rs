use conftrack::{
    ConferenceEngine, ConferenceId, DevEventsParser, EngineConfig, FeedFilter, SortKey, Source,
};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

const FEED_V1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>dev.events</title>
    <item>
      <title>Clean Code: The Next Level</title>
      <link>https://dev.events/conferences/clean-code</link>
      <description>Clean Code: The Next Level is happening on September 24, 2026, Online. More information: https://dev.events/conferences/clean-code</description>
    </item>
    <item>
      <title>AI Engineering Summit</title>
      <link>https://dev.events/conferences/ai-summit</link>
      <description>AI Engineering Summit is happening on November 3, 2026, Berlin. More information: https://dev.events/conferences/ai-summit</description>
    </item>
  </channel>
</rss>"#;

const FEED_V2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>dev.events</title>
    <item>
      <title>Clean Code: The Next Level</title>
      <link>https://dev.events/conferences/clean-code</link>
      <description>Clean Code: The Next Level is happening on October 1, 2026, Online. More information: https://dev.events/conferences/clean-code</description>
    </item>
  </channel>
</rss>"#;

fn engine() -> Arc<ConferenceEngine> {
    Arc::new(ConferenceEngine::new(EngineConfig::default()))
}

#[tokio::test]
async fn ingesting_the_same_feed_twice_is_idempotent() {
    init_tracing();
    let engine = engine();

    let mut parser = DevEventsParser::new();
    let batch = parser.parse(FEED_V1).unwrap();
    let first = engine.ingest_feed(batch).await;
    assert_eq!((first.stored, first.replaced), (2, 0));

    parser.clear_seen();
    let batch = parser.parse(FEED_V1).unwrap();
    let second = engine.ingest_feed(batch).await;
    assert_eq!((second.stored, second.replaced), (0, 2));

    let stats = engine.stats().await;
    assert_eq!(stats.external_conferences, 2);
    engine.shutdown();
}

#[tokio::test]
async fn reingestion_updates_fields_but_keeps_engagement() {
    init_tracing();
    let engine = engine();

    let mut parser = DevEventsParser::new();
    engine.ingest_feed(parser.parse(FEED_V1).unwrap()).await;

    let id = ConferenceId::External("https://dev.events/conferences/clean-code".to_string());
    engine.submit_rating(10, &id, 5).await.unwrap();
    engine.toggle_interest(10, &id).await.unwrap();

    // Updated payload for the same external id.
    parser.clear_seen();
    engine.ingest_feed(parser.parse(FEED_V2).unwrap()).await;

    let detail = engine.get_conference(&id).await.unwrap();
    assert_eq!(
        detail.view.conference.start_date,
        chrono::NaiveDate::from_ymd_opt(2026, 10, 1)
    );
    // Ratings and follows key off the identity and survive the replace.
    assert_eq!(detail.view.average_rating, Some(5.0));
    assert_eq!(detail.view.follower_count, 1);
    engine.shutdown();
}

#[tokio::test]
async fn external_records_reject_user_edits() {
    init_tracing();
    let engine = engine();

    let mut parser = DevEventsParser::new();
    engine.ingest_feed(parser.parse(FEED_V1).unwrap()).await;

    let id = ConferenceId::External("https://dev.events/conferences/ai-summit".to_string());
    let err = engine
        .edit_conference(
            10,
            &id,
            conftrack::ConferenceDraft {
                name: "Hijacked".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, conftrack::EngineError::Unauthorized(_)));

    let err = engine.delete_conference(10, &id).await.unwrap_err();
    assert!(matches!(err, conftrack::EngineError::Unauthorized(_)));
    engine.shutdown();
}

#[tokio::test]
async fn merged_feed_partitions_by_source() {
    init_tracing();
    let engine = engine();

    engine
        .create_conference(
            1,
            conftrack::ConferenceDraft {
                name: "Native AI Workshop".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let mut parser = DevEventsParser::new();
    engine.ingest_feed(parser.parse(FEED_V1).unwrap()).await;

    let (native, external) = engine
        .get_conferences_by_source(&FeedFilter::default(), Some(SortKey::NameAsc))
        .await
        .unwrap();
    assert_eq!(native.len(), 1);
    assert_eq!(external.len(), 2);
    assert!(native.iter().all(|v| v.conference.source() == Source::Native));
    assert!(external
        .iter()
        .all(|v| v.conference.source() == Source::ExternalFeed));

    // External records are trusted less, so with equal (zero) rating volume
    // their credibility sits below the native record's.
    assert!(external[0].credibility < native[0].credibility);
    engine.shutdown();
}

#[tokio::test]
async fn feed_records_are_categorized_by_rule_table() {
    init_tracing();
    let engine = engine();

    let mut parser = DevEventsParser::new();
    engine.ingest_feed(parser.parse(FEED_V1).unwrap()).await;

    let id = ConferenceId::External("https://dev.events/conferences/ai-summit".to_string());
    let detail = engine.get_conference(&id).await.unwrap();
    assert_eq!(detail.view.category, "artificial-intelligence");
    engine.shutdown();
}
