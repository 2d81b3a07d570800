//! End-to-end watch cycles against canned pages.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use listwatch::error::Result;
use listwatch::models::{ExtractorConfig, ListingRecord, SourceConfig, listing_id};
use listwatch::pipeline::{CycleKind, CycleStatus, Watcher, start_of_day};
use listwatch::services::{FetchClient, ListingExtractor, Notifier, StaticPageFetcher};
use listwatch::storage::{MemoryRecordStore, RecordStore};

const DOMAIN: &str = "https://listings.test";

#[derive(Default)]
struct CollectingNotifier {
    sent: Mutex<Vec<ListingRecord>>,
}

impl CollectingNotifier {
    fn links(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.link.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, record: &ListingRecord) -> Result<()> {
        self.sent.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn card(slug: &str, city: Option<&str>) -> String {
    let location = match city {
        Some(city) => format!("<span>{city}</span><span>Center</span>"),
        None => String::new(),
    };
    format!(
        r#"<a href="/item/{slug}"><div class="_listingCard__PoR_B">
             <h4>Apartment {slug}</h4>
             <p class="_price__X51mi">5,000</p>
             {location}
           </div></a>"#
    )
}

fn page(cards: &[String]) -> String {
    format!("<html><body><main>{}</main></body></html>", cards.concat())
}

fn source() -> SourceConfig {
    SourceConfig {
        domain: DOMAIN.to_string(),
        endpoint_path: "/rent".to_string(),
        blocked_sentinel: "blocked".to_string(),
    }
}

fn watcher(
    fetcher: Arc<StaticPageFetcher>,
    store: Arc<MemoryRecordStore>,
    notifier: Arc<CollectingNotifier>,
) -> Watcher {
    let fetch = FetchClient::new(fetcher, source(), Duration::from_secs(5));
    let extractor = ListingExtractor::new(DOMAIN, &ExtractorConfig::default()).unwrap();
    Watcher::new(fetch, extractor, store, notifier, Duration::from_secs(180))
}

fn noon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
}

fn requested_watermark(url: &str) -> i64 {
    url.rsplit(',').next().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_second_cycle_announces_only_the_new_listing() {
    let first_page = page(&[
        card("a", Some("Haifa")),
        card("b", Some("Haifa")),
        card("c", Some("Haifa")),
    ]);
    let second_page = page(&[
        card("d", Some("Haifa")),
        card("a", Some("Haifa")),
        card("b", Some("Haifa")),
        card("c", Some("Haifa")),
    ]);
    let fetcher = Arc::new(
        StaticPageFetcher::new()
            .with_markup(first_page)
            .with_markup(second_page),
    );
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(CollectingNotifier::default());
    let w = watcher(fetcher.clone(), store.clone(), notifier.clone());

    let first_start = noon();
    let first = w.run_cycle_at(CycleKind::Initial, first_start).await.unwrap();
    assert_eq!(first.status, CycleStatus::Completed);
    assert_eq!(first.candidates, 3);
    assert_eq!(first.new, 3);
    assert_eq!(first.persisted, 3);
    assert_eq!(first.notified, 3);

    let second_start = first_start + chrono::Duration::seconds(180);
    let second = w.run_cycle_at(CycleKind::Periodic, second_start).await.unwrap();
    assert_eq!(second.candidates, 4);
    assert_eq!(second.seen, 3);
    assert_eq!(second.new, 1);
    assert_eq!(second.persisted, 1);
    assert_eq!(second.notified, 1);

    assert_eq!(store.len().await.unwrap(), 4);
    assert_eq!(
        notifier.links(),
        vec![
            format!("{DOMAIN}/item/a"),
            format!("{DOMAIN}/item/b"),
            format!("{DOMAIN}/item/c"),
            format!("{DOMAIN}/item/d"),
        ]
    );

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("https://listings.test/rent?create_time=gte,"));
    assert_eq!(requested_watermark(&requests[0]), start_of_day(&first_start));
    assert_eq!(
        requested_watermark(&requests[1]),
        second_start.timestamp() - 180
    );
}

#[tokio::test]
async fn test_cards_without_location_are_skipped() {
    let markup = page(&[
        card("a", Some("Haifa")),
        card("b", None),
        card("c", Some("Akko")),
    ]);
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(CollectingNotifier::default());
    let w = watcher(
        Arc::new(StaticPageFetcher::new().with_markup(markup)),
        store.clone(),
        notifier.clone(),
    );

    let report = w.run_cycle_at(CycleKind::Initial, noon()).await.unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.notified, 2);
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent[1].location, "Akko Center");
}

#[tokio::test]
async fn test_blocked_page_leaves_state_untouched() {
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(CollectingNotifier::default());
    let w = watcher(
        Arc::new(
            StaticPageFetcher::new()
                .with_markup("<html><body><p>You are blocked</p></body></html>"),
        ),
        store.clone(),
        notifier.clone(),
    );

    let report = w.run_cycle_at(CycleKind::Periodic, noon()).await.unwrap();

    assert_eq!(report.status, CycleStatus::Blocked);
    assert_eq!(store.len().await.unwrap(), 0);
    assert!(notifier.links().is_empty());
}

#[tokio::test]
async fn test_stored_ids_are_link_digests() {
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = Arc::new(CollectingNotifier::default());
    let w = watcher(
        Arc::new(StaticPageFetcher::new().with_markup(page(&[card("a", Some("Haifa"))]))),
        store.clone(),
        notifier,
    );

    w.run_cycle_at(CycleKind::Initial, noon()).await.unwrap();

    let link = format!("{DOMAIN}/item/a");
    let stored = store.get_by_id(&listing_id(&link)).await.unwrap().unwrap();
    assert_eq!(stored.link, link);
    assert_eq!(stored.id, listing_id(&link));
    assert_eq!(store.get_by_link(&link).await.unwrap(), Some(stored));
}
