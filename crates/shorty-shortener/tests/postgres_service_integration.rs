use std::sync::Arc;
use std::time::Duration;

use shorty_shortener::{BatchItem, SeqGenerator, ShortenerService, Stats, Storage};
use shorty_storage::PostgresStorage;
use shorty_test_infra::postgres::{PostgresConfig, PostgresServer};

const BASE_URL: &str = "http://localhost:8080";

struct Fixture {
    _postgres: PostgresServer,
    service: ShortenerService<PostgresStorage, SeqGenerator>,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let storage = connect_with_retry(&url).await;

        Self {
            _postgres: postgres,
            service: ShortenerService::new(
                Arc::new(storage),
                SeqGenerator::with_prefix("wh"),
                BASE_URL,
            ),
        }
    }
}

async fn connect_with_retry(url: &str) -> PostgresStorage {
    let mut last_error = None;

    for _ in 0..20 {
        match PostgresStorage::connect(url, 5).await {
            Ok(storage) => return storage,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn item(correlation_id: &str, original_url: &str) -> BatchItem {
    BatchItem {
        correlation_id: correlation_id.to_string(),
        original_url: original_url.to_string(),
    }
}

#[tokio::test]
async fn batch_with_already_stored_url_reuses_its_short_id() {
    let fixture = Fixture::start().await;
    let storage = fixture.service.storage();
    storage.put("held", "https://held.com", "u1").await.unwrap();

    let results = fixture
        .service
        .shorten_batch(
            &[item("1", "https://held.com"), item("2", "https://new.com")],
            "u2",
        )
        .await
        .unwrap();

    assert_eq!(results[0].short_url, "http://localhost:8080/held");
    assert_eq!(results[1].short_url, "http://localhost:8080/wh000000");
    assert_eq!(
        fixture.service.stats().await.unwrap(),
        Stats { urls: 2, users: 2 }
    );
}

#[tokio::test]
async fn batch_with_repeated_url_stores_it_once() {
    let fixture = Fixture::start().await;

    let results = fixture
        .service
        .shorten_batch(
            &[item("1", "https://same.com"), item("2", "https://same.com")],
            "u1",
        )
        .await
        .unwrap();

    assert_eq!(results[0].short_url, results[1].short_url);
    assert_eq!(fixture.service.user_urls("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn shorten_skips_short_ids_already_taken() {
    let fixture = Fixture::start().await;
    let storage = fixture.service.storage();
    storage.put("wh000000", "https://theirs.com", "u2").await.unwrap();

    let shortened = fixture
        .service
        .shorten("https://mine.com", "u1")
        .await
        .unwrap();

    assert_eq!(shortened.short_url, "http://localhost:8080/wh000001");
    assert_eq!(
        fixture.service.resolve("wh000000").await.unwrap(),
        "https://theirs.com"
    );
}
