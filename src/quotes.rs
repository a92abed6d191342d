//! One motivational quote per calendar day, cached in a small JSON file.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::AiProvider;

/// Contents of the cache file. Only one day is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQuote {
    pub date: NaiveDate,
    pub quote: String,
    pub generated_at: DateTime<Utc>,
}

/// Response body of the daily-quote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyQuote {
    pub quote: String,
    pub date: NaiveDate,
    pub cached: bool,
}

/// File-backed single-entry cache.
///
/// Reads and writes are not locked; concurrent misses on the same day may
/// both call the model and the last write wins.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    path: PathBuf,
}

impl QuoteCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cached quote if it was generated on `today`. A missing or
    /// unreadable file is a miss.
    pub async fn get(&self, today: NaiveDate) -> Option<String> {
        let raw = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice::<CachedQuote>(&raw) {
            Ok(cached) if cached.date == today && !cached.quote.is_empty() => Some(cached.quote),
            Ok(_) => None,
            Err(err) => {
                warn!(path = ?self.path, error = %err, "ignoring corrupt quote cache");
                None
            }
        }
    }

    /// Overwrites the cache with `quote` for `today`.
    pub async fn put(&self, today: NaiveDate, quote: &str, now: DateTime<Utc>) -> std::io::Result<()> {
        let cached = CachedQuote {
            date: today,
            quote: quote.to_string(),
            generated_at: now,
        };
        let bytes = serde_json::to_vec(&cached)?;
        tokio::fs::write(&self.path, bytes).await
    }
}

/// Returns today's quote, generating and caching a new one on a miss.
///
/// "Today" is the calendar date of `now` in its own time zone; the server
/// passes local time. A failed cache write is logged; the fresh quote is
/// still returned.
pub async fn daily_quote<Tz: TimeZone>(
    cache: &QuoteCache,
    provider: &dyn AiProvider,
    user_name: &str,
    now: DateTime<Tz>,
) -> DailyQuote {
    let today = now.date_naive();
    let now = now.with_timezone(&Utc);
    if let Some(quote) = cache.get(today).await {
        return DailyQuote {
            quote,
            date: today,
            cached: true,
        };
    }

    let quote = provider.generate_daily_quote(user_name).await;
    match cache.put(today, &quote, now).await {
        Ok(()) => info!(date = %today, "cached new daily quote"),
        Err(err) => warn!(path = ?cache.path, error = %err, "failed to write quote cache"),
    }

    DailyQuote {
        quote,
        date: today,
        cached: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::llm::ChatReply;
    use crate::models::TrackingEntry;

    struct CountingQuotes(AtomicUsize);

    #[async_trait]
    impl AiProvider for CountingQuotes {
        async fn chat(&self, _m: &str, _c: Option<&str>) -> ChatReply {
            ChatReply::apology("unused")
        }
        async fn generate_insights(&self, _e: &[TrackingEntry]) -> Vec<String> {
            Vec::new()
        }
        async fn generate_daily_quote(&self, user_name: &str) -> String {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            format!("Quote {n} for {user_name}")
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn same_day_calls_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = QuoteCache::new(dir.path().join("quote.json"));
        let provider = CountingQuotes(AtomicUsize::new(0));

        let first = daily_quote(&cache, &provider, "Sam", at(18, 8)).await;
        let second = daily_quote(&cache, &provider, "Sam", at(18, 22)).await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.quote, second.quote);
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_day_bypasses_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = QuoteCache::new(dir.path().join("quote.json"));
        let provider = CountingQuotes(AtomicUsize::new(0));

        let monday = daily_quote(&cache, &provider, "Sam", at(18, 8)).await;
        let tuesday = daily_quote(&cache, &provider, "Sam", at(19, 8)).await;

        assert!(!tuesday.cached);
        assert_ne!(monday.quote, tuesday.quote);
        assert_eq!(tuesday.date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[tokio::test]
    async fn day_boundary_follows_the_callers_time_zone() {
        let dir = tempfile::tempdir().unwrap();
        let cache = QuoteCache::new(dir.path().join("quote.json"));
        let provider = CountingQuotes(AtomicUsize::new(0));
        let west = chrono::FixedOffset::west_opt(5 * 3600).unwrap();

        // 22:00 on the 18th at UTC-5 is already the 19th in UTC.
        let evening = west.with_ymd_and_hms(2026, 10, 18, 22, 0, 0).unwrap();
        let quote = daily_quote(&cache, &provider, "Sam", evening).await;
        assert_eq!(quote.date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());

        let morning = daily_quote(&cache, &provider, "Sam", at(18, 8)).await;
        assert!(morning.cached);

        let raw = tokio::fs::read(dir.path().join("quote.json")).await.unwrap();
        let stored: CachedQuote = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored.generated_at, at(19, 3));
    }

    #[tokio::test]
    async fn corrupt_cache_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quote.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let cache = QuoteCache::new(&path);
        assert_eq!(cache.get(at(18, 8).date_naive()).await, None);
    }

    #[tokio::test]
    async fn unwritable_cache_still_returns_a_quote() {
        let dir = tempfile::tempdir().unwrap();
        let cache = QuoteCache::new(dir.path().join("missing-dir").join("quote.json"));
        let provider = CountingQuotes(AtomicUsize::new(0));

        let quote = daily_quote(&cache, &provider, "Sam", at(18, 8)).await;
        assert_eq!(quote.quote, "Quote 1 for Sam");
        assert!(!quote.cached);
    }
}
