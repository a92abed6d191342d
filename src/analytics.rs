//! Dashboard aggregation over a user's recent tracking entries.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::error::AppError;
use crate::llm::AiProvider;
use crate::models::{Dashboard, TrackingEntry, TrackingKind};
use crate::store::Store;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
/// Most recent entries considered before the window filter.
pub const FETCH_LIMIT: usize = 100;

/// Averages and counts without insights.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub sleep_avg: f64,
    pub water_avg: f64,
    pub gym_count: usize,
    pub mood_avg: f64,
    pub total_entries: usize,
}

/// Entries strictly newer than `now - days`. Unparseable timestamps are
/// skipped.
pub fn within_window(
    entries: Vec<TrackingEntry>,
    now: DateTime<Utc>,
    days: i64,
) -> Vec<TrackingEntry> {
    let cutoff = now - Duration::days(days);
    entries
        .into_iter()
        .filter(|entry| match entry.timestamp_utc() {
            Some(ts) => ts > cutoff,
            None => {
                warn!(timestamp = %entry.timestamp, "skipping entry with unparseable timestamp");
                false
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn of_kind(entries: &[TrackingEntry], kind: TrackingKind) -> impl Iterator<Item = &TrackingEntry> {
    entries.iter().filter(move |e| e.kind == kind)
}

/// Empty categories report 0. Mood is the share of entries noted `"happy"`.
pub fn summarize(entries: &[TrackingEntry]) -> Summary {
    Summary {
        sleep_avg: mean(of_kind(entries, TrackingKind::Sleep).map(|e| e.value)),
        water_avg: mean(of_kind(entries, TrackingKind::Water).map(|e| e.value)),
        gym_count: of_kind(entries, TrackingKind::Gym).count(),
        mood_avg: mean(
            of_kind(entries, TrackingKind::Mood)
                .map(|e| if e.notes.as_deref() == Some("happy") { 1.0 } else { 0.0 }),
        ),
        total_entries: entries.len(),
    }
}

/// Fetches recent entries, aggregates the window, and asks the provider for
/// insights about it.
pub async fn dashboard(
    store: &dyn Store,
    provider: &dyn AiProvider,
    user_id: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Dashboard, AppError> {
    let entries = store.tracking_entries(user_id, None, FETCH_LIMIT).await?;
    let recent = within_window(entries, now, days);
    let summary = summarize(&recent);
    let insights = provider.generate_insights(&recent).await;

    Ok(Dashboard {
        sleep_avg: summary.sleep_avg,
        water_avg: summary.water_avg,
        gym_count: summary.gym_count,
        mood_avg: summary.mood_avg,
        total_entries: summary.total_entries,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(kind: TrackingKind, value: f64, notes: Option<&str>, timestamp: &str) -> TrackingEntry {
        TrackingEntry {
            id: None,
            user_id: "u1".into(),
            kind,
            value,
            notes: notes.map(ToOwned::to_owned),
            timestamp: timestamp.into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    const TS: &str = "2026-10-17T08:00:00+00:00";

    #[test]
    fn sleep_average_is_arithmetic_mean() {
        let summary = summarize(&[
            entry(TrackingKind::Sleep, 6.0, None, TS),
            entry(TrackingKind::Sleep, 8.0, None, TS),
        ]);
        assert_eq!(summary.sleep_avg, 7.0);
        assert_eq!(summary.gym_count, 0);
        assert_eq!(summary.mood_avg, 0.0);
        assert_eq!(summary.water_avg, 0.0);
        assert_eq!(summary.total_entries, 2);
    }

    #[test]
    fn mood_average_counts_happy_notes() {
        let summary = summarize(&[
            entry(TrackingKind::Mood, 1.0, Some("happy"), TS),
            entry(TrackingKind::Mood, 1.0, Some("tired"), TS),
            entry(TrackingKind::Mood, 1.0, None, TS),
            entry(TrackingKind::Mood, 1.0, Some("happy"), TS),
            entry(TrackingKind::Gym, 1.0, None, TS),
        ]);
        assert_eq!(summary.mood_avg, 0.5);
        assert_eq!(summary.gym_count, 1);
    }

    #[test]
    fn window_excludes_old_and_unparseable_entries() {
        let entries = vec![
            entry(TrackingKind::Water, 2.0, None, "2026-10-17T08:00:00+00:00"),
            entry(TrackingKind::Water, 9.0, None, "2026-10-01T08:00:00+00:00"),
            entry(TrackingKind::Water, 9.0, None, "2026-10-11T12:00:00"),
            entry(TrackingKind::Water, 3.0, None, "2026-10-11T12:00:01"),
            entry(TrackingKind::Water, 9.0, None, "not a date"),
        ];
        let recent = within_window(entries, now(), 7);
        let values: Vec<f64> = recent.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn dashboard_in_mock_mode_is_all_zero() {
        struct FixedInsights;

        #[async_trait::async_trait]
        impl AiProvider for FixedInsights {
            async fn chat(&self, _m: &str, _c: Option<&str>) -> crate::llm::ChatReply {
                crate::llm::ChatReply::apology("unused")
            }
            async fn generate_insights(&self, entries: &[TrackingEntry]) -> Vec<String> {
                vec![format!("{} entries", entries.len())]
            }
            async fn generate_daily_quote(&self, _n: &str) -> String {
                String::new()
            }
        }

        let dash = dashboard(&crate::store::MockStore, &FixedInsights, "u1", 7, now())
            .await
            .unwrap();
        assert_eq!(dash.sleep_avg, 0.0);
        assert_eq!(dash.gym_count, 0);
        assert_eq!(dash.mood_avg, 0.0);
        assert_eq!(dash.insights, vec!["0 entries".to_string()]);
    }
}
