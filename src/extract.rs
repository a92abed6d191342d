//! Turns model-extracted chat fields into tracking entries.

use serde_json::Value;

use crate::models::{NewTrackingEntry, TrackingKind};

/// Extraction field names and the entry kind each one produces.
pub const FIELD_KINDS: [(&str, TrackingKind); 6] = [
    ("sleep_hours", TrackingKind::Sleep),
    ("water_liters", TrackingKind::Water),
    ("gym_session", TrackingKind::Gym),
    ("mood", TrackingKind::Mood),
    ("work_hours", TrackingKind::Work),
    ("learning_hours", TrackingKind::Learning),
];

fn kind_for_field(field: &str) -> Option<TrackingKind> {
    FIELD_KINDS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, kind)| *kind)
}

/// Builds one entry per known, non-null field of `extracted`.
///
/// Numbers are stored as-is, booleans as 1/0, strings as value 1 with the
/// string kept in `notes` (so `"mood": "happy"` feeds the mood average).
/// Unknown fields are ignored.
pub fn entries_from_extracted(
    extracted: &Value,
    user_id: &str,
    timestamp: &str,
) -> Vec<NewTrackingEntry> {
    let Some(fields) = extracted.as_object() else {
        return Vec::new();
    };

    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(field, value)| {
            let kind = kind_for_field(field)?;
            let (value, notes) = match value {
                Value::Number(n) => (n.as_f64().unwrap_or(1.0), None),
                Value::Bool(b) => (if *b { 1.0 } else { 0.0 }, None),
                Value::String(s) => (1.0, Some(s.clone())),
                _ => (1.0, None),
            };
            Some(NewTrackingEntry {
                user_id: user_id.to_string(),
                kind,
                value,
                notes,
                timestamp: Some(timestamp.to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: &str = "2026-10-18T09:00:00+00:00";

    fn by_kind(entries: &[NewTrackingEntry], kind: TrackingKind) -> &NewTrackingEntry {
        entries.iter().find(|e| e.kind == kind).expect("entry")
    }

    #[test]
    fn maps_fields_and_value_shapes() {
        let extracted = json!({
            "sleep_hours": 7.5,
            "water_liters": null,
            "gym_session": true,
            "mood": "happy",
            "work_hours": 8,
            "learning_hours": null,
            "steps": 10000
        });
        let entries = entries_from_extracted(&extracted, "u1", TS);
        assert_eq!(entries.len(), 4);

        assert_eq!(by_kind(&entries, TrackingKind::Sleep).value, 7.5);
        assert_eq!(by_kind(&entries, TrackingKind::Gym).value, 1.0);
        assert_eq!(by_kind(&entries, TrackingKind::Work).value, 8.0);

        let mood = by_kind(&entries, TrackingKind::Mood);
        assert_eq!(mood.value, 1.0);
        assert_eq!(mood.notes.as_deref(), Some("happy"));
        assert!(entries.iter().all(|e| e.user_id == "u1" && e.timestamp.as_deref() == Some(TS)));
    }

    #[test]
    fn false_gym_session_is_recorded_as_zero() {
        let entries = entries_from_extracted(&json!({"gym_session": false}), "u1", TS);
        assert_eq!(entries[0].value, 0.0);
    }

    #[test]
    fn non_object_yields_nothing() {
        assert!(entries_from_extracted(&json!([1, 2]), "u1", TS).is_empty());
        assert!(entries_from_extracted(&json!("text"), "u1", TS).is_empty());
    }
}
