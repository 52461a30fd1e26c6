use crate::api::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;

/// Lower-cases, trims and de-duplicates tags. Empty entries are dropped.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, AppError> {
    let set: BTreeSet<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    if set.len() > MAX_TAGS {
        return Err(AppError::BadRequest(format!(
            "tags: at most {} tags are allowed",
            MAX_TAGS
        )));
    }
    if let Some(long) = set.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
        return Err(AppError::BadRequest(format!(
            "tags: '{}' is longer than {} characters",
            long, MAX_TAG_LEN
        )));
    }

    Ok(set.into_iter().collect())
}

/// An expiry, when present, must lie in the future.
pub fn ensure_future(
    field: &str,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    match expires_at {
        Some(at) if at <= now => Err(AppError::BadRequest(format!(
            "{}: must be in the future",
            field
        ))),
        _ => Ok(()),
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in partial updates. Use with `#[serde(default, deserialize_with = "...")]`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " Rust ".to_string(),
            "rust".to_string(),
            "".to_string(),
            "Async".to_string(),
        ];
        assert_eq!(normalize_tags(&tags).unwrap(), vec!["async", "rust"]);
    }

    #[test]
    fn test_normalize_tags_limits() {
        let many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{}", i)).collect();
        assert!(normalize_tags(&many).is_err());

        let long = vec!["x".repeat(MAX_TAG_LEN + 1)];
        assert!(normalize_tags(&long).is_err());
    }

    #[test]
    fn test_ensure_future() {
        let now = Utc::now();
        assert!(ensure_future("expires_at", None, now).is_ok());
        assert!(ensure_future("expires_at", Some(now + Duration::hours(1)), now).is_ok());
        assert!(ensure_future("expires_at", Some(now - Duration::seconds(1)), now).is_err());
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        expires_at: Option<Option<DateTime<Utc>>>,
    }

    #[test]
    fn test_deserialize_some_distinguishes_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.expires_at, None);

        let cleared: Patch = serde_json::from_str(r#"{"expires_at": null}"#).unwrap();
        assert_eq!(cleared.expires_at, Some(None));

        let set: Patch =
            serde_json::from_str(r#"{"expires_at": "2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.expires_at, Some(Some(_))));
    }
}
