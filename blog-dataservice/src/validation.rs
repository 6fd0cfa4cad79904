use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A create request after trimming, empty-field rejection, and the
/// absent-field substitutions described for the ingest path.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCreate {
    pub client_msg_id: String,
    pub author: String,
    pub content: String,
    pub genre: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError(pub &'static str);

/// Trims `author`/`genre`/`location`, rejects empty required fields, and
/// substitutes a fresh client message id / the current instant when absent.
pub fn validate_create(
    author: &str,
    content: &str,
    genre: &str,
    location: &str,
    created_at_iso: &str,
    client_msg_id: &str,
) -> Result<ValidatedCreate, ValidationError> {
    let author = author.trim().to_string();
    let genre = genre.trim().to_string();
    let location = location.trim().to_string();

    if author.is_empty() || content.is_empty() || genre.is_empty() || location.is_empty() {
        return Err(ValidationError(
            "author, content, genre, location are required",
        ));
    }

    let client_msg_id = if client_msg_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        client_msg_id.to_string()
    };

    let created_at = if created_at_iso.is_empty() {
        Utc::now()
    } else {
        DateTime::parse_from_rfc3339(created_at_iso)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    };

    Ok(ValidatedCreate {
        client_msg_id,
        author,
        content: content.to_string(),
        genre,
        location,
        created_at,
    })
}

/// Clamps a `ListBlogs` limit into `[1, 500]`; a zero limit is treated as the
/// caller not having set one and becomes the default of 50.
pub fn clamp_limit(limit: u32) -> u32 {
    if limit == 0 {
        50
    } else {
        limit.clamp(1, 500)
    }
}

pub fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_author() {
        let err = validate_create("  ", "c", "g", "l", "", "").unwrap_err();
        assert_eq!(err.0, "author, content, genre, location are required");
    }

    #[test]
    fn trims_whitespace_from_genre_and_location_and_author() {
        let valid = validate_create(" alice ", "hi", " rust ", " office ", "", "").unwrap();
        assert_eq!(valid.author, "alice");
        assert_eq!(valid.genre, "rust");
        assert_eq!(valid.location, "office");
    }

    #[test]
    fn substitutes_a_fresh_client_msg_id_when_absent() {
        let valid = validate_create("a", "c", "g", "l", "", "").unwrap();
        assert_eq!(valid.client_msg_id.len(), 36);
    }

    #[test]
    fn keeps_a_supplied_client_msg_id() {
        let valid =
            validate_create("a", "c", "g", "l", "", "11111111-1111-1111-1111-111111111111").unwrap();
        assert_eq!(valid.client_msg_id, "11111111-1111-1111-1111-111111111111");
    }

    #[test]
    fn falls_back_to_now_on_unparseable_timestamp() {
        let valid = validate_create("a", "c", "g", "l", "not-a-date", "").unwrap();
        assert!(valid.created_at <= Utc::now());
    }

    #[test]
    fn limit_zero_becomes_the_default() {
        assert_eq!(clamp_limit(0), 50);
    }

    #[test]
    fn limit_is_clamped_to_the_spec_range() {
        assert_eq!(clamp_limit(10_000), 500);
        assert_eq!(clamp_limit(1), 1);
    }
}
