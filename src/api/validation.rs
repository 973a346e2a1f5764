use time::Date;

use crate::api::errors::ApiError;
use crate::core::time::parse_date;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const ESSAY_TEXT_MIN_CHARS: usize = 200;
pub(crate) const ESSAY_TEXT_MAX_CHARS: usize = 10_000;

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

/// Trimmed, lowercased address with a non-empty local part and a dotted domain.
pub(crate) fn normalize_email(email: &str) -> Result<String, ApiError> {
    let normalized = email.trim().to_lowercase();
    let valid = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !normalized.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(normalized)
    } else {
        Err(ApiError::BadRequest("Invalid email address".to_string()))
    }
}

pub(crate) fn essay_text(text: &str) -> Result<&str, ApiError> {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if length < ESSAY_TEXT_MIN_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Essay text must have at least {ESSAY_TEXT_MIN_CHARS} characters"
        )));
    }
    if length > ESSAY_TEXT_MAX_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Essay text must have at most {ESSAY_TEXT_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

pub(crate) fn non_blank<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::BadRequest(format!("{field} must not be blank")))
    } else {
        Ok(trimmed)
    }
}

pub(crate) fn date_field(value: &str, field: &str) -> Result<Date, ApiError> {
    parse_date(value)
        .ok_or_else(|| ApiError::BadRequest(format!("{field} must be a date in YYYY-MM-DD format")))
}

/// Keeps the first occurrence of each item, preserving order.
pub(crate) fn dedup_preserving_order<T: PartialEq + Copy>(items: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(*item);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::KnowledgeArea;
    use time::macros::date;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ana.Silva@Example.COM ").unwrap(), "ana.silva@example.com");
        for invalid in ["", "ana", "@example.com", "ana@", "ana@example", "ana@@x.com", "a b@x.com"] {
            assert!(normalize_email(invalid).is_err(), "{invalid}");
        }
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(validate_password_len("çãõéíáúê").is_ok());
        assert!(validate_password_len("short").is_err());
    }

    #[test]
    fn essay_text_bounds_apply_after_trimming() {
        let padded = format!("   {}   ", "a".repeat(ESSAY_TEXT_MIN_CHARS));
        assert_eq!(essay_text(&padded).unwrap().len(), ESSAY_TEXT_MIN_CHARS);

        let short = format!("{}{}", "a".repeat(ESSAY_TEXT_MIN_CHARS - 1), " ".repeat(50));
        assert!(essay_text(&short).is_err());

        assert!(essay_text(&"a".repeat(ESSAY_TEXT_MAX_CHARS)).is_ok());
        assert!(essay_text(&"a".repeat(ESSAY_TEXT_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn date_field_parses_iso_dates() {
        assert_eq!(date_field("2025-11-09", "exam_date").unwrap(), date!(2025 - 11 - 09));
        assert!(date_field("09/11/2025", "exam_date").is_err());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let areas = [KnowledgeArea::Matematica, KnowledgeArea::Linguagens, KnowledgeArea::Matematica];
        assert_eq!(
            dedup_preserving_order(&areas),
            vec![KnowledgeArea::Matematica, KnowledgeArea::Linguagens]
        );
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank("  oi ", "message").unwrap(), "oi");
        assert!(non_blank("   ", "message").is_err());
    }
}
