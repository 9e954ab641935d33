//! Input validation for anything a Mini App client can send.
//!
//! Everything here runs before a record is touched; a failure is reported to
//! the caller and never silently coerced.

use chrono::NaiveDate;

/// Maximum characters kept from a person's first or last name.
pub const MAX_PERSON_NAME_CHARS: usize = 64;
/// Maximum characters of a topic/homework title.
pub const MAX_TITLE_CHARS: usize = 200;
/// Maximum bytes of a description or submission comment.
pub const MAX_TEXT_BYTES: usize = 4000;

/// Validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("telegram id must be a non-empty string of digits, got {0:?}")]
    InvalidTelegramId(String),

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long (maximum {max})")]
    TooLong { field: &'static str, max: usize },

    #[error("birth date must look like DD.MM.YYYY, got {0:?}")]
    InvalidBirthDate(String),

    #[error("media item is not a base64 data URL")]
    InvalidDataUrl,

    #[error("media item exceeds {limit} bytes")]
    MediaTooLarge { limit: usize },

    #[error("unknown admin action: {0}")]
    UnknownAction(String),
}

/// Telegram user ids are positive integers; they travel as strings.
pub fn validate_tg_id(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 20 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidTelegramId(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Trim, drop control characters and collapse runs of whitespace.
pub fn sanitize_display_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A required single-line field such as a first name or a title.
pub fn validate_required_line(
    raw: &str,
    field: &'static str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let cleaned = sanitize_display_text(raw);
    if cleaned.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if cleaned.chars().count() > max_chars {
        return Err(ValidationError::TooLong { field, max: max_chars });
    }
    Ok(cleaned)
}

/// An optional single-line field; empty input stays empty.
pub fn validate_optional_line(
    raw: &str,
    field: &'static str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let cleaned = sanitize_display_text(raw);
    if cleaned.chars().count() > max_chars {
        return Err(ValidationError::TooLong { field, max: max_chars });
    }
    Ok(cleaned)
}

/// Multi-line free text: control characters removed except newlines and tabs.
pub fn sanitize_text_block(
    raw: &str,
    field: &'static str,
    max_bytes: usize,
) -> Result<String, ValidationError> {
    if raw.len() > max_bytes {
        return Err(ValidationError::TooLong { field, max: max_bytes });
    }
    Ok(raw
        .trim()
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect())
}

/// Birth dates are stored as typed, but must name a real `DD.MM.YYYY` day.
/// Empty input is accepted.
pub fn validate_birth_date(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    NaiveDate::parse_from_str(trimmed, "%d.%m.%Y")
        .map_err(|_| ValidationError::InvalidBirthDate(raw.to_string()))?;
    Ok(trimmed.to_string())
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and payload.
/// A bare base64 payload is accepted with an empty MIME type.
pub fn split_data_url(raw: &str) -> Result<(&str, &str), ValidationError> {
    let Some(rest) = raw.strip_prefix("data:") else {
        if raw.is_empty() || raw.contains(',') {
            return Err(ValidationError::InvalidDataUrl);
        }
        return Ok(("", raw));
    };
    let (header, payload) = rest.split_once(',').ok_or(ValidationError::InvalidDataUrl)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(ValidationError::InvalidDataUrl)?;
    Ok((mime, payload))
}

/// File extension for an uploaded MIME type; unknown types are stored as JPEG.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("png") {
        ".png"
    } else if mime.contains("gif") {
        ".gif"
    } else if mime.contains("webp") {
        ".webp"
    } else if mime.contains("mp4") {
        ".mp4"
    } else if mime.contains("webm") {
        ".webm"
    } else if mime.contains("mov") || mime.contains("quicktime") {
        ".mov"
    } else if mime.contains("video") {
        ".mp4"
    } else {
        ".jpg"
    }
}

/// Keep only filename-safe characters of a client supplied name.
pub fn safe_upload_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(80)
        .collect();
    cleaned.trim_start_matches('.').to_string()
}
