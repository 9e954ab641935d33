//! Student registration and self-service profile edits.

use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;

use crate::diary::errors::DiaryError;
use crate::diary::types::{DiaryDocument, Theme, UserRecord};
use crate::logutil::escape_log;
use crate::validation::{
    validate_birth_date, validate_optional_line, validate_required_line, validate_tg_id,
    MAX_PERSON_NAME_CHARS,
};

const MAX_USERNAME_CHARS: usize = 64;
const MAX_PHOTO_CHARS: usize = 2048;

/// Registration form as submitted by the Mini App.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub tg_id: String,
    #[serde(default)]
    pub username: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub photo: String,
}

/// Fields a student may change about themselves. Anything absent is kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
    pub photo: Option<String>,
    pub theme: Option<Theme>,
}

pub fn register(
    doc: &mut DiaryDocument,
    form: NewUser,
    now: DateTime<Utc>,
) -> Result<UserRecord, DiaryError> {
    let tg_id = validate_tg_id(&form.tg_id)?;
    if doc.user(&tg_id).is_some() {
        return Err(DiaryError::Conflict(format!("user {} already registered", tg_id)));
    }
    let first_name = validate_required_line(&form.first_name, "first name", MAX_PERSON_NAME_CHARS)?;

    let mut user = UserRecord::new(&tg_id, &first_name, now);
    user.username = validate_optional_line(&form.username, "username", MAX_USERNAME_CHARS)?;
    user.last_name = validate_optional_line(&form.last_name, "last name", MAX_PERSON_NAME_CHARS)?;
    user.birth_date = validate_birth_date(&form.birth_date)?;
    user.photo = validate_optional_line(&form.photo, "photo", MAX_PHOTO_CHARS)?;

    info!("registered user {} ({})", tg_id, escape_log(&user.display_name()));
    doc.users.push(user.clone());
    Ok(user)
}

pub fn update_profile(user: &mut UserRecord, update: ProfileUpdate) -> Result<(), DiaryError> {
    // Validate everything before touching the record.
    let first_name = update
        .first_name
        .map(|v| validate_required_line(&v, "first name", MAX_PERSON_NAME_CHARS))
        .transpose()?;
    let last_name = update
        .last_name
        .map(|v| validate_optional_line(&v, "last name", MAX_PERSON_NAME_CHARS))
        .transpose()?;
    let username = update
        .username
        .map(|v| validate_optional_line(&v, "username", MAX_USERNAME_CHARS))
        .transpose()?;
    let birth_date = update.birth_date.map(|v| validate_birth_date(&v)).transpose()?;
    let photo = update
        .photo
        .map(|v| validate_optional_line(&v, "photo", MAX_PHOTO_CHARS))
        .transpose()?;

    if let Some(v) = first_name {
        user.first_name = v;
    }
    if let Some(v) = last_name {
        user.last_name = v;
    }
    if let Some(v) = username {
        user.username = v;
    }
    if let Some(v) = birth_date {
        user.birth_date = v;
    }
    if let Some(v) = photo {
        user.photo = v;
    }
    if let Some(theme) = update.theme {
        user.theme = theme;
    }
    Ok(())
}
