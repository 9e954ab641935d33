//! Class content curated by admins: lesson topics, homework assignments and
//! the homework submissions students upload.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;

use crate::diary::errors::DiaryError;
use crate::diary::types::{
    DiaryDocument, Homework, MediaRef, Submission, SubmissionStatus, Topic,
};
use crate::logutil::{describe_payload, escape_log};
use crate::validation::{
    extension_for_mime, safe_upload_name, sanitize_display_text, sanitize_text_block, split_data_url,
    validate_optional_line, validate_required_line, ValidationError, MAX_TEXT_BYTES,
    MAX_TITLE_CHARS,
};

/// URL prefix under which stored media are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

const MAX_DATE_CHARS: usize = 32;

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---- topics ----------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDraft {
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicUpdate {
    pub title: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub is_hidden: Option<bool>,
    pub is_current: Option<bool>,
}

fn make_current(doc: &mut DiaryDocument, topic_id: &str) {
    for topic in &mut doc.topics {
        topic.is_current = topic.id == topic_id;
    }
}

pub fn create_topic(doc: &mut DiaryDocument, draft: TopicDraft) -> Result<Topic, DiaryError> {
    let topic = Topic {
        id: new_id(),
        title: validate_required_line(&draft.title, "title", MAX_TITLE_CHARS)?,
        date: validate_optional_line(&draft.date, "date", MAX_DATE_CHARS)?,
        description: sanitize_text_block(&draft.description, "description", MAX_TEXT_BYTES)?,
        is_hidden: false,
        is_current: draft.is_current,
    };
    doc.topics.push(topic.clone());
    if topic.is_current {
        make_current(doc, &topic.id);
    }
    Ok(topic)
}

pub fn update_topic(
    doc: &mut DiaryDocument,
    topic_id: &str,
    update: TopicUpdate,
) -> Result<Topic, DiaryError> {
    let title = update
        .title
        .map(|v| validate_required_line(&v, "title", MAX_TITLE_CHARS))
        .transpose()?;
    let date = update
        .date
        .map(|v| validate_optional_line(&v, "date", MAX_DATE_CHARS))
        .transpose()?;
    let description = update
        .description
        .map(|v| sanitize_text_block(&v, "description", MAX_TEXT_BYTES))
        .transpose()?;

    let topic = doc
        .topics
        .iter_mut()
        .find(|t| t.id == topic_id)
        .ok_or_else(|| DiaryError::NotFound(format!("topic: {}", topic_id)))?;
    if let Some(v) = title {
        topic.title = v;
    }
    if let Some(v) = date {
        topic.date = v;
    }
    if let Some(v) = description {
        topic.description = v;
    }
    if let Some(v) = update.is_hidden {
        topic.is_hidden = v;
    }
    if let Some(v) = update.is_current {
        topic.is_current = v;
    }
    let updated = topic.clone();
    if updated.is_current {
        make_current(doc, topic_id);
    }
    Ok(updated)
}

pub fn delete_topic(doc: &mut DiaryDocument, topic_id: &str) -> Result<(), DiaryError> {
    let before = doc.topics.len();
    doc.topics.retain(|t| t.id != topic_id);
    if doc.topics.len() == before {
        return Err(DiaryError::NotFound(format!("topic: {}", topic_id)));
    }
    Ok(())
}

/// Topics as students see them.
pub fn visible_topics(doc: &DiaryDocument) -> Vec<Topic> {
    doc.topics.iter().filter(|t| !t.is_hidden).cloned().collect()
}

// ---- homework --------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub is_hidden: Option<bool>,
}

pub fn create_homework(doc: &mut DiaryDocument, draft: HomeworkDraft) -> Result<Homework, DiaryError> {
    let homework = Homework {
        id: new_id(),
        title: validate_required_line(&draft.title, "title", MAX_TITLE_CHARS)?,
        description: sanitize_text_block(&draft.description, "description", MAX_TEXT_BYTES)?,
        due_date: validate_optional_line(&draft.due_date, "due date", MAX_DATE_CHARS)?,
        is_hidden: false,
        completed_by: Vec::new(),
    };
    doc.homework.push(homework.clone());
    Ok(homework)
}

pub fn update_homework(
    doc: &mut DiaryDocument,
    hw_id: &str,
    update: HomeworkUpdate,
) -> Result<Homework, DiaryError> {
    let title = update
        .title
        .map(|v| validate_required_line(&v, "title", MAX_TITLE_CHARS))
        .transpose()?;
    let description = update
        .description
        .map(|v| sanitize_text_block(&v, "description", MAX_TEXT_BYTES))
        .transpose()?;
    let due_date = update
        .due_date
        .map(|v| validate_optional_line(&v, "due date", MAX_DATE_CHARS))
        .transpose()?;

    let homework = find_homework_mut(doc, hw_id)?;
    if let Some(v) = title {
        homework.title = v;
    }
    if let Some(v) = description {
        homework.description = v;
    }
    if let Some(v) = due_date {
        homework.due_date = v;
    }
    if let Some(v) = update.is_hidden {
        homework.is_hidden = v;
    }
    Ok(homework.clone())
}

pub fn delete_homework(doc: &mut DiaryDocument, hw_id: &str) -> Result<(), DiaryError> {
    let before = doc.homework.len();
    doc.homework.retain(|h| h.id != hw_id);
    if doc.homework.len() == before {
        return Err(DiaryError::NotFound(format!("homework: {}", hw_id)));
    }
    Ok(())
}

pub fn visible_homework(doc: &DiaryDocument) -> Vec<Homework> {
    doc.homework.iter().filter(|h| !h.is_hidden).cloned().collect()
}

fn find_homework_mut<'d>(doc: &'d mut DiaryDocument, hw_id: &str) -> Result<&'d mut Homework, DiaryError> {
    doc.homework
        .iter_mut()
        .find(|h| h.id == hw_id)
        .ok_or_else(|| DiaryError::NotFound(format!("homework: {}", hw_id)))
}

/// Marks (or unmarks) `tg_id` as having completed `hw_id`, crediting or
/// taking back `award` stickers. Returns `false` when the mark was already
/// in the requested state.
pub fn mark_homework(
    doc: &mut DiaryDocument,
    hw_id: &str,
    tg_id: &str,
    done: bool,
    award: u32,
) -> Result<bool, DiaryError> {
    if doc.user(tg_id).is_none() {
        return Err(DiaryError::NotFound(format!("user: {}", tg_id)));
    }
    let homework = find_homework_mut(doc, hw_id)?;
    let already = homework.completed_by.iter().any(|id| id == tg_id);
    if already == done {
        return Ok(false);
    }
    if done {
        homework.completed_by.push(tg_id.to_string());
    } else {
        homework.completed_by.retain(|id| id != tg_id);
    }
    if let Some(user) = doc.user_mut(tg_id) {
        user.stickers = if done {
            user.stickers.saturating_add(award)
        } else {
            user.stickers.saturating_sub(award)
        };
    }
    info!(
        "homework {} {} for user {} ({} stickers)",
        hw_id,
        if done { "marked" } else { "unmarked" },
        tg_id,
        award
    );
    Ok(true)
}

// ---- submissions -----------------------------------------------------------

/// One attachment as sent by the client: a `data:` URL plus metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaUpload {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub hw_id: String,
    pub tg_id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub media: Vec<MediaUpload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_items: usize,
    /// Decoded size limit per attachment.
    pub max_item_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_items: 10,
            max_item_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Records a homework submission and stores its attachments in
/// `uploads_dir`. Attachments without data or with an undecodable payload
/// are skipped.
pub fn submit(
    doc: &mut DiaryDocument,
    form: NewSubmission,
    uploads_dir: &Path,
    limits: UploadLimits,
    now: DateTime<Utc>,
) -> Result<Submission, DiaryError> {
    let user = doc
        .user(&form.tg_id)
        .ok_or_else(|| DiaryError::NotFound(format!("user: {}", form.tg_id)))?;
    if user.is_blocked {
        return Err(DiaryError::PermissionDenied(format!("user {} is blocked", user.tg_id)));
    }
    let user_name = user.display_name();
    let hw_title = doc
        .homework
        .iter()
        .find(|h| h.id == form.hw_id)
        .map(|h| h.title.clone())
        .ok_or_else(|| DiaryError::NotFound(format!("homework: {}", form.hw_id)))?;
    let comment = sanitize_text_block(&form.comment, "comment", MAX_TEXT_BYTES)?;
    if form.media.len() > limits.max_items {
        return Err(ValidationError::TooLong {
            field: "media",
            max: limits.max_items,
        }
        .into());
    }

    let id = new_id();
    let mut decoded = Vec::with_capacity(form.media.len());
    for (index, item) in form.media.iter().enumerate() {
        let Some(data) = item.data.as_deref().filter(|d| !d.is_empty()) else {
            info!("submission {}: skipping media item {} without data", id, index);
            continue;
        };
        let (mime, payload) = match split_data_url(data) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("submission {}: media item {} skipped: {}", id, index, e);
                continue;
            }
        };
        let bytes = match STANDARD.decode(payload.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "submission {}: media item {} ({}) is not valid base64: {}",
                    id,
                    index,
                    describe_payload(payload.len()),
                    e
                );
                continue;
            }
        };
        if bytes.len() > limits.max_item_bytes {
            return Err(ValidationError::MediaTooLarge {
                limit: limits.max_item_bytes,
            }
            .into());
        }
        decoded.push((index, extension_for_mime(mime), bytes, item));
    }

    fs::create_dir_all(uploads_dir)?;
    let mut media = Vec::with_capacity(decoded.len());
    for (index, ext, bytes, item) in decoded {
        let filename = format!("{}_{}{}", id, index, ext);
        if let Err(e) = fs::write(uploads_dir.join(&filename), &bytes) {
            warn!("submission {}: failed to store {}: {}", id, filename, e);
            continue;
        }
        let name = item
            .name
            .as_deref()
            .map(safe_upload_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| filename.clone());
        media.push(MediaRef {
            url: format!("{}{}", UPLOADS_URL_PREFIX, filename),
            kind: sanitize_display_text(&item.kind).chars().take(16).collect(),
            name,
        });
    }

    let submission = Submission {
        id,
        hw_id: form.hw_id,
        hw_title,
        tg_id: form.tg_id,
        user_name,
        media,
        comment,
        status: SubmissionStatus::Pending,
        submitted_at: now,
        reviewed_at: None,
    };
    info!(
        "submission {} for homework {} by user {} ({} attachments)",
        submission.id,
        submission.hw_id,
        submission.tg_id,
        submission.media.len()
    );
    doc.submissions.push(submission.clone());
    Ok(submission)
}

/// Approves or rejects a submission. Approval also marks the homework done
/// for the submitter when both still exist.
pub fn review_submission(
    doc: &mut DiaryDocument,
    submission_id: &str,
    approve: bool,
    award: u32,
    now: DateTime<Utc>,
) -> Result<Submission, DiaryError> {
    let submission = doc
        .submissions
        .iter_mut()
        .find(|s| s.id == submission_id)
        .ok_or_else(|| DiaryError::NotFound(format!("submission: {}", submission_id)))?;
    submission.status = if approve {
        SubmissionStatus::Approved
    } else {
        SubmissionStatus::Rejected
    };
    submission.reviewed_at = Some(now);
    let reviewed = submission.clone();

    if approve {
        match mark_homework(doc, &reviewed.hw_id, &reviewed.tg_id, true, award) {
            Ok(_) | Err(DiaryError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(reviewed)
}

/// Runs [`submit`] inside `transact`, which must persist the document change.
/// Attachments written by a transaction that then fails to commit are removed
/// again.
pub fn submit_and_commit<T>(
    form: NewSubmission,
    uploads_dir: &Path,
    limits: UploadLimits,
    now: DateTime<Utc>,
    transact: T,
) -> Result<Submission, DiaryError>
where
    T: FnOnce(
        &mut dyn FnMut(&mut DiaryDocument) -> Result<Submission, DiaryError>,
    ) -> Result<Submission, DiaryError>,
{
    let mut form = Some(form);
    let mut written: Vec<MediaRef> = Vec::new();
    let result = transact(&mut |doc: &mut DiaryDocument| {
        let form = form
            .take()
            .ok_or_else(|| DiaryError::Internal("submission applied twice".to_string()))?;
        let submission = submit(doc, form, uploads_dir, limits, now)?;
        written = submission.media.clone();
        Ok(submission)
    });
    if result.is_err() && !written.is_empty() {
        warn!("submission not committed, removing {} attachments", written.len());
        remove_uploads(uploads_dir, &written);
    }
    result
}

/// Removes a submission record. Its attachments stay on disk until the caller
/// has committed the change and passes them to [`remove_uploads`].
pub fn delete_submission(doc: &mut DiaryDocument, submission_id: &str) -> Result<Submission, DiaryError> {
    let position = doc
        .submissions
        .iter()
        .position(|s| s.id == submission_id)
        .ok_or_else(|| DiaryError::NotFound(format!("submission: {}", submission_id)))?;
    Ok(doc.submissions.remove(position))
}

/// Deletes stored attachment files. Failures are logged and skipped.
pub fn remove_uploads(uploads_dir: &Path, media: &[MediaRef]) {
    for item in media {
        let Some(filename) = item.url.strip_prefix(UPLOADS_URL_PREFIX) else {
            continue;
        };
        if safe_upload_name(filename) != filename {
            continue;
        }
        if let Err(e) = fs::remove_file(uploads_dir.join(filename)) {
            warn!("could not remove upload {}: {}", escape_log(filename), e);
        }
    }
}
