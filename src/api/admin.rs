//! Admin handlers. Every route here runs behind `require_admin`, which puts
//! the caller's [`AdminIdentity`] into the request extensions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::auth::AdminIdentity;
use crate::api::error::{ApiError, JsonResult};
use crate::api::{blocking, AppState};
use crate::diary::admin::{self, AdminAction, SettingsUpdate};
use crate::diary::clock::Clock;
use crate::diary::content::{self, HomeworkDraft, HomeworkUpdate, TopicDraft, TopicUpdate};
use crate::diary::errors::DiaryError;
use crate::diary::rewards::GiftThreshold;
use crate::diary::types::{DiaryDocument, Homework, Settings, Submission, Topic, UserRecord};
use crate::logutil::sec_log;
use crate::storage::UserStore;
use crate::validation::validate_tg_id;

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: String,
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> JsonResult<Vec<UserRecord>> {
    Ok(Json(blocking(&state, |s| Ok(s.store().read()?.users)).await?))
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

pub async fn user_action(
    State(state): State<Arc<AppState>>,
    Extension(AdminIdentity(actor)): Extension<AdminIdentity>,
    Path(raw_id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> JsonResult<UserRecord> {
    let id = validate_tg_id(&raw_id).map_err(|e| ApiError::Diary(e.into()))?;
    let action: AdminAction = body
        .action
        .parse()
        .map_err(|e| ApiError::Diary(DiaryError::from(e)))?;
    let user = blocking(&state, move |s| {
        s.store().update_user(&id, |user| {
            admin::apply_admin_action(user, action, &actor);
            Ok(user.clone())
        })
    })
    .await?;
    Ok(Json(user))
}

pub async fn list_topics(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Topic>> {
    Ok(Json(blocking(&state, |s| Ok(s.store().read()?.topics)).await?))
}

pub async fn create_topic(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<TopicDraft>,
) -> Result<(StatusCode, Json<Topic>), ApiError> {
    let topic = blocking(&state, move |s| {
        s.store().transact(|doc| content::create_topic(doc, draft))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn update_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<TopicUpdate>,
) -> JsonResult<Topic> {
    let topic = blocking(&state, move |s| {
        s.store().transact(|doc| content::update_topic(doc, &id, update))
    })
    .await?;
    Ok(Json(topic))
}

pub async fn delete_topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Deleted> {
    let deleted = blocking(&state, move |s| {
        s.store().transact(|doc| content::delete_topic(doc, &id))?;
        Ok(id)
    })
    .await?;
    Ok(Json(Deleted { deleted }))
}

pub async fn list_homework(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Homework>> {
    Ok(Json(blocking(&state, |s| Ok(s.store().read()?.homework)).await?))
}

pub async fn create_homework(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<HomeworkDraft>,
) -> Result<(StatusCode, Json<Homework>), ApiError> {
    let homework = blocking(&state, move |s| {
        s.store().transact(|doc| content::create_homework(doc, draft))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(homework)))
}

pub async fn update_homework(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<HomeworkUpdate>,
) -> JsonResult<Homework> {
    let homework = blocking(&state, move |s| {
        s.store().transact(|doc| content::update_homework(doc, &id, update))
    })
    .await?;
    Ok(Json(homework))
}

pub async fn delete_homework(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Deleted> {
    let deleted = blocking(&state, move |s| {
        s.store().transact(|doc| content::delete_homework(doc, &id))?;
        Ok(id)
    })
    .await?;
    Ok(Json(Deleted { deleted }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    pub tg_id: String,
    #[serde(default = "default_done")]
    pub done: bool,
}

fn default_done() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct MarkResponse {
    pub changed: bool,
    pub homework: Homework,
}

pub async fn mark_homework(
    State(state): State<Arc<AppState>>,
    Extension(AdminIdentity(actor)): Extension<AdminIdentity>,
    Path(hw_id): Path<String>,
    Json(body): Json<MarkRequest>,
) -> JsonResult<MarkResponse> {
    let tg_id = validate_tg_id(&body.tg_id).map_err(|e| ApiError::Diary(e.into()))?;
    let response = blocking(&state, move |s| {
        let award = s.homework_award;
        s.store().transact(|doc| {
            let changed = content::mark_homework(doc, &hw_id, &tg_id, body.done, award)?;
            let homework = doc
                .homework
                .iter()
                .find(|h| h.id == hw_id)
                .cloned()
                .ok_or_else(|| DiaryError::NotFound(format!("homework: {}", hw_id)))?;
            if changed {
                sec_log!(
                    "MARK by {}: homework {} user {} done={}",
                    actor,
                    hw_id,
                    tg_id,
                    body.done
                );
            }
            Ok(MarkResponse { changed, homework })
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn list_submissions(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Submission>> {
    Ok(Json(blocking(&state, |s| Ok(s.store().read()?.submissions)).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
}

pub async fn review_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> JsonResult<Submission> {
    let submission = blocking(&state, move |s| {
        let award = s.homework_award;
        let now = s.service.clock().now();
        s.store()
            .transact(|doc| content::review_submission(doc, &id, body.approve, award, now))
    })
    .await?;
    Ok(Json(submission))
}

pub async fn delete_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Deleted> {
    let deleted = blocking(&state, move |s| {
        let uploads = s.store().uploads_dir();
        let removed = s.store().transact(|doc| content::delete_submission(doc, &id))?;
        content::remove_uploads(&uploads, &removed.media);
        Ok(id)
    })
    .await?;
    Ok(Json(Deleted { deleted }))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(AdminIdentity(actor)): Extension<AdminIdentity>,
    Json(update): Json<SettingsUpdate>,
) -> JsonResult<Settings> {
    let settings = blocking(&state, move |s| {
        s.store()
            .transact(|doc| admin::update_settings(doc, update, &actor))
    })
    .await?;
    Ok(Json(settings))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// SHA-256 of the stored document; pass it back unchanged on import.
    pub digest: String,
    pub document: DiaryDocument,
}

pub async fn export_document(State(state): State<Arc<AppState>>) -> JsonResult<DocumentEnvelope> {
    let (document, digest) = blocking(&state, |s| s.store().snapshot()).await?;
    Ok(Json(DocumentEnvelope { digest, document }))
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub digest: String,
}

pub async fn import_document(
    State(state): State<Arc<AppState>>,
    Extension(AdminIdentity(actor)): Extension<AdminIdentity>,
    Json(envelope): Json<DocumentEnvelope>,
) -> JsonResult<ImportResponse> {
    GiftThreshold::new(envelope.document.settings.gift_threshold)
        .map_err(|e| ApiError::Diary(e.into()))?;
    let users = envelope.document.users.len();
    let digest = blocking(&state, move |s| {
        s.store().replace(envelope.document, &envelope.digest)
    })
    .await?;
    sec_log!("IMPORT by {}: replaced document ({} users)", actor, users);
    Ok(Json(ImportResponse { digest }))
}
