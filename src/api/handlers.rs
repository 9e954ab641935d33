//! Student-facing handlers. Students are identified by the Telegram id in the
//! path; the Mini App front-end is trusted to send its own id.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, JsonResult};
use crate::api::{blocking, AppState};
use crate::diary::clock::Clock;
use crate::diary::content::{self, NewSubmission};
use crate::diary::errors::ShopError;
use crate::diary::pet::{PetView, TaskCompletion};
use crate::diary::registry::{self, NewUser, ProfileUpdate};
use crate::diary::rewards::GiftProgress;
use crate::diary::service::PetUpdate;
use crate::diary::shop::CosmeticItem;
use crate::diary::types::{CosmeticSlot, Homework, Settings, Submission, Topic, UserRecord};
use crate::storage::UserStore;
use crate::validation::validate_tg_id;

#[derive(Debug, Serialize)]
pub struct Ping {
    pub status: &'static str,
    pub time: DateTime<Utc>,
}

pub async fn ping() -> Json<Ping> {
    Json(Ping {
        status: "alive",
        time: Utc::now(),
    })
}

fn tg_id(raw: &str) -> Result<String, ApiError> {
    validate_tg_id(raw).map_err(|e| ApiError::Diary(e.into()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> JsonResult<Option<UserRecord>> {
    let id = tg_id(&raw_id)?;
    let user = blocking(&state, move |s| s.service.get_user(&id)).await?;
    Ok(Json(user))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<NewUser>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let user = blocking(&state, move |s| {
        let now = s.service.clock().now();
        s.store().transact(|doc| registry::register(doc, form, now))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> JsonResult<UserRecord> {
    let id = tg_id(&raw_id)?;
    let user = blocking(&state, move |s| s.service.update_profile(&id, update)).await?;
    Ok(Json(user))
}

pub async fn pet_view(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> JsonResult<PetView> {
    let id = tg_id(&raw_id)?;
    Ok(Json(blocking(&state, move |s| s.service.pet_view(&id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreatePet {
    pub species: String,
    pub name: String,
}

pub async fn create_pet(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(body): Json<CreatePet>,
) -> Result<(StatusCode, Json<PetView>), ApiError> {
    let id = tg_id(&raw_id)?;
    let view = blocking(&state, move |s| {
        s.service.create_pet(&id, &body.species, &body.name)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_pet(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(update): Json<PetUpdate>,
) -> JsonResult<PetView> {
    let id = tg_id(&raw_id)?;
    Ok(Json(
        blocking(&state, move |s| s.service.update_pet(&id, &update)).await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub completion: TaskCompletion,
    pub pet: PetView,
}

pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> JsonResult<CompletionResponse> {
    let id = tg_id(&raw_id)?;
    let (completion, pet) = blocking(&state, move |s| s.service.complete_task(&id)).await?;
    Ok(Json(CompletionResponse { completion, pet }))
}

pub async fn purchase_item(
    State(state): State<Arc<AppState>>,
    Path((raw_id, item_id)): Path<(String, String)>,
) -> JsonResult<UserRecord> {
    let id = tg_id(&raw_id)?;
    Ok(Json(
        blocking(&state, move |s| s.service.purchase_item(&id, &item_id)).await?,
    ))
}

pub async fn equip_item(
    State(state): State<Arc<AppState>>,
    Path((raw_id, item_id)): Path<(String, String)>,
) -> JsonResult<PetView> {
    let id = tg_id(&raw_id)?;
    Ok(Json(
        blocking(&state, move |s| s.service.equip_item(&id, &item_id)).await?,
    ))
}

pub async fn unequip_item(
    State(state): State<Arc<AppState>>,
    Path((raw_id, raw_slot)): Path<(String, String)>,
) -> JsonResult<PetView> {
    let id = tg_id(&raw_id)?;
    let slot: CosmeticSlot = raw_slot
        .parse()
        .map_err(|e: ShopError| ApiError::Diary(e.into()))?;
    Ok(Json(
        blocking(&state, move |s| s.service.unequip_item(&id, slot)).await?,
    ))
}

pub async fn gift_progress(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> JsonResult<GiftProgress> {
    let id = tg_id(&raw_id)?;
    Ok(Json(blocking(&state, move |s| s.service.gift_progress(&id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeGift {
    pub milestone: u32,
}

pub async fn acknowledge_gift(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(body): Json<AcknowledgeGift>,
) -> JsonResult<GiftProgress> {
    let id = tg_id(&raw_id)?;
    Ok(Json(
        blocking(&state, move |s| s.service.acknowledge_gift(&id, body.milestone)).await?,
    ))
}

pub async fn shop_catalog(State(state): State<Arc<AppState>>) -> Json<Vec<CosmeticItem>> {
    Json(state.service.catalog().items().to_vec())
}

pub async fn list_topics(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Topic>> {
    let topics = blocking(&state, |s| Ok(content::visible_topics(&s.store().read()?))).await?;
    Ok(Json(topics))
}

pub async fn list_homework(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Homework>> {
    let homework = blocking(&state, |s| Ok(content::visible_homework(&s.store().read()?))).await?;
    Ok(Json(homework))
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> JsonResult<Settings> {
    Ok(Json(blocking(&state, |s| s.store().load_settings()).await?))
}

pub async fn submit_homework(
    State(state): State<Arc<AppState>>,
    Json(form): Json<NewSubmission>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let submission = blocking(&state, move |s| {
        let now = s.service.clock().now();
        let uploads = s.store().uploads_dir();
        let limits = s.upload_limits;
        content::submit_and_commit(form, &uploads, limits, now, |apply| {
            s.store().transact(|doc| apply(doc))
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}
