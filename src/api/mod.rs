//! HTTP surface of the diary, served with axum.
//!
//! Handlers are thin: they validate path parameters, hand the work to the
//! synchronous [`DiaryService`] or [`DocumentStore`] on the blocking pool and
//! serialize the result. Admin routes sit behind [`auth::require_admin`].

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;
use log::{info, warn};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::diary::clock::{Clock, SystemClock};
use crate::diary::content::UploadLimits;
use crate::diary::errors::DiaryError;
use crate::diary::pet::PetEngine;
use crate::diary::service::DiaryService;
use crate::storage::DocumentStore;

use self::auth::{require_admin, AdminRegistry};
use self::error::ApiError;

pub type SharedClock = Arc<dyn Clock>;
pub type Service = DiaryService<DocumentStore, SharedClock>;

pub struct AppState {
    pub service: Service,
    pub admins: Arc<AdminRegistry>,
    pub upload_limits: UploadLimits,
    pub homework_award: u32,
    pub max_body_bytes: usize,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<String>,
}

impl AppState {
    /// Opens the document store named by `config` and wires the service.
    pub fn from_config(config: &Config, clock: SharedClock) -> anyhow::Result<Self> {
        let store = DocumentStore::open(&config.storage.data_dir)
            .with_context(|| format!("opening data dir {}", config.storage.data_dir))?;
        let engine = PetEngine::new(config.pet.rules(), config.pet.zone()?);
        let service = DiaryService::new(store, clock, engine, config.shop.catalog());
        Ok(Self::with_service(config, service))
    }

    pub fn with_service(config: &Config, service: Service) -> Self {
        Self {
            service,
            admins: Arc::new(AdminRegistry::new(config.admins.clone())),
            upload_limits: config.storage.upload_limits(),
            homework_award: config.rewards.homework_award,
            max_body_bytes: config.storage.max_upload_bytes,
            cors_origins: config.server.cors_origins.clone(),
            static_dir: config.server.static_dir.clone(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        self.service.store()
    }
}

/// Runs `f` on the blocking pool; store access does synchronous file IO.
pub(crate) async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, DiaryError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| DiaryError::Internal(format!("task join error: {}", e)))?
        .map_err(ApiError::from)
}

pub fn router(state: Arc<AppState>) -> Router {
    let student = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/api/register", post(handlers::register))
        .route(
            "/api/user/{tg_id}",
            get(handlers::get_user).put(handlers::update_profile),
        )
        .route(
            "/api/user/{tg_id}/pet",
            get(handlers::pet_view)
                .post(handlers::create_pet)
                .put(handlers::update_pet),
        )
        .route("/api/user/{tg_id}/pet/complete", post(handlers::complete_task))
        .route("/api/user/{tg_id}/shop/{item_id}", post(handlers::purchase_item))
        .route("/api/user/{tg_id}/outfit/{item_id}", post(handlers::equip_item))
        .route(
            "/api/user/{tg_id}/outfit/slot/{slot}",
            delete(handlers::unequip_item),
        )
        .route("/api/user/{tg_id}/gifts", get(handlers::gift_progress))
        .route("/api/user/{tg_id}/gifts/ack", post(handlers::acknowledge_gift))
        .route("/api/shop", get(handlers::shop_catalog))
        .route("/api/topics", get(handlers::list_topics))
        .route("/api/homework", get(handlers::list_homework))
        .route("/api/settings", get(handlers::get_settings))
        .route("/api/submissions", post(handlers::submit_homework));

    let admin = Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{tg_id}/actions", post(admin::user_action))
        .route(
            "/api/admin/topics",
            get(admin::list_topics).post(admin::create_topic),
        )
        .route(
            "/api/admin/topics/{id}",
            put(admin::update_topic).delete(admin::delete_topic),
        )
        .route(
            "/api/admin/homework",
            get(admin::list_homework).post(admin::create_homework),
        )
        .route(
            "/api/admin/homework/{id}",
            put(admin::update_homework).delete(admin::delete_homework),
        )
        .route("/api/admin/homework/{id}/marks", post(admin::mark_homework))
        .route("/api/admin/submissions", get(admin::list_submissions))
        .route(
            "/api/admin/submissions/{id}",
            put(admin::review_submission).delete(admin::delete_submission),
        )
        .route("/api/admin/settings", put(admin::update_settings))
        .route(
            "/api/admin/db",
            get(admin::export_document).put(admin::import_document),
        )
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_admin));

    let mut app = Router::new()
        .merge(student)
        .merge(admin)
        .nest_service("/uploads", ServeDir::new(state.store().uploads_dir()));
    if let Some(dir) = &state.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(cors_layer(&state.cors_origins))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let res = next.run(req).await;
    let status = res.status();
    let elapsed = started.elapsed().as_millis();
    if status.is_server_error() {
        warn!("{} {} -> {} ({} ms)", method, path, status.as_u16(), elapsed);
    } else {
        info!("{} {} -> {} ({} ms)", method, path, status.as_u16(), elapsed);
    }
    res
}

/// Binds `config.server.bind` and serves until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config, Arc::new(SystemClock))?);
    if state.admins.is_empty() {
        warn!("no admin has a password; run `classdiary admin-passwd --name <admin>`");
    }
    let app = router(state);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| anyhow!("invalid server.bind {:?}: {}", config.server.bind, e))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("classdiary listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
        })
        .await?;
    Ok(())
}
