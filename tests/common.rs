//! Test utilities & fixtures shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use classdiary::diary::clock::{ManualClock, ReferenceZone};
use classdiary::diary::pet::{PetEngine, PetRules};
use classdiary::diary::registry::{self, NewUser};
use classdiary::diary::service::DiaryService;
use classdiary::diary::shop::Catalog;
use classdiary::storage::DocumentStore;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub type TestService = DiaryService<DocumentStore, Arc<ManualClock>>;

/// Offset of the reference zone used by the fixtures (UTC+3).
pub const OFFSET_MINUTES: i32 = 180;

/// Local wall time `hour:minute` (UTC+3) on 2026-03-`day`.
pub fn local(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap() + Duration::hours(hour as i64)
        + Duration::minutes(minute as i64)
        - Duration::minutes(OFFSET_MINUTES as i64)
}

/// A service over a fresh document store in `dir`, clock stopped at `start`.
pub fn open_service(dir: &Path, start: DateTime<Utc>) -> TestService {
    let store = DocumentStore::open(dir).expect("open store");
    DiaryService::with_rng(
        store,
        Arc::new(ManualClock::new(start)),
        PetEngine::new(
            PetRules::default(),
            ReferenceZone::from_offset_minutes(OFFSET_MINUTES).unwrap(),
        ),
        Catalog::default(),
        StdRng::seed_from_u64(7),
    )
}

pub fn register_student(service: &TestService, tg_id: &str, first_name: &str) {
    let form = NewUser {
        tg_id: tg_id.to_string(),
        first_name: first_name.to_string(),
        ..Default::default()
    };
    let now = classdiary::diary::clock::Clock::now(service.clock());
    service
        .store()
        .transact(|doc| registry::register(doc, form, now))
        .expect("register student");
}

pub fn set_stickers(service: &TestService, tg_id: &str, stickers: u32) {
    use classdiary::storage::UserStore;
    service
        .store()
        .update_user(tg_id, |user| {
            user.stickers = stickers;
            Ok(())
        })
        .expect("set stickers");
}
