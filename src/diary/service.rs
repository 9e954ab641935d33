//! The operations a request handler calls. Each one is a single atomic
//! read-modify-write of one user record through a [`UserStore`].
//!
//! Time-driven pet transitions are applied first on every call and are kept
//! even when the requested operation is then refused, so a task that expired
//! kills the pet exactly once no matter which request observes it.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::diary::clock::Clock;
use crate::diary::errors::DiaryError;
use crate::diary::pet::{PetEngine, PetView, RefreshOutcome, TaskCompletion};
use crate::diary::registry::{self, ProfileUpdate};
use crate::diary::rewards::{self, GiftProgress, GiftThreshold};
use crate::diary::shop::{self, Catalog};
use crate::diary::types::{CosmeticSlot, UserRecord};
use crate::logutil::escape_log;
use crate::storage::UserStore;

/// Optional pet edits; both may be given at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct PetUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
}

pub struct DiaryService<S, C> {
    store: S,
    clock: C,
    engine: PetEngine,
    catalog: Catalog,
    rng: Mutex<StdRng>,
}

impl<S: UserStore, C: Clock> DiaryService<S, C> {
    pub fn new(store: S, clock: C, engine: PetEngine, catalog: Catalog) -> Self {
        Self::with_rng(store, clock, engine, catalog, StdRng::from_entropy())
    }

    /// Deterministic task generation, for tests.
    pub fn with_rng(store: S, clock: C, engine: PetEngine, catalog: Catalog, rng: StdRng) -> Self {
        Self {
            store,
            clock,
            engine,
            catalog,
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn engine(&self) -> &PetEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn threshold(&self) -> Result<GiftThreshold, DiaryError> {
        let settings = self.store.load_settings()?;
        Ok(GiftThreshold::new(settings.gift_threshold)?)
    }

    fn refresh(&self, user: &mut UserRecord, now: DateTime<Utc>) -> RefreshOutcome {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let outcome = self.engine.refresh(user, now, &mut *rng);
        if outcome.died {
            info!(
                "pet {} of user {} died (task overdue)",
                escape_log(user.pet.as_ref().map(|p| p.name.as_str()).unwrap_or("")),
                user.tg_id
            );
        }
        outcome
    }

    /// Runs `op` after the refresh. When `op` fails its partial effects are
    /// discarded but the refresh is still persisted.
    fn with_user<T, F>(&self, tg_id: &str, mutates: bool, op: F) -> Result<T, DiaryError>
    where
        F: FnOnce(&Self, &mut UserRecord, DateTime<Utc>) -> Result<T, DiaryError>,
    {
        let now = self.clock.now();
        let outcome = self.store.update_user(tg_id, |user| {
            if mutates && user.is_blocked {
                return Err(DiaryError::PermissionDenied(format!("user {} is blocked", tg_id)));
            }
            self.refresh(user, now);
            let refreshed = user.clone();
            match op(self, user, now) {
                Ok(value) => Ok(Ok(value)),
                Err(e) => {
                    *user = refreshed;
                    Ok(Err(e))
                }
            }
        })?;
        outcome
    }

    /// The user with pet transitions applied, or `None` when not registered.
    pub fn get_user(&self, tg_id: &str) -> Result<Option<UserRecord>, DiaryError> {
        if self.store.load_user(tg_id)?.is_none() {
            return Ok(None);
        }
        let threshold = self.threshold()?;
        self.with_user(tg_id, false, |_, user, _| {
            rewards::observe_milestones(user, threshold);
            Ok(Some(user.clone()))
        })
    }

    pub fn update_profile(&self, tg_id: &str, update: ProfileUpdate) -> Result<UserRecord, DiaryError> {
        self.with_user(tg_id, true, |_, user, _| {
            registry::update_profile(user, update)?;
            Ok(user.clone())
        })
    }

    pub fn pet_view(&self, tg_id: &str) -> Result<PetView, DiaryError> {
        self.with_user(tg_id, false, |svc, user, now| Ok(svc.engine.view(user, now)))
    }

    pub fn create_pet(&self, tg_id: &str, species: &str, name: &str) -> Result<PetView, DiaryError> {
        self.with_user(tg_id, true, |svc, user, now| {
            let pet = svc.engine.create_pet(user, species, name, now)?;
            info!(
                "user {} adopted a {} named {}",
                user.tg_id,
                pet.species,
                escape_log(&pet.name)
            );
            Ok(svc.engine.view(user, now))
        })
    }

    pub fn complete_task(&self, tg_id: &str) -> Result<(TaskCompletion, PetView), DiaryError> {
        self.with_user(tg_id, true, |svc, user, now| {
            let completion = svc.engine.complete_task(user, now)?;
            Ok((completion, svc.engine.view(user, now)))
        })
    }

    pub fn update_pet(&self, tg_id: &str, update: &PetUpdate) -> Result<PetView, DiaryError> {
        self.with_user(tg_id, true, |svc, user, now| {
            if let Some(species) = &update.species {
                svc.engine.change_species(user, species)?;
            }
            if let Some(name) = &update.name {
                svc.engine.rename_pet(user, name)?;
            }
            Ok(svc.engine.view(user, now))
        })
    }

    pub fn purchase_item(&self, tg_id: &str, item_id: &str) -> Result<UserRecord, DiaryError> {
        self.with_user(tg_id, true, |svc, user, _| {
            let item = shop::purchase_item(user, &svc.catalog, item_id)?;
            info!(
                "user {} bought {} for {} stickers (balance {})",
                user.tg_id, item.id, item.price, user.stickers
            );
            Ok(user.clone())
        })
    }

    pub fn equip_item(&self, tg_id: &str, item_id: &str) -> Result<PetView, DiaryError> {
        self.with_user(tg_id, true, |svc, user, now| {
            shop::equip_item(user, &svc.catalog, item_id)?;
            Ok(svc.engine.view(user, now))
        })
    }

    pub fn unequip_item(&self, tg_id: &str, slot: CosmeticSlot) -> Result<PetView, DiaryError> {
        self.with_user(tg_id, true, |svc, user, now| {
            shop::unequip_item(user, slot)?;
            Ok(svc.engine.view(user, now))
        })
    }

    pub fn gift_progress(&self, tg_id: &str) -> Result<GiftProgress, DiaryError> {
        let threshold = self.threshold()?;
        self.with_user(tg_id, false, |_, user, _| {
            Ok(rewards::observe_milestones(user, threshold).0)
        })
    }

    pub fn acknowledge_gift(&self, tg_id: &str, milestone: u32) -> Result<GiftProgress, DiaryError> {
        let threshold = self.threshold()?;
        self.with_user(tg_id, true, |_, user, _| {
            rewards::acknowledge_gift(user, threshold, milestone)?;
            Ok(rewards::observe_milestones(user, threshold).0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diary::clock::{ManualClock, ReferenceZone};
    use crate::diary::errors::{PetError, ShopError};
    use crate::diary::pet::{PetRules, PetState};
    use crate::diary::types::{PetTask, TaskKind};
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn service(start: DateTime<Utc>) -> DiaryService<MemoryStore, ManualClock> {
        let store = MemoryStore::new();
        store.insert(UserRecord::new("100", "Anna", start));
        DiaryService::with_rng(
            store,
            ManualClock::new(start),
            PetEngine::new(PetRules::default(), ReferenceZone::utc()),
            Catalog::default(),
            StdRng::seed_from_u64(11),
        )
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, 0, 0).unwrap()
    }

    fn give_task(svc: &DiaryService<MemoryStore, ManualClock>, created: DateTime<Utc>) {
        svc.store()
            .update_user("100", |u| {
                u.pet.as_mut().unwrap().current_task = Some(PetTask {
                    kind: TaskKind::Walk,
                    created_at: created,
                    deadline: created + Duration::hours(4),
                });
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn unknown_user_is_distinct_from_missing_pet() {
        let svc = service(at(8));
        assert!(svc.get_user("999").unwrap().is_none());
        assert!(matches!(svc.pet_view("999"), Err(DiaryError::NotFound(_))));
        assert_eq!(svc.pet_view("100").unwrap().state, PetState::NoPet);
    }

    #[test]
    fn blocked_users_cannot_edit_profile_or_claim_gifts() {
        let svc = service(at(20));
        svc.store()
            .update_user("100", |u| {
                u.stickers = 10;
                Ok(())
            })
            .unwrap();
        assert_eq!(svc.gift_progress("100").unwrap().deserved, 2);
        svc.store()
            .update_user("100", |u| {
                u.is_blocked = true;
                Ok(())
            })
            .unwrap();

        let rename = ProfileUpdate {
            first_name: Some("Hacked".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            svc.update_profile("100", rename),
            Err(DiaryError::PermissionDenied(_))
        ));
        assert!(matches!(
            svc.acknowledge_gift("100", 2),
            Err(DiaryError::PermissionDenied(_))
        ));

        let user = svc.store().load_user("100").unwrap().unwrap();
        assert_eq!(user.first_name, "Anna");
        assert!(user.claimed_gifts.is_empty());
        assert_eq!(svc.gift_progress("100").unwrap().deserved, 2);
    }

    #[test]
    fn death_is_persisted_even_when_completion_is_refused() {
        let svc = service(at(8));
        svc.create_pet("100", "cat", "Fluffy").unwrap();
        give_task(&svc, at(8));
        svc.clock().set(at(12) + Duration::minutes(1));

        assert!(matches!(
            svc.complete_task("100"),
            Err(DiaryError::Pet(PetError::PetIsDead))
        ));
        let stored = svc.store().load_user("100").unwrap().unwrap();
        assert!(stored.pet.unwrap().is_dead);
    }

    #[test]
    fn failed_purchase_leaves_record_untouched() {
        let svc = service(at(20));
        svc.create_pet("100", "dog", "Rex").unwrap();
        let writes = svc.store().write_count();
        assert!(matches!(
            svc.purchase_item("100", "crown"),
            Err(DiaryError::Shop(ShopError::InsufficientFunds { .. }))
        ));
        assert_eq!(svc.store().write_count(), writes);
    }

    #[test]
    fn blocked_users_cannot_mutate() {
        let svc = service(at(20));
        svc.store()
            .update_user("100", |u| {
                u.is_blocked = true;
                Ok(())
            })
            .unwrap();
        assert!(matches!(
            svc.create_pet("100", "cat", "Fluffy"),
            Err(DiaryError::PermissionDenied(_))
        ));
        assert_eq!(svc.pet_view("100").unwrap().state, PetState::NoPet);
    }

    #[test]
    fn invalid_threshold_is_fatal() {
        let svc = service(at(20));
        let mut settings = svc.store().load_settings().unwrap();
        settings.gift_threshold = 0;
        svc.store().set_settings(settings);
        assert!(matches!(
            svc.gift_progress("100"),
            Err(DiaryError::Reward(_))
        ));
    }
}
