//! Virtual pet lifecycle: creation, task generation, deadline enforcement and
//! streak accounting.
//!
//! ```text
//! NoPet ──create──▶ AliveIdle ──generate──▶ AliveTaskPending ──complete──▶ AliveIdle
//!                       ▲                          │
//!                       │                      deadline passed
//!                    create                        ▼
//!                       └────────────────────── Dead
//! ```
//!
//! Transitions are evaluated lazily by [`PetEngine::refresh`] whenever a pet
//! is read; there is no background timer. Re-running a refresh is harmless:
//! once a pet is dead it stays dead and `died_at` never moves.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::debug;
use rand::Rng;
use serde::Serialize;

use crate::diary::clock::ReferenceZone;
use crate::diary::errors::PetError;
use crate::diary::types::{CosmeticSlot, PetRecord, PetTask, Species, TaskKind, UserRecord};
use crate::validation::sanitize_display_text;

/// Maximum pet name length in characters.
pub const MAX_PET_NAME_CHARS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PetState {
    NoPet,
    AliveIdle,
    AliveTaskPending,
    Dead,
}

/// Tunables of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetRules {
    /// First local hour (inclusive) in which tasks may be generated.
    pub window_start_hour: u32,
    /// Local hour (exclusive) after which no new tasks are generated.
    pub window_end_hour: u32,
    pub daily_task_cap: u32,
    pub task_lifetime: Duration,
    /// No task is generated sooner than this after the previous one.
    pub min_generation_gap: Duration,
    /// Elapsed time at which generation becomes certain.
    pub target_interval: Duration,
}

impl Default for PetRules {
    fn default() -> Self {
        Self {
            window_start_hour: 4,
            window_end_hour: 18,
            daily_task_cap: 4,
            task_lifetime: Duration::hours(4),
            min_generation_gap: Duration::minutes(30),
            target_interval: Duration::hours(2),
        }
    }
}

/// What a refresh did to the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub died: bool,
    pub day_rolled_over: bool,
    pub generated: Option<TaskKind>,
}

impl RefreshOutcome {
    pub fn changed(&self) -> bool {
        self.died || self.day_rolled_over || self.generated.is_some()
    }
}

/// Result of a successful task completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub kind: TaskKind,
    pub streak: u32,
    pub streak_extended: bool,
    pub tasks_completed_today: u32,
}

/// Read-only projection of a user's pet for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PetView {
    pub state: PetState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<Species>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub streak: u32,
    pub tasks_completed_today: u32,
    pub daily_task_cap: u32,
    pub total_tasks_completed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<PetTask>,
    /// Seconds until the pending task's deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub died_at: Option<DateTime<Utc>>,
    pub inventory: Vec<String>,
    pub outfit: BTreeMap<CosmeticSlot, String>,
}

#[derive(Debug, Clone)]
pub struct PetEngine {
    rules: PetRules,
    zone: ReferenceZone,
}

impl PetEngine {
    pub fn new(rules: PetRules, zone: ReferenceZone) -> Self {
        Self { rules, zone }
    }

    pub fn rules(&self) -> &PetRules {
        &self.rules
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    pub fn state(user: &UserRecord) -> PetState {
        match &user.pet {
            None => PetState::NoPet,
            Some(pet) if pet.is_dead => PetState::Dead,
            Some(pet) if pet.current_task.is_some() => PetState::AliveTaskPending,
            Some(_) => PetState::AliveIdle,
        }
    }

    /// Applies every time-driven transition due at `now`.
    pub fn refresh<R: Rng + ?Sized>(
        &self,
        user: &mut UserRecord,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();
        let Some(pet) = user.pet.as_mut() else {
            return outcome;
        };
        if pet.is_dead {
            return outcome;
        }
        if enforce_deadline(pet, now) {
            debug!("pet of {} died at {:?}", user.tg_id, pet.died_at);
            outcome.died = true;
            return outcome;
        }

        let today = self.zone.local_date(now);
        if roll_over_day(pet, today) {
            outcome.day_rolled_over = true;
        }

        if let Some(kind) = self.maybe_generate(pet, now, rng) {
            debug!("generated {:?} task for {}", kind, user.tg_id);
            outcome.generated = Some(kind);
        }
        outcome
    }

    fn maybe_generate<R: Rng + ?Sized>(
        &self,
        pet: &mut PetRecord,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<TaskKind> {
        if pet.current_task.is_some() {
            return None;
        }
        let hour = self.zone.local_hour(now);
        if hour < self.rules.window_start_hour || hour >= self.rules.window_end_hour {
            return None;
        }
        if pet.tasks_completed_today >= self.rules.daily_task_cap {
            return None;
        }

        let probability = self.generation_probability(pet, now);
        if probability <= 0.0 || !rng.gen_bool(probability) {
            return None;
        }

        let kind = TaskKind::ALL[rng.gen_range(0..TaskKind::ALL.len())];
        pet.current_task = Some(PetTask {
            kind,
            created_at: now,
            deadline: now + self.rules.task_lifetime,
        });
        pet.last_task_generated_at = Some(now);
        Some(kind)
    }

    /// Grows quadratically with the time since the last task (or since the
    /// window opened today, whichever is later) and saturates at
    /// `target_interval`.
    pub fn generation_probability(&self, pet: &PetRecord, now: DateTime<Utc>) -> f64 {
        let opening = self.zone.at_local_hour(now, self.rules.window_start_hour);
        let anchor = match (pet.last_task_generated_at, opening) {
            (Some(last), Some(open)) => last.max(open),
            (Some(last), None) => last,
            (None, Some(open)) => open,
            (None, None) => return 1.0,
        };
        let elapsed = now.signed_duration_since(anchor);
        if pet.last_task_generated_at.is_some_and(|last| now - last < self.rules.min_generation_gap) {
            return 0.0;
        }
        let target = self.rules.target_interval.num_seconds().max(1) as f64;
        let ratio = (elapsed.num_seconds().max(0) as f64 / target).min(1.0);
        ratio * ratio
    }

    /// Creates a pet when the user has none or only a dead one. A replacement
    /// keeps the cosmetics bought for its predecessor.
    pub fn create_pet(
        &self,
        user: &mut UserRecord,
        species: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<PetRecord, PetError> {
        let species: Species = species.parse()?;
        let name = clean_pet_name(name)?;

        let mut fresh = PetRecord::new(species, &name, now);
        if let Some(existing) = user.pet.as_mut() {
            enforce_deadline(existing, now);
            if existing.is_alive() {
                return Err(PetError::PetAlreadyExists);
            }
            fresh.inventory = std::mem::take(&mut existing.inventory);
            fresh.outfit = std::mem::take(&mut existing.outfit);
        }
        user.pet = Some(fresh.clone());
        Ok(fresh)
    }

    /// Completes the pending task. An expired task kills the pet instead and
    /// the completion is refused.
    pub fn complete_task(
        &self,
        user: &mut UserRecord,
        now: DateTime<Utc>,
    ) -> Result<TaskCompletion, PetError> {
        let pet = user.pet.as_mut().ok_or(PetError::NoPet)?;
        if pet.is_dead || enforce_deadline(pet, now) {
            return Err(PetError::PetIsDead);
        }
        let task = pet.current_task.take().ok_or(PetError::NoPendingTask)?;

        let today = self.zone.local_date(now);
        let streak_extended = pet.last_task_date != Some(today);
        if streak_extended {
            pet.streak += 1;
            pet.tasks_completed_today = 0;
            pet.last_task_date = Some(today);
        }
        pet.tasks_completed_today += 1;
        pet.total_tasks_completed += 1;

        Ok(TaskCompletion {
            kind: task.kind,
            streak: pet.streak,
            streak_extended,
            tasks_completed_today: pet.tasks_completed_today,
        })
    }

    pub fn rename_pet(&self, user: &mut UserRecord, name: &str) -> Result<(), PetError> {
        let pet = alive_pet(user)?;
        pet.name = clean_pet_name(name)?;
        Ok(())
    }

    /// Switching species is not death: the name, task and cosmetics survive
    /// but streak accounting starts over.
    pub fn change_species(&self, user: &mut UserRecord, species: &str) -> Result<(), PetError> {
        let species: Species = species.parse()?;
        let pet = alive_pet(user)?;
        if pet.species == species {
            return Ok(());
        }
        pet.species = species;
        pet.streak = 0;
        pet.last_task_date = None;
        pet.tasks_completed_today = 0;
        Ok(())
    }

    pub fn view(&self, user: &UserRecord, now: DateTime<Utc>) -> PetView {
        let state = Self::state(user);
        let Some(pet) = &user.pet else {
            return PetView {
                state,
                species: None,
                name: None,
                streak: 0,
                tasks_completed_today: 0,
                daily_task_cap: self.rules.daily_task_cap,
                total_tasks_completed: 0,
                task: None,
                time_left: None,
                died_at: None,
                inventory: Vec::new(),
                outfit: BTreeMap::new(),
            };
        };
        let today = self.zone.local_date(now);
        let tasks_today = if pet.last_task_date == Some(today) {
            pet.tasks_completed_today
        } else {
            0
        };
        PetView {
            state,
            species: Some(pet.species),
            name: Some(pet.name.clone()),
            streak: pet.streak,
            tasks_completed_today: tasks_today,
            daily_task_cap: self.rules.daily_task_cap,
            total_tasks_completed: pet.total_tasks_completed,
            task: pet.current_task.clone(),
            time_left: pet
                .current_task
                .as_ref()
                .map(|task| task.deadline.signed_duration_since(now).num_seconds().max(0)),
            died_at: pet.died_at,
            inventory: pet.inventory.iter().cloned().collect(),
            outfit: pet.outfit.clone(),
        }
    }
}

fn alive_pet(user: &mut UserRecord) -> Result<&mut PetRecord, PetError> {
    let pet = user.pet.as_mut().ok_or(PetError::NoPet)?;
    if pet.is_dead {
        return Err(PetError::PetIsDead);
    }
    Ok(pet)
}

/// Kills the pet when its pending task is overdue. Returns `true` only on the
/// transition itself.
fn enforce_deadline(pet: &mut PetRecord, now: DateTime<Utc>) -> bool {
    if pet.is_dead {
        return false;
    }
    let Some(task) = &pet.current_task else {
        return false;
    };
    if !task.is_expired(now) {
        return false;
    }
    pet.died_at = Some(task.deadline);
    pet.is_dead = true;
    pet.current_task = None;
    true
}

fn roll_over_day(pet: &mut PetRecord, today: NaiveDate) -> bool {
    if pet.tasks_completed_today == 0 || pet.last_task_date == Some(today) {
        return false;
    }
    pet.tasks_completed_today = 0;
    true
}

fn clean_pet_name(name: &str) -> Result<String, PetError> {
    let cleaned = sanitize_display_text(name);
    if cleaned.is_empty() {
        return Err(PetError::EmptyName);
    }
    if cleaned.chars().count() > MAX_PET_NAME_CHARS {
        return Err(PetError::NameTooLong {
            max: MAX_PET_NAME_CHARS,
        });
    }
    Ok(cleaned)
}
