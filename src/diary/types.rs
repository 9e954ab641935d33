use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::diary::errors::{PetError, ShopError};

pub const DOCUMENT_SCHEMA_VERSION: u32 = 1;

/// Default number of earned stickers between two gift milestones.
pub const DEFAULT_GIFT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Fixed species catalog a student can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Cat,
    Dog,
    Hamster,
    Bunny,
    Fox,
    Owl,
}

impl Species {
    pub const ALL: [Species; 6] = [
        Species::Cat,
        Species::Dog,
        Species::Hamster,
        Species::Bunny,
        Species::Fox,
        Species::Owl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Cat => "cat",
            Species::Dog => "dog",
            Species::Hamster => "hamster",
            Species::Bunny => "bunny",
            Species::Fox => "fox",
            Species::Owl => "owl",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = PetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Species::ALL
            .into_iter()
            .find(|species| species.as_str() == needle)
            .ok_or_else(|| PetError::InvalidSpecies(s.to_string()))
    }
}

/// Care prompts a pending task can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Feed,
    Play,
    Walk,
    Bathe,
    Sleep,
    Cuddle,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Feed,
        TaskKind::Play,
        TaskKind::Walk,
        TaskKind::Bathe,
        TaskKind::Sleep,
        TaskKind::Cuddle,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CosmeticSlot {
    Head,
    Neck,
    Feet,
    Accessory,
}

impl CosmeticSlot {
    pub const ALL: [CosmeticSlot; 4] = [
        CosmeticSlot::Head,
        CosmeticSlot::Neck,
        CosmeticSlot::Feet,
        CosmeticSlot::Accessory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CosmeticSlot::Head => "head",
            CosmeticSlot::Neck => "neck",
            CosmeticSlot::Feet => "feet",
            CosmeticSlot::Accessory => "accessory",
        }
    }
}

impl FromStr for CosmeticSlot {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        CosmeticSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == needle)
            .ok_or_else(|| ShopError::UnknownSlot(s.to_string()))
    }
}

/// The single outstanding obligation of a pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetTask {
    pub kind: TaskKind,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl PetTask {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetRecord {
    pub species: Species,
    pub name: String,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub died_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_task_date: Option<NaiveDate>,
    #[serde(default)]
    pub tasks_completed_today: u32,
    #[serde(default)]
    pub total_tasks_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_task_generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_task: Option<PetTask>,
    /// Owned cosmetic item ids.
    #[serde(default)]
    pub inventory: BTreeSet<String>,
    /// Worn item per slot; every value is also in `inventory`.
    #[serde(default)]
    pub outfit: BTreeMap<CosmeticSlot, String>,
}

impl PetRecord {
    pub fn new(species: Species, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            species,
            name: name.to_string(),
            is_dead: false,
            died_at: None,
            created_at: now,
            streak: 0,
            last_task_date: None,
            tasks_completed_today: 0,
            total_tasks_completed: 0,
            last_task_generated_at: None,
            current_task: None,
            inventory: BTreeSet::new(),
            outfit: BTreeMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    pub fn owns(&self, item_id: &str) -> bool {
        self.inventory.contains(item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Telegram numeric id, kept as a string.
    pub tg_id: String,
    #[serde(default)]
    pub username: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Free text, usually `DD.MM.YYYY`.
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub theme: Theme,
    /// Spendable balance.
    #[serde(default)]
    pub stickers: u32,
    /// Lifetime amount spent in the shop.
    #[serde(default)]
    pub spent_stickers: u32,
    #[serde(default)]
    pub absences: u32,
    /// Milestones already shown to the user, in acknowledgement order.
    #[serde(default)]
    pub claimed_gifts: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_acknowledged_gift: Option<u32>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_admin: bool,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub pet: Option<PetRecord>,
}

impl UserRecord {
    pub fn new(tg_id: &str, first_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            tg_id: tg_id.to_string(),
            username: String::new(),
            first_name: first_name.to_string(),
            last_name: String::new(),
            birth_date: String::new(),
            photo: String::new(),
            theme: Theme::Light,
            stickers: 0,
            spent_stickers: 0,
            absences: 0,
            claimed_gifts: Vec::new(),
            last_acknowledged_gift: None,
            is_blocked: false,
            is_admin: false,
            registered_at: now,
            pet: None,
        }
    }

    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_gift_threshold")]
    pub gift_threshold: u32,
}

fn default_admin_username() -> String {
    "@admin".to_string()
}

fn default_gift_threshold() -> u32 {
    DEFAULT_GIFT_THRESHOLD
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            gift_threshold: DEFAULT_GIFT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Class date as entered by the admin.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub is_hidden: bool,
    /// Telegram ids of students whose homework was accepted.
    #[serde(default)]
    pub completed_by: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    /// `image` or `video`, as reported by the client.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub hw_id: String,
    #[serde(default)]
    pub hw_title: String,
    pub tg_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// The whole persisted state: one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Incremented by the store on every successful write.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub homework: Vec<Homework>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub settings: Settings,
}

fn default_schema_version() -> u32 {
    DOCUMENT_SCHEMA_VERSION
}

impl Default for DiaryDocument {
    fn default() -> Self {
        Self {
            schema_version: DOCUMENT_SCHEMA_VERSION,
            revision: 0,
            users: Vec::new(),
            topics: Vec::new(),
            homework: Vec::new(),
            submissions: Vec::new(),
            settings: Settings::default(),
        }
    }
}

impl DiaryDocument {
    pub fn user(&self, tg_id: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.tg_id == tg_id)
    }

    pub fn user_mut(&mut self, tg_id: &str) -> Option<&mut UserRecord> {
        self.users.iter_mut().find(|u| u.tg_id == tg_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_parse_is_case_insensitive() {
        assert_eq!("Cat".parse::<Species>().unwrap(), Species::Cat);
        assert_eq!(" owl ".parse::<Species>().unwrap(), Species::Owl);
        assert_eq!(
            "dragon".parse::<Species>(),
            Err(PetError::InvalidSpecies("dragon".to_string()))
        );
    }

    #[test]
    fn legacy_user_json_loads_with_defaults() {
        let raw = r#"{
            "tgId": "12345",
            "username": "anna",
            "firstName": "Anna",
            "lastName": "Petrova",
            "birthDate": "01.02.2012",
            "photo": "",
            "stickers": 7,
            "absences": 1,
            "isAdmin": false,
            "theme": "dark",
            "registeredAt": "2024-09-01T10:00:00.000Z"
        }"#;
        let user: UserRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(user.stickers, 7);
        assert_eq!(user.spent_stickers, 0);
        assert_eq!(user.theme, Theme::Dark);
        assert!(user.pet.is_none());
        assert!(user.last_acknowledged_gift.is_none());
    }

    #[test]
    fn legacy_content_without_optional_strings_loads() {
        let raw = r#"{
            "users": [],
            "topics": [{"id": "1", "title": "Lesson", "isHidden": false, "isCurrent": true}],
            "homework": [{"id": "2", "dueDate": "12.03"}]
        }"#;
        let doc: DiaryDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.topics[0].title, "Lesson");
        assert_eq!(doc.topics[0].date, "");
        assert!(doc.topics[0].is_current);
        assert_eq!(doc.homework[0].title, "");
        assert_eq!(doc.homework[0].due_date, "12.03");
    }

    #[test]
    fn outfit_serializes_with_slot_names() {
        let mut pet = PetRecord::new(Species::Fox, "Rusty", Utc::now());
        pet.inventory.insert("crown".to_string());
        pet.outfit.insert(CosmeticSlot::Head, "crown".to_string());
        let json = serde_json::to_value(&pet).unwrap();
        assert_eq!(json["outfit"]["head"], "crown");
        assert_eq!(json["species"], "fox");
    }
}
