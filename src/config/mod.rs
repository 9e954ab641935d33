//! # Configuration Management Module
//!
//! One TOML file drives the whole server: where it listens, where the diary
//! document lives, how the pet scheduler behaves, what the shop sells and who
//! may use the admin API.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use classdiary::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     println!("Listening on {}", config.server.bind);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//! static_dir = "./public"
//!
//! [storage]
//! data_dir = "./data"
//! max_upload_bytes = 52428800
//!
//! [logging]
//! level = "info"
//! file = "classdiary.log"
//! security_file = "classdiary-security.log"
//!
//! [pet]
//! utc_offset_minutes = 180
//! window_start_hour = 4
//! window_end_hour = 18
//!
//! [rewards]
//! homework_award = 1
//!
//! [[admins]]
//! name = "teacher"
//! password_hash = "$argon2id$v=19$..."
//! ```
//!
//! Sections other than `[server]`, `[storage]` and `[logging]` may be omitted
//! and fall back to their defaults.

use std::collections::HashSet;

use anyhow::{anyhow, bail, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::diary::clock::ReferenceZone;
use crate::diary::content::UploadLimits;
use crate::diary::pet::PetRules;
use crate::diary::shop::{default_items, Catalog, CosmeticItem};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub pet: PetConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub admins: Vec<AdminCredential>,
    pub security: Option<SecurityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Directory with the Mini App front-end, served at `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Request body limit; submissions carry base64 media inline.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_max_media_items")]
    pub max_media_items: usize,
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_max_media_items() -> usize {
    10
}

impl StorageConfig {
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_items: self.max_media_items,
            max_item_bytes: self.max_upload_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

/// Pet scheduler tunables. Hours are local to `utc_offset_minutes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PetConfig {
    pub utc_offset_minutes: i32,
    pub window_start_hour: u32,
    pub window_end_hour: u32,
    pub daily_task_cap: u32,
    pub task_lifetime_minutes: i64,
    pub min_generation_gap_minutes: i64,
    pub target_interval_minutes: i64,
}

impl Default for PetConfig {
    fn default() -> Self {
        let rules = PetRules::default();
        Self {
            utc_offset_minutes: 180,
            window_start_hour: rules.window_start_hour,
            window_end_hour: rules.window_end_hour,
            daily_task_cap: rules.daily_task_cap,
            task_lifetime_minutes: rules.task_lifetime.num_minutes(),
            min_generation_gap_minutes: rules.min_generation_gap.num_minutes(),
            target_interval_minutes: rules.target_interval.num_minutes(),
        }
    }
}

impl PetConfig {
    pub fn rules(&self) -> PetRules {
        PetRules {
            window_start_hour: self.window_start_hour,
            window_end_hour: self.window_end_hour,
            daily_task_cap: self.daily_task_cap,
            task_lifetime: Duration::minutes(self.task_lifetime_minutes),
            min_generation_gap: Duration::minutes(self.min_generation_gap_minutes),
            target_interval: Duration::minutes(self.target_interval_minutes),
        }
    }

    pub fn zone(&self) -> Result<ReferenceZone> {
        ReferenceZone::from_offset_minutes(self.utc_offset_minutes)
            .ok_or_else(|| anyhow!("pet.utc_offset_minutes out of range: {}", self.utc_offset_minutes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    /// Stickers credited when a homework is marked done.
    pub homework_award: u32,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self { homework_award: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_items")]
    pub items: Vec<CosmeticItem>,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            items: default_items(),
        }
    }
}

impl ShopConfig {
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.items.clone())
    }
}

/// An admin allowed to call `/api/admin/*`. Only the Argon2 hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCredential {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        Config::default().save(path).await
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Rejects settings the diary cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            bail!("server.bind cannot be empty");
        }
        if self.storage.data_dir.trim().is_empty() {
            bail!("storage.data_dir cannot be empty");
        }
        if self.storage.max_upload_bytes == 0 {
            bail!("storage.max_upload_bytes must be positive");
        }

        let pet = &self.pet;
        pet.zone()?;
        if pet.window_start_hour >= pet.window_end_hour || pet.window_end_hour > 24 {
            bail!(
                "pet window {}..{} is invalid (need start < end <= 24)",
                pet.window_start_hour,
                pet.window_end_hour
            );
        }
        if pet.daily_task_cap == 0 {
            bail!("pet.daily_task_cap must be positive");
        }
        if pet.task_lifetime_minutes <= 0 || pet.target_interval_minutes <= 0 {
            bail!("pet task lifetime and target interval must be positive");
        }
        if pet.min_generation_gap_minutes < 0 {
            bail!("pet.min_generation_gap_minutes cannot be negative");
        }

        let mut seen = HashSet::new();
        for item in &self.shop.items {
            if item.id.trim().is_empty() || !seen.insert(item.id.as_str()) {
                bail!("shop item id {:?} is empty or duplicated", item.id);
            }
            if item.price == 0 {
                bail!("shop item {} must have a positive price", item.id);
            }
        }

        let mut names = HashSet::new();
        for admin in &self.admins {
            if admin.name.trim().is_empty() || admin.name.contains(':') {
                bail!("admin name {:?} must be non-empty and contain no ':'", admin.name);
            }
            if !names.insert(admin.name.as_str()) {
                bail!("admin {} is listed twice", admin.name);
            }
        }
        self.argon2_params()?;
        Ok(())
    }

    /// Argon2 parameters from `[security.argon2]`, or `None` for the defaults.
    pub fn argon2_params(&self) -> Result<Option<Params>> {
        let Some(a) = self.security.as_ref().and_then(|s| s.argon2.as_ref()) else {
            return Ok(None);
        };
        let builder = Params::DEFAULT;
        let mem = a.memory_kib.unwrap_or(builder.m_cost());
        let time = a.time_cost.unwrap_or(builder.t_cost());
        let para = a.parallelism.unwrap_or(builder.p_cost());
        Params::new(mem, time, para, None)
            .map(Some)
            .map_err(|e| anyhow!("invalid argon2 parameters: {}", e))
    }

    /// Hasher used for new admin passwords.
    pub fn argon2(&self) -> Result<Argon2<'static>> {
        Ok(match self.argon2_params()? {
            Some(p) => Argon2::new(Algorithm::Argon2id, Version::V0x13, p),
            None => Argon2::default(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind: "0.0.0.0:3000".to_string(),
                cors_origins: Vec::new(),
                static_dir: Some("./public".to_string()),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                max_upload_bytes: default_max_upload_bytes(),
                max_media_items: default_max_media_items(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("classdiary.log".to_string()),
                security_file: Some("classdiary-security.log".to_string()),
            },
            pet: PetConfig::default(),
            rewards: RewardsConfig::default(),
            shop: ShopConfig::default(),
            admins: vec![AdminCredential {
                name: "teacher".to_string(),
                password_hash: None,
            }],
            security: Some(SecurityConfig::default()),
        }
    }
}
