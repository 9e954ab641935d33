//! Moderation and manual corrections performed by admins.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::diary::errors::{DiaryError, RewardError};
use crate::diary::types::{DiaryDocument, Settings, UserRecord};
use crate::logutil::{escape_log, sec_log};
use crate::validation::{validate_required_line, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdminAction {
    AddSticker,
    RemoveSticker,
    AddAbsence,
    RemoveAbsence,
    Block,
    Unblock,
    GrantAdmin,
    RevokeAdmin,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::AddSticker => "addSticker",
            AdminAction::RemoveSticker => "removeSticker",
            AdminAction::AddAbsence => "addAbsence",
            AdminAction::RemoveAbsence => "removeAbsence",
            AdminAction::Block => "block",
            AdminAction::Unblock => "unblock",
            AdminAction::GrantAdmin => "grantAdmin",
            AdminAction::RevokeAdmin => "revokeAdmin",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminAction {
    type Err = ValidationError;

    /// Accepts the canonical names and the short button codes of the admin
    /// panel (`addS`, `remS`, `addA`, `remA`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s.trim() {
            "addSticker" | "addS" => AdminAction::AddSticker,
            "removeSticker" | "remS" => AdminAction::RemoveSticker,
            "addAbsence" | "addA" => AdminAction::AddAbsence,
            "removeAbsence" | "remA" => AdminAction::RemoveAbsence,
            "block" => AdminAction::Block,
            "unblock" => AdminAction::Unblock,
            "grantAdmin" => AdminAction::GrantAdmin,
            "revokeAdmin" => AdminAction::RevokeAdmin,
            other => return Err(ValidationError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

/// Applies `action` to `user`. Counters never go below zero.
pub fn apply_admin_action(user: &mut UserRecord, action: AdminAction, actor: &str) {
    match action {
        AdminAction::AddSticker => user.stickers = user.stickers.saturating_add(1),
        AdminAction::RemoveSticker => user.stickers = user.stickers.saturating_sub(1),
        AdminAction::AddAbsence => user.absences = user.absences.saturating_add(1),
        AdminAction::RemoveAbsence => user.absences = user.absences.saturating_sub(1),
        AdminAction::Block => user.is_blocked = true,
        AdminAction::Unblock => user.is_blocked = false,
        AdminAction::GrantAdmin => user.is_admin = true,
        AdminAction::RevokeAdmin => user.is_admin = false,
    }
    sec_log!(
        "ADMIN {} by {} on user {} (stickers={}, absences={}, blocked={})",
        action,
        escape_log(actor),
        user.tg_id,
        user.stickers,
        user.absences,
        user.is_blocked
    );
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub admin_username: Option<String>,
    pub gift_threshold: Option<u32>,
}

pub fn update_settings(
    doc: &mut DiaryDocument,
    update: SettingsUpdate,
    actor: &str,
) -> Result<Settings, DiaryError> {
    if let Some(0) = update.gift_threshold {
        return Err(RewardError::InvalidThreshold(0).into());
    }
    let admin_username = update
        .admin_username
        .map(|v| validate_required_line(&v, "admin username", 64))
        .transpose()?;

    if let Some(v) = admin_username {
        doc.settings.admin_username = v;
    }
    if let Some(t) = update.gift_threshold {
        doc.settings.gift_threshold = t;
    }
    sec_log!(
        "SETTINGS by {}: admin_username={} gift_threshold={}",
        escape_log(actor),
        escape_log(&doc.settings.admin_username),
        doc.settings.gift_threshold
    );
    Ok(doc.settings.clone())
}
