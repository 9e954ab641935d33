//! Reward ladder: how many gift milestones a student has earned and how far
//! away the next one is.
//!
//! Progress is measured on *earned* stickers (balance plus everything ever
//! spent in the shop) so buying cosmetics never sets a student back on the
//! ladder.

use serde::Serialize;

use crate::diary::errors::RewardError;
use crate::diary::types::{UserRecord, DEFAULT_GIFT_THRESHOLD};

/// Number of earned stickers between two milestones. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GiftThreshold(u32);

impl GiftThreshold {
    pub fn new(value: u32) -> Result<Self, RewardError> {
        if value == 0 {
            return Err(RewardError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for GiftThreshold {
    fn default() -> Self {
        Self(DEFAULT_GIFT_THRESHOLD)
    }
}

impl TryFrom<u32> for GiftThreshold {
    type Error = RewardError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Display-ready summary of a user's position on the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftProgress {
    pub earned: u32,
    pub balance: u32,
    pub threshold: u32,
    pub deserved: u32,
    pub until_next: u32,
    pub acknowledged: u32,
    /// Lowest reached milestone the user has not been shown yet.
    pub pending: Option<u32>,
}

pub fn earned_stickers(user: &UserRecord) -> u32 {
    user.stickers.saturating_add(user.spent_stickers)
}

pub fn deserved_gifts(earned: u32, threshold: GiftThreshold) -> u32 {
    earned / threshold.get()
}

/// Equals `threshold` right at a milestone (and at zero): the next gift is a
/// full cycle away.
pub fn stickers_until_next_gift(earned: u32, threshold: GiftThreshold) -> u32 {
    threshold.get() - earned % threshold.get()
}

/// Builds the progress summary, initializing the acknowledgement watermark on
/// first observation so milestones reached before tracking began are not
/// announced. Returns `true` in the second slot when the user record changed.
pub fn observe_milestones(user: &mut UserRecord, threshold: GiftThreshold) -> (GiftProgress, bool) {
    let earned = earned_stickers(user);
    let deserved = deserved_gifts(earned, threshold);
    let mut changed = false;
    let acknowledged = match user.last_acknowledged_gift {
        Some(mark) => mark,
        None => {
            user.last_acknowledged_gift = Some(deserved);
            changed = true;
            deserved
        }
    };
    let pending = (acknowledged < deserved).then_some(acknowledged + 1);
    let progress = GiftProgress {
        earned,
        balance: user.stickers,
        threshold: threshold.get(),
        deserved,
        until_next: stickers_until_next_gift(earned, threshold),
        acknowledged,
        pending,
    };
    (progress, changed)
}

/// Marks milestone `milestone` as shown. Acknowledging the same or a lower
/// number again changes nothing; the return value reports whether the
/// watermark moved.
pub fn acknowledge_gift(
    user: &mut UserRecord,
    threshold: GiftThreshold,
    milestone: u32,
) -> Result<bool, RewardError> {
    let deserved = deserved_gifts(earned_stickers(user), threshold);
    if milestone > deserved {
        return Err(RewardError::MilestoneNotReached {
            requested: milestone,
            deserved,
        });
    }
    let (_, initialized) = observe_milestones(user, threshold);
    let mark = user.last_acknowledged_gift.unwrap_or(deserved);
    if milestone <= mark {
        return Ok(initialized);
    }
    user.last_acknowledged_gift = Some(milestone);
    user.claimed_gifts.push(milestone);
    Ok(true)
}
