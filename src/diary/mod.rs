//! Class diary domain model: students, sticker rewards, the virtual pet and
//! its cosmetic shop, plus the topics/homework content admins publish.
//! Everything here is synchronous and storage-agnostic; the HTTP layer drives
//! it through [`service::DiaryService`] and [`storage::DocumentStore`](crate::storage::DocumentStore).

pub mod admin;
pub mod clock;
pub mod content;
pub mod errors;
pub mod pet;
pub mod registry;
pub mod rewards;
pub mod service;
pub mod shop;
pub mod types;

pub use admin::{apply_admin_action, update_settings, AdminAction, SettingsUpdate};
pub use clock::{Clock, ManualClock, ReferenceZone, SystemClock};
pub use content::{
    create_homework, create_topic, delete_homework, delete_submission, delete_topic,
    mark_homework, remove_uploads, review_submission, submit, submit_and_commit, update_homework,
    update_topic, visible_homework,
    visible_topics, HomeworkDraft, HomeworkUpdate, MediaUpload, NewSubmission, TopicDraft,
    TopicUpdate, UploadLimits,
};
pub use errors::{DiaryError, PetError, RewardError, ShopError};
pub use pet::{PetEngine, PetRules, PetState, PetView, RefreshOutcome, TaskCompletion};
pub use registry::{register, update_profile, NewUser, ProfileUpdate};
pub use rewards::{GiftProgress, GiftThreshold};
pub use service::{DiaryService, PetUpdate};
pub use shop::{default_items, Catalog, CosmeticItem};
pub use types::*;
