mod common;

use chrono::Utc;
use classdiary::diary::errors::{DiaryError, RewardError};
use classdiary::diary::rewards::{
    acknowledge_gift, deserved_gifts, earned_stickers, observe_milestones,
    stickers_until_next_gift, GiftThreshold,
};
use classdiary::diary::types::UserRecord;
use common::{local, open_service, register_student, set_stickers};
use proptest::prelude::*;
use tempfile::tempdir;

fn user_with(stickers: u32, spent: u32) -> UserRecord {
    let mut user = UserRecord::new("1", "Test", Utc::now());
    user.stickers = stickers;
    user.spent_stickers = spent;
    user
}

proptest! {
    #[test]
    fn next_gift_is_never_more_than_one_cycle_away(earned in 0u32..100_000, t in 1u32..500) {
        let threshold = GiftThreshold::new(t).unwrap();
        let until = stickers_until_next_gift(earned, threshold);
        prop_assert!(until > 0);
        prop_assert!(until <= t);
        let deserved = deserved_gifts(earned, threshold);
        prop_assert_eq!((deserved + 1) * t - until, earned);
    }

    #[test]
    fn earning_never_loses_milestones(earned in 0u32..100_000, extra in 0u32..1_000, t in 1u32..500) {
        let threshold = GiftThreshold::new(t).unwrap();
        prop_assert!(deserved_gifts(earned + extra, threshold) >= deserved_gifts(earned, threshold));
    }

    #[test]
    fn spending_keeps_ladder_position(balance in 0u32..10_000, price in 0u32..10_000, t in 1u32..50) {
        let threshold = GiftThreshold::new(t).unwrap();
        let price = price.min(balance);
        let before = user_with(balance, 0);
        let after = user_with(balance - price, price);
        prop_assert_eq!(earned_stickers(&before), earned_stickers(&after));
        prop_assert_eq!(
            deserved_gifts(earned_stickers(&before), threshold),
            deserved_gifts(earned_stickers(&after), threshold)
        );
    }

    #[test]
    fn acknowledgement_is_idempotent(stickers in 0u32..1_000, t in 1u32..20) {
        let threshold = GiftThreshold::new(t).unwrap();
        let mut user = user_with(0, 0);
        observe_milestones(&mut user, threshold);
        user.stickers = stickers;
        let deserved = deserved_gifts(stickers, threshold);
        if deserved > 0 {
            acknowledge_gift(&mut user, threshold, deserved).unwrap();
            let snapshot = user.clone();
            prop_assert!(!acknowledge_gift(&mut user, threshold, deserved).unwrap());
            prop_assert_eq!(user, snapshot);
        }
    }
}

#[test]
fn threshold_five_ladder() {
    let threshold = GiftThreshold::new(5).unwrap();
    let cases = [(0, 0, 5), (4, 0, 1), (5, 1, 5), (7, 1, 3), (10, 2, 5)];
    for (earned, deserved, until) in cases {
        assert_eq!(deserved_gifts(earned, threshold), deserved, "earned {}", earned);
        assert_eq!(stickers_until_next_gift(earned, threshold), until, "earned {}", earned);
    }
    assert!(matches!(
        GiftThreshold::new(0),
        Err(RewardError::InvalidThreshold(0))
    ));
}

#[test]
fn gift_is_announced_once_and_acknowledged_once() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "300", "Vera");

    let start = svc.gift_progress("300").unwrap();
    assert_eq!(start.deserved, 0);
    assert_eq!(start.pending, None);

    set_stickers(&svc, "300", 6);
    let progress = svc.gift_progress("300").unwrap();
    assert_eq!(progress.deserved, 1);
    assert_eq!(progress.until_next, 4);
    assert_eq!(progress.pending, Some(1));

    let acked = svc.acknowledge_gift("300", 1).unwrap();
    assert_eq!(acked.acknowledged, 1);
    assert_eq!(acked.pending, None);
    let again = svc.acknowledge_gift("300", 1).unwrap();
    assert_eq!(again, acked);

    assert!(matches!(
        svc.acknowledge_gift("300", 2),
        Err(DiaryError::Reward(RewardError::MilestoneNotReached {
            requested: 2,
            deserved: 1
        }))
    ));
    let user = svc.get_user("300").unwrap().unwrap();
    assert_eq!(user.claimed_gifts, vec![1]);
}

#[test]
fn milestones_before_tracking_are_not_announced() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "300", "Vera");
    set_stickers(&svc, "300", 12);

    let progress = svc.gift_progress("300").unwrap();
    assert_eq!(progress.deserved, 2);
    assert_eq!(progress.acknowledged, 2);
    assert_eq!(progress.pending, None);
}

#[test]
fn shopping_does_not_move_the_ladder() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "300", "Vera");
    set_stickers(&svc, "300", 10);
    svc.create_pet("300", "bunny", "Snow").unwrap();
    let before = svc.gift_progress("300").unwrap();

    svc.purchase_item("300", "crown").unwrap();
    let after = svc.gift_progress("300").unwrap();
    assert_eq!(after.balance, 0);
    assert_eq!(after.earned, before.earned);
    assert_eq!(after.deserved, 2);
    assert_eq!(after.until_next, before.until_next);
}

#[test]
fn threshold_change_applies_to_everyone() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "300", "Vera");
    set_stickers(&svc, "300", 7);
    svc.store()
        .transact(|doc| {
            doc.settings.gift_threshold = 3;
            Ok(())
        })
        .unwrap();
    let progress = svc.gift_progress("300").unwrap();
    assert_eq!(progress.threshold, 3);
    assert_eq!(progress.deserved, 2);
    assert_eq!(progress.until_next, 2);
}
