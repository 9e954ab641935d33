mod common;

use classdiary::diary::errors::{DiaryError, ShopError};
use classdiary::diary::types::CosmeticSlot;
use classdiary::storage::UserStore;
use common::{local, open_service, register_student, set_stickers, TestService};
use tempfile::tempdir;

fn student_with_pet(dir: &std::path::Path, stickers: u32) -> TestService {
    // Evening: no task generation interferes with the purchases below.
    let svc = open_service(dir, local(2, 20, 0));
    register_student(&svc, "200", "Boris");
    set_stickers(&svc, "200", stickers);
    svc.create_pet("200", "hamster", "Chip").unwrap();
    svc
}

#[test]
fn purchase_with_exact_balance_empties_wallet() {
    let dir = tempdir().unwrap();
    let svc = student_with_pet(dir.path(), 10);

    let user = svc.purchase_item("200", "crown").unwrap();
    assert_eq!(user.stickers, 0);
    assert_eq!(user.spent_stickers, 10);
    assert!(user.pet.unwrap().owns("crown"));
}

#[test]
fn one_sticker_short_changes_nothing() {
    let dir = tempdir().unwrap();
    let svc = student_with_pet(dir.path(), 9);
    let (_, digest_before) = svc.store().snapshot().unwrap();

    let err = svc.purchase_item("200", "crown").unwrap_err();
    assert!(matches!(
        err,
        DiaryError::Shop(ShopError::InsufficientFunds { price: 10, balance: 9 })
    ));

    let (_, digest_after) = svc.store().snapshot().unwrap();
    assert_eq!(digest_before, digest_after);
    let user = svc.store().load_user("200").unwrap().unwrap();
    assert_eq!(user.stickers, 9);
    assert_eq!(user.spent_stickers, 0);
    assert!(user.pet.unwrap().inventory.is_empty());
}

#[test]
fn items_are_bought_once() {
    let dir = tempdir().unwrap();
    let svc = student_with_pet(dir.path(), 20);
    svc.purchase_item("200", "bow").unwrap();
    assert!(matches!(
        svc.purchase_item("200", "bow"),
        Err(DiaryError::Shop(ShopError::AlreadyOwned(_)))
    ));
    let user = svc.store().load_user("200").unwrap().unwrap();
    assert_eq!(user.stickers, 17);
}

#[test]
fn unknown_items_are_checked_first() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "200", "Boris");

    assert!(matches!(
        svc.purchase_item("200", "jetpack"),
        Err(DiaryError::Shop(ShopError::UnknownItem(_)))
    ));
    assert!(matches!(
        svc.purchase_item("200", "cap"),
        Err(DiaryError::Shop(ShopError::NoPet))
    ));
}

#[test]
fn equipping_replaces_within_a_slot() {
    let dir = tempdir().unwrap();
    let svc = student_with_pet(dir.path(), 20);
    svc.purchase_item("200", "cap").unwrap();
    svc.purchase_item("200", "crown").unwrap();
    svc.purchase_item("200", "scarf").unwrap();

    svc.equip_item("200", "cap").unwrap();
    svc.equip_item("200", "scarf").unwrap();
    let view = svc.equip_item("200", "crown").unwrap();

    assert_eq!(view.outfit.len(), 2);
    assert_eq!(view.outfit.get(&CosmeticSlot::Head).map(String::as_str), Some("crown"));
    assert_eq!(view.outfit.get(&CosmeticSlot::Neck).map(String::as_str), Some("scarf"));
    assert!(view.inventory.contains(&"cap".to_string()));
    assert!(view.inventory.contains(&"crown".to_string()));
}

#[test]
fn only_owned_items_can_be_worn() {
    let dir = tempdir().unwrap();
    let svc = student_with_pet(dir.path(), 0);
    assert!(matches!(
        svc.equip_item("200", "glasses"),
        Err(DiaryError::Shop(ShopError::NotOwned(_)))
    ));
}

#[test]
fn unequip_clears_the_slot_only() {
    let dir = tempdir().unwrap();
    let svc = student_with_pet(dir.path(), 20);
    svc.purchase_item("200", "boots").unwrap();
    svc.purchase_item("200", "glasses").unwrap();
    svc.equip_item("200", "boots").unwrap();
    svc.equip_item("200", "glasses").unwrap();

    let view = svc.unequip_item("200", CosmeticSlot::Feet).unwrap();
    assert!(view.outfit.get(&CosmeticSlot::Feet).is_none());
    assert_eq!(
        view.outfit.get(&CosmeticSlot::Accessory).map(String::as_str),
        Some("glasses")
    );
    assert!(view.inventory.contains(&"boots".to_string()));

    // Clearing an empty slot is fine.
    svc.unequip_item("200", CosmeticSlot::Feet).unwrap();
}

#[test]
fn slot_names_parse() {
    assert_eq!("head".parse::<CosmeticSlot>().unwrap(), CosmeticSlot::Head);
    assert!(matches!(
        "tail".parse::<CosmeticSlot>(),
        Err(ShopError::UnknownSlot(_))
    ));
}
