mod common;

use chrono::Duration;
use classdiary::diary::errors::{DiaryError, PetError};
use classdiary::diary::pet::PetState;
use classdiary::diary::types::{CosmeticSlot, PetTask, TaskKind};
use classdiary::storage::UserStore;
use common::{local, open_service, register_student, set_stickers};
use tempfile::tempdir;

#[test]
fn fluffy_dies_when_a_task_is_ignored() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 9, 0));
    register_student(&svc, "100", "Anna");

    let created = svc.create_pet("100", "cat", "Fluffy").unwrap();
    assert_eq!(created.state, PetState::AliveIdle);
    assert_eq!(created.streak, 0);
    assert_eq!(created.name.as_deref(), Some("Fluffy"));

    // Six hours after the window opened generation is certain.
    svc.clock().set(local(2, 10, 0));
    let pending = svc.pet_view("100").unwrap();
    assert_eq!(pending.state, PetState::AliveTaskPending);
    let task = pending.task.expect("task generated");
    assert_eq!(task.deadline, local(2, 14, 0));
    assert_eq!(pending.time_left, Some(4 * 3600));

    svc.clock().set(local(2, 14, 1));
    let dead = svc.pet_view("100").unwrap();
    assert_eq!(dead.state, PetState::Dead);
    assert_eq!(dead.died_at, Some(local(2, 14, 0)));
    assert!(dead.task.is_none());
}

#[test]
fn death_is_recorded_once_and_survives_reopening() {
    let dir = tempdir().unwrap();
    {
        let svc = open_service(dir.path(), local(2, 9, 0));
        register_student(&svc, "100", "Anna");
        svc.create_pet("100", "cat", "Fluffy").unwrap();
        svc.clock().set(local(2, 10, 0));
        svc.pet_view("100").unwrap();
        svc.clock().set(local(2, 15, 0));
        assert_eq!(svc.pet_view("100").unwrap().state, PetState::Dead);
    }

    let svc = open_service(dir.path(), local(3, 12, 0));
    for hours in [0, 5, 30] {
        svc.clock().set(local(3, 12, 0) + Duration::hours(hours));
        let view = svc.pet_view("100").unwrap();
        assert_eq!(view.state, PetState::Dead);
        assert_eq!(view.died_at, Some(local(2, 14, 0)));
    }
    let stored = svc.store().load_user("100").unwrap().unwrap();
    assert_eq!(stored.pet.unwrap().died_at, Some(local(2, 14, 0)));
}

#[test]
fn nothing_is_generated_outside_the_activity_window() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 19, 0));
    register_student(&svc, "100", "Anna");
    svc.create_pet("100", "dog", "Rex").unwrap();

    for instant in [local(2, 19, 30), local(2, 23, 59), local(3, 3, 0), local(3, 4, 0)] {
        svc.clock().set(instant);
        assert_eq!(svc.pet_view("100").unwrap().state, PetState::AliveIdle);
    }

    svc.clock().set(local(3, 6, 0));
    assert_eq!(svc.pet_view("100").unwrap().state, PetState::AliveTaskPending);
}

#[test]
fn streak_counts_days_not_tasks() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 5, 0));
    register_student(&svc, "100", "Anna");
    svc.create_pet("100", "fox", "Rusty").unwrap();

    svc.clock().set(local(2, 6, 0));
    assert_eq!(svc.pet_view("100").unwrap().state, PetState::AliveTaskPending);
    svc.clock().set(local(2, 6, 10));
    let (first, _) = svc.complete_task("100").unwrap();
    assert_eq!(first.streak, 1);
    assert!(first.streak_extended);

    svc.clock().set(local(2, 8, 10));
    svc.pet_view("100").unwrap();
    svc.clock().set(local(2, 8, 20));
    let (second, view) = svc.complete_task("100").unwrap();
    assert_eq!(second.streak, 1);
    assert!(!second.streak_extended);
    assert_eq!(view.tasks_completed_today, 2);

    svc.clock().set(local(3, 6, 0));
    svc.pet_view("100").unwrap();
    svc.clock().set(local(3, 6, 5));
    let (next_day, view) = svc.complete_task("100").unwrap();
    assert_eq!(next_day.streak, 2);
    assert_eq!(view.tasks_completed_today, 1);
    assert_eq!(view.total_tasks_completed, 3);
}

#[test]
fn daily_cap_stops_generation() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 5, 0));
    register_student(&svc, "100", "Anna");
    svc.create_pet("100", "cat", "Fluffy").unwrap();

    let mut generated_at = local(2, 6, 0);
    for done in 1..=4 {
        svc.clock().set(generated_at);
        assert_eq!(
            svc.pet_view("100").unwrap().state,
            PetState::AliveTaskPending,
            "task {} should be generated",
            done
        );
        svc.clock().set(generated_at + Duration::minutes(10));
        let (completion, _) = svc.complete_task("100").unwrap();
        assert_eq!(completion.tasks_completed_today, done);
        generated_at = generated_at + Duration::minutes(130);
    }

    for instant in [generated_at, local(2, 17, 59)] {
        svc.clock().set(instant);
        let view = svc.pet_view("100").unwrap();
        assert_eq!(view.state, PetState::AliveIdle);
        assert_eq!(view.tasks_completed_today, 4);
    }

    svc.clock().set(local(3, 6, 30));
    assert_eq!(svc.pet_view("100").unwrap().state, PetState::AliveTaskPending);
}

#[test]
fn completing_requires_a_pending_task() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "100", "Anna");

    assert!(matches!(
        svc.complete_task("100"),
        Err(DiaryError::Pet(PetError::NoPet))
    ));
    svc.create_pet("100", "owl", "Hoot").unwrap();
    assert!(matches!(
        svc.complete_task("100"),
        Err(DiaryError::Pet(PetError::NoPendingTask))
    ));
    assert!(matches!(
        svc.create_pet("100", "cat", "Second"),
        Err(DiaryError::Pet(PetError::PetAlreadyExists))
    ));
    assert!(matches!(
        svc.create_pet("999", "cat", "Ghost"),
        Err(DiaryError::NotFound(_))
    ));
}

#[test]
fn invalid_pet_input_is_rejected() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "100", "Anna");

    assert!(matches!(
        svc.create_pet("100", "dragon", "Smaug"),
        Err(DiaryError::Pet(PetError::InvalidSpecies(_)))
    ));
    assert!(matches!(
        svc.create_pet("100", "cat", "   "),
        Err(DiaryError::Pet(PetError::EmptyName))
    ));
    assert!(matches!(
        svc.create_pet("100", "cat", &"x".repeat(40)),
        Err(DiaryError::Pet(PetError::NameTooLong { .. }))
    ));
    assert_eq!(svc.pet_view("100").unwrap().state, PetState::NoPet);
}

#[test]
fn replacement_pet_inherits_cosmetics() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "100", "Anna");
    set_stickers(&svc, "100", 10);
    svc.create_pet("100", "cat", "Fluffy").unwrap();
    svc.purchase_item("100", "cap").unwrap();
    svc.equip_item("100", "cap").unwrap();

    svc.store()
        .update_user("100", |user| {
            let pet = user.pet.as_mut().unwrap();
            pet.current_task = Some(PetTask {
                kind: TaskKind::Feed,
                created_at: local(2, 20, 0),
                deadline: local(2, 21, 0),
            });
            Ok(())
        })
        .unwrap();
    svc.clock().set(local(2, 22, 0));
    assert_eq!(svc.pet_view("100").unwrap().state, PetState::Dead);

    let reborn = svc.create_pet("100", "dog", "Rex").unwrap();
    assert_eq!(reborn.state, PetState::AliveIdle);
    assert_eq!(reborn.streak, 0);
    assert!(reborn.died_at.is_none());
    assert_eq!(reborn.inventory, vec!["cap".to_string()]);
    assert_eq!(reborn.outfit.get(&CosmeticSlot::Head).map(String::as_str), Some("cap"));

    let user = svc.store().load_user("100").unwrap().unwrap();
    assert_eq!(user.stickers, 6);
    assert_eq!(user.spent_stickers, 4);
}

#[test]
fn renaming_and_species_change_keep_the_pet_alive() {
    let dir = tempdir().unwrap();
    let svc = open_service(dir.path(), local(2, 20, 0));
    register_student(&svc, "100", "Anna");
    svc.create_pet("100", "cat", "Fluffy").unwrap();

    let update = classdiary::diary::PetUpdate {
        name: Some("  Mr   Whiskers ".to_string()),
        species: Some("Bunny".to_string()),
    };
    let view = svc.update_pet("100", &update).unwrap();
    assert_eq!(view.state, PetState::AliveIdle);
    assert_eq!(view.name.as_deref(), Some("Mr Whiskers"));
    assert_eq!(view.species.map(|s| s.as_str()), Some("bunny"));
}
