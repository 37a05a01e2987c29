use std::sync::Arc;

use serde_json::json;
use shared::{
    domain::{Planet, System},
    error::NoticeLevel,
    store::DOCUMENT_KEY,
};
use storage::MemoryStore;
use tokio::sync::broadcast::Receiver;

use super::*;

type TestOrganizer = Organizer<Arc<MemoryStore>>;

async fn open_with(store: Arc<MemoryStore>) -> TestOrganizer {
    Organizer::open_with_rng(store, Viewport::new(1000.0, 600.0), StdRng::seed_from_u64(7)).await
}

async fn open_fresh() -> (TestOrganizer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (open_with(Arc::clone(&store)).await, store)
}

fn messages(rx: &mut Receiver<Notice>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice.message);
    }
    out
}

fn current_id(organizer: &TestOrganizer) -> SystemId {
    organizer.state().current.clone().expect("current system")
}

fn snapshot(organizer: &TestOrganizer) -> String {
    Snapshot::capture(organizer.state()).expect("snapshot")
}

async fn rename_current(organizer: &mut TestOrganizer, name: &str) {
    let id = current_id(organizer);
    organizer
        .edit_system(
            &id,
            SystemPatch {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("rename");
}

async fn stored_state(store: &MemoryStore) -> AppState {
    let raw = store
        .read(DOCUMENT_KEY)
        .await
        .expect("read")
        .expect("document stored");
    serde_json::from_slice(&raw).expect("stored state")
}

#[tokio::test]
async fn empty_store_is_seeded_and_persisted() {
    let (organizer, store) = open_fresh().await;
    let state = organizer.state();
    assert_eq!(state.systems.len(), 2);
    assert_eq!(state.current_system().expect("current").name, "School");
    assert!(state.link_mode && !state.edit_mode);
    assert_eq!(organizer.undo_depth(), 0);
    assert_eq!(&stored_state(&store).await, state);
}

#[tokio::test]
async fn corrupt_document_falls_back_to_starter_systems() {
    let store = Arc::new(MemoryStore::with_document(DOCUMENT_KEY, "{\"systems\": [").await);
    let organizer = open_with(store).await;
    assert_eq!(organizer.state().systems.len(), 2);
}

#[tokio::test]
async fn legacy_document_is_migrated_and_rewritten() {
    let legacy = json!({
        "systems": [
            { "id": "work", "name": "Work", "planets": {
                "a": { "id": "docs", "name": "Docs", "url": "https://docs.rs", "x": 0, "y": 120 }
            } }
        ],
        "current": "missing",
        "adv": { "speedMult": 2 }
    });
    let store = Arc::new(
        MemoryStore::with_document(DOCUMENT_KEY, legacy.to_string().into_bytes()).await,
    );
    let organizer = open_with(Arc::clone(&store)).await;

    let state = organizer.state();
    assert_eq!(state.current, Some(SystemId::from("work")));
    assert_eq!(state.adv.speed_mult, 2.0);
    let planet = &state.current_system().expect("work").planets[0];
    assert!((planet.orbit.radius - 120.0).abs() < 1e-9);

    let stored = stored_state(&store).await;
    assert_eq!(&stored, state);
}

#[tokio::test]
async fn undo_and_redo_walk_the_timeline() {
    let (mut organizer, _) = open_fresh().await;
    let mut rx = organizer.subscribe_notices();
    let s0 = snapshot(&organizer);
    rename_current(&mut organizer, "one").await;
    let s1 = snapshot(&organizer);
    rename_current(&mut organizer, "two").await;
    let s2 = snapshot(&organizer);

    assert!(organizer.undo().await);
    assert_eq!(snapshot(&organizer), s1);
    assert!(organizer.undo().await);
    assert_eq!(snapshot(&organizer), s0);
    assert!(organizer.redo().await);
    assert_eq!(snapshot(&organizer), s1);
    assert!(organizer.redo().await);
    assert_eq!(snapshot(&organizer), s2);

    assert!(!organizer.redo().await);
    let seen = messages(&mut rx);
    assert_eq!(seen.iter().filter(|m| *m == "Undone").count(), 2);
    assert_eq!(seen.iter().filter(|m| *m == "Redone").count(), 2);
    assert_eq!(seen.last().map(String::as_str), Some("Nothing to redo"));
}

#[tokio::test]
async fn new_edit_after_undo_clears_redo() {
    let (mut organizer, _) = open_fresh().await;
    rename_current(&mut organizer, "one").await;
    rename_current(&mut organizer, "two").await;
    assert!(organizer.undo().await);
    assert_eq!(organizer.redo_depth(), 1);

    rename_current(&mut organizer, "three").await;
    assert_eq!(organizer.redo_depth(), 0);
    assert!(!organizer.redo().await);
    assert_eq!(organizer.state().current_system().expect("current").name, "three");

    assert!(organizer.undo().await);
    assert_eq!(organizer.state().current_system().expect("current").name, "one");
}

#[tokio::test]
async fn undo_with_empty_history_only_notifies() {
    let (mut organizer, store) = open_fresh().await;
    let mut rx = organizer.subscribe_notices();
    let writes = store.write_count();
    assert!(!organizer.undo().await);
    assert_eq!(messages(&mut rx), vec!["Nothing to undo".to_string()]);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn history_keeps_the_newest_fifty_edits() {
    let (mut organizer, _) = open_fresh().await;
    for n in 1..=100 {
        rename_current(&mut organizer, &format!("edit {n}")).await;
    }
    assert_eq!(organizer.undo_depth(), history::HISTORY_LIMIT);

    for _ in 0..history::HISTORY_LIMIT {
        assert!(organizer.undo().await);
    }
    assert_eq!(organizer.state().current_system().expect("current").name, "edit 50");
    assert!(!organizer.undo().await);
}

#[tokio::test]
async fn mode_changes_are_not_undoable() {
    let (mut organizer, _) = open_fresh().await;
    assert_eq!(organizer.toggle_mode().await, Mode::Edit);
    assert_eq!(organizer.undo_depth(), 0);
    rename_current(&mut organizer, "renamed").await;
    assert!(organizer.undo().await);
    assert!(organizer.state().edit_mode);
}

#[tokio::test]
async fn failed_save_warns_and_skips_history() {
    let (mut organizer, store) = open_fresh().await;
    let mut rx = organizer.subscribe_notices();
    store.set_fail_writes(true);

    let id = organizer.create_planet().await.expect("planet created in memory");
    assert!(organizer
        .state()
        .current_system()
        .expect("current")
        .planet(&id)
        .is_some());
    assert_eq!(organizer.undo_depth(), 0);

    let mut last = None;
    while let Ok(notice) = rx.try_recv() {
        last = Some(notice);
    }
    let last = last.expect("notice");
    assert_eq!(last.level, NoticeLevel::Error);
    assert_eq!(last.message, "Failed to save - storage may be full");
    assert!(organizer.save().await.is_err());
}

#[tokio::test]
async fn failed_undo_save_still_moves_the_baseline() {
    let (mut organizer, store) = open_fresh().await;
    rename_current(&mut organizer, "one").await;
    rename_current(&mut organizer, "two").await;

    store.set_fail_writes(true);
    assert!(organizer.undo().await);
    assert_eq!(organizer.state().current_system().expect("current").name, "one");
    store.set_fail_writes(false);

    rename_current(&mut organizer, "three").await;
    assert!(organizer.undo().await);
    assert_eq!(organizer.state().current_system().expect("current").name, "one");
}

#[tokio::test]
async fn failed_startup_save_keeps_first_edit_undoable() {
    let store = Arc::new(MemoryStore::new());
    store.set_fail_writes(true);
    let mut organizer = open_with(Arc::clone(&store)).await;
    assert_eq!(store.write_count(), 0);
    store.set_fail_writes(false);
    let seeded = snapshot(&organizer);

    rename_current(&mut organizer, "first").await;
    assert_eq!(organizer.undo_depth(), 1);
    assert!(organizer.undo().await);
    assert_eq!(snapshot(&organizer), seeded);
}

#[tokio::test]
async fn created_planets_do_not_overlap() {
    let (mut organizer, _) = open_fresh().await;
    for _ in 0..6 {
        organizer.create_planet().await.expect("create");
    }
    let viewport = organizer.viewport();
    let planets = &organizer.state().current_system().expect("current").planets;
    assert_eq!(planets.len(), 9);
    for (i, a) in planets.iter().enumerate() {
        assert!(a.is_synchronized());
        for b in planets.iter().skip(i + 1) {
            let min = (viewport.planet_size_px(a.size_percent)
                + viewport.planet_size_px(b.size_percent))
                / 2.0
                + placement::SPAWN_MARGIN;
            assert!((a.x - b.x).hypot(a.y - b.y) >= min);
        }
    }
}

#[tokio::test]
async fn create_planet_without_active_system_creates_one() {
    let (mut organizer, _) = open_fresh().await;
    let mut rx = organizer.subscribe_notices();
    organizer.state_mut().current = None;

    organizer.create_planet().await.expect("create");
    let state = organizer.state();
    assert_eq!(state.systems.len(), 3);
    let system = state.current_system().expect("current");
    assert_eq!(system.name, "System 3");
    assert_eq!(system.planets.len(), 1);
    assert_eq!(
        messages(&mut rx).first().map(String::as_str),
        Some("No system selected - creating a new one first")
    );
}

#[tokio::test]
async fn last_system_cannot_be_deleted() {
    let (mut organizer, _) = open_fresh().await;
    let ids: Vec<_> = organizer.state().systems.ids().cloned().collect();
    organizer.delete_system(&ids[1]).await.expect("delete personal");

    let mut rx = organizer.subscribe_notices();
    assert_eq!(
        organizer.delete_system(&ids[0]).await,
        Err(CommandError::LastSystem)
    );
    assert_eq!(organizer.state().systems.len(), 1);
    assert_eq!(messages(&mut rx), vec!["Must have at least one system".to_string()]);
    assert_eq!(
        organizer.delete_system(&SystemId::from("nope")).await,
        Err(CommandError::UnknownSystem(SystemId::from("nope")))
    );
}

#[tokio::test]
async fn deleting_the_active_system_selects_the_first() {
    let (mut organizer, _) = open_fresh().await;
    let first = organizer.state().systems.first_id().cloned().expect("first");
    let copy = organizer.duplicate_system(&first).await.expect("duplicate");
    assert_eq!(current_id(&organizer), copy);

    organizer.delete_system(&copy).await.expect("delete copy");
    assert_eq!(current_id(&organizer), first);
    assert!(organizer.state().has_valid_current());
}

#[tokio::test]
async fn duplicate_gets_fresh_ids() {
    let (mut organizer, _) = open_fresh().await;
    let source = current_id(&organizer);
    let copy = organizer.duplicate_system(&source).await.expect("duplicate");

    let state = organizer.state();
    let original = state.systems.get(&source).expect("source");
    let duplicated = state.systems.get(&copy).expect("copy");
    assert_eq!(duplicated.name, "School (copy)");
    assert_eq!(duplicated.planets.len(), original.planets.len());
    for (a, b) in original.planets.iter().zip(&duplicated.planets) {
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, b.name);
    }
}

#[tokio::test]
async fn selecting_unknown_system_repairs() {
    let (mut organizer, _) = open_fresh().await;
    let mut rx = organizer.subscribe_notices();
    let err = organizer
        .select_system(&SystemId::from("ghost"))
        .await
        .expect_err("unknown system");
    assert_eq!(err, CommandError::UnknownSystem(SystemId::from("ghost")));
    assert_eq!(
        messages(&mut rx).first().map(String::as_str),
        Some("System not found - repairing")
    );

    let personal = organizer.state().systems.ids().nth(1).cloned().expect("personal");
    organizer.select_system(&personal).await.expect("select");
    assert_eq!(current_id(&organizer), personal);
}

#[tokio::test]
async fn repair_restores_invariants_after_direct_edits() {
    let (mut organizer, _) = open_fresh().await;
    {
        let state = organizer.state_mut();
        state.current = Some(SystemId::from("dangling"));
        state.edit_mode = true;
        state.link_mode = true;
        let system = state.systems.iter_mut().next().expect("system");
        let duplicate_id = system.planets[0].id.clone();
        system.planets[1].id = duplicate_id;
        system.planets[2].x += 40.0;
    }
    assert!(organizer.repair().await);

    let state = organizer.state();
    assert!(state.has_valid_current());
    assert!(state.edit_mode && !state.link_mode);
    let planets = &state.systems.iter().next().expect("system").planets;
    assert_ne!(planets[0].id, planets[1].id);
    assert!(planets.iter().all(Planet::is_synchronized));

    assert!(!organizer.repair().await);
}

#[tokio::test]
async fn reorder_changes_tab_order() {
    let (mut organizer, store) = open_fresh().await;
    let ids: Vec<_> = organizer.state().systems.ids().cloned().collect();
    organizer.reorder_systems(&[ids[1].clone(), ids[0].clone()]).await;
    let reordered: Vec<_> = organizer.state().systems.ids().cloned().collect();
    assert_eq!(reordered, vec![ids[1].clone(), ids[0].clone()]);

    let stored = stored_state(&store).await;
    assert_eq!(stored.systems.first_id(), Some(&ids[1]));
}

#[tokio::test]
async fn auto_arrange_lays_out_the_active_system() {
    let (mut organizer, _) = open_fresh().await;
    organizer.auto_arrange().await.expect("arrange");
    let planets = &organizer.state().current_system().expect("current").planets;
    for planet in planets {
        assert!(planet.orbit.radius >= placement::ARRANGE_BASE_RADIUS);
        assert!(planet.orbit.radius < placement::ARRANGE_BASE_RADIUS + placement::ARRANGE_RADIUS_JITTER);
        assert!(planet.is_synchronized());
    }
    assert_eq!(organizer.undo_depth(), 1);
}

#[tokio::test]
async fn frames_advance_rotating_planets_deterministically() {
    let (mut organizer, _) = open_fresh().await;
    organizer
        .edit_settings(SettingsPatch {
            disable_orbits: Some(false),
            ..Default::default()
        })
        .await;
    let id = organizer.state().current_system().expect("current").planets[0].id.clone();
    organizer
        .edit_planet(
            &id,
            PlanetPatch {
                orbit_speed: Some(0.5),
                ..Default::default()
            },
        )
        .await
        .expect("edit");
    assert!(organizer.toggle_orbit(&id).await.expect("toggle"));

    for _ in 0..10 {
        organizer.on_frame(0.016);
    }
    let planet = organizer
        .state()
        .current_system()
        .expect("current")
        .planet(&id)
        .expect("planet");
    assert!((planet.orbit.angle - 0.08).abs() < 1e-12);
    assert!((planet.x - 200.0 * 0.08f64.cos()).abs() < 1e-9);

    organizer
        .edit_settings(SettingsPatch {
            disable_orbits: Some(true),
            ..Default::default()
        })
        .await;
    let system = organizer.state().current_system().expect("current");
    assert!(system.planets.iter().all(|planet| !planet.orbit.rotating));
}

#[tokio::test]
async fn frames_never_write_or_record_history() {
    let (mut organizer, store) = open_fresh().await;
    let id = organizer.state().current_system().expect("current").planets[0].id.clone();
    if !organizer.toggle_orbit(&id).await.expect("toggle") {
        assert!(organizer.toggle_orbit(&id).await.expect("toggle back on"));
    }
    let writes = store.write_count();
    let depth = organizer.undo_depth();
    let stored_before = stored_state(&store).await;
    let x_before = organizer.state().current_system().expect("current").planet(&id).expect("planet").x;

    let mut moved = 0;
    for _ in 0..30 {
        moved += organizer.on_frame(0.016);
    }
    assert!(moved > 0);
    let x_after = organizer.state().current_system().expect("current").planet(&id).expect("planet").x;
    assert_ne!(x_after, x_before);

    assert_eq!(store.write_count(), writes);
    assert_eq!(organizer.undo_depth(), depth);
    assert_eq!(organizer.redo_depth(), 0);
    assert_eq!(stored_state(&store).await, stored_before);
}

#[tokio::test]
async fn link_mode_press_opens_the_planet_link() {
    let (mut organizer, _) = open_fresh().await;
    let id = organizer.state().current_system().expect("current").planets[0].id.clone();
    match organizer.pointer_down(PointerTarget::Planet(id), (0.0, 0.0)) {
        PressOutcome::OpenLink(url) => assert_eq!(url.host_str(), Some("mail.google.com")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(organizer.selection(), &Selection::None);
}

#[tokio::test]
async fn drag_moves_persists_and_undoes() {
    let (mut organizer, store) = open_fresh().await;
    organizer.set_mode(Mode::Edit).await;
    let viewport = organizer.viewport();
    let planet = organizer.state().current_system().expect("current").planets[0].clone();
    let (cx, cy) = viewport.center();
    let grab = (cx + planet.x, cy + planet.y);

    let outcome = organizer.pointer_down(PointerTarget::Planet(planet.id.clone()), grab);
    assert_eq!(outcome, PressOutcome::DragStarted(planet.id.clone()));
    assert_eq!(organizer.selection(), &Selection::Planet(planet.id.clone()));

    assert_eq!(organizer.pointer_move((grab.0 - 50.0, grab.1 + 20.0)), MoveOutcome::Moved);
    // The dragged planet ignores frames even if it orbits.
    organizer.on_frame(0.05);
    let writes = store.write_count();
    assert!(organizer.pointer_up().await);
    assert_eq!(store.write_count(), writes + 1);
    assert_eq!(organizer.drag(), &DragState::Idle);
    assert!(!organizer.pointer_up().await);

    let moved = organizer
        .state()
        .current_system()
        .expect("current")
        .planet(&planet.id)
        .expect("planet")
        .clone();
    assert!((moved.x - (planet.x - 50.0)).abs() < 1e-9);
    assert!((moved.y - (planet.y + 20.0)).abs() < 1e-9);
    assert!(moved.is_synchronized());
    let stored = stored_state(&store).await;
    assert_eq!(
        stored.current_system().expect("current").planet(&planet.id),
        Some(&moved)
    );

    assert!(organizer.undo().await);
    let restored = organizer
        .state()
        .current_system()
        .expect("current")
        .planet(&planet.id)
        .expect("planet");
    assert_eq!(restored.x, planet.x);
}

#[tokio::test]
async fn locked_layout_warns_once_per_drag() {
    let (mut organizer, _) = open_fresh().await;
    organizer.set_mode(Mode::Edit).await;
    organizer
        .edit_settings(SettingsPatch {
            lock_layout: Some(true),
            ..Default::default()
        })
        .await;
    let mut rx = organizer.subscribe_notices();
    let id = organizer.state().current_system().expect("current").planets[0].id.clone();

    organizer.pointer_down(PointerTarget::Planet(id), (700.0, 300.0));
    organizer.pointer_move((710.0, 300.0));
    organizer.pointer_move((720.0, 300.0));
    organizer.pointer_up().await;
    assert_eq!(messages(&mut rx), vec!["Layout is locked".to_string()]);
}

#[tokio::test]
async fn deleting_the_selected_planet_clears_selection() {
    let (mut organizer, _) = open_fresh().await;
    organizer.set_mode(Mode::Edit).await;
    let id = organizer.state().current_system().expect("current").planets[1].id.clone();
    organizer.pointer_down(PointerTarget::Planet(id.clone()), (0.0, 0.0));
    organizer.pointer_up().await;

    organizer.delete_planet(&id).await.expect("delete");
    assert_eq!(organizer.selection(), &Selection::None);
    assert_eq!(
        organizer.delete_planet(&id).await,
        Err(CommandError::UnknownPlanet(id))
    );
}

#[tokio::test]
async fn export_then_import_round_trips() {
    let (mut organizer, _) = open_fresh().await;
    organizer.create_planet().await.expect("create");
    let exported = organizer.export_blob().expect("export");
    let original = organizer.state().clone();

    let (mut other, other_store) = open_fresh().await;
    other.import_blob(exported.as_bytes()).await.expect("import");
    assert_eq!(other.state(), &original);
    assert_eq!(&stored_state(&other_store).await, &original);

    rename_current(&mut organizer, "changed").await;
    organizer.import_blob(exported.as_bytes()).await.expect("reimport");
    assert_eq!(organizer.state(), &original);
}

#[tokio::test]
async fn placed_positions_survive_export_and_migration() {
    let (mut organizer, _) = open_fresh().await;
    for _ in 0..5 {
        organizer.create_planet().await.expect("create");
    }
    organizer.auto_arrange().await.expect("arrange");
    for _ in 0..3 {
        organizer.create_planet().await.expect("create");
    }
    let state = organizer.state().clone();

    let exported = organizer.export_blob().expect("export");
    let migrated = migrate(&parse_document(exported.as_bytes()).expect("parse"));
    assert_eq!(migrated, state);

    let rewritten = serde_json::to_vec(&migrated).expect("serialize");
    let again = migrate(&parse_document(&rewritten).expect("parse"));
    assert_eq!(again, migrated);
}

#[tokio::test]
async fn bad_imports_leave_state_untouched() {
    let (mut organizer, _) = open_fresh().await;
    let mut rx = organizer.subscribe_notices();
    let before = organizer.state().clone();

    assert!(matches!(
        organizer.import_blob(b"not json").await,
        Err(ImportError::Parse(_))
    ));
    assert!(matches!(
        organizer.import_blob(br#"{"current":"x"}"#).await,
        Err(ImportError::MissingSystems)
    ));
    assert!(matches!(
        organizer.import_blob(br#"{"systems":[{"name":"no id"}]}"#).await,
        Err(ImportError::NoUsableSystems)
    ));
    assert_eq!(organizer.state(), &before);
    assert_eq!(
        messages(&mut rx),
        vec!["Import failed - invalid file".to_string(); 3]
    );
}

#[tokio::test]
async fn shortcuts_follow_configured_keybinds() {
    let (mut organizer, _) = open_fresh().await;
    rename_current(&mut organizer, "changed").await;
    let ctrl = HeldModifiers {
        ctrl: true,
        ..Default::default()
    };

    assert_eq!(organizer.handle_shortcut(HeldModifiers::default(), "z").await, None);
    assert_eq!(
        organizer.handle_shortcut(ctrl, "Z").await,
        Some(ShortcutAction::Undo)
    );
    assert_eq!(organizer.state().current_system().expect("current").name, "School");

    organizer
        .edit_settings(SettingsPatch {
            redo_key: Some("R".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(organizer.handle_shortcut(ctrl, "y").await, None);

    organizer.reset_keybinds().await;
    assert_eq!(organizer.state().adv.keybinds, Keybinds::default());
}

#[tokio::test]
async fn system_edits_are_persisted() {
    let (mut organizer, store) = open_fresh().await;
    let id = current_id(&organizer);
    organizer
        .edit_system(
            &id,
            SystemPatch {
                bg_angle: Some(450.0),
                party_mode: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("edit");
    let stored = stored_state(&store).await;
    let system: &System = stored.systems.get(&id).expect("system");
    assert_eq!(system.bg_angle, 90.0);
    assert!(system.party_mode);
    assert_eq!(
        organizer
            .edit_system(&SystemId::from("nope"), SystemPatch::default())
            .await,
        Err(CommandError::UnknownSystem(SystemId::from("nope")))
    );
}
