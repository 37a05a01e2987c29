use client_core::{Organizer, PlanetPatch};
use rand::{rngs::StdRng, SeedableRng};
use shared::domain::Viewport;
use storage::Storage;

async fn open(database_url: &str, seed: u64) -> Organizer<Storage> {
    let storage = Storage::new(database_url).await.expect("db");
    Organizer::open_with_rng(storage, Viewport::default(), StdRng::seed_from_u64(seed)).await
}

#[tokio::test]
async fn edits_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!("sqlite://{}", dir.path().join("nested/marks.db").display());

    let mut organizer = open(&database_url, 1).await;
    let planet = organizer.create_planet().await.expect("create");
    organizer
        .edit_planet(
            &planet,
            PlanetPatch {
                name: Some("Docs".into()),
                url: Some("docs.rs".into()),
                ..Default::default()
            },
        )
        .await
        .expect("edit");
    let second = organizer.new_system().await;
    let expected = organizer.state().clone();
    drop(organizer);

    let reopened = open(&database_url, 2).await;
    assert_eq!(reopened.state(), &expected);
    assert_eq!(reopened.state().current.as_ref(), Some(&second));
    assert_eq!(reopened.undo_depth(), 0);
}

#[tokio::test]
async fn arranged_layout_is_what_gets_stored() {
    let mut organizer = open("sqlite::memory:", 3).await;
    organizer.auto_arrange().await.expect("arrange");
    let exported = organizer.export_blob().expect("export");

    let mut other = open("sqlite::memory:", 4).await;
    other.import_blob(exported.as_bytes()).await.expect("import");
    assert_eq!(other.state(), organizer.state());
}
