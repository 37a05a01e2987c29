use shared::{
    domain::SystemId,
    migrate::{migrate, parse_document},
    store::{DocumentStore, DOCUMENT_KEY},
};
use storage::Storage;

#[tokio::test]
async fn legacy_document_is_migrated_and_rewritten_in_current_shape() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let legacy = br#"{
        "systems": [
            { "id": "school", "name": "School", "planets": {
                "mail": { "name": "Email", "url": "https://mail.example.com", "x": 200, "y": 0 }
            } }
        ],
        "adv": { "disableOrbits": false }
    }"#;
    storage.write(DOCUMENT_KEY, legacy).await.expect("seed legacy");

    let raw = storage
        .read(DOCUMENT_KEY)
        .await
        .expect("read")
        .expect("document present");
    let state = migrate(&parse_document(&raw).expect("parse"));
    assert_eq!(state.current, Some(SystemId::from("school")));

    let rewritten = serde_json::to_vec(&state).expect("serialize");
    storage.write(DOCUMENT_KEY, &rewritten).await.expect("rewrite");

    let reread = storage
        .read(DOCUMENT_KEY)
        .await
        .expect("reread")
        .expect("document present");
    let value = parse_document(&reread).expect("parse rewritten");
    assert!(value["systems"].is_object(), "systems persist as a mapping");
    assert!(value["systems"]["school"]["planets"].is_array());
    assert_eq!(migrate(&value), state);
}

#[tokio::test]
async fn corrupt_document_is_reported_by_the_parser() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .write(DOCUMENT_KEY, b"{not json")
        .await
        .expect("seed corrupt");
    let raw = storage
        .read(DOCUMENT_KEY)
        .await
        .expect("read")
        .expect("document present");
    assert!(parse_document(&raw).is_err());
}
