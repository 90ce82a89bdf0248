use super::{load_entities, save_entities, Entity, EnvelopeError, ItemIdList};

#[test]
fn envelope_roundtrip_preserves_ids_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Garden_Tools_4711.json");

    let envelope = ItemIdList::new(
        "4711".to_string(),
        "Garden Tools".to_string(),
        vec!["100".to_string(), "101".to_string()],
    );
    envelope.save(&path).unwrap();

    let loaded = ItemIdList::load(&path).unwrap();
    assert_eq!(loaded, envelope);
    assert_eq!(loaded.item_count, 2);
}

#[test]
fn load_trims_and_drops_blank_item_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.json");
    std::fs::write(
        &path,
        r#"{"entity_id":"9","entity_name":"N","item_count":3,"item_ids":[" 1 ","","2"]}"#,
    )
    .unwrap();

    let loaded = ItemIdList::load(&path).unwrap();
    assert_eq!(loaded.item_ids, ["1", "2"]);
    assert_eq!(loaded.item_count, 2);
}

#[test]
fn load_rejects_empty_item_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(
        &path,
        r#"{"entity_id":"9","entity_name":"N","item_count":0,"item_ids":[]}"#,
    )
    .unwrap();

    let err = ItemIdList::load(&path).unwrap_err();
    assert!(matches!(err, EnvelopeError::EmptyItemIds { .. }));
}

#[test]
fn load_rejects_missing_entity_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noid.json");
    std::fs::write(
        &path,
        r#"{"entity_id":"","entity_name":"N","item_count":1,"item_ids":["1"]}"#,
    )
    .unwrap();

    let err = ItemIdList::load(&path).unwrap_err();
    assert!(matches!(err, EnvelopeError::MissingEntityId { .. }));
}

#[test]
fn entity_list_roundtrip_filters_blank_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("factories.json");
    let entities = vec![
        Entity {
            id: "1".to_string(),
            name: "Alpha".to_string(),
            item_count: Some(12),
        },
        Entity {
            id: "".to_string(),
            name: "broken".to_string(),
            item_count: None,
        },
    ];
    save_entities(&path, &entities).unwrap();

    let loaded = load_entities(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "1");
    assert_eq!(loaded[0].item_count, Some(12));
}
