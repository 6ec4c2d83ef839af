//! Create, change, delete and restore entities and relationships through
//! the connector.

mod common;

use common::{add_asset, connector, link, ASSET, CONFIDENTIAL, TABLE, USER};
use std::collections::HashMap;
use vellum::graph::{Entity, Guid, InstanceProvenance, InstanceStatus, PropertyValue};
use vellum::repository::ErrorKind;
use vellum::{FindRequest, HistoryOrder, NewEntity, NewRelationship};

#[tokio::test]
async fn add_then_read_back() {
    let connector = connector();
    let table = connector
        .add_entity(
            USER,
            NewEntity::of_type(TABLE)
                .with_property("qualifiedName", "db.sales")
                .with_property("size", 12i64),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(table.version(), 1);
    assert_eq!(table.type_name(), "Table");
    assert_eq!(table.header.created_by, USER);

    let read = connector.get_entity_detail(USER, table.guid(), None).unwrap();
    assert_eq!(read, table);
    assert!(connector.is_entity_known(USER, table.guid()).unwrap().is_some());
}

#[tokio::test]
async fn missing_required_property_is_a_type_error() {
    let connector = connector();
    let err = connector
        .add_entity(USER, NewEntity::of_type(TABLE).with_property("owner", "ops"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn unknown_guid_is_not_known() {
    let connector = connector();
    let err = connector
        .get_entity_detail(USER, &Guid::from("nope"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotKnown);
    assert!(connector
        .is_entity_known(USER, &Guid::from("nope"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn empty_user_is_rejected() {
    let connector = connector();
    let err = connector
        .get_entity_detail("  ", &Guid::from("g"), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn update_and_undo_properties() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.orders").await;

    let props = HashMap::from([
        ("qualifiedName".to_string(), PropertyValue::from("db.orders")),
        ("owner".to_string(), PropertyValue::from("finance")),
    ]);
    let updated = connector
        .update_entity_properties(USER, table.guid(), props)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.version(), 2);
    assert_eq!(updated.properties["owner"], PropertyValue::from("finance"));

    let undone = connector
        .undo_entity_update(USER, table.guid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(undone.version(), 3);
    assert!(!undone.properties.contains_key("owner"));
}

#[tokio::test]
async fn undo_needs_an_earlier_version() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.fresh").await;
    let err = connector
        .undo_entity_update(USER, table.guid())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn restore_returns_the_status_before_delete() {
    let connector = connector();
    let draft = connector
        .add_entity(
            USER,
            NewEntity::of_type(TABLE)
                .with_property("qualifiedName", "db.draft")
                .with_status(InstanceStatus::Draft),
        )
        .await
        .unwrap()
        .unwrap();

    connector.delete_entity(USER, draft.guid()).await.unwrap();
    let err = connector
        .get_entity_detail(USER, draft.guid(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotKnown);

    let restored = connector
        .restore_entity(USER, draft.guid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.status(), InstanceStatus::Draft);
}

#[tokio::test]
async fn restore_of_a_live_entity_is_rejected() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.live").await;
    let err = connector
        .restore_entity(USER, table.guid())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn delete_cascades_to_relationships_and_purge_evicts_them() {
    let connector = connector();
    let a = add_asset(&connector, TABLE, "db.a").await;
    let b = add_asset(&connector, TABLE, "db.b").await;
    let rel = link(&connector, a.guid(), b.guid()).await;

    let err = connector.purge_entity(USER, a.guid()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    connector.delete_entity(USER, a.guid()).await.unwrap();
    assert!(connector
        .is_relationship_known(USER, rel.guid())
        .unwrap()
        .is_none());

    connector.purge_entity(USER, a.guid()).await.unwrap();
    assert!(connector.is_entity_known(USER, a.guid()).unwrap().is_none());
    assert_eq!(
        connector
            .get_entity_detail(USER, a.guid(), None)
            .unwrap_err()
            .kind(),
        ErrorKind::NotKnown
    );
    assert_eq!(
        connector
            .get_entity_detail_history(USER, a.guid(), None, None, HistoryOrder::Forward)
            .unwrap_err()
            .kind(),
        ErrorKind::NotKnown
    );
    assert_eq!(
        connector.restore_entity(USER, a.guid()).await.unwrap_err().kind(),
        ErrorKind::NotKnown
    );
    assert_eq!(
        connector
            .get_relationship(USER, rel.guid(), None)
            .unwrap_err()
            .kind(),
        ErrorKind::NotKnown
    );
    assert!(connector
        .get_relationships_for_entity(USER, b.guid(), &FindRequest::new())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn classify_update_and_declassify() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.secret").await;

    let classified = connector
        .classify_entity(
            USER,
            table.guid(),
            "Confidential",
            HashMap::from([("level".to_string(), PropertyValue::from(1i64))]),
        )
        .await
        .unwrap()
        .unwrap();
    let classification = classified.classification("Confidential").unwrap();
    assert_eq!(classification.type_guid, CONFIDENTIAL);

    let again = connector
        .classify_entity(USER, table.guid(), "Confidential", HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(again.kind(), ErrorKind::InvalidParameter);

    let updated = connector
        .update_entity_classification(
            USER,
            table.guid(),
            "Confidential",
            HashMap::from([("level".to_string(), PropertyValue::from(3i64))]),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        updated.classification("Confidential").unwrap().properties["level"],
        PropertyValue::from(3i64)
    );

    let declassified = connector
        .declassify_entity(USER, table.guid(), "Confidential")
        .await
        .unwrap()
        .unwrap();
    assert!(!declassified.has_classification("Confidential"));
}

#[tokio::test]
async fn classification_must_be_registered() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.t").await;
    let err = connector
        .classify_entity(USER, table.guid(), "Unheard", HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn re_identify_moves_relationships() {
    let connector = connector();
    let a = add_asset(&connector, TABLE, "db.a").await;
    let b = add_asset(&connector, TABLE, "db.b").await;
    let rel = link(&connector, a.guid(), b.guid()).await;

    let new_guid = Guid::from("a-renamed");
    let moved = connector
        .re_identify_entity(USER, a.guid(), new_guid.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.guid(), &new_guid);
    assert_eq!(
        connector
            .get_entity_detail(USER, a.guid(), None)
            .unwrap_err()
            .kind(),
        ErrorKind::NotKnown
    );

    let relationship = connector.get_relationship(USER, rel.guid(), None).unwrap();
    assert_eq!(relationship.end1.guid, new_guid);
    let found = connector
        .get_relationships_for_entity(USER, &new_guid, &FindRequest::new())
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn re_type_within_the_hierarchy() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.t").await;
    let retyped = connector
        .re_type_entity(USER, table.guid(), common::COLUMN)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retyped.type_name(), "Column");

    let err = connector
        .re_type_entity(USER, table.guid(), common::LINK)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn re_homed_entities_become_read_only() {
    let connector = connector();
    let table = add_asset(&connector, TABLE, "db.t").await;
    let rehomed = connector
        .re_home_entity(USER, table.guid(), "other-collection", "other")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rehomed.header.provenance.metadata_collection_id, "other-collection");

    let err = connector
        .update_entity_status(USER, table.guid(), InstanceStatus::Draft)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

fn remote_table(connector: &vellum::RepositoryConnector, name: &str) -> Entity {
    Entity::new(
        connector.registry().instance_type("Table").unwrap(),
        InstanceProvenance::local("remote-collection", "remote"),
        "bob",
        vellum::graph::now_micros(),
    )
    .with_property("qualifiedName", PropertyValue::from(name))
}

#[tokio::test]
async fn reference_copies_cannot_be_changed_locally() {
    let connector = connector();
    let copy = remote_table(&connector, "remote.t");
    connector
        .save_entity_reference_copy(USER, copy.clone())
        .await
        .unwrap();

    let stored = connector.get_entity_detail(USER, copy.guid(), None).unwrap();
    assert_eq!(stored.header.provenance.metadata_collection_id, "remote-collection");

    for err in [
        connector
            .update_entity_status(USER, copy.guid(), InstanceStatus::Draft)
            .await
            .unwrap_err(),
        connector.delete_entity(USER, copy.guid()).await.unwrap_err(),
        connector
            .classify_entity(USER, copy.guid(), "Confidential", HashMap::new())
            .await
            .unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    let local = add_asset(&connector, TABLE, "db.local").await;
    let err = connector
        .save_entity_reference_copy(USER, local)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn reference_copy_cannot_replace_a_local_entity() {
    let connector = connector();
    let local = add_asset(&connector, TABLE, "db.local").await;

    let mut clash = remote_table(&connector, "remote.clash");
    clash.header.guid = local.guid().clone();
    clash.header.version = local.version() + 5;
    let err = connector
        .save_entity_reference_copy(USER, clash)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);

    let kept = connector.get_entity_detail(USER, local.guid(), None).unwrap();
    assert_eq!(kept, local);
}

#[tokio::test]
async fn purging_a_reference_copy_is_quiet() {
    let connector = connector();
    let copy = remote_table(&connector, "remote.t");
    connector
        .save_entity_reference_copy(USER, copy.clone())
        .await
        .unwrap();
    connector
        .purge_entity_reference_copy(USER, copy.guid())
        .await
        .unwrap();
    connector.await_indexed().await.unwrap();
    assert!(connector.is_entity_known(USER, copy.guid()).unwrap().is_none());

    connector
        .purge_entity_reference_copy(USER, &Guid::from("never-held"))
        .await
        .unwrap();
}

#[tokio::test]
async fn proxies_give_summaries_but_not_detail() {
    let connector = connector();
    let remote = remote_table(&connector, "remote.p");
    connector.add_entity_proxy(USER, remote.clone()).await.unwrap();

    let err = connector
        .get_entity_detail(USER, remote.guid(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProxyOnly);

    let summary = connector
        .get_entity_summary(USER, remote.guid(), None)
        .unwrap();
    assert!(summary.proxy);
    assert!(summary.properties.is_empty());
}

#[tokio::test]
async fn relationships_may_end_at_proxies() {
    let connector = connector();
    let local = add_asset(&connector, TABLE, "db.local").await;
    let remote = remote_table(&connector, "remote.p");
    connector.add_entity_proxy(USER, remote.clone()).await.unwrap();

    let rel = connector
        .add_relationship(
            USER,
            NewRelationship::of_type(common::LINK, local.guid().clone(), remote.guid().clone())
                .with_property("label", "feeds"),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rel.end2.type_name, "Table");
    assert_eq!(rel.properties["label"], PropertyValue::from("feeds"));
}

#[tokio::test]
async fn relationship_ends_must_exist_and_fit_the_type() {
    let connector = connector();
    let local = add_asset(&connector, TABLE, "db.local").await;
    let err = connector
        .add_relationship(
            USER,
            NewRelationship::of_type(common::LINK, local.guid().clone(), Guid::from("ghost")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotKnown);

    let err = connector
        .add_relationship(
            USER,
            NewRelationship::of_type(ASSET, local.guid().clone(), local.guid().clone()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn relationship_delete_restore_and_purge() {
    let connector = connector();
    let a = add_asset(&connector, TABLE, "db.a").await;
    let b = add_asset(&connector, TABLE, "db.b").await;
    let rel = link(&connector, a.guid(), b.guid()).await;

    let updated = connector
        .update_relationship_properties(
            USER,
            rel.guid(),
            HashMap::from([("label".to_string(), PropertyValue::from("copies"))]),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.version(), 2);

    connector.delete_relationship(USER, rel.guid()).await.unwrap();
    let restored = connector
        .restore_relationship(USER, rel.guid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.header.status, InstanceStatus::Active);
    assert_eq!(restored.properties["label"], PropertyValue::from("copies"));

    connector.delete_relationship(USER, rel.guid()).await.unwrap();
    connector.purge_relationship(USER, rel.guid()).await.unwrap();
    assert!(connector
        .get_relationship_history(USER, rel.guid(), None, None, Default::default())
        .is_err());
    // Purging a relationship leaves its ends alone
    assert!(connector.is_entity_known(USER, a.guid()).unwrap().is_some());
}
