//! Find operations: type, property, classification and text filters with
//! sequencing and paging.

mod common;

use common::{add_asset, connector, link, ASSET, COLUMN, LINK, TABLE, USER};
use std::collections::HashMap;
use vellum::graph::{InstanceStatus, PropertyValue};
use vellum::query::{exact_match, MatchCriteria, PropertyCondition, SearchProperties};
use vellum::repository::ErrorKind;
use vellum::{FindRequest, NewEntity, RepositoryConnector, Sequencing, SequencingOrder};

async fn catalog() -> RepositoryConnector {
    let connector = connector();
    for (type_guid, name, owner, size) in [
        (TABLE, "db.sales", "finance", 30i64),
        (TABLE, "db.orders", "ops", 10),
        (COLUMN, "db.sales.amount", "finance", 20),
    ] {
        connector
            .add_entity(
                USER,
                NewEntity::of_type(type_guid)
                    .with_property("qualifiedName", name)
                    .with_property("owner", owner)
                    .with_property("size", size),
            )
            .await
            .unwrap();
    }
    connector
}

fn names(entities: &[vellum::Entity]) -> Vec<String> {
    entities
        .iter()
        .map(|e| e.properties["qualifiedName"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn type_filter_includes_subtypes() {
    let connector = catalog().await;
    let assets = connector
        .find_entities(USER, &FindRequest::new().of_type(ASSET))
        .unwrap();
    assert_eq!(assets.len(), 3);

    let tables = connector
        .find_entities(USER, &FindRequest::new().of_type(TABLE))
        .unwrap();
    assert_eq!(tables.len(), 2);

    let narrowed = connector
        .find_entities(
            USER,
            &FindRequest::new()
                .of_type(ASSET)
                .with_subtypes([COLUMN.to_string()]),
        )
        .unwrap();
    assert_eq!(names(&narrowed), vec!["db.sales.amount"]);
}

#[tokio::test]
async fn unknown_type_is_a_type_error() {
    let connector = catalog().await;
    let err = connector
        .find_entities(USER, &FindRequest::new().of_type("t-missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn property_conditions_and_sequencing() {
    let connector = catalog().await;
    let request = FindRequest::new()
        .matching(
            SearchProperties::new(MatchCriteria::All)
                .with_condition(PropertyCondition::eq("owner", "finance")),
        )
        .sequenced(Sequencing::by_property("size", true));
    let found = connector.find_entities(USER, &request).unwrap();
    assert_eq!(names(&found), vec!["db.sales.amount", "db.sales"]);

    let either = SearchProperties::new(MatchCriteria::Any)
        .with_condition(PropertyCondition::eq("owner", "ops"))
        .with_condition(PropertyCondition::like("qualifiedName", r".*\.amount"));
    let found = connector
        .find_entities(
            USER,
            &FindRequest::new()
                .matching(either)
                .sequenced(Sequencing::by_property("qualifiedName", true)),
        )
        .unwrap();
    assert_eq!(names(&found), vec!["db.orders", "db.sales.amount"]);
}

#[tokio::test]
async fn paging_windows_the_sequenced_result() {
    let connector = catalog().await;
    let request = FindRequest::new()
        .sequenced(Sequencing::by_property("size", false))
        .page(1, 1);
    let found = connector.find_entities(USER, &request).unwrap();
    assert_eq!(names(&found), vec!["db.sales.amount"]);

    let past_the_end = FindRequest::new().page(10, 5);
    assert!(connector.find_entities(USER, &past_the_end).unwrap().is_empty());
}

#[tokio::test]
async fn bad_paging_is_a_paging_error() {
    let connector = catalog().await;
    for request in [
        FindRequest::new().page(-1, 10),
        FindRequest::new().page(0, -5),
        FindRequest::new().page(0, 1_000_000),
    ] {
        let err = connector.find_entities(USER, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PagingError);
    }
}

#[tokio::test]
async fn property_sequencing_needs_a_property_name() {
    let connector = catalog().await;
    let request = FindRequest::new().sequenced(Sequencing::by(SequencingOrder::PropertyAscending));
    let err = connector.find_entities(USER, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PagingError);
}

#[tokio::test]
async fn free_text_is_a_full_match_over_string_attributes() {
    let connector = catalog().await;
    let found = connector
        .find_entities_by_property_value(USER, "db\\.sales.*", &FindRequest::new())
        .unwrap();
    assert_eq!(found.len(), 2);

    // Partial matches do not count
    let none = connector
        .find_entities_by_property_value(USER, "sales", &FindRequest::new())
        .unwrap();
    assert!(none.is_empty());

    let literal = format!("{}.*", exact_match("db.sales."));
    let found = connector
        .find_entities_by_property_value(USER, &literal, &FindRequest::new())
        .unwrap();
    assert_eq!(names(&found), vec!["db.sales.amount"]);

    let contained = connector
        .find_entities_containing(USER, "orders", &FindRequest::new())
        .unwrap();
    assert_eq!(names(&contained), vec!["db.orders"]);
}

#[tokio::test]
async fn invalid_regex_is_an_invalid_parameter() {
    let connector = catalog().await;
    let err = connector
        .find_entities_by_property_value(USER, "[unclosed", &FindRequest::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn find_by_classification() {
    let connector = catalog().await;
    let secret = add_asset(&connector, TABLE, "db.secret").await;
    connector
        .classify_entity(
            USER,
            secret.guid(),
            "Confidential",
            HashMap::from([("level".to_string(), PropertyValue::from(2i64))]),
        )
        .await
        .unwrap();

    let found = connector
        .find_entities_by_classification(USER, "Confidential", None, &FindRequest::new())
        .unwrap();
    assert_eq!(names(&found), vec!["db.secret"]);

    let high = SearchProperties::new(MatchCriteria::All).with_condition(PropertyCondition::new(
        "level",
        vellum::query::PropertyOperator::Gte,
        PropertyValue::from(3i64),
    ));
    assert!(connector
        .find_entities_by_classification(USER, "Confidential", Some(high), &FindRequest::new())
        .unwrap()
        .is_empty());

    let limited = connector
        .find_entities(USER, &FindRequest::new().limited_by_classification("Confidential"))
        .unwrap();
    assert_eq!(limited.len(), 1);

    let err = connector
        .find_entities_by_classification(USER, "Table", None, &FindRequest::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn deleted_entities_only_when_asked_for() {
    let connector = catalog().await;
    let gone = add_asset(&connector, TABLE, "db.gone").await;
    connector.delete_entity(USER, gone.guid()).await.unwrap();

    let default = connector
        .find_entities(USER, &FindRequest::new().of_type(TABLE))
        .unwrap();
    assert_eq!(default.len(), 2);

    let deleted = connector
        .find_entities(
            USER,
            &FindRequest::new()
                .of_type(TABLE)
                .with_status(InstanceStatus::Deleted),
        )
        .unwrap();
    assert_eq!(names(&deleted), vec!["db.gone"]);
}

#[tokio::test]
async fn relationships_are_found_by_type_and_text() {
    let connector = catalog().await;
    let a = add_asset(&connector, TABLE, "db.a").await;
    let b = add_asset(&connector, TABLE, "db.b").await;
    let rel = link(&connector, a.guid(), b.guid()).await;
    connector
        .update_relationship_properties(
            USER,
            rel.guid(),
            HashMap::from([("label".to_string(), PropertyValue::from("feeds"))]),
        )
        .await
        .unwrap();

    let all = connector
        .find_relationships(USER, &FindRequest::new().of_type(LINK))
        .unwrap();
    assert_eq!(all.len(), 1);

    let labelled = connector
        .find_relationships_by_property_value(USER, "fee.*", &FindRequest::new())
        .unwrap();
    assert_eq!(labelled.len(), 1);

    let for_entity = connector
        .get_relationships_for_entity(
            USER,
            b.guid(),
            &FindRequest::new().sequenced(Sequencing::by(SequencingOrder::Guid)),
        )
        .unwrap();
    assert_eq!(for_entity[0].guid(), rel.guid());

    let err = connector
        .find_relationships(USER, &FindRequest::new().of_type(TABLE))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}
