//! Neighborhood, linking and related-entity traversals over a stored graph.

mod common;

use common::{add_asset, connector, link, COLUMN, TABLE, USER};
use std::collections::HashMap;
use vellum::graph::{Guid, InstanceStatus};
use vellum::repository::ErrorKind;
use vellum::{Entity, RepositoryConnector, Sequencing, SequencingOrder, TraversalRequest};

/// a - b - c - d chain plus a column e hanging off b
async fn chain(connector: &RepositoryConnector) -> HashMap<&'static str, Entity> {
    let mut nodes = HashMap::new();
    for name in ["a", "b", "c", "d"] {
        nodes.insert(name, add_asset(connector, TABLE, name).await);
    }
    nodes.insert("e", add_asset(connector, COLUMN, "e").await);
    for (from, to) in [("a", "b"), ("b", "c"), ("c", "d"), ("b", "e")] {
        link(connector, nodes[from].guid(), nodes[to].guid()).await;
    }
    nodes
}

fn sorted(guids: Vec<&Guid>) -> Vec<Guid> {
    let mut guids: Vec<Guid> = guids.into_iter().cloned().collect();
    guids.sort();
    guids
}

fn guids(nodes: &HashMap<&str, Entity>, names: &[&str]) -> Vec<Guid> {
    let mut guids: Vec<Guid> = names.iter().map(|n| nodes[n].guid().clone()).collect();
    guids.sort();
    guids
}

#[tokio::test]
async fn level_zero_is_just_the_start() {
    let connector = connector();
    let nodes = chain(&connector).await;
    let graph = connector
        .get_entity_neighborhood(USER, nodes["b"].guid(), 0, &TraversalRequest::new())
        .unwrap();
    assert_eq!(graph.entities.len(), 1);
    assert!(graph.relationships.is_empty());
}

#[tokio::test]
async fn neighborhood_levels() {
    let connector = connector();
    let nodes = chain(&connector).await;

    let one = connector
        .get_entity_neighborhood(USER, nodes["b"].guid(), 1, &TraversalRequest::new())
        .unwrap();
    assert_eq!(sorted(one.entity_guids()), guids(&nodes, &["a", "b", "c", "e"]));
    assert_eq!(one.relationships.len(), 3);

    let two = connector
        .get_entity_neighborhood(USER, nodes["a"].guid(), 2, &TraversalRequest::new())
        .unwrap();
    assert_eq!(sorted(two.entity_guids()), guids(&nodes, &["a", "b", "c", "e"]));
}

#[tokio::test]
async fn neighborhood_type_filter_stops_expansion() {
    let connector = connector();
    let nodes = chain(&connector).await;
    let tables_only = TraversalRequest::new().with_entity_type(TABLE);
    let graph = connector
        .get_entity_neighborhood(USER, nodes["b"].guid(), 3, &tables_only)
        .unwrap();
    assert_eq!(sorted(graph.entity_guids()), guids(&nodes, &["a", "b", "c", "d"]));

    let no_links = TraversalRequest::new().with_relationship_type(common::CONFIDENTIAL);
    let err = connector
        .get_entity_neighborhood(USER, nodes["b"].guid(), 1, &no_links)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[tokio::test]
async fn deleted_relationships_are_not_followed() {
    let connector = connector();
    let nodes = chain(&connector).await;
    connector.delete_entity(USER, nodes["c"].guid()).await.unwrap();

    let graph = connector
        .get_entity_neighborhood(USER, nodes["a"].guid(), 5, &TraversalRequest::new())
        .unwrap();
    assert_eq!(sorted(graph.entity_guids()), guids(&nodes, &["a", "b", "e"]));

    let err = connector
        .get_entity_neighborhood(USER, nodes["c"].guid(), 1, &TraversalRequest::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotKnown);

    let with_deleted = TraversalRequest::new()
        .with_status(InstanceStatus::Active)
        .with_status(InstanceStatus::Deleted);
    let graph = connector
        .get_entity_neighborhood(USER, nodes["a"].guid(), 5, &with_deleted)
        .unwrap();
    assert_eq!(graph.entities.len(), 5);
}

#[tokio::test]
async fn linking_an_entity_to_itself() {
    let connector = connector();
    let nodes = chain(&connector).await;
    let graph = connector
        .get_linking_entities(USER, nodes["a"].guid(), nodes["a"].guid(), &TraversalRequest::new())
        .unwrap();
    assert_eq!(graph.entity_guids(), vec![nodes["a"].guid()]);
    assert!(graph.relationships.is_empty());
}

#[tokio::test]
async fn linking_follows_the_shortest_path() {
    let connector = connector();
    let nodes = chain(&connector).await;
    let graph = connector
        .get_linking_entities(USER, nodes["a"].guid(), nodes["d"].guid(), &TraversalRequest::new())
        .unwrap();
    let order: Vec<&Guid> = graph.entity_guids();
    assert_eq!(
        order,
        vec![
            nodes["a"].guid(),
            nodes["b"].guid(),
            nodes["c"].guid(),
            nodes["d"].guid()
        ]
    );
    assert_eq!(graph.relationships.len(), 3);
}

#[tokio::test]
async fn disconnected_entities_link_to_nothing() {
    let connector = connector();
    let nodes = chain(&connector).await;
    let island = add_asset(&connector, TABLE, "island").await;
    let graph = connector
        .get_linking_entities(USER, nodes["a"].guid(), island.guid(), &TraversalRequest::new())
        .unwrap();
    assert!(graph.is_empty());

    let err = connector
        .get_linking_entities(USER, nodes["a"].guid(), &Guid::from("ghost"), &TraversalRequest::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotKnown);
}

#[tokio::test]
async fn related_entities_exclude_the_start_and_page() {
    let connector = connector();
    let nodes = chain(&connector).await;

    let related = connector
        .get_related_entities(USER, nodes["a"].guid(), &TraversalRequest::new())
        .unwrap();
    assert_eq!(related.len(), 4);
    assert!(related.iter().all(|e| e.guid() != nodes["a"].guid()));

    let columns = connector
        .get_related_entities(
            USER,
            nodes["a"].guid(),
            &TraversalRequest::new().with_entity_type(COLUMN),
        )
        .unwrap();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].guid(), nodes["e"].guid());

    let paged = connector
        .get_related_entities(
            USER,
            nodes["a"].guid(),
            &TraversalRequest::new()
                .sequenced(Sequencing::by_property("qualifiedName", false))
                .page(0, 2),
        )
        .unwrap();
    assert_eq!(paged.len(), 2);
    assert_eq!(paged[0].guid(), nodes["e"].guid());

    let err = connector
        .get_related_entities(
            USER,
            nodes["a"].guid(),
            &TraversalRequest::new().sequenced(Sequencing::by(SequencingOrder::PropertyDescending)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PagingError);
}

#[tokio::test]
async fn classification_filter_limits_results() {
    let connector = connector();
    let nodes = chain(&connector).await;
    connector
        .classify_entity(USER, nodes["b"].guid(), "Confidential", HashMap::new())
        .await
        .unwrap();

    let related = connector
        .get_related_entities(
            USER,
            nodes["d"].guid(),
            &TraversalRequest::new().with_classification("Confidential"),
        )
        .unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].guid(), nodes["b"].guid());

    let err = connector
        .get_related_entities(
            USER,
            nodes["d"].guid(),
            &TraversalRequest::new().with_classification("AssetLink"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}
