//! Neighborhood traversal

use super::source::InstanceSource;
use super::types::TraversalFilter;
use crate::graph::{Guid, InstanceGraph, Relationship};
use std::collections::{HashMap, HashSet};

/// Relationships per entity, fetched once and filtered
pub(super) struct Links<'s, S: InstanceSource> {
    source: &'s S,
    filter: &'s TraversalFilter,
    cache: HashMap<Guid, Vec<Relationship>>,
}

impl<'s, S: InstanceSource> Links<'s, S> {
    pub(super) fn new(source: &'s S, filter: &'s TraversalFilter) -> Self {
        Self {
            source,
            filter,
            cache: HashMap::new(),
        }
    }

    /// Admitted relationships touching `guid`
    pub(super) fn of(&mut self, guid: &Guid) -> Result<&[Relationship], S::Error> {
        if !self.cache.contains_key(guid) {
            let admitted: Vec<Relationship> = self
                .source
                .relationships_for(guid)?
                .into_iter()
                .filter(|r| self.filter.admits_relationship(r))
                .collect();
            self.cache.insert(guid.clone(), admitted);
        }
        Ok(self.cache.get(guid).map(Vec::as_slice).unwrap_or(&[]))
    }
}

/// Entities within a number of hops of a start entity, and the relationships
/// among them
#[derive(Debug, Clone)]
pub struct NeighborhoodQuery {
    pub start: Guid,
    /// 0 returns only the start entity
    pub level: usize,
    pub filter: TraversalFilter,
}

impl NeighborhoodQuery {
    pub fn around(start: Guid) -> Self {
        Self {
            start,
            level: 1,
            filter: TraversalFilter::default(),
        }
    }

    pub fn level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    pub fn filter(mut self, filter: TraversalFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Breadth-first expansion from the start entity.
    ///
    /// Entities rejected by the filter are neither returned nor expanded.
    /// The result holds every admitted relationship whose two ends were both
    /// reached, not only the ones walked.
    pub fn execute<S: InstanceSource>(&self, source: &S) -> Result<InstanceGraph, S::Error> {
        let mut graph = InstanceGraph::empty();
        let Some(start) = source.entity(&self.start)? else {
            return Ok(graph);
        };
        graph.entities.push(start);
        if self.level == 0 {
            return Ok(graph);
        }

        let mut links = Links::new(source, &self.filter);
        let mut visited: HashSet<Guid> = HashSet::from([self.start.clone()]);
        let mut frontier = vec![self.start.clone()];

        for _ in 0..self.level {
            let mut next = Vec::new();
            for guid in &frontier {
                let neighbors: Vec<Guid> = links
                    .of(guid)?
                    .iter()
                    .filter_map(|r| r.other_end(guid).cloned())
                    .collect();
                for neighbor in neighbors {
                    if visited.contains(&neighbor) {
                        continue;
                    }
                    if let Some(entity) = source.entity(&neighbor)? {
                        if self.filter.admits_entity(&entity) {
                            visited.insert(neighbor.clone());
                            next.push(neighbor);
                            graph.entities.push(entity);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let reached: Vec<Guid> = graph.entities.iter().map(|e| e.guid().clone()).collect();
        let mut seen: HashSet<Guid> = HashSet::new();
        for guid in &reached {
            for relationship in links.of(guid)? {
                if visited.contains(&relationship.end1.guid)
                    && visited.contains(&relationship.end2.guid)
                    && seen.insert(relationship.guid().clone())
                {
                    graph.relationships.push(relationship.clone());
                }
            }
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InstanceStatus;
    use crate::query::fixture::*;

    // a - b - c - d, plus b - e and a shortcut c - e
    fn chain() -> InstanceGraph {
        graph(
            vec![
                entity("a", "Table"),
                entity("b", "Table"),
                entity("c", "Column"),
                entity("d", "Table"),
                classified("e", "Table", "Confidential"),
            ],
            vec![
                link("ab", "Link", "a", "b"),
                link("bc", "Link", "b", "c"),
                link("cd", "Link", "c", "d"),
                link("be", "Owns", "b", "e"),
                link("ce", "Link", "c", "e"),
            ],
        )
    }

    #[test]
    fn level_zero_is_start_only() {
        let result = NeighborhoodQuery::around(Guid::from("a"))
            .level(0)
            .execute(&chain())
            .unwrap();
        assert_eq!(entity_ids(&result), ["a"]);
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn expands_level_by_level() {
        let source = chain();
        let one = NeighborhoodQuery::around(Guid::from("a")).execute(&source).unwrap();
        assert_eq!(entity_ids(&one), ["a", "b"]);
        assert_eq!(relationship_ids(&one), ["ab"]);

        let two = NeighborhoodQuery::around(Guid::from("a"))
            .level(2)
            .execute(&source)
            .unwrap();
        assert_eq!(entity_ids(&two), ["a", "b", "c", "e"]);
        // ce joins two level-2 entities and is included
        assert_eq!(relationship_ids(&two), ["ab", "bc", "be", "ce"]);
    }

    #[test]
    fn relationship_type_filter_limits_walk() {
        let filter = TraversalFilter::new().with_relationship_types(["Link".to_string()]);
        let result = NeighborhoodQuery::around(Guid::from("b"))
            .level(1)
            .filter(filter)
            .execute(&chain())
            .unwrap();
        assert_eq!(entity_ids(&result), ["a", "b", "c"]);
    }

    #[test]
    fn entity_filters_stop_expansion() {
        let by_type = TraversalFilter::new().with_entity_types(["Table".to_string()]);
        let result = NeighborhoodQuery::around(Guid::from("a"))
            .level(5)
            .filter(by_type)
            .execute(&chain())
            .unwrap();
        // c is a Column, so d is only reachable through it and stays out
        assert_eq!(entity_ids(&result), ["a", "b", "e"]);

        let by_classification = TraversalFilter::new().with_classification("Confidential");
        let result = NeighborhoodQuery::around(Guid::from("b"))
            .filter(by_classification)
            .execute(&chain())
            .unwrap();
        assert_eq!(entity_ids(&result), ["b", "e"]);
    }

    #[test]
    fn deleted_relationships_are_not_followed_by_default() {
        let source = graph(
            vec![entity("a", "Table"), entity("b", "Table")],
            vec![deleted(link("ab", "Link", "a", "b"))],
        );
        let result = NeighborhoodQuery::around(Guid::from("a")).execute(&source).unwrap();
        assert_eq!(entity_ids(&result), ["a"]);

        let with_deleted = TraversalFilter::new().with_statuses([InstanceStatus::Deleted]);
        let result = NeighborhoodQuery::around(Guid::from("a"))
            .filter(with_deleted)
            .execute(&source);
        // the deleted link is followed but b is active and now filtered out
        assert_eq!(entity_ids(&result.unwrap()), ["a"]);
    }

    #[test]
    fn unknown_start_gives_empty_graph() {
        let result = NeighborhoodQuery::around(Guid::from("zz")).execute(&chain()).unwrap();
        assert!(result.is_empty());
    }
}
