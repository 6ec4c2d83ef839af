//! Entities reachable from a start entity

use super::source::InstanceSource;
use super::traverse::Links;
use super::types::TraversalFilter;
use crate::graph::{Entity, Guid};
use std::collections::HashSet;

/// Every entity connected to the start entity, directly or transitively
#[derive(Debug, Clone)]
pub struct RelatedQuery {
    pub start: Guid,
    pub filter: TraversalFilter,
}

impl RelatedQuery {
    pub fn from(start: Guid) -> Self {
        Self {
            start,
            filter: TraversalFilter::default(),
        }
    }

    pub fn filter(mut self, filter: TraversalFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Walk every admitted relationship without a depth limit.
    ///
    /// The walk passes through any entity with an admitted status; type and
    /// classification filters only decide which entities are returned. The
    /// start entity is never part of the result. Results come back in
    /// discovery order.
    pub fn execute<S: InstanceSource>(&self, source: &S) -> Result<Vec<Entity>, S::Error> {
        let mut related = Vec::new();
        if source.entity(&self.start)?.is_none() {
            return Ok(related);
        }

        let mut links = Links::new(source, &self.filter);
        let mut visited: HashSet<Guid> = HashSet::from([self.start.clone()]);
        let mut frontier = vec![self.start.clone()];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for guid in &frontier {
                let neighbors: Vec<Guid> = links
                    .of(guid)?
                    .iter()
                    .filter_map(|r| r.other_end(guid).cloned())
                    .collect();
                for neighbor in neighbors {
                    if !visited.insert(neighbor.clone()) {
                        continue;
                    }
                    let Some(entity) = source.entity(&neighbor)? else {
                        continue;
                    };
                    if !self.filter.admits_status(entity.status()) {
                        continue;
                    }
                    next.push(neighbor);
                    if self.filter.admits_entity(&entity) {
                        related.push(entity);
                    }
                }
            }
            frontier = next;
        }
        Ok(related)
    }
}
