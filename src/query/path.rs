//! Entities and relationships on the shortest paths between two entities

use super::source::InstanceSource;
use super::traverse::Links;
use super::types::TraversalFilter;
use crate::graph::{Guid, InstanceGraph};
use std::collections::{HashMap, HashSet};

/// Query for everything lying on a shortest path between two entities
#[derive(Debug, Clone)]
pub struct LinkingQuery {
    pub from: Guid,
    pub to: Guid,
    pub filter: TraversalFilter,
}

impl LinkingQuery {
    pub fn between(from: Guid, to: Guid) -> Self {
        Self {
            from,
            to,
            filter: TraversalFilter::default(),
        }
    }

    pub fn filter(mut self, filter: TraversalFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Hop distances from `origin`, level by level.
    ///
    /// Stops after the level that reaches `stop_at`, or after `max_depth`
    /// levels. The two query ends are always admitted; intermediate entities
    /// must pass the filter.
    fn distances<S: InstanceSource>(
        &self,
        source: &S,
        links: &mut Links<'_, S>,
        origin: &Guid,
        stop_at: Option<&Guid>,
        max_depth: Option<usize>,
    ) -> Result<HashMap<Guid, usize>, S::Error> {
        let mut dist: HashMap<Guid, usize> = HashMap::from([(origin.clone(), 0)]);
        let mut frontier = vec![origin.clone()];
        let mut depth = 0;

        while !frontier.is_empty() {
            if stop_at.is_some_and(|target| dist.contains_key(target))
                || max_depth.is_some_and(|max| depth >= max)
            {
                break;
            }
            depth += 1;
            let mut next = Vec::new();
            for guid in &frontier {
                let neighbors: Vec<Guid> = links
                    .of(guid)?
                    .iter()
                    .filter_map(|r| r.other_end(guid).cloned())
                    .collect();
                for neighbor in neighbors {
                    if dist.contains_key(&neighbor) {
                        continue;
                    }
                    let endpoint = neighbor == self.from || neighbor == self.to;
                    let admitted = match source.entity(&neighbor)? {
                        Some(entity) => endpoint || self.filter.admits_entity(&entity),
                        None => false,
                    };
                    if admitted {
                        dist.insert(neighbor.clone(), depth);
                        next.push(neighbor);
                    }
                }
            }
            frontier = next;
        }
        Ok(dist)
    }

    /// Run two breadth-first searches, one from each end. An entity is on a
    /// shortest path when its distances from both ends add up to the length
    /// of the shortest path; a relationship is when it joins two such
    /// entities one step apart along that path.
    pub fn execute<S: InstanceSource>(&self, source: &S) -> Result<InstanceGraph, S::Error> {
        let mut graph = InstanceGraph::empty();
        let Some(from) = source.entity(&self.from)? else {
            return Ok(graph);
        };
        if self.from == self.to {
            graph.entities.push(from);
            return Ok(graph);
        }
        if source.entity(&self.to)?.is_none() {
            return Ok(graph);
        }

        let mut links = Links::new(source, &self.filter);
        let from_start = self.distances(source, &mut links, &self.from, Some(&self.to), None)?;
        let Some(&length) = from_start.get(&self.to) else {
            return Ok(graph);
        };
        let from_end = self.distances(source, &mut links, &self.to, None, Some(length))?;

        let mut on_path: Vec<(usize, Guid)> = from_start
            .iter()
            .filter(|(guid, d)| from_end.get(*guid).is_some_and(|e| **d + e == length))
            .map(|(guid, d)| (*d, guid.clone()))
            .collect();
        on_path.sort();
        let members: HashSet<&Guid> = on_path.iter().map(|(_, g)| g).collect();

        let mut seen: HashSet<Guid> = HashSet::new();
        for (d, guid) in &on_path {
            for relationship in links.of(guid)? {
                let Some(other) = relationship.other_end(guid) else {
                    continue;
                };
                let steps_forward = members.contains(other)
                    && from_start.get(other) == Some(&(d + 1))
                    && from_end.get(other).is_some_and(|e| d + 1 + e == length);
                if steps_forward && seen.insert(relationship.guid().clone()) {
                    graph.relationships.push(relationship.clone());
                }
            }
        }
        for (_, guid) in &on_path {
            if let Some(entity) = source.entity(guid)? {
                graph.entities.push(entity);
            }
        }
        Ok(graph)
    }
}
