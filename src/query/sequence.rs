//! Result ordering and paging

use super::types::{Paging, QueryError, Sequencing, SequencingOrder};
use crate::graph::{Entity, InstanceHeader, Properties, PropertyValue, Relationship};
use std::cmp::Ordering;

/// Anything that can be ordered by the sequencing options
pub trait Sequenced {
    fn header(&self) -> &InstanceHeader;
    fn properties(&self) -> &Properties;
}

impl Sequenced for Entity {
    fn header(&self) -> &InstanceHeader {
        &self.header
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }
}

impl Sequenced for Relationship {
    fn header(&self) -> &InstanceHeader {
        &self.header
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Check the sequencing and paging options of a request
pub fn validate(
    sequencing: &Sequencing,
    paging: &Paging,
    max_page_size: usize,
) -> Result<(), QueryError> {
    if paging.from_element < 0 {
        return Err(QueryError::Paging(format!(
            "from_element {} is negative",
            paging.from_element
        )));
    }
    if paging.page_size < 0 {
        return Err(QueryError::Paging(format!(
            "page_size {} is negative",
            paging.page_size
        )));
    }
    if paging.page_size as u64 > max_page_size as u64 {
        return Err(QueryError::Paging(format!(
            "page_size {} exceeds the maximum of {}",
            paging.page_size, max_page_size
        )));
    }
    if matches!(
        sequencing.order,
        SequencingOrder::PropertyAscending | SequencingOrder::PropertyDescending
    ) && sequencing.property.as_deref().map_or(true, str::is_empty)
    {
        return Err(QueryError::Paging(
            "property sequencing needs a property name".into(),
        ));
    }
    Ok(())
}

/// Missing values sort after present ones in either direction
fn compare_property(
    a: Option<&PropertyValue>,
    b: Option<&PropertyValue>,
    descending: bool,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = a.compare(b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort in place. The sort is stable, so ties keep store order.
pub fn sequence<T: Sequenced>(items: &mut [T], sequencing: &Sequencing) {
    match sequencing.order {
        SequencingOrder::Any => {}
        SequencingOrder::Guid => items.sort_by(|a, b| a.header().guid.cmp(&b.header().guid)),
        SequencingOrder::CreationDateRecent => {
            items.sort_by(|a, b| b.header().create_time.cmp(&a.header().create_time))
        }
        SequencingOrder::CreationDateOldest => {
            items.sort_by(|a, b| a.header().create_time.cmp(&b.header().create_time))
        }
        SequencingOrder::LastUpdateRecent => {
            items.sort_by(|a, b| b.header().update_time.cmp(&a.header().update_time))
        }
        SequencingOrder::LastUpdateOldest => {
            items.sort_by(|a, b| a.header().update_time.cmp(&b.header().update_time))
        }
        SequencingOrder::PropertyAscending | SequencingOrder::PropertyDescending => {
            let Some(property) = sequencing.property.as_deref() else {
                return;
            };
            let descending = sequencing.order == SequencingOrder::PropertyDescending;
            items.sort_by(|a, b| {
                compare_property(
                    a.properties().get(property),
                    b.properties().get(property),
                    descending,
                )
            });
        }
    }
}

/// Cut the requested window out of an already ordered list
pub fn page<T>(items: Vec<T>, paging: &Paging, max_page_size: usize) -> Vec<T> {
    let skip = paging.from_element.max(0) as usize;
    let take = match paging.page_size {
        size if size > 0 => (size as usize).min(max_page_size),
        _ => max_page_size,
    };
    items.into_iter().skip(skip).take(take).collect()
}
