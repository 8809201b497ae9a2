//! Eager loading of dot-separated relation paths.
//!
//! Paths are grouped by their first segment. Each head relation is resolved
//! once per record in the current set, concurrently, and attached under its
//! name. The tails then recurse over the concatenation of everything the head
//! produced. Parent keys are not batched or deduplicated: a set of N records
//! issues N queries per head relation.

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::trace;

use crate::error::Result;
use crate::model::Record;
use crate::relation::{resolver_for, RelationResult};
use crate::session::Session;

/// Head relation with the tails requested beneath it.
#[derive(Debug, PartialEq)]
struct PathGroup {
    head: String,
    tails: Vec<String>,
}

/// Group paths by head, in order of first appearance.
fn group_paths(paths: &[String]) -> Vec<PathGroup> {
    let mut groups: Vec<PathGroup> = Vec::new();
    for path in paths {
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        let (head, tail) = match path.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path, None),
        };

        let index = match groups.iter().position(|g| g.head == head) {
            Some(index) => index,
            None => {
                groups.push(PathGroup {
                    head: head.to_string(),
                    tails: Vec::new(),
                });
                groups.len() - 1
            }
        };
        if let Some(tail) = tail.filter(|t| !t.is_empty()) {
            if !groups[index].tails.iter().any(|t| t == tail) {
                groups[index].tails.push(tail.to_string());
            }
        }
    }
    groups
}

/// How a record's relation result was flattened, to put it back together.
enum Shape {
    One(bool),
    Many(usize),
}

pub(crate) fn load<'a>(
    session: &'a Session,
    records: &'a mut [Record],
    paths: &'a [String],
) -> BoxFuture<'a, Result<()>> {
    async move {
        for group in group_paths(paths) {
            let head = group.head.as_str();
            trace!(relation = head, records = records.len(), "eager loading relation");

            let results = try_join_all(records.iter().map(|record| async move {
                resolver_for(session, record, head)?.get_results().await
            }))
            .await?;

            for (record, result) in records.iter_mut().zip(results) {
                record.set_relation(head, result);
            }

            if group.tails.is_empty() {
                continue;
            }

            let mut shapes = Vec::with_capacity(records.len());
            let mut children = Vec::new();
            for record in records.iter_mut() {
                match record.take_relation(head) {
                    Some(RelationResult::One(one)) => {
                        shapes.push(Shape::One(one.is_some()));
                        children.extend(one.map(|r| *r));
                    }
                    Some(RelationResult::Many(many)) => {
                        shapes.push(Shape::Many(many.len()));
                        children.extend(many);
                    }
                    None => shapes.push(Shape::Many(0)),
                }
            }

            if !children.is_empty() {
                load(session, &mut children, &group.tails).await?;
            }

            let mut children = children.into_iter();
            for (record, shape) in records.iter_mut().zip(shapes) {
                let result = match shape {
                    Shape::One(present) => RelationResult::One(
                        present.then(|| children.next()).flatten().map(Box::new),
                    ),
                    Shape::Many(count) => RelationResult::Many(children.by_ref().take(count).collect()),
                };
                record.set_relation(head, result);
            }
        }
        Ok(())
    }
    .boxed()
}
