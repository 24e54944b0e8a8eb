//! Association-graph walk that turns one delete into a plan.
//!
//! # Invariants
//! - Each record is visited at most once per plan.
//! - Only `children_of` edges are followed; far sides of joins are never
//!   touched.

use crate::deletion::plan::{DeletionPlan, Detachment, PlanOutcome, RestrictedDeletion};
use crate::model::record::{FieldValue, RecordRef};
use crate::repo::query::FieldFilter;
use crate::repo::record_store::{RecordStore, RepoError, RepoResult};
use crate::schema::{DeletePolicy, Registry};
use std::collections::HashSet;

/// Plans and applies deletes according to registry policies.
pub struct DeletionOrchestrator<'r> {
    registry: &'r Registry,
}

impl<'r> DeletionOrchestrator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolves every removal and detachment needed to delete `root`.
    ///
    /// # Errors
    /// - `NotFound` when `root` does not exist.
    pub fn plan(&self, store: &dyn RecordStore, root: RecordRef) -> RepoResult<PlanOutcome> {
        if !store.exists(root)? {
            return Err(RepoError::NotFound(root));
        }

        let mut walk = Walk::default();
        if let Some(restricted) = self.visit(store, root, &mut walk)? {
            return Ok(PlanOutcome::Restricted(restricted));
        }

        let removed: HashSet<RecordRef> = walk.removals.iter().copied().collect();
        let mut detachments = Vec::new();
        for detachment in walk.detachments {
            if !removed.contains(&detachment.record) && !detachments.contains(&detachment) {
                detachments.push(detachment);
            }
        }

        Ok(PlanOutcome::Ready(DeletionPlan {
            root,
            removals: walk.removals,
            detachments,
        }))
    }

    /// Writes a ready plan: detachments first, then removals in plan order.
    pub fn apply(&self, store: &dyn RecordStore, plan: &DeletionPlan) -> RepoResult<()> {
        for detachment in &plan.detachments {
            store.clear_field(detachment.record, detachment.field)?;
        }
        for target in &plan.removals {
            store.delete(*target)?;
        }
        Ok(())
    }

    /// Plans and, when nothing restricts it, applies the delete.
    pub fn execute(&self, store: &dyn RecordStore, root: RecordRef) -> RepoResult<PlanOutcome> {
        let outcome = self.plan(store, root)?;
        if let PlanOutcome::Ready(plan) = &outcome {
            self.apply(store, plan)?;
        }
        Ok(outcome)
    }

    fn visit(
        &self,
        store: &dyn RecordStore,
        node: RecordRef,
        walk: &mut Walk,
    ) -> RepoResult<Option<RestrictedDeletion>> {
        if !walk.visited.insert(node) {
            return Ok(None);
        }

        for edge in self.registry.children_of(node.entity) {
            let filter = FieldFilter::new(edge.foreign_key, FieldValue::Reference(node.id));
            let children: Vec<RecordRef> = store
                .find_ids(edge.child, &[filter])?
                .into_iter()
                .map(|id| RecordRef::new(edge.child, id))
                .collect();
            if children.is_empty() {
                continue;
            }

            match edge.policy {
                DeletePolicy::Cascade => {
                    for child in children {
                        if let Some(restricted) = self.visit(store, child, walk)? {
                            return Ok(Some(restricted));
                        }
                    }
                }
                DeletePolicy::Restrict => {
                    return Ok(Some(RestrictedDeletion {
                        association: *edge,
                        parent: node,
                        blocking: children,
                    }));
                }
                // A join row is the link itself; a plain child keeps its row.
                DeletePolicy::Detach if edge.is_join() => {
                    for child in children {
                        if walk.visited.insert(child) {
                            walk.removals.push(child);
                        }
                    }
                }
                DeletePolicy::Detach => {
                    walk.detachments.extend(children.into_iter().map(|record| Detachment {
                        record,
                        field: edge.foreign_key,
                    }));
                }
            }
        }

        walk.removals.push(node);
        Ok(None)
    }
}

#[derive(Default)]
struct Walk {
    visited: HashSet<RecordRef>,
    removals: Vec<RecordRef>,
    detachments: Vec<Detachment>,
}
