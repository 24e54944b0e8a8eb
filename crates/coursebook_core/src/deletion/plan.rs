//! Deletion plan and restricted-outcome types.

use crate::model::record::RecordRef;
use crate::schema::Association;
use std::fmt::{Display, Formatter};

/// One reference column cleared by a detach edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detachment {
    pub record: RecordRef,
    pub field: &'static str,
}

/// Every write needed to delete `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    pub root: RecordRef,
    /// Post-order: descendants precede their ancestors; `root` is last.
    pub removals: Vec<RecordRef>,
    pub detachments: Vec<Detachment>,
}

impl DeletionPlan {
    pub fn removes(&self, target: RecordRef) -> bool {
        self.removals.contains(&target)
    }
}

/// A restrict edge still has children; nothing was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedDeletion {
    pub association: Association,
    /// Record whose children block the delete. May be a descendant of the root.
    pub parent: RecordRef,
    pub blocking: Vec<RecordRef>,
}

impl Display for RestrictedDeletion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delete restricted: {} has {} dependent {} record(s) via {}",
            self.parent,
            self.blocking.len(),
            self.association.child,
            self.association.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Ready(DeletionPlan),
    Restricted(RestrictedDeletion),
}
