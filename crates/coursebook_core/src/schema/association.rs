//! Association edges and their deletion policies.
//!
//! Each edge links a parent entity to the child entity that stores the
//! foreign key. The deletion orchestrator walks edges by parent type.

use crate::model::record::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What happens to children when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Children are deleted with the parent, recursively.
    Cascade,
    /// Any existing child blocks the whole delete.
    Restrict,
    /// The child's link to the parent is cleared; the child stays.
    Detach,
}

impl DeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Restrict => "restrict",
            Self::Detach => "detach",
        }
    }
}

/// Association multiplicity as seen from one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToMany,
    ManyToOne,
    ManyToManyViaJoin { join: EntityType, far: EntityType },
}

/// Far side of a join edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTarget {
    pub entity: EntityType,
    pub foreign_key: &'static str,
}

/// One parent → child edge in the association graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    /// Stable edge name, unique within a registry.
    pub name: &'static str,
    pub parent: EntityType,
    pub child: EntityType,
    /// Reference field on `child` pointing at `parent`.
    pub foreign_key: &'static str,
    pub policy: DeletePolicy,
    /// Set when `child` is a join record linking `parent` to another entity.
    pub far_side: Option<JoinTarget>,
}

impl Association {
    pub const fn new(
        name: &'static str,
        parent: EntityType,
        child: EntityType,
        foreign_key: &'static str,
        policy: DeletePolicy,
    ) -> Self {
        Self {
            name,
            parent,
            child,
            foreign_key,
            policy,
            far_side: None,
        }
    }

    /// Marks `child` as a join record whose `far_key` points at `far`.
    pub const fn through_join(mut self, far: EntityType, far_key: &'static str) -> Self {
        self.far_side = Some(JoinTarget {
            entity: far,
            foreign_key: far_key,
        });
        self
    }

    pub fn is_join(&self) -> bool {
        self.far_side.is_some()
    }

    /// Multiplicity from `entity`'s point of view, `None` when not an endpoint.
    pub fn cardinality_from(&self, entity: EntityType) -> Option<Cardinality> {
        if entity == self.parent {
            return Some(match self.far_side {
                Some(far) => Cardinality::ManyToManyViaJoin {
                    join: self.child,
                    far: far.entity,
                },
                None => Cardinality::OneToMany,
            });
        }
        if entity == self.child {
            return Some(Cardinality::ManyToOne);
        }
        None
    }
}

impl Display for Association {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} -> {}.{}, {})",
            self.name,
            self.parent,
            self.child,
            self.foreign_key,
            self.policy.as_str()
        )
    }
}
