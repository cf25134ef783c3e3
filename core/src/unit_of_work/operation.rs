//! Recorded operations and log consolidation.
//!
//! A transaction's log is an append-only, insertion-ordered list of
//! [`Operation`]s. [`consolidate`] collapses repeated updates of one target
//! into a single before/after pair so a continuous drag becomes one logical
//! undo step instead of one per intermediate tick.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::document::{Document, Target};
use super::snapshot::Snapshot;

/// One recorded step of a transaction.
///
/// `Add` and `Remove` carry the parent and the structural index of the child
/// so replay can restore tree/collection membership, not just properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<K, I, S> {
    Add {
        target: Target<K, I>,
        parent: Target<K, I>,
        index: usize,
        after: Snapshot<S>,
    },
    Remove {
        target: Target<K, I>,
        parent: Target<K, I>,
        index: usize,
        before: Snapshot<S>,
    },
    Update {
        target: Target<K, I>,
        before: Snapshot<S>,
        after: Snapshot<S>,
    },
}

impl<K, I, S> Operation<K, I, S> {
    /// The entity this operation applies to.
    pub fn target(&self) -> &Target<K, I> {
        match self {
            Self::Add { target, .. } | Self::Remove { target, .. } | Self::Update { target, .. } => {
                target
            }
        }
    }

    /// The structural parent, for `Add` and `Remove`.
    pub fn parent(&self) -> Option<&Target<K, I>> {
        match self {
            Self::Add { parent, .. } | Self::Remove { parent, .. } => Some(parent),
            Self::Update { .. } => None,
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update { .. })
    }

    /// Short operation name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Update { .. } => "update",
        }
    }
}

/// The [`Operation`] type of a document.
pub type OperationOf<D> =
    Operation<<D as Document>::Kind, <D as Document>::Id, <D as Document>::Snapshot>;

/// Collapses repeated `Update`s of the same target.
///
/// The surviving entry sits where the first update of that target was
/// recorded and keeps its before-snapshot; its after-snapshot is taken from
/// the last update. `Add`/`Remove` entries and updates of other targets pass
/// through untouched, in their original relative order.
pub fn consolidate<K, I, S>(ops: Vec<Operation<K, I, S>>) -> Vec<Operation<K, I, S>>
where
    K: Clone + Eq + Hash,
    I: Clone + Eq + Hash,
{
    let mut first_update: HashMap<Target<K, I>, usize> = HashMap::new();
    let mut out: Vec<Operation<K, I, S>> = Vec::with_capacity(ops.len());

    for op in ops {
        match op {
            Operation::Update {
                target,
                before,
                after,
            } => {
                if let Some(&slot) = first_update.get(&target) {
                    if let Operation::Update { after: kept, .. } = &mut out[slot] {
                        *kept = after;
                    }
                } else {
                    first_update.insert(target.clone(), out.len());
                    out.push(Operation::Update {
                        target,
                        before,
                        after,
                    });
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// The set of distinct targets touched by `ops`.
pub fn affected_targets<K, I, S>(ops: &[Operation<K, I, S>]) -> HashSet<Target<K, I>>
where
    K: Clone + Eq + Hash,
    I: Clone + Eq + Hash,
{
    ops.iter().map(|op| op.target().clone()).collect()
}
