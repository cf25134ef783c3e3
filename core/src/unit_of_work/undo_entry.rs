//! The undo-log entry produced by [`Transaction::commit_with_undo`].
//!
//! An entry is a pure replay of recorded snapshots: undo walks the log in
//! reverse re-applying each `before` side through the adapters, redo walks it
//! forward with the `after` side. The original mutation closures are never
//! re-executed.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use super::action::UndoableAction;
use super::callbacks::{CallbackMap, Event, Phase};
use super::document::{Document, TargetOf};
use super::error::{UowError, UowResult};
use super::operation::{Operation, OperationOf, affected_targets, consolidate};
use super::snapshot::Snapshot;
use super::transaction::Transaction;

/// How long after an entry's last touch a same-shaped entry still merges into it.
pub const DEFAULT_MERGE_WINDOW: Duration = Duration::from_secs(2);

/// A committed transaction's consolidated log, replayable in both directions.
pub struct UndoLogEntry<D: Document> {
    description: String,
    operations: Vec<OperationOf<D>>,
    callbacks: CallbackMap<D>,
    created_at: Instant,
    last_touched: Instant,
    merge_window: Duration,
}

impl<D: Document> UndoLogEntry<D> {
    /// Builds an entry from a raw operation log; the log is consolidated.
    pub fn new(
        description: impl Into<String>,
        operations: Vec<OperationOf<D>>,
        callbacks: CallbackMap<D>,
    ) -> Self {
        let now = Instant::now();
        Self {
            description: description.into(),
            operations: consolidate(operations),
            callbacks,
            created_at: now,
            last_touched: now,
            merge_window: DEFAULT_MERGE_WINDOW,
        }
    }

    /// Overrides the creation (and last-touch) time.
    pub fn with_timestamp(mut self, at: Instant) -> Self {
        self.created_at = at;
        self.last_touched = at;
        self
    }

    pub fn with_merge_window(mut self, window: Duration) -> Self {
        self.merge_window = window;
        self
    }

    pub fn operations(&self) -> &[OperationOf<D>] {
        &self.operations
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    /// Distinct targets affected by this entry.
    pub fn affected_targets(&self) -> HashSet<TargetOf<D>> {
        affected_targets(&self.operations)
    }

    /// Runs this entry's callbacks for `(phase, event)`, then drains any the
    /// replay transaction picked up for the same key.
    fn fire(&self, doc: &mut D, tx: &mut Transaction<D>, phase: Phase, event: Event) {
        for callback in self.callbacks.get(phase, event) {
            callback(doc, tx);
        }
        tx.fire(doc, phase, event);
    }

    fn can_absorb(&self, next: &Self) -> bool {
        if next.description != self.description {
            return false;
        }
        if next.affected_targets() != self.affected_targets() {
            return false;
        }
        next.created_at.saturating_duration_since(self.last_touched) < self.merge_window
    }
}

fn captured<'a, S>(snapshot: &'a Snapshot<S>, target: &impl fmt::Display) -> UowResult<&'a S> {
    snapshot
        .captured()
        .ok_or_else(|| UowError::MissingSnapshot(target.to_string()))
}

fn trace<D: Document>(direction: &str, op: &OperationOf<D>) {
    if cfg!(debug_assertions) {
        match op.parent() {
            Some(parent) => log::debug!("{direction} {} {} (parent {parent})", op.name(), op.target()),
            None => log::debug!("{direction} {} {}", op.name(), op.target()),
        }
    }
}

impl<D: Document> UndoableAction<D> for UndoLogEntry<D> {
    fn undo(&mut self, doc: &mut D, tx: &mut Transaction<D>) -> UowResult {
        self.fire(doc, tx, Phase::Before, Event::Undo);
        let registry = tx.adapters().clone();
        for op in self.operations.iter().rev() {
            trace::<D>("undo", op);
            match op {
                Operation::Remove {
                    target,
                    parent,
                    index,
                    before,
                } => {
                    let snapshot = captured(before, target)?;
                    registry.child_adapter(parent.kind, target.kind).add(
                        doc, &parent.id, &target.id, snapshot, *index, tx,
                    )?;
                }
                Operation::Add { target, parent, .. } => {
                    registry
                        .child_adapter(parent.kind, target.kind)
                        .remove(doc, &parent.id, &target.id, tx)?;
                }
                Operation::Update { target, before, .. } => {
                    let snapshot = captured(before, target)?;
                    registry
                        .adapter(target.kind)
                        .update(doc, &target.id, snapshot, tx)?;
                }
            }
        }
        self.fire(doc, tx, Phase::After, Event::Undo);
        Ok(())
    }

    fn redo(&mut self, doc: &mut D, tx: &mut Transaction<D>) -> UowResult {
        self.fire(doc, tx, Phase::Before, Event::Redo);
        let registry = tx.adapters().clone();
        for op in &self.operations {
            trace::<D>("redo", op);
            match op {
                Operation::Add {
                    target,
                    parent,
                    index,
                    after,
                } => {
                    let snapshot = captured(after, target)?;
                    registry.child_adapter(parent.kind, target.kind).add(
                        doc, &parent.id, &target.id, snapshot, *index, tx,
                    )?;
                }
                Operation::Remove { target, parent, .. } => {
                    registry
                        .child_adapter(parent.kind, target.kind)
                        .remove(doc, &parent.id, &target.id, tx)?;
                }
                Operation::Update { target, after, .. } => {
                    let snapshot = captured(after, target)?;
                    registry
                        .adapter(target.kind)
                        .update(doc, &target.id, snapshot, tx)?;
                }
            }
        }
        self.fire(doc, tx, Phase::After, Event::Redo);
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    /// Absorbs `next` if it is another log entry with the same description
    /// and the same set of affected targets, created within the merge window
    /// of this entry's last touch.
    fn merge(&mut self, next: Box<dyn UndoableAction<D>>) -> Option<Box<dyn UndoableAction<D>>> {
        let Some(candidate) = (*next).as_any().downcast_ref::<Self>() else {
            return Some(next);
        };
        if !self.can_absorb(candidate) {
            return Some(next);
        }

        let mut operations = std::mem::take(&mut self.operations);
        operations.extend(candidate.operations.iter().cloned());
        self.operations = consolidate(operations);
        self.callbacks.absorb(&candidate.callbacks, Event::Redo, true);
        self.callbacks.absorb(&candidate.callbacks, Event::Undo, false);
        self.last_touched = candidate.created_at;
        None
    }
}

impl<D: Document> fmt::Debug for UndoLogEntry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoLogEntry")
            .field("description", &self.description)
            .field("operations", &self.operations)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
