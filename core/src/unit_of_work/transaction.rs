//! The unit of work: a bounded recording scope for one logical edit.
//!
//! Every mutation of a trackable entity goes through one of the recording
//! primitives so it can be undone, redone and dispatched to adapter hooks
//! regardless of whether it originated locally or from replication.
//!
//! # Modes
//!
//! | factory      | snapshots | undo entry | commit callbacks |
//! |--------------|-----------|------------|------------------|
//! | `tracked`    | captured  | yes        | queued           |
//! | `immediate`  | sentinel  | no         | queued           |
//! | `remote`     | sentinel  | no         | queued           |
//! | `throwaway`  | sentinel  | no         | fired on `on()`  |
//!
//! # Commit dispatch
//!
//! Operations are grouped by entity kind (in order of first appearance) and
//! dispatched in three passes: every kind's `on_before_commit`, then per kind
//! `on_notify` (operations not yet notified) followed by `on_after_commit`.
//! No kind's after-hook runs before every kind's before-hook has run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::action::{CompoundAction, UndoableAction};
use super::adapter::AdapterRegistry;
use super::callbacks::{CallbackMap, Event, Phase};
use super::document::{Document, TargetOf};
use super::operation::{Operation, OperationOf};
use super::snapshot::Snapshot;
use super::undo_entry::UndoLogEntry;

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Pending,
    Committed,
    Aborted,
}

struct LogEntry<D: Document> {
    op: OperationOf<D>,
    notified: bool,
}

/// A unit of work recording add/remove/update operations on a document.
///
/// The handle is linear: [`commit`](Self::commit),
/// [`commit_with_undo`](Self::commit_with_undo) and [`abort`](Self::abort)
/// consume it. Dropping a non-throwaway transaction while still pending logs
/// a leak warning.
///
/// # Example
///
/// ```ignore
/// let mut tx = Transaction::tracked(diagram.adapters());
/// tx.execute_update(&mut diagram, node.clone(), |diagram, _| {
///     diagram.node_mut(&node.id).bounds.x += 10.0;
/// });
/// tx.commit_with_undo(&mut diagram, "Move node");
/// ```
#[must_use = "a transaction must be committed or aborted"]
pub struct Transaction<D: Document> {
    registry: Arc<AdapterRegistry<D>>,
    state: TransactionState,
    tracking: bool,
    remote: bool,
    throwaway: bool,
    log: Vec<LogEntry<D>>,
    touched: HashSet<TargetOf<D>>,
    pending_snapshots: HashMap<TargetOf<D>, D::Snapshot>,
    nested: Vec<Box<dyn UndoableAction<D>>>,
    callbacks: CallbackMap<D>,
    warnings: Vec<String>,
    #[cfg(debug_assertions)]
    recording: Vec<TargetOf<D>>,
}

impl<D: Document> Transaction<D> {
    fn with_mode(registry: Arc<AdapterRegistry<D>>, tracking: bool, remote: bool, throwaway: bool) -> Self {
        Self {
            registry,
            state: TransactionState::Pending,
            tracking,
            remote,
            throwaway,
            log: Vec::new(),
            touched: HashSet::new(),
            pending_snapshots: HashMap::new(),
            nested: Vec::new(),
            callbacks: CallbackMap::new(),
            warnings: Vec::new(),
            #[cfg(debug_assertions)]
            recording: Vec::new(),
        }
    }

    /// A transaction that captures snapshots and can produce an undo entry.
    pub fn tracked(registry: Arc<AdapterRegistry<D>>) -> Self {
        Self::with_mode(registry, true, false, false)
    }

    /// A silent transaction: hooks are dispatched, history is untouched.
    pub fn immediate(registry: Arc<AdapterRegistry<D>>) -> Self {
        Self::with_mode(registry, false, false, false)
    }

    /// A transaction applying replicated changes; never reaches local history.
    ///
    /// Usually obtained through [`RemoteTransactions`](super::RemoteTransactions).
    pub fn remote(registry: Arc<AdapterRegistry<D>>) -> Self {
        Self::with_mode(registry, false, true, false)
    }

    /// An untracked transaction whose commit callbacks fire as soon as they
    /// are registered. Never reported as leaked.
    pub fn throwaway(registry: Arc<AdapterRegistry<D>>) -> Self {
        Self::with_mode(registry, false, false, true)
    }

    /// Runs `f` in a silent transaction and commits it.
    pub fn execute<R>(doc: &mut D, f: impl FnOnce(&mut D, &mut Self) -> R) -> R {
        let mut tx = Self::immediate(doc.adapters());
        let result = f(doc, &mut tx);
        tx.commit(doc);
        result
    }

    /// Runs `f` in a tracked transaction and commits it with undo under `label`.
    pub fn execute_with_undo<R>(
        doc: &mut D,
        label: impl Into<String>,
        f: impl FnOnce(&mut D, &mut Self) -> R,
    ) -> R {
        let mut tx = Self::tracked(doc.adapters());
        let result = f(doc, &mut tx);
        tx.commit_with_undo(doc, label);
        result
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn is_throwaway(&self) -> bool {
        self.throwaway
    }

    /// The registry adapters are resolved from.
    pub fn adapters(&self) -> &Arc<AdapterRegistry<D>> {
        &self.registry
    }

    /// Returns `true` if any operation on `target` has been recorded.
    pub fn contains(&self, target: &TargetOf<D>) -> bool {
        self.touched.contains(target)
    }

    /// Recorded operations in log order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationOf<D>> + '_ {
        self.log.iter().map(|entry| &entry.op)
    }

    pub fn operation_count(&self) -> usize {
        self.log.len()
    }

    /// Out-of-order corrections applied to the log so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of callbacks queued for `(phase, event)`.
    pub fn callback_count(&self, phase: Phase, event: Event) -> usize {
        self.callbacks.count(phase, event)
    }

    #[track_caller]
    fn assert_pending(&self) {
        assert!(
            self.state == TransactionState::Pending,
            "transaction is {:?}; no further recording is permitted",
            self.state
        );
    }

    #[track_caller]
    fn capture(&self, doc: &D, target: &TargetOf<D>) -> Snapshot<D::Snapshot> {
        if !self.tracking {
            return Snapshot::Untracked;
        }
        match self.registry.adapter(target.kind).snapshot(doc, &target.id) {
            Some(snapshot) => Snapshot::Captured(snapshot),
            None => panic!("cannot snapshot {target}: not found in document"),
        }
    }

    #[cfg(debug_assertions)]
    #[track_caller]
    fn enter(&mut self, target: &TargetOf<D>) {
        assert!(
            !self.recording.contains(target),
            "re-entrant mutation of {target} inside its own recording call"
        );
        self.recording.push(target.clone());
    }

    #[cfg(debug_assertions)]
    fn exit(&mut self, target: &TargetOf<D>) {
        if let Some(pos) = self.recording.iter().rposition(|t| t == target) {
            self.recording.remove(pos);
        }
    }

    #[cfg(not(debug_assertions))]
    fn enter(&mut self, _target: &TargetOf<D>) {}

    #[cfg(not(debug_assertions))]
    fn exit(&mut self, _target: &TargetOf<D>) {}

    fn push(&mut self, op: OperationOf<D>) {
        self.log.push(LogEntry { op, notified: false });
    }

    // -----------------------------------------------------------------------
    // Low-level recording primitives
    // -----------------------------------------------------------------------

    /// Captures the before-state of `target` for a later
    /// [`update_element`](Self::update_element). No-op when not tracking.
    #[track_caller]
    pub fn snapshot(&mut self, doc: &D, target: &TargetOf<D>) {
        self.assert_pending();
        if let Snapshot::Captured(snapshot) = self.capture(doc, target) {
            self.pending_snapshots.insert(target.clone(), snapshot);
        }
    }

    /// Records an `Update` of `target`, pairing the state captured by
    /// [`snapshot`](Self::snapshot) with its current state.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is closed, or if it is tracking and no
    /// before-state was captured for `target`.
    #[track_caller]
    pub fn update_element(&mut self, doc: &D, target: TargetOf<D>) {
        self.assert_pending();
        let before = if self.tracking {
            match self.pending_snapshots.remove(&target) {
                Some(snapshot) => Snapshot::Captured(snapshot),
                None => panic!("update of {target} recorded without a prior snapshot"),
            }
        } else {
            Snapshot::Untracked
        };
        self.record_update(doc, target, before);
    }

    #[track_caller]
    fn record_update(&mut self, doc: &D, target: TargetOf<D>, before: Snapshot<D::Snapshot>) {
        let after = self.capture(doc, &target);
        self.touched.insert(target.clone());
        self.push(Operation::Update {
            target,
            before,
            after,
        });
    }

    /// Records an `Add` of `target` into `parent` at `index`. The entity
    /// must already be wired into the document.
    ///
    /// If updates of `target` were recorded earlier in this transaction (an
    /// entity removed, edited and re-added), they are moved to directly after
    /// the new `Add` so replay stays causally valid, and a warning is kept.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is closed, or if `target` was already added
    /// in this transaction without an intervening remove.
    #[track_caller]
    pub fn add_element(&mut self, doc: &D, target: TargetOf<D>, parent: TargetOf<D>, index: usize) {
        self.assert_pending();
        let last_structural = self
            .log
            .iter()
            .rev()
            .find(|e| !e.op.is_update() && *e.op.target() == target);
        if let Some(entry) = last_structural {
            assert!(
                !matches!(entry.op, Operation::Add { .. }),
                "{target} added twice without an intervening remove"
            );
        }

        let after = self.capture(doc, &target);
        let add = LogEntry {
            op: Operation::Add {
                target: target.clone(),
                parent,
                index,
                after,
            },
            notified: false,
        };

        if self.touched.contains(&target) {
            let (stranded, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.log)
                .into_iter()
                .partition(|e| e.op.is_update() && *e.op.target() == target);
            self.log = rest;
            self.log.push(add);
            if !stranded.is_empty() {
                let message = format!(
                    "moved {} update(s) of {target} after its re-add",
                    stranded.len()
                );
                // Replaying such an entry re-records the same sequence.
                if self.tracking {
                    log::warn!("{message}");
                    self.warnings.push(message);
                } else {
                    log::debug!("{message}");
                }
                self.log.extend(stranded);
            }
            return;
        }

        self.touched.insert(target);
        self.log.push(add);
    }

    /// Records a `Remove` of `target` from `parent` at `index`. Call before
    /// detaching the entity so its before-state can be captured.
    #[track_caller]
    pub fn remove_element(&mut self, doc: &D, target: TargetOf<D>, parent: TargetOf<D>, index: usize) {
        self.assert_pending();
        let before = self.capture(doc, &target);
        self.touched.insert(target.clone());
        self.push(Operation::Remove {
            target,
            parent,
            index,
            before,
        });
    }

    // -----------------------------------------------------------------------
    // Execute wrappers
    // -----------------------------------------------------------------------

    /// Snapshots `target`, runs `mutate`, then records one `Update`.
    #[track_caller]
    pub fn execute_update<R>(
        &mut self,
        doc: &mut D,
        target: TargetOf<D>,
        mutate: impl FnOnce(&mut D, &mut Self) -> R,
    ) -> R {
        self.assert_pending();
        self.enter(&target);
        let before = self.capture(doc, &target);
        let result = mutate(doc, self);
        self.exit(&target);
        self.record_update(doc, target, before);
        result
    }

    /// Runs `mutate` (which wires the entities in), then records one `Add`
    /// per target at consecutive indices starting at `index`.
    #[track_caller]
    pub fn execute_add<R>(
        &mut self,
        doc: &mut D,
        targets: &[TargetOf<D>],
        parent: &TargetOf<D>,
        index: usize,
        mutate: impl FnOnce(&mut D, &mut Self) -> R,
    ) -> R {
        self.assert_pending();
        for target in targets {
            self.enter(target);
        }
        let result = mutate(doc, self);
        for target in targets {
            self.exit(target);
        }
        for (offset, target) in targets.iter().enumerate() {
            self.add_element(doc, target.clone(), parent.clone(), index + offset);
        }
        result
    }

    /// Records the `Remove` (capturing the before-state), then runs `mutate`.
    #[track_caller]
    pub fn execute_remove<R>(
        &mut self,
        doc: &mut D,
        target: TargetOf<D>,
        parent: TargetOf<D>,
        index: usize,
        mutate: impl FnOnce(&mut D, &mut Self) -> R,
    ) -> R {
        self.assert_pending();
        self.enter(&target);
        self.remove_element(doc, target.clone(), parent, index);
        let result = mutate(doc, self);
        self.exit(&target);
        result
    }

    // -----------------------------------------------------------------------
    // Callbacks, selection, nested actions
    // -----------------------------------------------------------------------

    /// Registers a one-shot callback under `(phase, event)` and `id`.
    ///
    /// A later registration under the same id replaces the earlier one. On a
    /// throwaway transaction, commit-phase callbacks run immediately.
    pub fn on(
        &mut self,
        doc: &mut D,
        phase: Phase,
        event: Event,
        id: impl Into<String>,
        callback: impl Fn(&mut D, &mut Transaction<D>) + Send + Sync + 'static,
    ) {
        if self.throwaway && event == Event::Commit {
            callback(doc, self);
            return;
        }
        self.callbacks.insert(phase, event, id, Arc::new(callback));
    }

    /// Selects `after` now, and keeps the selection in step with undo/redo of
    /// this transaction.
    pub fn select(&mut self, doc: &mut D, after: Vec<D::Id>) {
        let before = doc.selection();
        doc.set_selection(after.clone());
        self.on(doc, Phase::After, Event::Redo, "selection", move |doc, _| {
            doc.set_selection(after.clone());
        });
        self.on(doc, Phase::After, Event::Undo, "selection", move |doc, _| {
            doc.set_selection(before.clone());
        });
    }

    /// Bundles an already-applied, self-contained action with this
    /// transaction's own undo entry.
    #[track_caller]
    pub fn add(&mut self, action: Box<dyn UndoableAction<D>>) {
        self.assert_pending();
        self.nested.push(action);
    }

    /// Runs queued callbacks for `(phase, event)` until none remain,
    /// including ones registered by the callbacks themselves.
    pub(crate) fn fire(&mut self, doc: &mut D, phase: Phase, event: Event) {
        loop {
            let batch = self.callbacks.take(phase, event);
            if batch.is_empty() {
                break;
            }
            for callback in batch {
                callback(doc, self);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch and termination
    // -----------------------------------------------------------------------

    /// Groups log entries by kind in order of first appearance.
    fn grouped(&self) -> Vec<(D::Kind, Vec<OperationOf<D>>, Vec<OperationOf<D>>)> {
        let mut groups: Vec<(D::Kind, Vec<OperationOf<D>>, Vec<OperationOf<D>>)> = Vec::new();
        for entry in &self.log {
            let kind = entry.op.target().kind;
            let slot = match groups.iter().position(|(k, _, _)| *k == kind) {
                Some(slot) => slot,
                None => {
                    groups.push((kind, Vec::new(), Vec::new()));
                    groups.len() - 1
                }
            };
            groups[slot].1.push(entry.op.clone());
            if !entry.notified {
                groups[slot].2.push(entry.op.clone());
            }
        }
        groups
    }

    /// Dispatches operations not yet notified to each kind's `on_notify`.
    ///
    /// Idempotent: a second call without new operations dispatches nothing.
    #[track_caller]
    pub fn notify(&mut self, doc: &mut D) {
        self.assert_pending();
        let groups = self.grouped();
        for entry in &mut self.log {
            entry.notified = true;
        }
        let registry = self.registry.clone();
        for (kind, _, fresh) in groups {
            if !fresh.is_empty() {
                registry.adapter(kind).on_notify(doc, &fresh, self);
            }
        }
    }

    #[track_caller]
    fn finish(&mut self, doc: &mut D) {
        self.assert_pending();
        self.fire(doc, Phase::Before, Event::Commit);
        self.state = TransactionState::Committed;

        let groups = self.grouped();
        for entry in &mut self.log {
            entry.notified = true;
        }
        let registry = self.registry.clone();
        for (kind, ops, _) in &groups {
            registry.adapter(*kind).on_before_commit(doc, ops, self);
        }
        for (kind, ops, fresh) in &groups {
            let adapter = registry.adapter(*kind);
            if !fresh.is_empty() {
                adapter.on_notify(doc, fresh, self);
            }
            adapter.on_after_commit(doc, ops, self);
        }

        self.fire(doc, Phase::After, Event::Commit);
    }

    /// Commits: fires before-commit callbacks, runs the three-pass adapter
    /// dispatch, then fires after-commit callbacks.
    #[track_caller]
    pub fn commit(mut self, doc: &mut D) {
        self.finish(doc);
    }

    /// Commits, then hands an undo entry built from the consolidated log
    /// (bundled with any nested actions) to the document's undo manager.
    ///
    /// Nothing is pushed if the transaction recorded no operations and no
    /// nested actions, or if it is not tracking.
    #[track_caller]
    pub fn commit_with_undo(mut self, doc: &mut D, label: impl Into<String>) {
        let has_work = !self.log.is_empty() || !self.nested.is_empty();
        self.finish(doc);
        if !has_work {
            return;
        }
        if !self.tracking {
            log::debug!("untracked transaction committed; no undo entry recorded");
            return;
        }

        let label = label.into();
        let ops: Vec<OperationOf<D>> = std::mem::take(&mut self.log)
            .into_iter()
            .map(|entry| entry.op)
            .collect();
        let mut callbacks = std::mem::take(&mut self.callbacks);
        callbacks.clear_event(Event::Commit);
        let mut actions = std::mem::take(&mut self.nested);

        // Undo/redo callbacks (selection tracking) ride on a log entry even
        // when no operation was recorded.
        if !ops.is_empty() || !callbacks.is_empty() {
            let window = doc.undo_manager().merge_window();
            let entry = UndoLogEntry::new(label.clone(), ops, callbacks).with_merge_window(window);
            actions.push(Box::new(entry));
        }
        let action: Box<dyn UndoableAction<D>> = if actions.len() == 1 {
            actions.remove(0)
        } else {
            Box::new(CompoundAction::new(label, actions))
        };
        doc.undo_manager().add(action);
    }

    /// Discards the log. No adapter hook runs and history is untouched.
    #[track_caller]
    pub fn abort(mut self) {
        self.assert_pending();
        self.state = TransactionState::Aborted;
        self.log.clear();
        self.touched.clear();
        self.pending_snapshots.clear();
        self.nested.clear();
        self.callbacks = CallbackMap::new();
    }
}

impl<D: Document> Transaction<D> {
    /// The leak diagnostic for dropping this transaction now, if any.
    fn leak_report(&self) -> Option<String> {
        (self.state == TransactionState::Pending && !self.throwaway).then(|| {
            format!(
                "Transaction dropped while pending ({} operations recorded); commit() or abort() was never called",
                self.log.len()
            )
        })
    }
}

#[cfg(test)]
thread_local! {
    static LEAK_REPORTS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

impl<D: Document> Drop for Transaction<D> {
    fn drop(&mut self) {
        if let Some(report) = self.leak_report() {
            log::warn!("{report}");
            #[cfg(test)]
            LEAK_REPORTS.with(|count| count.set(count.get() + 1));
        }
    }
}

impl<D: Document> fmt::Debug for Transaction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("tracking", &self.tracking)
            .field("remote", &self.remote)
            .field("throwaway", &self.throwaway)
            .field("operations", &self.log.len())
            .field("nested", &self.nested.len())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
