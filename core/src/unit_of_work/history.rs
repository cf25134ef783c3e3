//! Undo/redo history of committed transactions.
//!
//! [`UndoManager`] owns a linear undo/redo stack of [`UndoableAction`] trait
//! objects. Actions arrive already applied (the transaction performed the
//! mutation); the manager only stores, merges and replays them. When a new
//! action is added after undoing, the redo stack is cleared (standard editor
//! behavior).

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use super::action::UndoableAction;
use super::document::Document;
use super::error::{UowError, UowResult};
use super::transaction::Transaction;
use super::undo_entry::DEFAULT_MERGE_WINDOW;
use crate::config::HistoryConfig;

/// Default maximum number of undo steps.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// Manages the undo/redo stacks of one document.
///
/// The undo stack is a bounded [`VecDeque`]: when it exceeds `max_undo`, the
/// oldest action is dropped from the front. The redo stack is an unbounded
/// [`Vec`] (it can never grow larger than the undo stack was).
///
/// Undo and redo are driven through the document
/// ([`Document::undo`] / [`Document::redo`]) because replay needs the
/// document and the manager at the same time.
pub struct UndoManager<D: Document> {
    undo_stack: VecDeque<Box<dyn UndoableAction<D>>>,
    redo_stack: Vec<Box<dyn UndoableAction<D>>>,
    max_undo: usize,
    merge_window: Duration,
    merge_broken: bool,
    /// Tracks distance from the saved state.
    ///
    /// - `Some(0)`: the current state matches the last save.
    /// - `Some(n)` where `n > 0`: `n` undos needed to reach the saved state.
    /// - `Some(n)` where `n < 0`: `|n|` redos needed to reach the saved state.
    /// - `None`: never saved, or the save point is permanently unreachable
    ///   (e.g. after capacity overflow dropped it, or the redo branch was discarded).
    save_distance: Option<i64>,
}

impl<D: Document> UndoManager<D> {
    /// Creates an empty manager with the given maximum undo depth and the
    /// default merge window.
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo,
            merge_window: DEFAULT_MERGE_WINDOW,
            merge_broken: false,
            save_distance: Some(0),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        let mut manager = Self::new(config.max_undo);
        manager.merge_window = config.merge_window();
        manager
    }

    /// Pushes an already-applied action onto the undo stack.
    ///
    /// Clears the redo stack and attempts to [merge](UndoableAction::merge)
    /// with the top of the undo stack, unless [`break_merge`](Self::break_merge)
    /// was called since the last push.
    pub fn add(&mut self, mut action: Box<dyn UndoableAction<D>>) {
        let is_content = action.modifies_content();

        // Clearing the redo stack invalidates a save point that was in redo.
        self.redo_stack.clear();
        if is_content
            && let Some(d) = self.save_distance
            && d < 0
        {
            self.save_distance = None;
        }

        if !self.merge_broken
            && let Some(last) = self.undo_stack.back_mut()
        {
            match last.merge(action) {
                None => {
                    log::trace!("merged \"{}\" into previous undo entry", last.description());
                    if is_content && self.save_distance == Some(0) {
                        self.save_distance = None;
                    }
                    return;
                }
                Some(returned) => action = returned,
            }
        }
        self.merge_broken = false;

        if is_content && let Some(d) = &mut self.save_distance {
            *d += 1;
        }

        self.undo_stack.push_back(action);
        self.trim();
    }

    /// Prevents the next added action from merging with the current top entry.
    pub fn break_merge(&mut self) {
        self.merge_broken = true;
    }

    fn trim(&mut self) {
        if self.undo_stack.len() > self.max_undo {
            self.undo_stack.pop_front();
            // If the save point was beyond the oldest surviving entry, it's gone.
            if let Some(d) = self.save_distance
                && d > self.undo_stack.len() as i64
            {
                self.save_distance = None;
            }
        }
    }

    /// Returns `true` if there are actions that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns `true` if there are actions that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Returns an iterator over undo action descriptions, most recent first.
    pub fn undo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.undo_stack.iter().rev().map(|a| a.description())
    }

    /// Returns an iterator over redo action descriptions, most recent first.
    pub fn redo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.redo_stack.iter().rev().map(|a| a.description())
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Window within which same-shaped undo entries merge.
    pub fn merge_window(&self) -> Duration {
        self.merge_window
    }

    pub fn set_merge_window(&mut self, window: Duration) {
        self.merge_window = window;
    }

    /// Records the current state as the saved state.
    pub fn mark_saved(&mut self) {
        self.save_distance = Some(0);
    }

    /// Returns `true` if the current state differs from the last saved state,
    /// or if the save point became unreachable.
    pub fn has_unsaved_changes(&self) -> bool {
        self.save_distance != Some(0)
    }

    /// Clears both stacks and resets the merge-broken flag.
    ///
    /// If the current state was the saved state it remains so; otherwise
    /// the save point is permanently lost.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.merge_broken = false;
        if self.save_distance != Some(0) {
            self.save_distance = None;
        }
    }
}

impl<D: Document> Default for UndoManager<D> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl<D: Document> fmt::Debug for UndoManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoManager")
            .field("undo_count", &self.undo_stack.len())
            .field("redo_count", &self.redo_stack.len())
            .field("max_undo", &self.max_undo)
            .field("merge_window", &self.merge_window)
            .field("merge_broken", &self.merge_broken)
            .field("save_distance", &self.save_distance)
            .finish()
    }
}

/// Pops the newest undo entry and replays it backwards in a silent transaction.
///
/// If the replay fails the entry is dropped and the error returned; the
/// replay transaction is still committed so derived state sees whatever
/// was applied.
pub(crate) fn undo_document<D: Document>(doc: &mut D) -> UowResult {
    let mut action = doc
        .undo_manager()
        .undo_stack
        .pop_back()
        .ok_or(UowError::NothingToUndo)?;
    log::debug!("undo \"{}\"", action.description());

    let mut tx = Transaction::immediate(doc.adapters());
    let result = action.undo(doc, &mut tx);
    tx.commit(doc);
    result?;

    let manager = doc.undo_manager();
    let is_content = action.modifies_content();
    manager.redo_stack.push(action);
    if is_content && let Some(d) = &mut manager.save_distance {
        *d -= 1;
    }
    Ok(())
}

/// Pops the newest redo entry and replays it forwards in a silent transaction.
pub(crate) fn redo_document<D: Document>(doc: &mut D) -> UowResult {
    let mut action = doc
        .undo_manager()
        .redo_stack
        .pop()
        .ok_or(UowError::NothingToRedo)?;
    log::debug!("redo \"{}\"", action.description());

    let mut tx = Transaction::immediate(doc.adapters());
    let result = action.redo(doc, &mut tx);
    tx.commit(doc);
    result?;

    let manager = doc.undo_manager();
    let is_content = action.modifies_content();
    manager.undo_stack.push_back(action);
    if is_content && let Some(d) = &mut manager.save_distance {
        *d += 1;
    }
    manager.trim();
    Ok(())
}
