//! Unit-of-work change tracking and undo/redo for diagram documents.
//!
//! Every mutation of a trackable entity is funneled through a
//! [`Transaction`]. Local and replicated edits share the same recording
//! primitives and adapter dispatch; only tracked local edits reach history.
//!
//! - [`Document`]: the identity-resolution root and undo sink
//! - [`Adapter`] / [`ChildAdapter`]: per-kind snapshot, restore and hooks
//! - [`AdapterRegistry`]: explicit lookup table passed to every transaction
//! - [`Transaction`]: the recording scope for one logical edit
//! - [`UndoLogEntry`]: the replayable, mergeable result of `commit_with_undo`
//! - [`UndoManager`]: bounded undo/redo stacks
//! - [`RemoteTransactions`]: per-document transactions for replicated changes
//!
//! # Tracking modes
//!
//! Only [`Transaction::tracked`] captures real snapshots and reaches the undo
//! manager. The other modes still record operations (with the
//! [`Snapshot::Untracked`] sentinel) so adapter hooks run on commit.
//!
//! # Merging
//!
//! Two undo-log entries with the same description and the same set of
//! affected targets merge when the second is created within the manager's
//! merge window of the first entry's last touch. A continuous drag thus
//! becomes one undo step. Call [`UndoManager::break_merge`] to separate two
//! otherwise-mergeable sequences.

mod action;
mod adapter;
mod callbacks;
mod document;
mod error;
mod history;
mod operation;
mod remote;
mod snapshot;
mod transaction;
mod undo_entry;

#[cfg(test)]
pub(crate) mod test_support;

pub use action::{AsAny, CompoundAction, UndoableAction};
pub use adapter::{Adapter, AdapterRegistry, ChildAdapter};
pub use callbacks::{Callback, CallbackMap, Event, Phase};
pub use document::{Document, Target, TargetOf};
pub use error::{UowError, UowResult};
pub use history::{DEFAULT_MAX_UNDO, UndoManager};
pub use operation::{Operation, OperationOf, affected_targets, consolidate};
pub use remote::RemoteTransactions;
pub use snapshot::Snapshot;
pub use transaction::{Transaction, TransactionState};
pub use undo_entry::{DEFAULT_MERGE_WINDOW, UndoLogEntry};
