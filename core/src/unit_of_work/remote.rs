//! Per-document transactions for replicated (remote) changes.
//!
//! The replication layer applies incoming mutations through the same
//! `add_element` / `update_element` / `remove_element` primitives as local
//! code, but into one dedicated transaction per document. That transaction
//! runs the identical adapter dispatch on commit, so derived state stays
//! consistent, and never reaches the undo manager.

use std::collections::HashMap;
use std::fmt;

use super::document::Document;
use super::transaction::Transaction;

/// Lazily-created remote transactions keyed by [`Document::document_id`].
pub struct RemoteTransactions<D: Document> {
    active: HashMap<String, Transaction<D>>,
}

impl<D: Document> RemoteTransactions<D> {
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
        }
    }

    /// Returns the document's remote transaction, creating it on first use.
    pub fn get_or_begin(&mut self, doc: &D) -> &mut Transaction<D> {
        self.active
            .entry(doc.document_id().to_owned())
            .or_insert_with(|| {
                log::debug!("opening remote transaction for document {}", doc.document_id());
                Transaction::remote(doc.adapters())
            })
    }

    /// Runs `apply` against the document's remote transaction.
    pub fn apply<R>(&mut self, doc: &mut D, apply: impl FnOnce(&mut D, &mut Transaction<D>) -> R) -> R {
        let tx = self.get_or_begin(doc);
        apply(doc, tx)
    }

    /// Returns `true` if the document has an open remote transaction.
    pub fn is_active(&self, doc: &D) -> bool {
        self.active.contains_key(doc.document_id())
    }

    /// Tears down and commits the document's remote transaction.
    ///
    /// The registry entry is removed before commit dispatch runs, so hooks
    /// that apply further replicated changes open a fresh transaction.
    /// Returns `false` if there was nothing to commit.
    pub fn commit(&mut self, doc: &mut D) -> bool {
        match self.active.remove(doc.document_id()) {
            Some(tx) => {
                tx.commit(doc);
                true
            }
            None => false,
        }
    }

    /// Tears down and aborts the document's remote transaction.
    pub fn abort(&mut self, doc: &D) -> bool {
        match self.active.remove(doc.document_id()) {
            Some(tx) => {
                tx.abort();
                true
            }
            None => false,
        }
    }

    /// Number of documents with an open remote transaction.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl<D: Document> Default for RemoteTransactions<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> fmt::Debug for RemoteTransactions<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTransactions")
            .field("documents", &self.active.keys().collect::<Vec<_>>())
            .finish()
    }
}
