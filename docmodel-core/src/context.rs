//! Execution contexts a [`Model`](crate::model::Model) runs its store calls under.

use mea::mutex::{Mutex, MutexGuard};
use std::fmt;

use crate::backend::StoreSession;

/// Either no transaction, or one transaction bound to an exclusively owned session.
///
/// The session sits behind an async mutex so store calls issued through one
/// transactional engine are serialized; a driver session must never see two operations
/// at once.
pub enum ExecutionContext<S: StoreSession> {
    Plain,
    Transaction(Mutex<S>),
}

impl<S: StoreSession> ExecutionContext<S> {
    pub(crate) fn transaction(session: S) -> Self {
        ExecutionContext::Transaction(Mutex::new(session))
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, ExecutionContext::Transaction(_))
    }

    /// Locks the session for one store call. Plain contexts yield `None`.
    pub(crate) async fn session(&self) -> Option<MutexGuard<'_, S>> {
        match self {
            ExecutionContext::Plain => None,
            ExecutionContext::Transaction(session) => Some(session.lock().await),
        }
    }
}

impl<S: StoreSession> fmt::Debug for ExecutionContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Plain => f.write_str("Plain"),
            ExecutionContext::Transaction(_) => f.write_str("Transaction"),
        }
    }
}
