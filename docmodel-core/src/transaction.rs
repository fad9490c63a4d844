//! Multi-document transactions.
//!
//! A transaction is a separate [`Model`] bound to its own session. The engine it was
//! started from is left untouched and stays usable; only the plain engine may start
//! transactions.
//!
//! ```ignore
//! let tx = model.start_transaction().await?;
//!
//! if let Err(err) = tx.create(&mut order).await {
//!     return Err(tx.rollback(err).await);
//! }
//! if let Err(err) = tx.update(&mut stock, &stock_id).await {
//!     return Err(tx.rollback(err).await);
//! }
//!
//! tx.commit().await?;
//! ```

use std::{fmt::Display, sync::Arc};

use crate::{
    backend::{StoreBackend, StoreSession},
    context::ExecutionContext,
    error::{ModelError, ModelResult},
    model::Model,
};

impl<B: StoreBackend> Model<B> {
    /// Opens a session, begins a transaction on it, and returns an engine bound to it.
    ///
    /// # Errors
    ///
    /// [`ModelError::Internal`] if the session or transaction can't be started, or if
    /// this engine is itself transactional (transactions don't nest).
    pub async fn start_transaction(&self) -> ModelResult<Model<B>> {
        if self.context.is_transaction() {
            tracing::error!("can't start a transaction from inside a transaction");
            return Err(ModelError::Internal);
        }

        let mut session = self
            .backend
            .start_session()
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "can't init session for transaction");
                ModelError::Internal
            })?;

        session
            .start_transaction()
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "can't start transaction");
                ModelError::Internal
            })?;

        Ok(Model {
            backend: Arc::clone(&self.backend),
            context: ExecutionContext::transaction(session),
        })
    }

    /// Commits the transaction this engine is bound to.
    ///
    /// Consumes the engine: a finished transaction can't be used again.
    pub async fn commit(self) -> ModelResult<()> {
        let Some(mut session) = self.context.session().await else {
            tracing::error!("commit called on an engine without a transaction");
            return Err(ModelError::Internal);
        };

        session
            .commit_transaction()
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "can't commit transaction");
                ModelError::Internal
            })
    }

    /// Aborts the transaction this engine is bound to in response to `cause`.
    ///
    /// Always returns [`ModelError::Internal`]: the caller already failed, and an abort
    /// failure is only logged.
    pub async fn rollback<E: Display + Send>(self, cause: E) -> ModelError {
        match self.context.session().await {
            Some(mut session) => match session.abort_transaction().await {
                Ok(()) => tracing::debug!(cause = %cause, "transaction rolled back"),
                Err(err) => tracing::error!(
                    cause = %cause,
                    error = %err,
                    "error on rollback transaction"
                ),
            },
            None => tracing::error!(
                cause = %cause,
                "rollback called on an engine without a transaction"
            ),
        }

        ModelError::Internal
    }
}
