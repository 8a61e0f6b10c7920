//! Pooled Postgres connections.

use std::fmt;

use futures::{FutureExt as _, TryFutureExt as _};
use ouroboros::self_referencing;
use tracerr::Traced;

use crate::infra::database::{self, postgres};

pub use deadpool_postgres::{
    Client as Pooled, CreatePoolError as PoolCreationError, Pool, PoolError,
    Transaction,
};
pub use tokio_postgres::Error;

/// [`Pooled`] connection owning the transaction started in it.
///
/// Transaction is rolled back if this [`Tx`] is dropped unfinished.
#[self_referencing]
pub struct Tx {
    /// [`Pooled`] connection the transaction is started in.
    conn: Pooled,

    /// Transaction started in the `conn`ection.
    ///
    /// [`None`] once the transaction is finished.
    #[borrows(mut conn)]
    #[not_covariant]
    tx: Option<Transaction<'this>>,
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_tx(|tx| {
            f.debug_struct("Tx")
                .field("finished", &tx.is_none())
                .finish_non_exhaustive()
        })
    }
}

impl Tx {
    /// Takes a [`Pooled`] connection from the provided [`Pool`] and starts a
    /// transaction in it.
    ///
    /// # Errors
    ///
    /// If no connection can be taken or the transaction cannot be started.
    pub async fn begin(pool: &Pool) -> Result<Self, Traced<database::Error>> {
        let conn = pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)?;
        Self::try_new_async_send(conn, |c| c.transaction().map_ok(Some).boxed())
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }

    /// Returns the open [`Transaction`] of this [`Tx`].
    ///
    /// # Errors
    ///
    /// With [`postgres::Error::TxFinished`] if the transaction is already
    /// committed or rolled back.
    pub fn transaction(
        &self,
    ) -> Result<&Transaction<'_>, Traced<database::Error>> {
        self.with_tx(|tx| tx.as_ref())
            .ok_or_else(|| tracerr::new!(postgres::Error::TxFinished))
            .map_err(tracerr::map_from)
    }

    /// Commits the transaction of this [`Tx`].
    ///
    /// # Errors
    ///
    /// If the transaction is already finished or fails to commit.
    pub async fn commit(mut self) -> Result<(), Traced<database::Error>> {
        #[expect(
            clippy::redundant_closure_for_method_calls,
            reason = "different variance, see \
                      https://doc.rust-lang.org/nomicon/subtyping.html#variance"
        )]
        let tx = self
            .with_tx_mut(|tx| tx.take())
            .ok_or_else(|| tracerr::new!(postgres::Error::TxFinished))
            .map_err(tracerr::map_from)?;
        tx.commit()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }

    /// Rolls back the transaction of this [`Tx`].
    ///
    /// # Errors
    ///
    /// If the transaction is already finished or fails to roll back.
    pub async fn rollback(mut self) -> Result<(), Traced<database::Error>> {
        #[expect(
            clippy::redundant_closure_for_method_calls,
            reason = "different variance, see \
                      https://doc.rust-lang.org/nomicon/subtyping.html#variance"
        )]
        let tx = self
            .with_tx_mut(|tx| tx.take())
            .ok_or_else(|| tracerr::new!(postgres::Error::TxFinished))
            .map_err(tracerr::map_from)?;
        tx.rollback()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }
}
