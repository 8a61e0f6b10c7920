//! In-memory [`Database`] implementation.

mod impls;
mod store;

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use derive_more::{Deref, Display, Error as StdError};
use tokio::sync::Mutex;
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use self::store::Store;

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default, Deref)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write following the next `n` ones fail with
    /// [`Error::InjectedFault`].
    pub fn fail_writes_after(&self, n: usize) {
        self.0.faults.writes_left.store(n, Ordering::SeqCst);
    }

    /// Makes every write to take the provided `delay` after being applied.
    ///
    /// [`Duration::ZERO`] disables the delay.
    pub fn delay_writes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.0.faults.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Returns a copy of the currently committed [`Store`].
    pub async fn snapshot(&self) -> Store {
        self.0.store.lock().await.clone()
    }
}

/// Non-transactional in-memory client.
#[derive(Clone, Debug, Default)]
pub struct NonTx {
    /// Committed [`Store`].
    store: Arc<Mutex<Store>>,

    /// Injected [`Faults`].
    faults: Arc<Faults>,
}

/// Transactional in-memory client.
///
/// Operates on a snapshot of the [`Store`] taken when the transaction began.
/// The snapshot replaces the committed [`Store`] on commit, and is discarded
/// on rollback or drop.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`NonTx`] client this transaction was started from.
    origin: NonTx,

    /// Staged [`Store`], if the transaction is still open.
    staged: Arc<Mutex<Option<Store>>>,
}

impl Tx {
    /// Begins a new [`Tx`] from the provided [`NonTx`] client.
    async fn begin(origin: NonTx) -> Self {
        let snapshot = origin.store.lock().await.clone();
        Self {
            origin,
            staged: Arc::new(Mutex::new(Some(snapshot))),
        }
    }

    /// Commits this [`Tx`].
    ///
    /// # Errors
    ///
    /// If this [`Tx`] is already finished.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let staged = self
            .staged
            .lock()
            .await
            .take()
            .ok_or_else(|| tracerr::new!(Error::TxFinished))
            .map_err(tracerr::map_from)?;
        *self.origin.store.lock().await = staged;
        Ok(())
    }

    /// Discards all the changes of this [`Tx`].
    ///
    /// # Errors
    ///
    /// If this [`Tx`] is already finished.
    pub async fn rollback(&self) -> Result<(), Traced<database::Error>> {
        self.staged
            .lock()
            .await
            .take()
            .ok_or_else(|| tracerr::new!(Error::TxFinished))
            .map_err(tracerr::map_from)
            .map(drop)
    }
}

/// Faults injected into a [`Memory`] client.
#[derive(Debug)]
struct Faults {
    /// Number of writes left to succeed.
    ///
    /// [`usize::MAX`] disables the injection.
    writes_left: AtomicUsize,

    /// Milliseconds every applied write is delayed for.
    write_delay_ms: AtomicU64,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            writes_left: AtomicUsize::new(usize::MAX),
            write_delay_ms: AtomicU64::new(0),
        }
    }
}

impl Faults {
    /// Accounts a single write, failing if it's not allowed anymore.
    fn write(&self) -> Result<(), Traced<database::Error>> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(n),
                n => Some(n - 1),
            })
            .map(drop)
            .map_err(|_| tracerr::new!(Error::InjectedFault))
            .map_err(tracerr::map_from)
    }

    /// Waits for the injected write delay, if any.
    async fn delay(&self) {
        match self.write_delay_ms.load(Ordering::SeqCst) {
            0 => {}
            ms => tokio::time::sleep(Duration::from_millis(ms)).await,
        }
    }
}

/// Access to a [`Store`] of a [`Memory`] client.
pub trait Access {
    /// Reads the [`Store`] with the provided function.
    ///
    /// # Errors
    ///
    /// If the [`Store`] is not accessible anymore.
    fn read<R>(
        &self,
        f: impl FnOnce(&Store) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;

    /// Modifies the [`Store`] with the provided function.
    ///
    /// # Errors
    ///
    /// If the [`Store`] is not accessible anymore, or a fault is injected.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;
}

impl Access for NonTx {
    async fn read<R>(
        &self,
        f: impl FnOnce(&Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(f(&*self.store.lock().await))
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        self.faults.write().map_err(tracerr::wrap!())?;
        let out = f(&mut *self.store.lock().await);
        self.faults.delay().await;
        Ok(out)
    }
}

impl Access for Tx {
    async fn read<R>(
        &self,
        f: impl FnOnce(&Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        self.staged
            .lock()
            .await
            .as_ref()
            .map(f)
            .ok_or_else(|| tracerr::new!(Error::TxFinished))
            .map_err(tracerr::map_from)
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        self.origin.faults.write().map_err(tracerr::wrap!())?;
        let out = self
            .staged
            .lock()
            .await
            .as_mut()
            .map(f)
            .ok_or_else(|| tracerr::new!(Error::TxFinished))
            .map_err(tracerr::map_from)?;
        self.origin.faults.delay().await;
        Ok(out)
    }
}

/// In-memory database [`Error`].
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Write failed due to an injected fault.
    #[display("Injected write fault")]
    InjectedFault,

    /// Transaction is already committed or rolled back.
    #[display("Transaction is already finished")]
    TxFinished,
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Commit, Insert, Rollback, Select, Transact},
        DateTime,
    };

    use crate::{
        domain::{order, user, User},
        infra::Database as _,
    };

    use super::Memory;

    fn entry(id: order::Id, status: order::Status) -> order::status::NewEntry {
        order::status::NewEntry {
            order_id: id,
            status,
            recorded_at: DateTime::UNIX_EPOCH.coerce(),
            comment: order::status::Comment::default(),
            user_id: None,
        }
    }

    fn user() -> User {
        User {
            id: user::Id::new(),
            name: user::Name::new("John").unwrap(),
            role: user::Role::Client,
        }
    }

    #[tokio::test]
    async fn breaks_ties_by_larger_id() {
        let db = Memory::new();
        let id = order::Id::new();
        let first = db
            .execute(Insert(entry(id, order::Status::Review)))
            .await
            .unwrap();
        let second = db
            .execute(Insert(entry(id, order::Status::Approved)))
            .await
            .unwrap();
        assert!(first.id < second.id);

        let current = db
            .execute(Select(By::<Option<order::status::Entry>, _>::new(id)))
            .await
            .unwrap();
        assert_eq!(current, Some(second));
    }

    #[tokio::test]
    async fn isolates_transaction_until_commit() {
        let db = Memory::new();
        let user = user();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(user.clone())).await.unwrap();
        let outside = db
            .execute(Select(By::<Option<User>, _>::new(user.id)))
            .await
            .unwrap();
        assert_eq!(outside, None);

        tx.execute(Commit).await.unwrap();
        let outside = db
            .execute(Select(By::<Option<User>, _>::new(user.id)))
            .await
            .unwrap();
        assert_eq!(outside, Some(user));
        assert!(tx.execute(Commit).await.is_err());
    }

    #[tokio::test]
    async fn discards_rolled_back_and_dropped_transactions() {
        let db = Memory::new();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(user())).await.unwrap();
        tx.execute(Rollback).await.unwrap();

        {
            let tx = db.execute(Transact).await.unwrap();
            tx.execute(Insert(user())).await.unwrap();
        }

        assert_eq!(db.snapshot().await, super::Store::default());
    }

    #[tokio::test]
    async fn injects_write_faults() {
        let db = Memory::new();
        db.fail_writes_after(1);

        db.execute(Insert(user())).await.unwrap();
        assert!(db.execute(Insert(user())).await.is_err());
    }
}
