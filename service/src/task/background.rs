//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Boxed error a [`Task`] running in the [`Background`] failed with.
pub type TaskError = Box<dyn Error + 'static>;

/// Background environment for running [`Task`]s.
///
/// [`Task`]s are run on the current thread, so resolving the [`Background`]
/// drives all of them until the first one fails.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are spawned into.
    set: task::LocalSet,

    /// Names and handles of the spawned [`Task`]s.
    tasks: Vec<(&'static str, task::JoinHandle<Result<(), TaskError>>)>,
}

impl Background {
    /// Spawns a new [`Task`] with the provided `name` inside the
    /// [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        log::debug!("spawning `{name}` background task");
        let handle = self
            .set
            .spawn_local(task.map_err(TaskError::from));
        self.tasks.push((name, handle));
    }

    /// Returns the number of [`Task`]s spawned into this [`Background`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Indicates whether no [`Task`]s are spawned into this [`Background`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl IntoFuture for Background {
    type Output = Result<(), TaskError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;
        let tasks = tasks.into_iter().map(|(name, handle)| {
            handle
                .map(move |res| {
                    res.map_err(TaskError::from)
                        .and_then(|r| r)
                        .inspect_err(|e| {
                            log::error!("`{name}` background task failed: {e}");
                        })
                })
                .boxed_local()
        });
        future::try_join_all(
            std::iter::once(set.map(Ok).boxed_local()).chain(tasks),
        )
        .map_ok(drop)
        .boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use derive_more::{Display, Error};

    use super::Background;

    #[derive(Debug, Display, Error)]
    #[display("failed")]
    struct Failed;

    #[tokio::test]
    async fn completes_once_all_tasks_complete() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, Failed>(()) });
        bg.spawn("second", async { Ok::<_, Failed>(()) });

        assert_eq!(bg.len(), 2);
        bg.await.unwrap();
    }

    #[tokio::test]
    async fn fails_with_the_first_failed_task() {
        let mut bg = Background::default();
        bg.spawn("healthy", async { Ok::<_, Failed>(()) });
        bg.spawn("broken", async { Err(Failed) });

        let err = bg.await.unwrap_err();

        assert_eq!(err.to_string(), "failed");
    }
}
