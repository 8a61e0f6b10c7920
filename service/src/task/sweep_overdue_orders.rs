//! [`SweepOverdueOrders`] [`Task`].

use std::{collections::HashMap, convert::Infallible, error::Error, time};

use common::{
    operations::{
        By, Commit, Insert, Lock, Perform, Rollback, Select, Start, Transact,
        Transacted,
    },
    DateTime,
};
use derive_more::Display;
use smart_default::SmartDefault;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Equipment;
use crate::{
    domain::{
        equipment::{self, cascade},
        order, Order,
    },
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`SweepOverdueOrders`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between [`Run`]s.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,

    /// Maximum duration of a single [`Run`].
    ///
    /// [`Run`] exceeding it is cancelled and its changes are discarded.
    #[default(time::Duration::from_secs(5 * 60))]
    pub deadline: time::Duration,
}

/// [`Task`] moving [`Order`]s not returned in time to
/// [`order::Status::Overdue`].
///
/// [`Order`] is overdue once it's [`order::Status::InProgress`] and its
/// [`order::RentEndDateTime`] has passed. Its [`Equipment`] becomes
/// [`equipment::Status::Overdue`] since a day after the rent end.
#[derive(Clone, Copy, Debug)]
pub struct SweepOverdueOrders<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<S> SweepOverdueOrders<S> {
    /// Creates a new [`SweepOverdueOrders`] [`Task`] over the provided
    /// [`Service`].
    #[must_use]
    pub const fn new(config: Config, service: S) -> Self {
        Self { config, service }
    }
}

/// Single run of a [`SweepOverdueOrders`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Run {
    /// [`DateTime`] to detect overdue [`Order`]s at.
    pub now: DateTime,
}

/// Outcome of a [`Run`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Report {
    /// No overdue [`Order`]s were found.
    NoChanges,

    /// All the overdue [`Order`]s were transitioned.
    Committed {
        /// IDs of the transitioned [`Order`]s, in ascending order.
        transitioned: Vec<order::Id>,
    },

    /// Some overdue [`Order`]s cannot be transitioned, so nothing was.
    RolledBack {
        /// [`Failure`]s preventing the transition.
        failures: Vec<Failure>,
    },
}

/// Overdue [`Order`] which cannot be transitioned.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("`Order(id: {order_id})`: {error}")]
pub struct Failure {
    /// ID of the [`Order`].
    pub order_id: order::Id,

    /// [`cascade::PreconditionFailure`] of its [`Equipment`].
    pub error: cascade::PreconditionFailure,
}

impl<Db> Task<Start<By<SweepOverdueOrders<Self>, Config>>> for Service<Db>
where
    SweepOverdueOrders<Service<Db>>: Task<Perform<Run>, Ok = Report, Err: Error>
        + Send
        + Sync
        + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<SweepOverdueOrders<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let task = SweepOverdueOrders::new(by.into_inner(), self.clone());

        let mut interval = interval(task.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let _ = interval.tick().await;

            let run = Run {
                now: DateTime::now(),
            };
            match timeout(task.config.deadline, task.execute(Perform(run)))
                .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    log::error!("`task::SweepOverdueOrders` failed: {e}");
                }
                Err(_) => log::error!(
                    "`task::SweepOverdueOrders` exceeded {:?} deadline",
                    task.config.deadline,
                ),
            }
        }
    }
}

impl<Db> Task<Perform<Run>> for SweepOverdueOrders<Service<Db>>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Vec<Order>, order::Status>>,
            Ok = Vec<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Order, order::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<order::status::Entry>, order::Id>>,
            Ok = Option<order::status::Entry>,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<
                    HashMap<equipment::Id, equipment::status::Entry>,
                    Vec<equipment::Id>,
                >,
            >,
            Ok = HashMap<equipment::Id, equipment::status::Entry>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<order::status::NewEntry>,
            Ok = order::status::Entry,
            Err = Traced<database::Error>,
        > + Database<
            Insert<equipment::status::NewEntry>,
            Ok = equipment::status::Entry,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>
        + Database<Rollback, Err = Traced<database::Error>>,
{
    type Ok = Report;
    type Err = ExecutionError;

    async fn execute(
        &self,
        Perform(Run { now }): Perform<Run>,
    ) -> Result<Self::Ok, Self::Err> {
        // Dropping `tx` on error discards all the changes of this run.
        let tx = self
            .service
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::wrap!())?;

        let candidates = tx
            .execute(Select(By::<Vec<Order>, _>::new(
                order::Status::InProgress,
            )))
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .filter(|o| o.is_expired_at(&now))
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            tx.execute(Rollback)
                .await
                .map_err(tracerr::wrap!())
                .map(drop)?;
            log::debug!("`task::SweepOverdueOrders` found no overdue `Order`s");
            return Ok(Report::NoChanges);
        }

        let mut transitioned = Vec::with_capacity(candidates.len());
        let mut failures = vec![];
        for order in &candidates {
            tx.execute(Lock(By::new(order.id)))
                .await
                .map_err(tracerr::wrap!())
                .map(drop)?;
            // Status might have been changed before the lock was taken.
            let status = tx
                .execute(Select(By::<Option<order::status::Entry>, _>::new(
                    order.id,
                )))
                .await
                .map_err(tracerr::wrap!())?
                .map(|e| e.status);
            if status != Some(order::Status::InProgress) {
                continue;
            }

            let statuses = tx
                .execute(Select(By::<HashMap<_, _>, _>::new(
                    order.equipment_ids.clone(),
                )))
                .await
                .map_err(tracerr::wrap!())?;
            let entries = match (cascade::Transition {
                order,
                status: order::Status::Overdue,
                effective_at: order.overdue_since().coerce(),
                recorded_at: now.coerce(),
                comment: overdue_comment(),
            })
            .cascade(&statuses)
            {
                Ok(entries) => entries,
                Err(error) => {
                    log::warn!(
                        "`task::SweepOverdueOrders` cannot transition \
                         `Order(id: {})`: {error}",
                        order.id,
                    );
                    failures.push(Failure {
                        order_id: order.id,
                        error,
                    });
                    continue;
                }
            };

            _ = tx
                .execute(Insert(order::status::NewEntry {
                    order_id: order.id,
                    status: order::Status::Overdue,
                    recorded_at: now.coerce(),
                    comment: overdue_comment(),
                    user_id: None,
                }))
                .await
                .map_err(tracerr::wrap!())?;
            for entry in entries {
                _ = tx
                    .execute(Insert(entry))
                    .await
                    .map_err(tracerr::wrap!())?;
            }
            transitioned.push(order.id);
        }

        if !failures.is_empty() || transitioned.is_empty() {
            tx.execute(Rollback)
                .await
                .map_err(tracerr::wrap!())
                .map(drop)?;
            if failures.is_empty() {
                log::debug!(
                    "`task::SweepOverdueOrders` has nothing left to transition",
                );
                return Ok(Report::NoChanges);
            }
            log::warn!(
                "`task::SweepOverdueOrders` rolled back because of {} \
                 failure(s)",
                failures.len(),
            );
            return Ok(Report::RolledBack { failures });
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;
        log::info!(
            "`task::SweepOverdueOrders` moved {} `Order`(s) to overdue",
            transitioned.len(),
        );
        Ok(Report::Committed { transitioned })
    }
}

/// Returns the [`order::status::Comment`] of the entries recorded by
/// [`SweepOverdueOrders`].
fn overdue_comment() -> order::status::Comment {
    #[expect(unsafe_code, reason = "length is checked by the test below")]
    unsafe {
        order::status::Comment::new_unchecked("overdue")
    }
}

/// Error of [`SweepOverdueOrders`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Insert, Perform, Select, Start},
        DateTime,
    };
    use tokio::time::{sleep, timeout};

    use crate::{
        domain::{equipment, order, user, Order},
        fixture::{self, DAY, HOUR},
        infra::{Database as _, Memory},
        Service, Task as _,
    };

    use super::{
        overdue_comment, Failure, Report, Run, SweepOverdueOrders,
    };

    fn sweep(db: &Memory) -> SweepOverdueOrders<Service<Memory>> {
        SweepOverdueOrders::new(super::Config::default(), fixture::service(db))
    }

    /// Seeds an [`Order`] of `units` [`Equipment`] being in the provided
    /// statuses, and returns it.
    ///
    /// [`Equipment`]: crate::domain::Equipment
    async fn seed(
        db: &Memory,
        rent_end: DateTime,
        order_status: order::Status,
        equipment_status: equipment::Status,
        units: usize,
    ) -> Order {
        let kind = fixture::kind(db, 30 * DAY, 10).await;
        let owner = fixture::user(db, user::Role::Client).await;

        let mut equipment_ids = vec![];
        for _ in 0..units {
            let unit = fixture::equipment(
                db,
                kind.id,
                Some((equipment_status, rent_end - 3 * DAY)),
            )
            .await;
            equipment_ids.push(unit.id);
        }

        let order = Order {
            id: order::Id::new(),
            description: order::Description::default(),
            quantity: order::Quantity::new(1).unwrap(),
            rent_start: (rent_end - 2 * DAY).coerce(),
            rent_end: rent_end.coerce(),
            created_at: (rent_end - 3 * DAY).coerce(),
            owner_id: owner.id,
            equipment_ids,
        };
        db.execute(Insert(order.clone())).await.unwrap();
        _ = db
            .execute(Insert(order::status::NewEntry {
                order_id: order.id,
                status: order_status,
                recorded_at: (rent_end - 2 * DAY).coerce(),
                comment: order::status::Comment::default(),
                user_id: None,
            }))
            .await
            .unwrap();

        order
    }

    async fn order_status(db: &Memory, id: order::Id) -> order::Status {
        db.execute(Select(By::<Option<order::status::Entry>, _>::new(id)))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn equipment_status(
        db: &Memory,
        id: equipment::Id,
    ) -> equipment::status::Entry {
        db.execute(Select(By::<Option<equipment::status::Entry>, _>::new(
            id,
        )))
        .await
        .unwrap()
        .unwrap()
    }

    #[test]
    fn overdue_comment_fits() {
        assert!(
            overdue_comment().to_string().len()
                <= order::status::Comment::MAX_LEN,
        );
    }

    #[tokio::test]
    async fn transitions_expired_order() {
        let db = Memory::new();
        let now = DateTime::now();
        let order = seed(
            &db,
            now - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;

        let report = sweep(&db).execute(Perform(Run { now })).await.unwrap();

        assert_eq!(
            report,
            Report::Committed {
                transitioned: vec![order.id],
            },
        );
        assert_eq!(
            order_status(&db, order.id).await,
            order::Status::Overdue,
        );
        let entry = equipment_status(&db, order.equipment_ids[0]).await;
        assert_eq!(entry.status, equipment::Status::Overdue);
        assert_eq!(entry.order_id, Some(order.id));
        assert_eq!(
            entry.start_date.unix_timestamp(),
            (order.rent_end + DAY).unix_timestamp(),
        );
        assert_eq!(entry.end_date, None);
    }

    #[tokio::test]
    async fn rolls_back_everything_on_failure() {
        let db = Memory::new();
        let now = DateTime::now();
        let good = seed(
            &db,
            now - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            2,
        )
        .await;
        let bad = seed(
            &db,
            now - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::Available,
            1,
        )
        .await;
        let before = db.snapshot().await;

        let report = sweep(&db).execute(Perform(Run { now })).await.unwrap();

        let Report::RolledBack { failures } = report else {
            panic!("expected rollback, got: {report:?}");
        };
        assert_eq!(failures.len(), 1);
        let Failure { order_id, error } = &failures[0];
        assert_eq!(*order_id, bad.id);
        assert_eq!(error.equipment_id, bad.equipment_ids[0]);
        assert_eq!(error.actual, Some(equipment::Status::Available));

        assert_eq!(
            order_status(&db, good.id).await,
            order::Status::InProgress,
        );
        assert_eq!(
            order_status(&db, bad.id).await,
            order::Status::InProgress,
        );
        for &id in &good.equipment_ids {
            assert_eq!(
                equipment_status(&db, id).await.status,
                equipment::Status::InUse,
            );
        }
        assert_eq!(db.snapshot().await, before);
    }

    #[tokio::test]
    async fn ignores_orders_not_expired_or_not_in_progress() {
        let db = Memory::new();
        let now = DateTime::now();
        let active = seed(
            &db,
            now + HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;
        let approved = seed(
            &db,
            now - 25 * HOUR,
            order::Status::Approved,
            equipment::Status::Booked,
            1,
        )
        .await;

        let task = sweep(&db);
        for _ in 0..2 {
            let report = task.execute(Perform(Run { now })).await.unwrap();
            assert_eq!(report, Report::NoChanges);
        }

        assert_eq!(
            order_status(&db, active.id).await,
            order::Status::InProgress,
        );
        assert_eq!(
            order_status(&db, approved.id).await,
            order::Status::Approved,
        );
    }

    #[tokio::test]
    async fn does_nothing_on_empty_database() {
        let db = Memory::new();
        let report = sweep(&db)
            .execute(Perform(Run {
                now: DateTime::now(),
            }))
            .await
            .unwrap();

        assert_eq!(report, Report::NoChanges);
    }

    #[tokio::test]
    async fn transitions_in_id_order() {
        let db = Memory::new();
        let now = DateTime::now();
        let mut ids = vec![];
        for _ in 0..3 {
            ids.push(
                seed(
                    &db,
                    now - 2 * DAY,
                    order::Status::InProgress,
                    equipment::Status::InUse,
                    1,
                )
                .await
                .id,
            );
        }
        ids.sort();

        let report = sweep(&db).execute(Perform(Run { now })).await.unwrap();

        assert_eq!(report, Report::Committed { transitioned: ids });
    }

    #[tokio::test]
    async fn discards_run_on_storage_failure() {
        let db = Memory::new();
        let now = DateTime::now();
        let first = seed(
            &db,
            now - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;
        _ = seed(
            &db,
            now - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;
        let before = db.snapshot().await;

        // Allows to record the first `Order` only.
        db.fail_writes_after(2);
        let res = sweep(&db).execute(Perform(Run { now })).await;

        assert!(res.is_err(), "expected failure, got: {res:?}");
        assert_eq!(db.snapshot().await, before);
        assert_eq!(
            order_status(&db, first.id).await,
            order::Status::InProgress,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn discards_run_cancelled_midway() {
        let db = Memory::new();
        let now = DateTime::now();
        let order = seed(
            &db,
            now - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;
        let before = db.snapshot().await;

        // The first write is applied to the transaction, but never committed.
        db.delay_writes(Duration::from_secs(10));
        let res = timeout(
            Duration::from_secs(5),
            sweep(&db).execute(Perform(Run { now })),
        )
        .await;

        assert!(res.is_err(), "expected cancellation, got: {res:?}");
        assert_eq!(db.snapshot().await, before);
        assert_eq!(
            order_status(&db, order.id).await,
            order::Status::InProgress,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn discards_run_exceeding_deadline() {
        let db = Memory::new();
        let order = seed(
            &db,
            DateTime::now() - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;
        let before = db.snapshot().await;
        let config = super::Config {
            interval: HOUR,
            deadline: Duration::from_secs(1),
        };

        db.delay_writes(Duration::from_secs(10));
        let svc = fixture::service(&db);
        let res = timeout(HOUR / 2, svc.execute(Start(By::new(config)))).await;

        assert!(res.is_err(), "loop must never stop");
        assert_eq!(db.snapshot().await, before);

        db.delay_writes(Duration::ZERO);
        let report = sweep(&db)
            .execute(Perform(Run {
                now: DateTime::now(),
            }))
            .await
            .unwrap();
        assert_eq!(
            report,
            Report::Committed {
                transitioned: vec![order.id],
            },
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_after_failed_run() {
        let db = Memory::new();
        let order = seed(
            &db,
            DateTime::now() - 25 * HOUR,
            order::Status::InProgress,
            equipment::Status::InUse,
            1,
        )
        .await;
        let config = super::Config {
            interval: HOUR,
            deadline: Duration::from_secs(60),
        };

        db.fail_writes_after(0);
        let svc = fixture::service(&db);
        tokio::select! {
            _ = svc.execute(Start(By::new(config))) => {
                unreachable!("loop must never stop");
            }
            () = async {
                sleep(HOUR / 2).await;
                assert_eq!(
                    order_status(&db, order.id).await,
                    order::Status::InProgress,
                );
                db.fail_writes_after(usize::MAX);
                sleep(HOUR).await;
            } => {}
        }

        assert_eq!(
            order_status(&db, order.id).await,
            order::Status::Overdue,
        );
    }
}
