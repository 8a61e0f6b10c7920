//! [`Command`] for updating an existing [`Order`].

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        equipment, kind,
        order::{self, reservation},
        user, Equipment, Kind, Order, User,
    },
    infra::{database, Database},
    Service,
};

use super::{create_order::KindResolutionError, Command};

/// [`Command`] for updating an existing [`Order`].
///
/// The [`Order`] is re-validated against the [`Kind`]s of its reserved
/// [`Equipment`] with the new values. Its rent period can be changed only
/// while it's under [`order::Status::Review`].
#[derive(Clone, Debug)]
pub struct UpdateOrder {
    /// ID of the [`Order`] to be updated.
    pub order_id: order::Id,

    /// ID of the [`User`] updating the [`Order`].
    ///
    /// Must be either the owner of the [`Order`] or an administrator.
    pub initiator_id: user::Id,

    /// New [`order::Description`] of the [`Order`].
    pub description: order::Description,

    /// New number of units to be reserved.
    pub quantity: order::Quantity,

    /// New [`DateTime`] the rent starts at.
    ///
    /// [`DateTime`]: common::DateTime
    pub rent_start: order::RentStartDateTime,

    /// New [`DateTime`] the rent ends at.
    ///
    /// [`DateTime`]: common::DateTime
    pub rent_end: order::RentEndDateTime,
}

impl<Db> Command<UpdateOrder> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Equipment>, equipment::Id>>,
            Ok = Option<Equipment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Kind>, kind::Id>>,
            Ok = Option<Kind>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<order::status::Entry>, order::Id>>,
            Ok = Option<order::status::Entry>,
            Err = Traced<database::Error>,
        > + Database<Update<Order>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Order;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UpdateOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateOrder {
            order_id,
            initiator_id,
            description,
            quantity,
            rent_start,
            rent_end,
        } = cmd;

        let initiator = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(initiator_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(initiator_id))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent modifications of the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut order = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OrderNotExists(order_id))
            .map_err(tracerr::wrap!())?;

        if order.owner_id != initiator.id && !initiator.is_admin() {
            return Err(tracerr::new!(E::AccessDenied(initiator.id)));
        }

        let status = tx
            .execute(Select(By::<Option<order::status::Entry>, _>::new(
                order_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .map(|e| e.status);
        if let Some(status) = status.filter(|s| s.is_final()) {
            return Err(tracerr::new!(E::OrderFinished(order_id, status)));
        }

        // Booked equipment keeps the rent period it was approved with.
        if let Some(status) = status.filter(|s| *s != order::Status::Review) {
            if rent_start != order.rent_start || rent_end != order.rent_end {
                return Err(tracerr::new!(E::RentPeriodLocked(
                    order_id, status,
                )));
            }
        }

        let reservation = order::Reservation {
            rent_start,
            rent_end,
            quantity,
        };
        for limits in self.kind_limits::<E>(&order.equipment_ids).await? {
            reservation
                .validate(&limits)
                .map_err(tracerr::from_and_wrap!(=> E))?;
        }

        order.description = description;
        order.quantity = quantity;
        order.rent_start = rent_start;
        order.rent_end = rent_end;

        tx.execute(Update(order.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(order)
    }
}

/// Error of [`UpdateOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`User`] is neither the owner of the [`Order`] nor an administrator.
    #[display("`User(id: {_0})` is not allowed to update the `Order`")]
    AccessDenied(#[error(not(source))] user::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Equipment`] or its [`Kind`] cannot be resolved.
    #[display("{_0}")]
    #[from]
    Kind(KindResolutionError),

    /// Requested [`order::Reservation`] is invalid.
    #[display("Invalid reservation: {_0}")]
    #[from]
    Invalid(reservation::Violation),

    /// [`Order`] has already finished its lifecycle.
    #[display("`Order(id: {_0})` is already {_1}")]
    OrderFinished(
        #[error(not(source))] order::Id,
        #[error(not(source))] order::Status,
    ),

    /// [`Order`] with the provided ID does not exist.
    #[display("`Order(id: {_0})` does not exist")]
    OrderNotExists(#[error(not(source))] order::Id),

    /// Rent period of the [`Order`] cannot be changed after its review.
    #[display("`Order(id: {_0})` is {_1}, so its rent period cannot change")]
    RentPeriodLocked(
        #[error(not(source))] order::Id,
        #[error(not(source))] order::Status,
    ),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select},
        DateTime,
    };

    use crate::{
        domain::{order, user, Order, User},
        fixture::{self, DAY, HOUR},
        infra::{Database as _, Memory},
        Command as _,
    };

    use super::{super::CreateOrder, ExecutionError, UpdateOrder};

    async fn place(db: &Memory, owner: &User) -> Order {
        let kind = fixture::kind(db, 7 * DAY, 5).await;
        let unit = fixture::equipment(db, kind.id, None).await;
        let rent_start = DateTime::now() + DAY;
        fixture::service(db)
            .execute(CreateOrder {
                owner_id: owner.id,
                equipment_ids: vec![unit.id],
                description: order::Description::default(),
                quantity: order::Quantity::new(1).unwrap(),
                rent_start: rent_start.coerce(),
                rent_end: (rent_start + 2 * DAY).coerce(),
            })
            .await
            .unwrap()
    }

    fn update(order: &Order, initiator_id: user::Id) -> UpdateOrder {
        UpdateOrder {
            order_id: order.id,
            initiator_id,
            description: order::Description::new("Longer rent").unwrap(),
            quantity: order::Quantity::new(2).unwrap(),
            rent_start: order.rent_start,
            rent_end: (order.rent_end + 2 * DAY).coerce(),
        }
    }

    #[tokio::test]
    async fn updates_by_owner_and_admin() {
        let db = Memory::new();
        let owner = fixture::user(&db, user::Role::Client).await;
        let admin = fixture::user(&db, user::Role::Admin).await;
        let order = place(&db, &owner).await;

        for initiator in [&owner, &admin] {
            let updated = fixture::service(&db)
                .execute(update(&order, initiator.id))
                .await
                .unwrap();
            assert_eq!(updated.quantity.get(), 2);
            assert_eq!(updated.created_at, order.created_at);

            let stored = db
                .execute(Select(By::<Option<Order>, _>::new(order.id)))
                .await
                .unwrap();
            assert_eq!(stored, Some(updated));
        }
    }

    #[tokio::test]
    async fn denies_foreign_client() {
        let db = Memory::new();
        let owner = fixture::user(&db, user::Role::Client).await;
        let stranger = fixture::user(&db, user::Role::Client).await;
        let order = place(&db, &owner).await;

        let err = fixture::service(&db)
            .execute(update(&order, stranger.id))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::AccessDenied(id) if *id == stranger.id,
            ),
            "unexpected error: {err}",
        );
        let stored = db
            .execute(Select(By::<Option<Order>, _>::new(order.id)))
            .await
            .unwrap();
        assert_eq!(stored, Some(order));
    }

    #[tokio::test]
    async fn revalidates_reservation() {
        let db = Memory::new();
        let owner = fixture::user(&db, user::Role::Client).await;
        let order = place(&db, &owner).await;

        let mut cmd = update(&order, owner.id);
        cmd.rent_end = (order.rent_start + 20 * HOUR).coerce();
        let err = fixture::service(&db).execute(cmd).await.unwrap_err();

        assert!(
            matches!(err.as_ref(), ExecutionError::Invalid(_)),
            "unexpected error: {err}",
        );
    }

    #[tokio::test]
    async fn refuses_finished_order() {
        let db = Memory::new();
        let owner = fixture::user(&db, user::Role::Client).await;
        let order = place(&db, &owner).await;
        _ = db
            .execute(Insert(order::status::NewEntry {
                order_id: order.id,
                status: order::Status::Rejected,
                recorded_at: DateTime::now().coerce(),
                comment: order::status::Comment::default(),
                user_id: None,
            }))
            .await
            .unwrap();

        let err = fixture::service(&db)
            .execute(update(&order, owner.id))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::OrderFinished(_, order::Status::Rejected),
            ),
            "unexpected error: {err}",
        );
    }

    #[tokio::test]
    async fn fails_on_missing_order() {
        let db = Memory::new();
        let owner = fixture::user(&db, user::Role::Client).await;
        let missing = Order {
            id: order::Id::new(),
            ..place(&db, &owner).await
        };

        let err = fixture::service(&db)
            .execute(update(&missing, owner.id))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::OrderNotExists(id) if *id == missing.id,
            ),
            "unexpected error: {err}",
        );
    }

    #[tokio::test]
    async fn keeps_rent_period_of_approved_order() {
        let db = Memory::new();
        let owner = fixture::user(&db, user::Role::Client).await;
        let order = place(&db, &owner).await;
        _ = db
            .execute(Insert(order::status::NewEntry {
                order_id: order.id,
                status: order::Status::Approved,
                recorded_at: DateTime::now().coerce(),
                comment: order::status::Comment::default(),
                user_id: None,
            }))
            .await
            .unwrap();

        let err = fixture::service(&db)
            .execute(update(&order, owner.id))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::RentPeriodLocked(id, order::Status::Approved)
                    if *id == order.id,
            ),
            "unexpected error: {err}",
        );
        let stored = db
            .execute(Select(By::<Option<Order>, _>::new(order.id)))
            .await
            .unwrap();
        assert_eq!(stored, Some(order.clone()));

        let updated = fixture::service(&db)
            .execute(UpdateOrder {
                rent_end: order.rent_end,
                ..update(&order, owner.id)
            })
            .await
            .unwrap();
        assert_eq!(updated.quantity.get(), 2);
        assert_eq!(updated.rent_end, order.rent_end);
    }
}
