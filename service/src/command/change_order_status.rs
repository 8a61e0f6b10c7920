//! [`Command`] for moving an [`Order`] to another [`order::Status`].

use std::collections::HashMap;

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Equipment;
use crate::{
    domain::{
        equipment::{self, cascade},
        order, user, Order, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for moving an [`Order`] to another [`order::Status`] by an
/// administrator.
///
/// Statuses of the reserved [`Equipment`] follow the [`Order`] in the same
/// transaction.
#[derive(Clone, Debug)]
pub struct ChangeOrderStatus {
    /// ID of the [`Order`] to change the [`order::Status`] of.
    pub order_id: order::Id,

    /// ID of the [`User`] changing the [`order::Status`].
    pub initiator_id: user::Id,

    /// New [`order::Status`] of the [`Order`].
    pub status: order::Status,

    /// [`order::status::Comment`] to record along.
    pub comment: order::status::Comment,
}

impl<Db> Command<ChangeOrderStatus> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
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
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = order::status::Entry;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ChangeOrderStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ChangeOrderStatus {
            order_id,
            initiator_id,
            status,
            comment,
        } = cmd;

        let initiator = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(initiator_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(initiator_id))
            .map_err(tracerr::wrap!())?;
        if !initiator.is_admin() {
            return Err(tracerr::new!(E::AccessDenied(initiator.id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent status changes of the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let order = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OrderNotExists(order_id))
            .map_err(tracerr::wrap!())?;

        // `Order` without any recorded status is still under review.
        let current = tx
            .execute(Select(By::<Option<order::status::Entry>, _>::new(
                order_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .map_or(order::Status::Review, |e| e.status);
        if !current.can_transition_to(status) {
            return Err(tracerr::new!(E::TransitionNotAllowed {
                from: current,
                to: status,
            }));
        }

        let now = DateTime::now();
        let effective_at = if status == order::Status::Overdue {
            order.overdue_since()
        } else {
            now
        };

        let statuses = tx
            .execute(Select(By::<HashMap<_, _>, _>::new(
                order.equipment_ids.clone(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let cascaded = cascade::Transition {
            order: &order,
            status,
            effective_at: effective_at.coerce(),
            recorded_at: now.coerce(),
            comment: comment.clone(),
        }
        .cascade(&statuses)
        .map_err(tracerr::from_and_wrap!(=> E))?;

        let entry = tx
            .execute(Insert(order::status::NewEntry {
                order_id,
                status,
                recorded_at: now.coerce(),
                comment,
                user_id: Some(initiator.id),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        for e in cascaded {
            tx.execute(Insert(e))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!(
            "`Order(id: {order_id})` is moved from {current} to {status} by \
             `User(id: {initiator_id})`",
        );

        Ok(entry)
    }
}

/// Error of [`ChangeOrderStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`User`] is not an administrator.
    #[display("`User(id: {_0})` is not allowed to change `Order` statuses")]
    AccessDenied(#[error(not(source))] user::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Order`] with the provided ID does not exist.
    #[display("`Order(id: {_0})` does not exist")]
    OrderNotExists(#[error(not(source))] order::Id),

    /// [`Equipment`] of the [`Order`] is not in the expected status.
    #[display("Cannot cascade `Order` status: {_0}")]
    #[from]
    PreconditionFailed(cascade::PreconditionFailure),

    /// [`Order`] cannot be moved between the provided statuses.
    #[display("`Order` cannot be moved from {from} to {to}")]
    TransitionNotAllowed {
        /// Current [`order::Status`] of the [`Order`].
        from: order::Status,

        /// Requested [`order::Status`] of the [`Order`].
        to: order::Status,
    },

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
