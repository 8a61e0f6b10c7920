//! [`Command`] for creating a new [`Order`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        equipment, kind,
        order::{self, reservation},
        user, Equipment, Kind, Order, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Order`].
#[derive(Clone, Debug)]
pub struct CreateOrder {
    /// ID of the [`User`] placing the new [`Order`].
    pub owner_id: user::Id,

    /// IDs of the [`Equipment`] to be reserved.
    pub equipment_ids: Vec<equipment::Id>,

    /// [`order::Description`] of the new [`Order`].
    pub description: order::Description,

    /// Number of units to be reserved.
    pub quantity: order::Quantity,

    /// [`DateTime`] the rent starts at.
    pub rent_start: order::RentStartDateTime,

    /// [`DateTime`] the rent ends at.
    pub rent_end: order::RentEndDateTime,
}

impl<Db> Command<CreateOrder> for Service<Db>
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
    Transacted<Db>: Database<Insert<Order>, Err = Traced<database::Error>>
        + Database<
            Insert<order::status::NewEntry>,
            Ok = order::status::Entry,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Order;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateOrder {
            owner_id,
            equipment_ids,
            description,
            quantity,
            rent_start,
            rent_end,
        } = cmd;

        let owner = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(owner_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(owner_id))
            .map_err(tracerr::wrap!())?;

        if equipment_ids.is_empty() {
            return Err(tracerr::new!(E::NoEquipment));
        }

        let reservation = order::Reservation {
            rent_start,
            rent_end,
            quantity,
        };
        for limits in self.kind_limits::<E>(&equipment_ids).await? {
            reservation
                .validate(&limits)
                .map_err(tracerr::from_and_wrap!(=> E))?;
        }

        let created_at = DateTime::now();
        let order = Order {
            id: order::Id::new(),
            description,
            quantity,
            rent_start,
            rent_end,
            created_at: created_at.coerce(),
            owner_id: owner.id,
            equipment_ids,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Insert(order.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(order::status::NewEntry {
            order_id: order.id,
            status: order::Status::Review,
            recorded_at: created_at.coerce(),
            comment: order::status::Comment::default(),
            user_id: Some(owner.id),
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!(
            "`Order(id: {})` is placed by `User(id: {owner_id})`",
            order.id,
        );

        Ok(order)
    }
}

impl<Db> Service<Db> {
    /// Resolves the [`kind::Limits`] of every distinct [`Kind`] the provided
    /// [`Equipment`] belongs to.
    ///
    /// # Errors
    ///
    /// If some [`Equipment`] or its [`Kind`] doesn't exist.
    pub(crate) async fn kind_limits<E>(
        &self,
        equipment_ids: &[equipment::Id],
    ) -> Result<Vec<kind::Limits>, Traced<E>>
    where
        Db: Database<
                Select<By<Option<Equipment>, equipment::Id>>,
                Ok = Option<Equipment>,
                Err = Traced<database::Error>,
            > + Database<
                Select<By<Option<Kind>, kind::Id>>,
                Ok = Option<Kind>,
                Err = Traced<database::Error>,
            >,
        E: From<database::Error> + From<KindResolutionError>,
    {
        let mut kind_ids = Vec::<kind::Id>::with_capacity(1);
        for &id in equipment_ids {
            let equipment = self
                .database()
                .execute(Select(By::<Option<Equipment>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(KindResolutionError::EquipmentNotExists(id))
                .map_err(tracerr::from_and_wrap!(=> E))?;
            if !kind_ids.contains(&equipment.kind_id) {
                kind_ids.push(equipment.kind_id);
            }
        }

        let mut limits = Vec::with_capacity(kind_ids.len());
        for id in kind_ids {
            let kind = self
                .database()
                .execute(Select(By::<Option<Kind>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(KindResolutionError::KindNotExists(id))
                .map_err(tracerr::from_and_wrap!(=> E))?;
            limits.push(kind.limits);
        }
        Ok(limits)
    }
}

/// Error of resolving the [`Kind`]s of some [`Equipment`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum KindResolutionError {
    /// [`Equipment`] with the provided ID does not exist.
    #[display("`Equipment(id: {_0})` does not exist")]
    EquipmentNotExists(#[error(not(source))] equipment::Id),

    /// [`Kind`] with the provided ID does not exist.
    #[display("`Kind(id: {_0})` does not exist")]
    KindNotExists(#[error(not(source))] kind::Id),
}

/// Error of [`CreateOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
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

    /// No [`Equipment`] is requested to be reserved.
    #[display("No `Equipment` is requested")]
    NoEquipment,

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
