//! [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{
    By, Commit, Insert, Lock, Rollback, Select, Transact, Update,
};
use tracerr::Traced;

use crate::{
    domain::{equipment, kind, order, user, Equipment, Kind, Order, User},
    infra::{database, Database},
    read,
};

use super::{Access, Memory, NonTx, Tx};

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory(Tx::begin(self.0.clone()).await))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.commit().await.map_err(tracerr::wrap!())
    }
}

impl Database<Rollback> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Rollback) -> Result<Self::Ok, Self::Err> {
        self.rollback().await.map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<User>, user::Id>>> for Memory<A> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.users.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<User>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.users.insert(user.id, user)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Kind>, kind::Id>>> for Memory<A> {
    type Ok = Option<Kind>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Kind>, kind::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.kinds.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Kind>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(kind): Insert<Kind>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.kinds.insert(kind.id, kind)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Equipment>, equipment::Id>>>
    for Memory<A>
{
    type Ok = Option<Equipment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Equipment>, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.equipment.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Equipment>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(equipment): Insert<Equipment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.equipment.insert(equipment.id, equipment)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Order>, order::Id>>> for Memory<A> {
    type Ok = Option<Order>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Order>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.orders.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Vec<Order>, order::Status>>> for Memory<A> {
    type Ok = Vec<Order>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Order>, order::Status>>,
    ) -> Result<Self::Ok, Self::Err> {
        let status = by.into_inner();
        self.read(|s| {
            s.orders
                .values()
                .filter(|o| {
                    s.order_status(o.id).map(|e| e.status) == Some(status)
                })
                .cloned()
                .collect()
        })
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<A: Access>
    Database<Select<By<read::order::list::Page, read::order::list::Selector>>>
    for Memory<A>
{
    type Ok = read::order::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::order::list::Page, read::order::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::order::list::Selector { arguments, filter } =
            by.into_inner();
        self.read(|s| {
            arguments.paginate(
                s.orders
                    .values()
                    .filter(|o| {
                        let status = s.order_status(o.id).map(|e| e.status);
                        filter.matches(o, status)
                    })
                    .map(|o| (o.id, o.clone())),
            )
        })
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Order>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(order): Insert<Order>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.orders.insert(order.id, order)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Update<Order>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(order): Update<Order>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| {
            if let Some(existing) = s.orders.get_mut(&order.id) {
                *existing = order;
            }
        })
        .await
        .map_err(tracerr::wrap!())
    }
}

impl Database<Lock<By<Order, order::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Order, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Snapshot is already isolated from concurrent transactions.
        self.read(|_| ()).await.map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<order::status::NewEntry>> for Memory<A> {
    type Ok = order::status::Entry;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<order::status::NewEntry>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.record_order_status(entry))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<order::status::Log, order::Id>>>
    for Memory<A>
{
    type Ok = order::status::Log;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<order::status::Log, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.order_log(id))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<order::status::Entry>, order::Id>>>
    for Memory<A>
{
    type Ok = Option<order::status::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<order::status::Entry>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.order_status(id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<equipment::status::NewEntry>> for Memory<A> {
    type Ok = equipment::status::Entry;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<equipment::status::NewEntry>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| s.record_equipment_status(entry))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<equipment::status::Log, equipment::Id>>>
    for Memory<A>
{
    type Ok = equipment::status::Log;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<equipment::status::Log, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.equipment_log(id))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access>
    Database<Select<By<Option<equipment::status::Entry>, equipment::Id>>>
    for Memory<A>
{
    type Ok = Option<equipment::status::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<equipment::status::Entry>, equipment::Id>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.equipment_status(id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A, IDs>
    Database<
        Select<By<HashMap<equipment::Id, equipment::status::Entry>, IDs>>,
    > for Memory<A>
where
    A: Access,
    IDs: AsRef<[equipment::Id]>,
{
    type Ok = HashMap<equipment::Id, equipment::status::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<HashMap<equipment::Id, equipment::status::Entry>, IDs>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        self.read(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|&id| {
                    s.equipment_status(id).map(|e| (id, e.clone()))
                })
                .collect()
        })
        .await
        .map_err(tracerr::wrap!())
    }
}
