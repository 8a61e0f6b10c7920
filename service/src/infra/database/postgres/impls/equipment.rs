//! [`Equipment`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{equipment, Equipment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of an [`equipment::status::Entry`].
const STATUS_COLUMNS: &str = "\
    id, equipment_id, order_id, status, \
    start_date, end_date, recorded_at, comment";

/// Reads an [`equipment::status::Entry`] from the provided [`Row`].
fn status_entry(row: &Row) -> equipment::status::Entry {
    equipment::status::Entry {
        id: row.get("id"),
        equipment_id: row.get("equipment_id"),
        order_id: row.get("order_id"),
        status: row.get("status"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        recorded_at: row.get("recorded_at"),
        comment: row.get("comment"),
    }
}

impl<C> Database<Select<By<Option<Equipment>, equipment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Equipment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Equipment>, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, kind_id \
            FROM equipment \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Equipment {
                id: row.get("id"),
                name: row.get("name"),
                kind_id: row.get("kind_id"),
            }))
    }
}

impl<C> Database<Insert<Equipment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(equipment): Insert<Equipment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Equipment { id, name, kind_id } = equipment;

        const SQL: &str = "\
            INSERT INTO equipment (id, name, kind_id) \
            VALUES ($1::UUID, $2::VARCHAR, $3::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                kind_id = EXCLUDED.kind_id";
        self.exec(SQL, &[&id, &name, &kind_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Insert<equipment::status::NewEntry>> for Postgres<C>
where
    C: Connection,
{
    type Ok = equipment::status::Entry;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<equipment::status::NewEntry>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO equipment_statuses (\
                equipment_id, order_id, status, \
                start_date, end_date, recorded_at, comment\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::INT2, \
                $4::TIMESTAMPTZ, $5::TIMESTAMPTZ, $6::TIMESTAMPTZ, \
                $7::VARCHAR\
            ) \
            RETURNING id";
        let row = self
            .query_one(
                SQL,
                &[
                    &entry.equipment_id,
                    &entry.order_id,
                    &entry.status,
                    &entry.start_date,
                    &entry.end_date,
                    &entry.recorded_at,
                    &entry.comment,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        Ok(entry.recorded_as(row.get("id")))
    }
}

impl<C> Database<Select<By<equipment::status::Log, equipment::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = equipment::status::Log;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<equipment::status::Log, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!(
            "SELECT {STATUS_COLUMNS} \
             FROM equipment_statuses \
             WHERE equipment_id = $1::UUID \
             ORDER BY recorded_at ASC, id ASC",
        );
        Ok(self
            .query(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(status_entry)
            .collect())
    }
}

impl<C> Database<Select<By<Option<equipment::status::Entry>, equipment::Id>>>
    for Postgres<C>
where
    C: Connection,
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

        let sql = format!(
            "SELECT {STATUS_COLUMNS} \
             FROM equipment_statuses \
             WHERE equipment_id = $1::UUID \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(status_entry))
    }
}

impl<C, IDs>
    Database<
        Select<By<HashMap<equipment::Id, equipment::status::Entry>, IDs>>,
    > for Postgres<C>
where
    C: Connection,
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
        // Avoid subtle change for SQL.
        let ids: &[equipment::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT DISTINCT ON (equipment_id) {STATUS_COLUMNS} \
             FROM equipment_statuses \
             WHERE equipment_id = ANY($1::UUID[]) \
             ORDER BY equipment_id, recorded_at DESC, id DESC",
        );
        Ok(self
            .query(&sql, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                let entry = status_entry(row);
                (entry.equipment_id, entry)
            })
            .collect())
    }
}
