//! [`Kind`]-related [`Database`] implementations.

use std::time::Duration;

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{kind, Kind},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Kind>, kind::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Kind>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Kind>, kind::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, \
                   max_reservation_time, max_reservation_units \
            FROM kinds \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| {
                // Both limits are positive due to `CHECK` constraints.
                let max_time: i64 = row.get("max_reservation_time");
                let max_units: i64 = row.get("max_reservation_units");
                Kind {
                    id: row.get("id"),
                    name: row.get("name"),
                    limits: kind::Limits {
                        max_reservation_time: Duration::from_secs(
                            max_time.unsigned_abs(),
                        ),
                        max_reservation_units: u32::try_from(max_units)
                            .unwrap_or(u32::MAX),
                    },
                }
            }))
    }
}

impl<C> Database<Insert<Kind>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(kind): Insert<Kind>,
    ) -> Result<Self::Ok, Self::Err> {
        let Kind { id, name, limits } = kind;
        let max_time =
            i64::try_from(limits.max_reservation_time.as_secs())
                .unwrap_or(i64::MAX);
        let max_units = i64::from(limits.max_reservation_units);

        const SQL: &str = "\
            INSERT INTO kinds (\
                id, name, \
                max_reservation_time, max_reservation_units\
            ) \
            VALUES ($1::UUID, $2::VARCHAR, $3::INT8, $4::INT8) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                max_reservation_time = EXCLUDED.max_reservation_time, \
                max_reservation_units = EXCLUDED.max_reservation_units";
        self.exec(SQL, &[&id, &name, &max_time, &max_units])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
