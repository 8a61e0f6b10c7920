//! Fixtures for testing against the [`Memory`] database.

use std::time::Duration;

use common::{operations::Insert, DateTime};

use crate::{
    domain::{equipment, kind, user, Equipment, Kind, User},
    infra::{Database as _, Memory},
    Config, Service,
};

pub(crate) const HOUR: Duration = Duration::from_secs(60 * 60);
pub(crate) const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Creates a new [`Service`] over the provided [`Memory`] database.
pub(crate) fn service(db: &Memory) -> Service<Memory> {
    Service {
        config: Config::default(),
        database: db.clone(),
    }
}

/// Stores a new [`User`] with the provided [`user::Role`].
pub(crate) async fn user(db: &Memory, role: user::Role) -> User {
    let user = User {
        id: user::Id::new(),
        name: user::Name::new("Jane Doe").unwrap(),
        role,
    };
    db.execute(Insert(user.clone())).await.unwrap();
    user
}

/// Stores a new [`Kind`] with the provided limits.
pub(crate) async fn kind(
    db: &Memory,
    max_reservation_time: Duration,
    max_reservation_units: u32,
) -> Kind {
    let kind = Kind {
        id: kind::Id::new(),
        name: kind::Name::new("Drill").unwrap(),
        limits: kind::Limits {
            max_reservation_time,
            max_reservation_units,
        },
    };
    db.execute(Insert(kind.clone())).await.unwrap();
    kind
}

/// Stores a new [`Equipment`] unit of the provided [`Kind`], optionally
/// recording its initial [`equipment::Status`] at the provided [`DateTime`].
pub(crate) async fn equipment(
    db: &Memory,
    kind_id: kind::Id,
    status: Option<(equipment::Status, DateTime)>,
) -> Equipment {
    let unit = Equipment {
        id: equipment::Id::new(),
        name: equipment::Name::new("Drill #1").unwrap(),
        kind_id,
    };
    db.execute(Insert(unit.clone())).await.unwrap();
    if let Some((status, at)) = status {
        _ = db
            .execute(Insert(equipment::status::NewEntry {
                equipment_id: unit.id,
                order_id: None,
                status,
                start_date: at.coerce(),
                end_date: None,
                recorded_at: at.coerce(),
                comment: equipment::status::Comment::default(),
            }))
            .await
            .unwrap();
    }
    unit
}
