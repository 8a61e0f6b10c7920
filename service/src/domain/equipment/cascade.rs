//! Cascading of [`Order`] [`Status`] transitions onto [`Equipment`].
//!
//! [`Status`]: order::Status

use std::collections::HashMap;

use derive_more::{Display, Error};
use itertools::Itertools as _;

#[cfg(doc)]
use crate::domain::Equipment;
use crate::domain::{equipment, order, Order};

use super::status::{self, Comment, Status};

/// Transition of an [`Order`] into a new [`order::Status`].
#[derive(Clone, Debug)]
pub struct Transition<'o> {
    /// [`Order`] being transitioned.
    pub order: &'o Order,

    /// New [`order::Status`] of the [`Order`].
    pub status: order::Status,

    /// [`DateTime`] the [`Equipment`] changes its [`Status`] at.
    ///
    /// Ignored for [`order::Status::Approved`], which books the
    /// [`Equipment`] for the rent period of the [`Order`] itself.
    ///
    /// [`DateTime`]: common::DateTime
    pub effective_at: status::StartDateTime,

    /// [`DateTime`] the cascaded [`status::Entry`]s are recorded at.
    ///
    /// [`DateTime`]: common::DateTime
    pub recorded_at: status::RecordDateTime,

    /// [`Comment`] of the cascaded [`status::Entry`]s.
    pub comment: Comment,
}

impl Transition<'_> {
    /// Computes the [`status::NewEntry`]s to be recorded for the
    /// [`Equipment`] of the [`Order`], given their `current` [`Status`]
    /// entries.
    ///
    /// [`Equipment`] missing from `current` is considered to have no
    /// [`Status`] recorded yet.
    ///
    /// # Errors
    ///
    /// With a [`PreconditionFailure`] on the first [`Equipment`] not being in
    /// a [`Status`] the transition requires. Nothing is recorded in this case.
    pub fn cascade(
        &self,
        current: &HashMap<equipment::Id, status::Entry>,
    ) -> Result<Vec<status::NewEntry>, PreconditionFailure> {
        use order::Status as O;

        let (next, expected): (_, &'static [Status]) = match self.status {
            O::Review => return Ok(vec![]),
            O::Rejected => return Ok(self.release_booked(current)),
            O::Approved => (Status::Booked, &[Status::Available]),
            O::InProgress => (Status::InUse, &[Status::Booked]),
            O::Overdue => (Status::Overdue, &[Status::InUse]),
            O::Closed => {
                (Status::Available, &[Status::InUse, Status::Overdue])
            }
        };

        self.order
            .equipment_ids
            .iter()
            .unique()
            .map(|&equipment_id| {
                let actual = current.get(&equipment_id).map(|e| e.status);
                let satisfied = match actual {
                    Some(s) => expected.contains(&s),
                    // Fresh `Equipment` is implicitly available.
                    None => next == Status::Booked,
                };
                if !satisfied {
                    return Err(PreconditionFailure {
                        equipment_id,
                        expected,
                        actual,
                    });
                }
                Ok(self.entry(equipment_id, next))
            })
            .collect()
    }

    /// Releases the [`Equipment`] still booked by the [`Order`].
    fn release_booked(
        &self,
        current: &HashMap<equipment::Id, status::Entry>,
    ) -> Vec<status::NewEntry> {
        self.order
            .equipment_ids
            .iter()
            .unique()
            .filter(|id| {
                current.get(id).is_some_and(|e| {
                    e.status == Status::Booked
                        && e.order_id == Some(self.order.id)
                })
            })
            .map(|&id| self.entry(id, Status::Available))
            .collect()
    }

    /// Creates a [`status::NewEntry`] of the provided [`Equipment`].
    fn entry(
        &self,
        equipment_id: equipment::Id,
        status: Status,
    ) -> status::NewEntry {
        let (start_date, end_date) = match status {
            Status::Booked => (
                self.order.rent_start.coerce(),
                Some(self.order.rent_end.coerce()),
            ),
            Status::InUse => {
                (self.effective_at, Some(self.order.rent_end.coerce()))
            }
            Status::Available | Status::Overdue | Status::NotAvailable => {
                (self.effective_at, None)
            }
        };
        status::NewEntry {
            equipment_id,
            order_id: Some(self.order.id),
            status,
            start_date,
            end_date,
            recorded_at: self.recorded_at,
            comment: self.comment.clone(),
        }
    }
}

/// [`Equipment`] is not in a [`Status`] required by a [`Transition`].
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display(
    "`Equipment(id: {equipment_id})` is expected to be in {} status, but \
     is {}",
    expected.iter().join(" or "),
    actual.map_or_else(|| "NONE".to_owned(), |s| s.to_string()),
)]
pub struct PreconditionFailure {
    /// ID of the [`Equipment`].
    pub equipment_id: equipment::Id,

    /// [`Status`]es the [`Equipment`] is expected to be in.
    pub expected: &'static [Status],

    /// Actual [`Status`] of the [`Equipment`], if any.
    pub actual: Option<Status>,
}

#[cfg(test)]
mod spec {
    use std::{collections::HashMap, time::Duration};

    use common::DateTime;

    use crate::domain::{
        equipment::{
            self,
            status::{self, Comment, Status},
        },
        order, user, Order,
    };

    use super::{PreconditionFailure, Transition};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn order(units: usize) -> Order {
        let rent_start = DateTime::from_rfc3339("2024-05-01T09:00:00Z")
            .unwrap()
            .coerce();
        Order {
            id: order::Id::new(),
            description: order::Description::default(),
            quantity: order::Quantity::new(1).unwrap(),
            rent_start,
            rent_end: (rent_start + 3 * DAY).coerce(),
            created_at: rent_start.coerce(),
            owner_id: user::Id::new(),
            equipment_ids: (0..units).map(|_| equipment::Id::new()).collect(),
        }
    }

    fn current(
        order: &Order,
        statuses: &[(Status, Option<order::Id>)],
    ) -> HashMap<equipment::Id, status::Entry> {
        order
            .equipment_ids
            .iter()
            .zip(statuses)
            .enumerate()
            .map(|(n, (&equipment_id, &(status, order_id)))| {
                let entry = status::NewEntry {
                    equipment_id,
                    order_id,
                    status,
                    start_date: order.created_at.coerce(),
                    end_date: None,
                    recorded_at: order.created_at.coerce(),
                    comment: Comment::default(),
                }
                .recorded_as(status::Id::from(i64::try_from(n).unwrap()));
                (equipment_id, entry)
            })
            .collect()
    }

    fn transition(order: &Order, status: order::Status) -> Transition<'_> {
        Transition {
            order,
            status,
            effective_at: (order.rent_end + DAY).coerce(),
            recorded_at: DateTime::now().coerce(),
            comment: Comment::new("cascaded").unwrap(),
        }
    }

    #[test]
    fn marks_used_equipment_overdue() {
        let order = order(2);
        let current = current(
            &order,
            &[(Status::InUse, Some(order.id)), (Status::InUse, None)],
        );

        let entries = transition(&order, order::Status::Overdue)
            .cascade(&current)
            .unwrap();

        assert_eq!(entries.len(), 2);
        for (entry, id) in entries.iter().zip(&order.equipment_ids) {
            assert_eq!(entry.equipment_id, *id);
            assert_eq!(entry.status, Status::Overdue);
            assert_eq!(entry.order_id, Some(order.id));
            assert_eq!(
                entry.start_date.unix_timestamp(),
                order.rent_end.unix_timestamp() + 86_400,
            );
            assert_eq!(entry.end_date, None);
            assert_eq!(AsRef::<str>::as_ref(&entry.comment), "cascaded");
        }
    }

    #[test]
    fn fails_overdue_on_unused_equipment() {
        let order = order(2);
        let current = current(
            &order,
            &[(Status::InUse, None), (Status::Available, None)],
        );

        assert_eq!(
            transition(&order, order::Status::Overdue).cascade(&current),
            Err(PreconditionFailure {
                equipment_id: order.equipment_ids[1],
                expected: &[Status::InUse],
                actual: Some(Status::Available),
            }),
        );
    }

    #[test]
    fn fails_on_missing_status() {
        let order = order(1);

        let err = transition(&order, order::Status::InProgress)
            .cascade(&HashMap::new())
            .unwrap_err();

        assert_eq!(err.actual, None);
        assert_eq!(
            err.to_string(),
            format!(
                "`Equipment(id: {})` is expected to be in BOOKED status, but \
                 is NONE",
                order.equipment_ids[0],
            ),
        );
    }

    #[test]
    fn books_equipment_for_rent_period() {
        let order = order(2);
        let current = current(&order, &[(Status::Available, None)]);

        let entries = transition(&order, order::Status::Approved)
            .cascade(&current)
            .unwrap();

        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.status, Status::Booked);
            assert_eq!(entry.start_date, order.rent_start.coerce());
            assert_eq!(entry.end_date, Some(order.rent_end.coerce()));
        }
    }

    #[test]
    fn refuses_booking_unavailable_equipment() {
        let order = order(1);
        let current = current(&order, &[(Status::NotAvailable, None)]);

        assert!(transition(&order, order::Status::Approved)
            .cascade(&current)
            .is_err());
    }

    #[test]
    fn hands_over_and_returns_equipment() {
        let order = order(1);

        let booked = current(&order, &[(Status::Booked, Some(order.id))]);
        let entries = transition(&order, order::Status::InProgress)
            .cascade(&booked)
            .unwrap();
        assert_eq!(entries[0].status, Status::InUse);

        for status in [Status::InUse, Status::Overdue] {
            let used = current(&order, &[(status, Some(order.id))]);
            let entries = transition(&order, order::Status::Closed)
                .cascade(&used)
                .unwrap();
            assert_eq!(entries[0].status, Status::Available);
            assert_eq!(entries[0].end_date, None);
        }
    }

    #[test]
    fn releases_only_own_bookings_on_rejection() {
        let order = order(3);
        let other = order::Id::new();
        let current = current(
            &order,
            &[
                (Status::Booked, Some(order.id)),
                (Status::Booked, Some(other)),
                (Status::Available, None),
            ],
        );

        let entries = transition(&order, order::Status::Rejected)
            .cascade(&current)
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].equipment_id, order.equipment_ids[0]);
        assert_eq!(entries[0].status, Status::Available);
    }

    #[test]
    fn records_nothing_on_review() {
        let order = order(1);

        assert_eq!(
            transition(&order, order::Status::Review).cascade(&HashMap::new()),
            Ok(vec![]),
        );
    }
}
