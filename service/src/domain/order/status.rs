//! [`Order`] [`Status`] definitions.

use common::{define_kind, unit, DateTimeOf};
use derive_more::{Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::{Order, User};
use crate::domain::{history, order, user, History};

pub use crate::domain::history::Comment;

define_kind! {
    #[doc = "Status of an [`Order`] in its lifecycle."]
    enum Status {
        #[doc = "[`Order`] awaits an administrator's decision."]
        Review = 1,

        #[doc = "[`Order`] is approved, and its equipment is booked."]
        Approved = 2,

        #[doc = "Equipment of the [`Order`] is handed over to its owner."]
        InProgress = 3,

        #[doc = "[`Order`] is rejected by an administrator."]
        Rejected = 4,

        #[doc = "Equipment of the [`Order`] is returned."]
        Closed = 5,

        #[doc = "Equipment of the [`Order`] wasn't returned in time."]
        Overdue = 6,
    }
}

impl Status {
    /// Indicates whether an [`Order`] may move from this [`Status`] to the
    /// provided one.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use Status as S;

        matches!(
            (self, next),
            (S::Review, S::Approved | S::Rejected)
                | (S::Approved, S::InProgress | S::Rejected)
                | (S::InProgress, S::Closed | S::Overdue)
                | (S::Overdue, S::Closed)
        )
    }

    /// Indicates whether this [`Status`] finishes the [`Order`] lifecycle.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Rejected | Self::Closed)
    }
}

/// Recorded [`Status`] of an [`Order`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    /// ID of this [`Entry`].
    pub id: Id,

    /// ID of the [`Order`] this [`Entry`] describes.
    pub order_id: order::Id,

    /// [`Status`] of the [`Order`].
    pub status: Status,

    /// [`DateTime`] when this [`Entry`] was recorded.
    ///
    /// [`DateTime`]: common::DateTime
    pub recorded_at: RecordDateTime,

    /// [`Comment`] of this [`Entry`].
    pub comment: Comment,

    /// ID of the [`User`] recorded this [`Entry`].
    ///
    /// [`None`] for the entries recorded by the system itself.
    pub user_id: Option<user::Id>,
}

impl history::Entry for Entry {
    type Id = Id;
    type RecordedAt = RecordDateTime;

    fn id(&self) -> Id {
        self.id
    }

    fn recorded_at(&self) -> RecordDateTime {
        self.recorded_at
    }
}

/// [`Entry`] to be recorded, not having its [`Id`] assigned yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewEntry {
    /// ID of the [`Order`] the [`Entry`] describes.
    pub order_id: order::Id,

    /// [`Status`] of the [`Order`].
    pub status: Status,

    /// [`DateTime`] when the [`Entry`] is recorded.
    ///
    /// [`DateTime`]: common::DateTime
    pub recorded_at: RecordDateTime,

    /// [`Comment`] of the [`Entry`].
    pub comment: Comment,

    /// ID of the [`User`] recording the [`Entry`], if any.
    pub user_id: Option<user::Id>,
}

impl NewEntry {
    /// Turns this [`NewEntry`] into an [`Entry`] recorded with the provided
    /// [`Id`].
    #[must_use]
    pub fn recorded_as(self, id: Id) -> Entry {
        let Self {
            order_id,
            status,
            recorded_at,
            comment,
            user_id,
        } = self;
        Entry {
            id,
            order_id,
            status,
            recorded_at,
            comment,
            user_id,
        }
    }
}

/// ID of an [`Entry`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

/// Append-only [`Status`] history of an [`Order`].
pub type Log = History<Entry>;

/// [`DateTime`] an [`Entry`] was recorded at.
///
/// [`DateTime`]: common::DateTime
pub type RecordDateTime = DateTimeOf<(Entry, unit::Record)>;

#[cfg(test)]
mod spec {
    use super::Status;

    #[test]
    fn allows_workflow_transitions() {
        use Status as S;

        for (from, to) in [
            (S::Review, S::Approved),
            (S::Review, S::Rejected),
            (S::Approved, S::InProgress),
            (S::Approved, S::Rejected),
            (S::InProgress, S::Closed),
            (S::InProgress, S::Overdue),
            (S::Overdue, S::Closed),
        ] {
            assert!(from.can_transition_to(to), "{from} -> {to}");
        }
    }

    #[test]
    fn forbids_other_transitions() {
        use Status as S;

        for (from, to) in [
            (S::Review, S::InProgress),
            (S::Review, S::Overdue),
            (S::Approved, S::Review),
            (S::InProgress, S::Approved),
            (S::Overdue, S::InProgress),
            (S::Rejected, S::Approved),
            (S::Closed, S::Review),
            (S::Closed, S::Closed),
        ] {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }

        for &status in Status::ALL {
            if status.is_final() {
                assert!(Status::ALL
                    .iter()
                    .all(|&next| !status.can_transition_to(next)));
            }
        }
    }

    #[test]
    fn has_stable_representation() {
        assert_eq!(Status::Overdue.u8(), 6);
        assert_eq!(Status::from_u8(3), Some(Status::InProgress));
        assert_eq!(Status::from_u8(0), None);
        assert_eq!(Status::InProgress.to_string(), "IN_PROGRESS");
    }
}
