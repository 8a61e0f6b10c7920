//! [`Equipment`] availability [`Status`] definitions.

use common::{define_kind, unit, DateTimeOf};
use derive_more::{Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::{Equipment, Order};
use crate::domain::{equipment, history, order, History};

pub use crate::domain::history::Comment;

define_kind! {
    #[doc = "Availability status of an [`Equipment`]."]
    enum Status {
        #[doc = "[`Equipment`] can be reserved."]
        Available = 1,

        #[doc = "[`Equipment`] is reserved by an approved [`Order`]."]
        Booked = 2,

        #[doc = "[`Equipment`] is handed over to a renter."]
        InUse = 3,

        #[doc = "[`Equipment`] wasn't returned in time."]
        Overdue = 4,

        #[doc = "[`Equipment`] is withdrawn from rental (broken, lost, etc)."]
        NotAvailable = 5,
    }
}

/// Recorded [`Status`] of an [`Equipment`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    /// ID of this [`Entry`].
    pub id: Id,

    /// ID of the [`Equipment`] this [`Entry`] describes.
    pub equipment_id: equipment::Id,

    /// ID of the [`Order`] caused this [`Entry`], if any.
    pub order_id: Option<order::Id>,

    /// [`Status`] of the [`Equipment`].
    pub status: Status,

    /// [`DateTime`] the [`Status`] takes effect from.
    ///
    /// [`DateTime`]: common::DateTime
    pub start_date: StartDateTime,

    /// [`DateTime`] the [`Status`] is planned to last till, if known.
    ///
    /// [`DateTime`]: common::DateTime
    pub end_date: Option<EndDateTime>,

    /// [`DateTime`] when this [`Entry`] was recorded.
    ///
    /// [`DateTime`]: common::DateTime
    pub recorded_at: RecordDateTime,

    /// [`Comment`] of this [`Entry`].
    pub comment: Comment,
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
    /// ID of the [`Equipment`] the [`Entry`] describes.
    pub equipment_id: equipment::Id,

    /// ID of the [`Order`] caused the [`Entry`], if any.
    pub order_id: Option<order::Id>,

    /// [`Status`] of the [`Equipment`].
    pub status: Status,

    /// [`DateTime`] the [`Status`] takes effect from.
    ///
    /// [`DateTime`]: common::DateTime
    pub start_date: StartDateTime,

    /// [`DateTime`] the [`Status`] is planned to last till, if known.
    ///
    /// [`DateTime`]: common::DateTime
    pub end_date: Option<EndDateTime>,

    /// [`DateTime`] when the [`Entry`] is recorded.
    ///
    /// [`DateTime`]: common::DateTime
    pub recorded_at: RecordDateTime,

    /// [`Comment`] of the [`Entry`].
    pub comment: Comment,
}

impl NewEntry {
    /// Turns this [`NewEntry`] into an [`Entry`] recorded with the provided
    /// [`Id`].
    #[must_use]
    pub fn recorded_as(self, id: Id) -> Entry {
        let Self {
            equipment_id,
            order_id,
            status,
            start_date,
            end_date,
            recorded_at,
            comment,
        } = self;
        Entry {
            id,
            equipment_id,
            order_id,
            status,
            start_date,
            end_date,
            recorded_at,
            comment,
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

/// Append-only [`Status`] history of an [`Equipment`].
pub type Log = History<Entry>;

/// [`DateTime`] an [`Equipment`] [`Status`] takes effect from.
///
/// [`DateTime`]: common::DateTime
pub type StartDateTime = DateTimeOf<(Entry, unit::Start)>;

/// [`DateTime`] an [`Equipment`] [`Status`] is planned to last till.
///
/// [`DateTime`]: common::DateTime
pub type EndDateTime = DateTimeOf<(Entry, unit::End)>;

/// [`DateTime`] an [`Entry`] was recorded at.
///
/// [`DateTime`]: common::DateTime
pub type RecordDateTime = DateTimeOf<(Entry, unit::Record)>;
