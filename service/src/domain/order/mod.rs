//! [`Order`] definitions.

pub mod reservation;
pub mod status;

use common::{unit, DateTime, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Equipment, User};
use crate::domain::{equipment, user};

pub use self::{reservation::Reservation, status::Status};

/// Reservation of [`Equipment`] placed by a [`User`] for some period.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Order {
    /// ID of this [`Order`].
    pub id: Id,

    /// [`Description`] of this [`Order`].
    pub description: Description,

    /// Number of reserved units.
    pub quantity: Quantity,

    /// [`DateTime`] the rent starts at.
    pub rent_start: RentStartDateTime,

    /// [`DateTime`] the rent ends at.
    pub rent_end: RentEndDateTime,

    /// [`DateTime`] when this [`Order`] was created.
    pub created_at: CreationDateTime,

    /// ID of the [`User`] owning this [`Order`].
    ///
    /// Captured on creation and never reassigned.
    pub owner_id: user::Id,

    /// IDs of the [`Equipment`] reserved by this [`Order`].
    pub equipment_ids: Vec<equipment::Id>,
}

impl Order {
    /// Returns the [`Reservation`] requested by this [`Order`].
    #[must_use]
    pub fn reservation(&self) -> Reservation {
        Reservation {
            rent_start: self.rent_start,
            rent_end: self.rent_end,
            quantity: self.quantity,
        }
    }

    /// Returns the [`DateTime`] the reserved [`Equipment`] of this [`Order`]
    /// is considered overdue since, being one [`reservation::MIN_DURATION`]
    /// after the rent end.
    #[must_use]
    pub fn overdue_since(&self) -> DateTime {
        (self.rent_end + reservation::MIN_DURATION).coerce()
    }

    /// Indicates whether the rent period of this [`Order`] is over at the
    /// provided moment.
    #[must_use]
    pub fn is_expired_at<Of: ?Sized>(&self, now: &DateTimeOf<Of>) -> bool {
        self.rent_end.is_before(now)
    }
}

/// ID of an [`Order`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Description of an [`Order`].
#[derive(AsRef, Clone, Debug, Default, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Description(String);

impl Description {
    /// Creates a new [`Description`] if the given `description` is valid.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Option<Self> {
        let description = description.into();
        Self::check(&description).then_some(Self(description))
    }

    /// Checks whether the given `description` is a valid [`Description`].
    fn check(description: impl AsRef<str>) -> bool {
        let description = description.as_ref();
        description.trim() == description && description.len() <= 4096
    }
}

impl FromStr for Description {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Description`")
    }
}

/// Number of reserved units in an [`Order`], always positive.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Quantity(u32);

impl Quantity {
    /// Creates a new [`Quantity`] if the given `quantity` is positive.
    #[must_use]
    pub fn new(quantity: u32) -> Option<Self> {
        (quantity > 0).then_some(Self(quantity))
    }

    /// Returns the number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for Quantity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().ok().and_then(Self::new).ok_or("invalid `Quantity`")
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Quantity {
    accepts!(INT4);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let raw = u32::try_from(i32::from_sql(ty, raw)?)?;
        Self::new(raw).ok_or_else(|| "zero `Quantity`".into())
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Quantity {
    accepts!(INT4);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        i32::try_from(self.0)?.to_sql(ty, w)
    }
}

/// [`DateTime`] when an [`Order`] was created.
pub type CreationDateTime = DateTimeOf<(Order, unit::Creation)>;

/// [`DateTime`] the rent of an [`Order`] starts at.
pub type RentStartDateTime = DateTimeOf<(Order, unit::Start)>;

/// [`DateTime`] the rent of an [`Order`] ends at.
pub type RentEndDateTime = DateTimeOf<(Order, unit::End)>;
