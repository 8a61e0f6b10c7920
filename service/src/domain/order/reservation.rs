//! [`Reservation`] policy.

use std::time::Duration;

use derive_more::{Display, Error};

use crate::domain::kind;
#[cfg(doc)]
use crate::domain::{Kind, Order};

use super::{Quantity, RentEndDateTime, RentStartDateTime};

/// Minimal rental period of any [`Reservation`].
pub const MIN_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Requested reservation of some [`Kind`] of equipment, as it's placed by an
/// [`Order`].
#[derive(Clone, Copy, Debug)]
pub struct Reservation {
    /// [`DateTime`] the rent starts at.
    ///
    /// [`DateTime`]: common::DateTime
    pub rent_start: RentStartDateTime,

    /// [`DateTime`] the rent ends at.
    ///
    /// [`DateTime`]: common::DateTime
    pub rent_end: RentEndDateTime,

    /// Number of units to reserve.
    pub quantity: Quantity,
}

impl Reservation {
    /// Validates this [`Reservation`] against the provided [`kind::Limits`].
    ///
    /// Rules are checked in the following order, reporting the first one
    /// failed:
    /// 1. rent start is strictly before rent end;
    /// 2. rent lasts at least [`MIN_DURATION`];
    /// 3. rent lasts at most [`kind::Limits::max_reservation_time`];
    /// 4. quantity is at most [`kind::Limits::max_reservation_units`].
    ///
    /// # Errors
    ///
    /// With the [`Violation`] of the first failed rule.
    pub fn validate(&self, limits: &kind::Limits) -> Result<(), Violation> {
        let duration = self
            .rent_end
            .duration_since(&self.rent_start)
            .filter(|d| !d.is_zero())
            .ok_or(Violation::InvalidRange)?;

        if duration < MIN_DURATION {
            return Err(Violation::TooShort { duration });
        }
        if duration > limits.max_reservation_time {
            return Err(Violation::TooLong {
                duration,
                max: limits.max_reservation_time,
            });
        }
        if self.quantity.get() > limits.max_reservation_units {
            return Err(Violation::QuantityExceeded {
                requested: self.quantity.get(),
                max: limits.max_reservation_units,
            });
        }

        Ok(())
    }
}

/// Violated rule of a [`Reservation`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum Violation {
    /// Rent start is not strictly before rent end.
    #[display("rent start must be strictly before rent end")]
    InvalidRange,

    /// Rent is shorter than [`MIN_DURATION`].
    #[display(
        "rent of {}s is shorter than the minimal rental period of one day",
        duration.as_secs(),
    )]
    TooShort {
        /// Requested rent duration.
        duration: Duration,
    },

    /// Rent is longer than [`kind::Limits::max_reservation_time`].
    #[display(
        "rent of {}s exceeds the maximum reservation time of {}s",
        duration.as_secs(),
        max.as_secs(),
    )]
    TooLong {
        /// Requested rent duration.
        duration: Duration,

        /// Maximum allowed rent duration.
        max: Duration,
    },

    /// Quantity is larger than [`kind::Limits::max_reservation_units`].
    #[display(
        "quantity of {requested} exceeds the maximum of {max} units"
    )]
    QuantityExceeded {
        /// Requested number of units.
        requested: u32,

        /// Maximum allowed number of units.
        max: u32,
    },
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::DateTime;

    use crate::domain::{kind, order::Quantity};

    use super::{Reservation, Violation, MIN_DURATION};

    const HOUR: u64 = 60 * 60;

    fn limits() -> kind::Limits {
        kind::Limits {
            max_reservation_time: Duration::from_secs(7 * 24 * HOUR),
            max_reservation_units: 3,
        }
    }

    fn reservation(hours: i64, quantity: u32) -> Reservation {
        let start = DateTime::from_rfc3339("2024-05-01T09:00:00Z").unwrap();
        let end = DateTime::from_unix_timestamp(
            start.unix_timestamp() + hours * 3600,
        )
        .unwrap();
        Reservation {
            rent_start: start.coerce(),
            rent_end: end.coerce(),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    #[test]
    fn accepts_within_limits() {
        assert_eq!(reservation(24, 1).validate(&limits()), Ok(()));
        assert_eq!(reservation(72, 3).validate(&limits()), Ok(()));
        assert_eq!(reservation(7 * 24, 2).validate(&limits()), Ok(()));
    }

    #[test]
    fn rejects_invalid_range() {
        assert_eq!(
            reservation(0, 1).validate(&limits()),
            Err(Violation::InvalidRange),
        );
        assert_eq!(
            reservation(-48, 1).validate(&limits()),
            Err(Violation::InvalidRange),
        );
    }

    #[test]
    fn rejects_too_short() {
        assert_eq!(
            reservation(12, 1).validate(&limits()),
            Err(Violation::TooShort {
                duration: Duration::from_secs(12 * HOUR),
            }),
        );
        assert!(reservation(23, 1).validate(&limits()).is_err());
        assert_eq!(MIN_DURATION, Duration::from_secs(24 * HOUR));
    }

    #[test]
    fn rejects_too_long() {
        assert_eq!(
            reservation(7 * 24 + 1, 1).validate(&limits()),
            Err(Violation::TooLong {
                duration: Duration::from_secs((7 * 24 + 1) * HOUR),
                max: Duration::from_secs(7 * 24 * HOUR),
            }),
        );
    }

    #[test]
    fn rejects_too_long_by_a_fraction_of_second() {
        let start = DateTime::from_rfc3339("2024-05-01T09:00:00Z").unwrap();
        let end =
            DateTime::from_rfc3339("2024-05-03T09:00:00.900Z").unwrap();
        let limits = kind::Limits {
            max_reservation_time: Duration::from_secs(48 * HOUR),
            max_reservation_units: 3,
        };
        let reservation = |rent_end: DateTime| Reservation {
            rent_start: start.coerce(),
            rent_end: rent_end.coerce(),
            quantity: Quantity::new(1).unwrap(),
        };

        assert_eq!(
            reservation(end).validate(&limits),
            Err(Violation::TooLong {
                duration: Duration::from_millis(48 * HOUR * 1000 + 900),
                max: limits.max_reservation_time,
            }),
        );
        assert_eq!(
            reservation(start + limits.max_reservation_time)
                .validate(&limits),
            Ok(()),
        );
    }

    #[test]
    fn rejects_exceeded_quantity() {
        assert_eq!(
            reservation(48, 4).validate(&limits()),
            Err(Violation::QuantityExceeded {
                requested: 4,
                max: 3,
            }),
        );
    }

    #[test]
    fn reports_range_before_quantity() {
        assert_eq!(
            reservation(-1, 10).validate(&limits()),
            Err(Violation::InvalidRange),
        );
        assert!(matches!(
            reservation(1, 10).validate(&limits()),
            Err(Violation::TooShort { .. }),
        ));
    }

    #[test]
    fn explains_violations() {
        assert_eq!(
            reservation(12, 1).validate(&limits()).unwrap_err().to_string(),
            "rent of 43200s is shorter than the minimal rental period of one \
             day",
        );
        assert_eq!(
            reservation(48, 5).validate(&limits()).unwrap_err().to_string(),
            "quantity of 5 exceeds the maximum of 3 units",
        );
    }
}
