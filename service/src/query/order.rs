//! [`Query`] collection related to a single [`Order`].

use common::operations::By;

use crate::domain::{order, Order};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries an [`Order`] by its [`order::Id`].
pub type ById = DatabaseQuery<By<Option<Order>, order::Id>>;

/// Queries the whole [`order::status::Log`] of an [`Order`].
pub type History = DatabaseQuery<By<order::status::Log, order::Id>>;

/// Queries the current [`order::status::Entry`] of an [`Order`].
pub type CurrentStatus =
    DatabaseQuery<By<Option<order::status::Entry>, order::Id>>;
