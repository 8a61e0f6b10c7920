//! [`Query`] collection related to a single [`Equipment`].

use common::operations::By;

use crate::domain::{equipment, Equipment};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries an [`Equipment`] by its [`equipment::Id`].
pub type ById = DatabaseQuery<By<Option<Equipment>, equipment::Id>>;

/// Queries the whole [`equipment::status::Log`] of an [`Equipment`].
pub type History = DatabaseQuery<By<equipment::status::Log, equipment::Id>>;

/// Queries the current [`equipment::status::Entry`] of an [`Equipment`].
pub type CurrentStatus =
    DatabaseQuery<By<Option<equipment::status::Entry>, equipment::Id>>;
