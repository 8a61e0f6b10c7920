//! [`Store`] of the in-memory database.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{equipment, kind, order, user, Equipment, Kind, Order, User};

/// State of the in-memory database.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Store {
    /// Stored [`User`]s.
    pub(super) users: HashMap<user::Id, User>,

    /// Stored [`Kind`]s.
    pub(super) kinds: HashMap<kind::Id, Kind>,

    /// Stored [`Equipment`].
    pub(super) equipment: HashMap<equipment::Id, Equipment>,

    /// Stored [`Order`]s.
    pub(super) orders: BTreeMap<order::Id, Order>,

    /// Recorded [`order::status::Entry`]s in their recording order.
    pub(super) order_statuses: Vec<order::status::Entry>,

    /// Recorded [`equipment::status::Entry`]s in their recording order.
    pub(super) equipment_statuses: Vec<equipment::status::Entry>,

    /// Last assigned [`order::status::Id`].
    last_order_status_id: i64,

    /// Last assigned [`equipment::status::Id`].
    last_equipment_status_id: i64,
}

impl Store {
    /// Returns an [`Iterator`] over the stored [`Order`]s, ascending by their
    /// IDs.
    pub fn orders(&self) -> impl ExactSizeIterator<Item = &Order> {
        self.orders.values()
    }

    /// Records the provided [`order::status::NewEntry`], assigning it the
    /// next [`order::status::Id`].
    pub(super) fn record_order_status(
        &mut self,
        entry: order::status::NewEntry,
    ) -> order::status::Entry {
        self.last_order_status_id += 1;
        let entry = entry.recorded_as(self.last_order_status_id.into());
        self.order_statuses.push(entry.clone());
        entry
    }

    /// Records the provided [`equipment::status::NewEntry`], assigning it the
    /// next [`equipment::status::Id`].
    pub(super) fn record_equipment_status(
        &mut self,
        entry: equipment::status::NewEntry,
    ) -> equipment::status::Entry {
        self.last_equipment_status_id += 1;
        let entry = entry.recorded_as(self.last_equipment_status_id.into());
        self.equipment_statuses.push(entry.clone());
        entry
    }

    /// Returns the [`order::status::Log`] of the provided [`Order`].
    pub(super) fn order_log(&self, id: order::Id) -> order::status::Log {
        self.order_statuses
            .iter()
            .filter(|e| e.order_id == id)
            .cloned()
            .collect()
    }

    /// Returns the current [`order::status::Entry`] of the provided
    /// [`Order`], if any.
    pub(super) fn order_status(
        &self,
        id: order::Id,
    ) -> Option<&order::status::Entry> {
        self.order_statuses
            .iter()
            .filter(|e| e.order_id == id)
            .max_by_key(|e| (e.recorded_at, e.id))
    }

    /// Returns the [`equipment::status::Log`] of the provided [`Equipment`].
    pub(super) fn equipment_log(
        &self,
        id: equipment::Id,
    ) -> equipment::status::Log {
        self.equipment_statuses
            .iter()
            .filter(|e| e.equipment_id == id)
            .cloned()
            .collect()
    }

    /// Returns the current [`equipment::status::Entry`] of the provided
    /// [`Equipment`], if any.
    pub(super) fn equipment_status(
        &self,
        id: equipment::Id,
    ) -> Option<&equipment::status::Entry> {
        self.equipment_statuses
            .iter()
            .filter(|e| e.equipment_id == id)
            .max_by_key(|e| (e.recorded_at, e.id))
    }
}
