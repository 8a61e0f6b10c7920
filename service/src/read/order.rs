//! [`Order`] read model definition.
//!
//! [`Order`]: crate::domain::Order

pub mod list {
    //! [`Order`]s list definitions.

    use common::define_pagination;

    #[cfg(doc)]
    use crate::domain::User;
    use crate::domain::{order, user, Order};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = Order;

    /// Cursor pointing to a specific [`Order`] in a list.
    pub type Cursor = order::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// ID of the [`User`] owning the listed [`Order`]s.
        pub owner_id: Option<user::Id>,

        /// Current [`order::Status`] of the listed [`Order`]s.
        pub status: Option<order::Status>,
    }

    impl Filter {
        /// Checks whether the provided [`Order`] having the provided current
        /// [`order::Status`] passes this [`Filter`].
        #[must_use]
        pub fn matches(
            &self,
            order: &Order,
            status: Option<order::Status>,
        ) -> bool {
            self.owner_id.map_or(true, |id| order.owner_id == id)
                && self.status.map_or(true, |s| status == Some(s))
        }
    }
}
