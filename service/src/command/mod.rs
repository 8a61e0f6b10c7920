//! [`Command`] definition.

pub mod change_order_status;
pub mod create_order;
pub mod update_order;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    change_order_status::ChangeOrderStatus, create_order::CreateOrder,
    update_order::UpdateOrder,
};
