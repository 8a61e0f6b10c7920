//! Background [`Task`]s definitions.

mod background;
pub mod sweep_overdue_orders;

pub use common::Handler as Task;

pub use self::{
    background::Background, sweep_overdue_orders::SweepOverdueOrders,
};
