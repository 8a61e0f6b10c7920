//! Domain definitions.

pub mod equipment;
pub mod history;
pub mod kind;
pub mod order;
pub mod user;

pub use self::{
    equipment::Equipment, history::History, kind::Kind, order::Order,
    user::User,
};
