pub mod conversation;
pub mod hours;
pub mod user;
