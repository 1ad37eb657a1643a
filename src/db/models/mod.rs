pub mod notification;
pub mod outbox;
pub mod requests;
pub mod routing_rule;
pub mod team;
pub mod user;
