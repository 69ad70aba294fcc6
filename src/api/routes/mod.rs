//! HTTP route handlers, one module per endpoint group.

pub mod commands;
pub mod events;
pub mod messages;
pub mod streams;
