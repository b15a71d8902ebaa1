//! GroupGuard — rule-based message moderation for group chats.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod guards;
pub mod message;
pub mod moderator;
pub mod policy;
pub mod store;
