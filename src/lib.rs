//! Vehicle sale watcher: resolves the game's for-sale list into listings,
//! renders a static page and announces new or expiring listings to chat.

pub mod archive;
pub mod clock;
pub mod config;
pub mod discord;
pub mod error;
pub mod extract;
pub mod history;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod render;
pub mod sales;
pub mod texture;
