pub mod broadcast;
pub mod events;
pub mod registry;
pub mod server;
