//! HTTP handlers

pub mod health;
pub mod hook;

pub use health::root;
pub use hook::handle_hook;
