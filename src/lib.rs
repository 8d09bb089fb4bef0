pub mod bot;
pub mod config;
pub mod logging;
pub mod quiz;
pub mod store;
