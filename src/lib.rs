pub mod config;
pub mod feeds;
pub mod logging;
pub mod settings;
pub mod sync;
pub mod ui;
