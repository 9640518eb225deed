pub mod api;
pub mod config;
pub mod session;
pub mod types;
pub mod util;
