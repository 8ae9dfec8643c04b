pub mod client;
pub mod config;
pub mod errors;
pub mod history;
pub mod types;
