pub mod config;
pub mod errors;
pub mod output;
pub mod sampling;
pub mod session;
