pub mod auction;
pub mod config;
