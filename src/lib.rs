pub mod backup;
pub mod chord;
pub mod config;
pub mod error;
pub mod network;
