//! Database bootstrap shared by all services

pub mod init;

pub use init::*;
