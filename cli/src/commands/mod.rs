pub mod cache;
pub mod config;
pub mod run;
pub mod tls;
pub mod users;
