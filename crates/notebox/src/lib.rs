pub use sqlx;

pub use color_eyre;

pub mod app_state;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod notes;
pub mod server;
