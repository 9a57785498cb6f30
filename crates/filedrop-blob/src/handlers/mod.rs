//! HTTP handlers for filedrop

mod flash;
pub mod handler;
pub mod types;
pub mod views;

pub use flash::FLASH_COOKIE;
pub use handler::{app, configure_routes, FileDropApiDoc};
pub use types::*;
