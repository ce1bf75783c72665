pub mod aggregate;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod recognition;
pub mod service;
pub mod session;

pub use error::{Error, Result};
