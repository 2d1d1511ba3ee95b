pub mod activity;
pub mod config;
pub mod entities;
pub mod error;
pub mod portfolio;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod use_cases;

#[cfg(test)]
mod testing;

pub use error::{AuthFailure, BrokerError, Error};
