pub mod audit;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod eligibility;
pub mod engagement;
pub mod error;
pub mod gateway;
pub mod journal;
pub mod matching;
pub mod messages;
pub mod orchestrator;
pub mod pairer;
pub mod pairing;
pub mod participant;
pub mod pool;
pub mod store;
pub mod types;
pub mod week;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CoffeeError, Result};
