//! Coevolution of costly signals between quality-classed senders and
//! interval-accepting receivers.

pub mod acceptance;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod payoff;
pub mod population;
pub mod stats;
pub mod strategy;
