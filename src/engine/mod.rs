pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod model;
pub mod state;

mod executor;
mod registry;
mod worker;

#[cfg(test)]
pub(crate) mod testing;
