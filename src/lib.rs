#![allow(async_fn_in_trait)]
pub mod catalog;
pub mod config;
pub mod constants;
pub mod download_plan;
pub mod error;
pub mod geometry;
pub mod granule;
pub mod retrieve;
pub mod search;
pub mod time;
pub mod timeseries;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use geometry::Geometry;
pub use retrieve::Retriever;
