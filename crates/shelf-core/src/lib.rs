//! Core types and trait definitions for the Shelf trust-and-admission
//! pipeline.
//!
//! No HTTP or database dependencies; every other crate builds on this one.

#![allow(async_fn_in_trait)]

pub mod admission;
pub mod audit;
pub mod error;
pub mod principal;
pub mod report;
pub mod series;
pub mod store;
pub mod trending;

pub use error::{Error, Result};
