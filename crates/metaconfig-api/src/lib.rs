//! Metaconfig API - entity model
//!
//! A `Config` owns an ordered tree of `Property` values. Both carry an
//! attribute map and an `updated` timestamp in epoch milliseconds; a
//! `Config` also carries the version used for optimistic locking.

pub mod config;
pub mod page;
pub mod property;

pub use config::Config;
pub use page::{PageRequest, PageResponse};
pub use property::{Property, PropertyType};
