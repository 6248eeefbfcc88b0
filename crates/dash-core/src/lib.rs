//! Core domain logic for the event dashboard.
//!
//! This crate contains the fundamental types for:
//! - Events: normalized hook events with status derived from their payloads
//! - Filtering: per-dimension "all" vs explicit-subset selection plus search
//! - Stats: aggregate status counts over a filtered event set

pub mod event;
pub mod filter;
mod stats;

pub use event::{Event, Payload, RawEvent, Status, derive_status, error_details};
pub use filter::{Dimension, EventFilter, FilterError, FilterState};
pub use stats::Stats;
