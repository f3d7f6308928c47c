//! Paged filtered fetch engine.
//!
//! This module provides:
//! - QueryBuilder: derives one items query from the feed's inputs
//! - PageFeed: fetch orchestration, cursor tracking, reset discipline
//! - post_filter: local taxonomy matching applied after each page
//! - Types: ColumnKind, FilterCriterion, QuerySpec, LoadOutcome, etc.

mod orchestrator;
pub mod post_filter;
mod query_builder;
pub mod types;

pub use orchestrator::{FeedParams, PageFeed};
pub use query_builder::QueryBuilder;
pub use types::{
    ColumnDescriptor, ColumnKind, FilterCriterion, LoadOutcome, PageResult, QuerySpec,
    SortDirection, SortSpec,
};
