//! Pagefeed engine.
//!
//! Incremental, filtered, paginated fetching of page records from a remote
//! REST list service: one derived items query per parameter set, verbatim
//! continuation-link paging, server-side OData filtering layered with
//! local taxonomy post-filtering, and the supporting view/alert/feedback
//! collaborators. Rendering is the host's business; this crate only moves
//! and shapes data.

pub mod alerts;
pub mod client;
pub mod config;
pub mod error;
pub mod facets;
pub mod feed;
pub mod feedback;
pub mod view;

pub use client::{ListClient, RestListClient};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{
    ColumnDescriptor, ColumnKind, FilterCriterion, LoadOutcome, PageFeed, QueryBuilder, QuerySpec,
    SortDirection, SortSpec,
};
