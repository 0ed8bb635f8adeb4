//! Typed tools over the USAspending.gov API.
//!
//! Surface:
//! - Request models that turn flat, string-typed tool arguments into
//!   validated payloads (`models`)
//! - `SpendingApi` transport seam with a `reqwest` implementation
//! - Sequential pagination aggregator and bounded-concurrency detail fetcher
//! - Tool registry + JSON schema validation + dependency injection

pub mod client;
pub mod config;
pub mod details;
pub mod error;
pub mod models;
pub mod pagination;
pub mod tools;

pub use client::{QueryParams, SpendingApi, UsaSpendingClient};
pub use config::{ClientConfig, SearchLimits};
pub use details::{AwardDetailsRequest, DetailFetchSummary, fetch_details};
pub use error::{ConfigError, SchemaError, ToolError, TransportError, ValidationError};
pub use pagination::{Paginated, fetch_pages};
pub use tools::spending::{SpendingContext, all_tools};
pub use tools::{DependencyMap, ToolDefinition, ToolOutcome, ToolRegistry, ToolSpec};
