//! Validated request models for the USAspending endpoints.
//!
//! Every search request is built from flat, string-typed parameters via
//! `from_params` and serialized with `to_api_payload`, which never emits a
//! `null` at any depth.

pub mod agency;
pub mod award;
pub mod common;
pub mod explorer;
pub mod geography;
pub mod parse;
pub mod recipient;

pub use agency::{AgencyListParams, ProgramActivityListArgs, ProgramActivityListParams};
pub use award::{
    AwardAmount, AwardSearchFilters, AwardSearchParams, AwardSearchRequest, ProgramActivityObject,
};
pub use common::{
    Agency, AgencyTier, AgencyType, AwardTypeCode, Pagination, SortOrder, TimePeriod, WireEnum,
};
pub use explorer::{
    DetailedFilter, ExplorerFilter, ExplorerType, GeneralFilter, Period, Quarter,
    SpendingExplorerParams, SpendingExplorerRequest,
};
pub use geography::{
    GeographicLayer, GeographicScope, GeographySearchFilters, GeographySearchParams,
    GeographySearchRequest,
};
pub use recipient::{
    RecipientAwardType, RecipientSearchParams, RecipientSearchRequest, RecipientSort,
};
