//! USAspending tools: the five search flows, the award detail fan-out and
//! the agency/reference lookups.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::client::{QueryParams, SpendingApi};
use crate::config::SearchLimits;
use crate::details::{AwardDetailsRequest, award_detail_endpoint, fetch_details};
use crate::error::{SchemaError, ToolError, ValidationError};
use crate::models::agency::{validate_bureau_slug, validate_toptier_code};
use crate::models::award::AWARD_SEARCH_ENDPOINT;
use crate::models::explorer::SPENDING_EXPLORER_ENDPOINT;
use crate::models::geography::GEOGRAPHY_SEARCH_ENDPOINT;
use crate::models::parse::{lenient_string, non_blank, parse_flag, parse_u32};
use crate::models::recipient::RECIPIENT_SEARCH_ENDPOINT;
use crate::models::{
    AgencyListParams, AwardSearchParams, AwardSearchRequest, GeographySearchParams,
    GeographySearchRequest, ProgramActivityListArgs, ProgramActivityListParams,
    RecipientSearchParams, RecipientSearchRequest, SpendingExplorerParams,
    SpendingExplorerRequest,
};
use crate::pagination::fetch_pages;
use crate::tools::{DependencyMap, ToolOutcome, ToolSpec};


pub const SEARCH_SPENDING_BY_AWARD: &str = "search_spending_by_award";
pub const GET_AWARD_DETAILS: &str = "get_award_details";
pub const SEARCH_SPENDING_BY_GEOGRAPHY: &str = "search_spending_by_geography";
pub const SEARCH_RECIPIENTS: &str = "search_recipients";
pub const SEARCH_SPENDING_EXPLORER: &str = "search_spending_explorer";
pub const GET_AGENCIES: &str = "get_agencies";
pub const GET_AWARD_TYPES: &str = "get_award_types";
pub const GET_GLOSSARY: &str = "get_glossary";
pub const GET_SUB_AGENCY_LIST: &str = "get_sub_agency_list";
pub const GET_SUB_COMPONENTS_LIST: &str = "get_sub_components_list";
pub const GET_SUB_COMPONENT_DETAILS: &str = "get_sub_component_details";
pub const LIST_PROGRAM_ACTIVITIES: &str = "list_program_activities";

/// Shared state for every spending tool: the API collaborator and the
/// configured limits.
#[derive(Clone)]
pub struct SpendingContext {
    api: Arc<dyn SpendingApi>,
    limits: SearchLimits,
}

impl std::fmt::Debug for SpendingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendingContext")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl SpendingContext {
    pub fn new(api: impl SpendingApi + 'static, limits: SearchLimits) -> Self {
        Self::from_shared(Arc::new(api), limits)
    }

    pub fn from_shared(api: Arc<dyn SpendingApi>, limits: SearchLimits) -> Self {
        Self { api, limits }
    }

    pub fn api(&self) -> &dyn SpendingApi {
        self.api.as_ref()
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }
}

/// Every spending tool, in the order they are advertised.
pub fn all_tools() -> Result<Vec<ToolSpec>, SchemaError> {
    Ok(vec![
        search_spending_by_award_tool()?,
        get_award_details_tool()?,
        search_spending_by_geography_tool()?,
        search_recipients_tool()?,
        search_spending_explorer_tool()?,
        get_agencies_tool()?,
        get_award_types_tool()?,
        get_glossary_tool()?,
        get_sub_agency_list_tool()?,
        get_sub_components_list_tool()?,
        get_sub_component_details_tool()?,
        list_program_activities_tool()?,
    ])
}

pub fn search_spending_by_award_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        SEARCH_SPENDING_BY_AWARD,
        "Search federal awards. Dates are YYYY-MM-DD; list arguments are comma-separated \
         (award_amounts and program_activities use ';'). Agencies use \
         [type:][tier:top_tier_name:]name. Fetches up to max_pages pages unless \
         fetch_all_pages is false.",
        json!({
            "type": "object",
            "properties": {
                "award_type_codes": {
                    "type": ["string", "array"],
                    "description": "e.g. A,B,C,D or 02,03"
                },
                "start_date": {"type": "string"},
                "end_date": {"type": "string"},
                "agencies": {"type": ["string", "array"]},
                "recipients": {"type": ["string", "array"]},
                "award_ids": {"type": ["string", "array"]},
                "keywords": {"type": ["string", "array"]},
                "award_amounts": {"type": "string", "description": "min-max;min-;-max"},
                "program_activities": {"type": "string", "description": "name|code;name|code"},
                "fields": {"type": ["string", "array"]},
                "sort": {"type": "string"},
                "subawards": {"type": ["string", "boolean"]},
                "page": {"type": ["string", "integer"]},
                "limit": {"type": ["string", "integer"]},
                "order": {"type": "string", "enum": ["asc", "desc"]},
                "fetch_all_pages": {"type": ["string", "boolean"]},
                "max_pages": {"type": ["string", "integer"]},
                "extra": {"type": "object", "description": "additional top-level payload fields"}
            },
            "required": ["start_date", "end_date"],
            "additionalProperties": false
        }),
        search_spending_by_award,
    )
}

pub fn get_award_details_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        GET_AWARD_DETAILS,
        "Fetch full details for up to 10 awards by generated award ID, concurrently.",
        json!({
            "type": "object",
            "properties": {
                "award_ids": {"type": ["string", "array"], "description": "comma-separated IDs"},
                "max_concurrent": {"type": ["string", "integer"]}
            },
            "required": ["award_ids"],
            "additionalProperties": false
        }),
        get_award_details,
    )
}

pub fn search_spending_by_geography_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        SEARCH_SPENDING_BY_GEOGRAPHY,
        "Aggregate spending by state, county, district or zip code.",
        json!({
            "type": "object",
            "properties": {
                "scope": {"type": "string", "enum": ["place_of_performance", "recipient_location"]},
                "geo_layer": {"type": "string", "enum": ["state", "county", "district", "zip"]},
                "geo_layer_filters": {"type": ["string", "array"]},
                "award_types": {"type": ["string", "array"]},
                "agencies": {"type": ["string", "array"]},
                "recipients": {"type": ["string", "array"]},
                "start_date": {"type": "string"},
                "end_date": {"type": "string"},
                "subawards": {"type": ["string", "boolean"]},
                "page": {"type": ["string", "integer"]},
                "limit": {"type": ["string", "integer"]},
                "sort": {"type": "string"},
                "order": {"type": "string", "enum": ["asc", "desc"]},
                "extra": {"type": "object"}
            },
            "required": ["scope", "geo_layer", "geo_layer_filters", "start_date", "end_date"],
            "additionalProperties": false
        }),
        search_spending_by_geography,
    )
}

pub fn search_recipients_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        SEARCH_RECIPIENTS,
        "Search award recipients by name, DUNS or UEI keyword.",
        json!({
            "type": "object",
            "properties": {
                "keyword": {"type": "string"},
                "award_type": {
                    "type": "string",
                    "enum": ["all", "contracts", "grants", "loans", "direct_payments",
                             "other_financial_assistance"]
                },
                "sort": {"type": "string", "enum": ["amount", "name", "duns"]},
                "order": {"type": "string", "enum": ["asc", "desc"]},
                "page": {"type": ["string", "integer"]},
                "limit": {"type": ["string", "integer"]}
            },
            "required": [],
            "additionalProperties": false
        }),
        search_recipients,
    )
}

pub fn search_spending_explorer_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        SEARCH_SPENDING_EXPLORER,
        "Explore spending hierarchically. budget_function, agency and object_class need \
         fy and quarter; drill-down types accept fy, an optional quarter or period, and \
         filter identifiers.",
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["budget_function", "budget_subfunction", "federal_account",
                             "program_activity", "object_class", "recipient", "award", "agency"]
                },
                "fy": {"type": ["string", "integer"]},
                "quarter": {"type": ["string", "integer"]},
                "period": {"type": ["string", "integer"]},
                "agency": {"type": ["string", "integer"]},
                "federal_account": {"type": ["string", "integer"]},
                "object_class": {"type": ["string", "integer"]},
                "budget_function": {"type": ["string", "integer"]},
                "budget_subfunction": {"type": ["string", "integer"]},
                "recipient": {"type": ["string", "integer"]},
                "program_activity": {"type": ["string", "integer"]}
            },
            "required": ["type", "fy"],
            "additionalProperties": false
        }),
        search_spending_explorer,
    )
}

pub fn get_agencies_tool() -> Result<ToolSpec, SchemaError> {
    reference_tool(
        GET_AGENCIES,
        "List toptier agencies with the codes other tools need.",
        "references/toptier_agencies/",
    )
}

pub fn get_award_types_tool() -> Result<ToolSpec, SchemaError> {
    reference_tool(
        GET_AWARD_TYPES,
        "List award types and the codes used to filter by them.",
        "references/award_types/",
    )
}

pub fn get_glossary_tool() -> Result<ToolSpec, SchemaError> {
    reference_tool(
        GET_GLOSSARY,
        "Glossary of spending terms.",
        "references/glossary/",
    )
}

pub fn get_sub_agency_list_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        GET_SUB_AGENCY_LIST,
        "List sub-agencies and offices of a toptier agency.",
        agency_list_schema(false),
        get_sub_agency_list,
    )
}

pub fn get_sub_components_list_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        GET_SUB_COMPONENTS_LIST,
        "List bureaus (sub-components) of a toptier agency.",
        agency_list_schema(false),
        get_sub_components_list,
    )
}

pub fn get_sub_component_details_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        GET_SUB_COMPONENT_DETAILS,
        "Federal accounts and totals for one bureau of a toptier agency.",
        agency_list_schema(true),
        get_sub_component_details,
    )
}

pub fn list_program_activities_tool() -> Result<ToolSpec, SchemaError> {
    spending_tool(
        LIST_PROGRAM_ACTIVITIES,
        "List program activities funded by a toptier agency.",
        json!({
            "type": "object",
            "properties": {
                "toptier_code": {"type": ["string", "integer"]},
                "fiscal_year": {"type": ["string", "integer"]},
                "filter": {"type": "string"},
                "order": {"type": "string", "enum": ["asc", "desc"]},
                "sort": {
                    "type": "string",
                    "enum": ["name", "obligated_amount", "gross_outlay_amount"]
                },
                "page": {"type": ["string", "integer"]},
                "limit": {"type": ["string", "integer"]}
            },
            "required": ["toptier_code"],
            "additionalProperties": false
        }),
        list_program_activities,
    )
}

fn agency_list_schema(with_bureau: bool) -> Value {
    let mut properties = json!({
        "toptier_code": {"type": ["string", "integer"], "description": "3-4 digit code"},
        "fiscal_year": {"type": ["string", "integer"]},
        "sort": {"type": "string"},
        "page": {"type": ["string", "integer"]},
        "limit": {"type": ["string", "integer"]}
    });
    let mut required = vec!["toptier_code"];
    if with_bureau {
        properties["bureau_slug"] = json!({"type": "string"});
        required.push("bureau_slug");
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Builds a tool whose handler needs the [`SpendingContext`] and produces
/// JSON. Handler errors become `Error:` text.
fn spending_tool<F, Fut>(
    name: &'static str,
    description: &str,
    schema: Value,
    run: F,
) -> Result<ToolSpec, SchemaError>
where
    F: Fn(Arc<SpendingContext>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    let tool = ToolSpec::new(name, description).with_schema(schema)?;
    Ok(tool.with_handler(move |args, deps| {
        let pending = get_ctx(deps).map(|ctx| run(ctx, args));
        async move {
            let result = match pending {
                Ok(pending) => pending.await,
                Err(err) => Err(err),
            };
            Ok(match result {
                Ok(value) => ToolOutcome::Json(value),
                Err(err) => {
                    tracing::debug!(tool = name, error = %err, "tool failed");
                    ToolOutcome::error(err)
                }
            })
        }
    }))
}

fn reference_tool(
    name: &'static str,
    description: &str,
    endpoint: &'static str,
) -> Result<ToolSpec, SchemaError> {
    spending_tool(
        name,
        description,
        json!({
            "type": "object",
            "properties": {},
            "required": [],
            "additionalProperties": false
        }),
        move |ctx, _args| async move {
            ctx.api
                .get(endpoint, &QueryParams::new())
                .await
                .map_err(ToolError::from)
        },
    )
}

fn get_ctx(deps: &DependencyMap) -> Result<Arc<SpendingContext>, ToolError> {
    deps.get::<SpendingContext>()
        .ok_or(ToolError::MissingDependency("SpendingContext"))
}

fn decode_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    T::deserialize(args).map_err(|err| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: err.to_string(),
    })
}

fn extra_fields(args: &Value) -> Map<String, Value> {
    args.get("extra")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
struct PagingArgs {
    #[serde(default, deserialize_with = "lenient_string")]
    fetch_all_pages: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    max_pages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailArgs {
    #[serde(default, deserialize_with = "lenient_string")]
    award_ids: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    max_concurrent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgencyArgs {
    #[serde(default, deserialize_with = "lenient_string")]
    toptier_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    bureau_slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    fiscal_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    sort: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    limit: Option<String>,
}

impl AgencyArgs {
    fn toptier_code(&self) -> Result<&str, ValidationError> {
        non_blank(self.toptier_code.as_deref())
            .ok_or(ValidationError::MissingField("toptier_code"))
            .and_then(validate_toptier_code)
    }

    fn bureau_slug(&self) -> Result<&str, ValidationError> {
        non_blank(self.bureau_slug.as_deref())
            .ok_or(ValidationError::MissingField("bureau_slug"))
            .and_then(validate_bureau_slug)
    }

    fn list_params(&self, max_limit: u32) -> Result<AgencyListParams, ValidationError> {
        AgencyListParams::from_params(
            self.fiscal_year.as_deref(),
            self.sort.as_deref(),
            self.page.as_deref(),
            self.limit.as_deref(),
            max_limit,
        )
    }
}

async fn search_spending_by_award(
    ctx: Arc<SpendingContext>,
    args: Value,
) -> Result<Value, ToolError> {
    let params: AwardSearchParams = decode_args(SEARCH_SPENDING_BY_AWARD, &args)?;
    let paging: PagingArgs = decode_args(SEARCH_SPENDING_BY_AWARD, &args)?;
    let request = AwardSearchRequest::from_params(&params, ctx.limits.award_max_limit)?
        .with_extra(extra_fields(&args));

    if !parse_flag(paging.fetch_all_pages.as_deref(), true) {
        let body = request.to_api_payload();
        return Ok(ctx.api.post(AWARD_SEARCH_ENDPOINT, &body).await?);
    }

    let max_pages = match non_blank(paging.max_pages.as_deref()) {
        Some(raw) => parse_u32("max_pages", raw)?,
        None => ctx.limits.default_max_pages,
    };
    if max_pages == 0 {
        return Err(ValidationError::out_of_range("max_pages", "max_pages must be >= 1").into());
    }

    let api = ctx.api.as_ref();
    let response = fetch_pages(&request, max_pages, |page_request| async move {
        let body = page_request.to_api_payload();
        api.post(AWARD_SEARCH_ENDPOINT, &body).await
    })
    .await?;
    Ok(response)
}

async fn get_award_details(ctx: Arc<SpendingContext>, args: Value) -> Result<Value, ToolError> {
    let detail_args: DetailArgs = decode_args(GET_AWARD_DETAILS, &args)?;
    let request = AwardDetailsRequest::from_params(
        detail_args.award_ids.as_deref(),
        detail_args.max_concurrent.as_deref(),
        ctx.limits.max_detail_ids,
    )?;

    let api = ctx.api.as_ref();
    let summary = fetch_details(&request, |award_id| async move {
        api.get(&award_detail_endpoint(&award_id), &QueryParams::new())
            .await
    })
    .await;
    Ok(summary.into_value())
}

async fn search_spending_by_geography(
    ctx: Arc<SpendingContext>,
    args: Value,
) -> Result<Value, ToolError> {
    let params: GeographySearchParams = decode_args(SEARCH_SPENDING_BY_GEOGRAPHY, &args)?;
    let request = GeographySearchRequest::from_params(&params, ctx.limits.geography_max_limit)?
        .with_extra(extra_fields(&args));
    let body = request.to_api_payload();
    Ok(ctx.api.post(GEOGRAPHY_SEARCH_ENDPOINT, &body).await?)
}

async fn search_recipients(ctx: Arc<SpendingContext>, args: Value) -> Result<Value, ToolError> {
    let params: RecipientSearchParams = decode_args(SEARCH_RECIPIENTS, &args)?;
    let request = RecipientSearchRequest::from_params(&params, ctx.limits.recipient_max_limit)?;
    let body = request.to_api_payload();
    Ok(ctx.api.post(RECIPIENT_SEARCH_ENDPOINT, &body).await?)
}

async fn search_spending_explorer(
    ctx: Arc<SpendingContext>,
    args: Value,
) -> Result<Value, ToolError> {
    let params: SpendingExplorerParams = decode_args(SEARCH_SPENDING_EXPLORER, &args)?;
    let request = SpendingExplorerRequest::from_params(&params)?;
    let body = request.to_api_payload();
    Ok(ctx.api.post(SPENDING_EXPLORER_ENDPOINT, &body).await?)
}

async fn get_sub_agency_list(ctx: Arc<SpendingContext>, args: Value) -> Result<Value, ToolError> {
    let agency: AgencyArgs = decode_args(GET_SUB_AGENCY_LIST, &args)?;
    let endpoint = format!("agency/{}/sub_agency/", agency.toptier_code()?);
    let query = agency.list_params(ctx.limits.agency_max_limit)?.to_query_params();
    Ok(ctx.api.get(&endpoint, &query).await?)
}

async fn get_sub_components_list(
    ctx: Arc<SpendingContext>,
    args: Value,
) -> Result<Value, ToolError> {
    let agency: AgencyArgs = decode_args(GET_SUB_COMPONENTS_LIST, &args)?;
    let endpoint = format!("agency/{}/sub_components/", agency.toptier_code()?);
    let query = agency.list_params(ctx.limits.agency_max_limit)?.to_query_params();
    Ok(ctx.api.get(&endpoint, &query).await?)
}

async fn get_sub_component_details(
    ctx: Arc<SpendingContext>,
    args: Value,
) -> Result<Value, ToolError> {
    let agency: AgencyArgs = decode_args(GET_SUB_COMPONENT_DETAILS, &args)?;
    let endpoint = format!(
        "agency/{}/sub_components/{}/",
        agency.toptier_code()?,
        agency.bureau_slug()?
    );
    let query = agency.list_params(ctx.limits.agency_max_limit)?.to_query_params();
    Ok(ctx.api.get(&endpoint, &query).await?)
}

async fn list_program_activities(
    ctx: Arc<SpendingContext>,
    args: Value,
) -> Result<Value, ToolError> {
    let agency: AgencyArgs = decode_args(LIST_PROGRAM_ACTIVITIES, &args)?;
    let list_args: ProgramActivityListArgs = decode_args(LIST_PROGRAM_ACTIVITIES, &args)?;
    let endpoint = format!("agency/{}/program_activity/", agency.toptier_code()?);
    let query = ProgramActivityListParams::from_params(&list_args, ctx.limits.agency_max_limit)?.to_query_params();
    Ok(ctx.api.get(&endpoint, &query).await?)
}
