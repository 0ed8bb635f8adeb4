use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::client::QueryParams;
use crate::error::ValidationError;
use crate::models::common::{SortOrder, WireEnum};
use crate::models::explorer::parse_fiscal_year;
use crate::models::parse::{lenient_string, non_blank, parse_u32};

static TOPTIER_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3,4}$").expect("toptier pattern compiles"));
static BUREAU_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles"));

/// Validates a toptier agency code for use as a path segment (`012`, `9700`).
pub fn validate_toptier_code(raw: &str) -> Result<&str, ValidationError> {
    let code = raw.trim();
    if TOPTIER_CODE.is_match(code) {
        Ok(code)
    } else {
        Err(ValidationError::format(
            "toptier_code",
            format!("'{code}' is not a 3 or 4 digit toptier code"),
        ))
    }
}

pub fn validate_bureau_slug(raw: &str) -> Result<&str, ValidationError> {
    let slug = raw.trim();
    if BUREAU_SLUG.is_match(slug) {
        Ok(slug)
    } else {
        Err(ValidationError::format(
            "bureau_slug",
            format!("'{slug}' is not a lowercase hyphenated slug"),
        ))
    }
}

const DEFAULT_LIMIT: u32 = 100;

/// Query parameters shared by the sub-agency and sub-component listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyListParams {
    pub fiscal_year: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl Default for AgencyListParams {
    fn default() -> Self {
        Self {
            fiscal_year: None,
            sort: None,
            page: Some("1".to_string()),
            limit: Some(DEFAULT_LIMIT.to_string()),
        }
    }
}

impl AgencyListParams {
    /// `limit` must fall in `1..=max_limit`; unset, it is `min(100, max_limit)`.
    pub fn from_params(
        fiscal_year: Option<&str>,
        sort: Option<&str>,
        page: Option<&str>,
        limit: Option<&str>,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let defaults = Self::default();
        let limit = match non_blank(limit) {
            Some(raw) => bounded_limit(parse_u32("limit", raw)?, max_limit)?,
            None => DEFAULT_LIMIT.min(max_limit),
        };
        Ok(Self {
            fiscal_year: non_blank(fiscal_year)
                .map(|raw| parse_fiscal_year("fiscal_year", raw))
                .transpose()?,
            sort: non_blank(sort).map(ToString::to_string),
            page: positive("page", page)?.or(defaults.page),
            limit: Some(limit.to_string()),
        })
    }

    /// Flat query map with unset entries dropped.
    pub fn to_query_params(&self) -> QueryParams {
        [
            ("fiscal_year", &self.fiscal_year),
            ("sort", &self.sort),
            ("page", &self.page),
            ("limit", &self.limit),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|value| (key.to_string(), value.clone())))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgramActivitySort {
    Name,
    #[default]
    ObligatedAmount,
    GrossOutlayAmount,
}

impl WireEnum for ProgramActivitySort {
    const FIELD: &'static str = "sort";
    const VARIANTS: &'static [Self] = &[Self::Name, Self::ObligatedAmount, Self::GrossOutlayAmount];

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::ObligatedAmount => "obligated_amount",
            Self::GrossOutlayAmount => "gross_outlay_amount",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramActivityListArgs {
    #[serde(default, deserialize_with = "lenient_string")]
    pub fiscal_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub filter: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sort: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub limit: Option<String>,
}

/// Query for `agency/{toptier_code}/program_activity/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramActivityListParams {
    pub fiscal_year: Option<String>,
    pub filter: Option<String>,
    pub order: SortOrder,
    pub sort: ProgramActivitySort,
    pub page: u32,
    pub limit: u32,
}

impl ProgramActivityListParams {
    pub fn from_params(
        args: &ProgramActivityListArgs,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let page = match non_blank(args.page.as_deref()) {
            Some(raw) => parse_u32("page", raw)?,
            None => 1,
        };
        if page == 0 {
            return Err(ValidationError::out_of_range("page", "page must be >= 1"));
        }
        let limit = match non_blank(args.limit.as_deref()) {
            Some(raw) => bounded_limit(parse_u32("limit", raw)?, max_limit)?,
            None => DEFAULT_LIMIT.min(max_limit),
        };

        Ok(Self {
            fiscal_year: non_blank(args.fiscal_year.as_deref())
                .map(|raw| parse_fiscal_year("fiscal_year", raw))
                .transpose()?,
            filter: non_blank(args.filter.as_deref()).map(ToString::to_string),
            order: non_blank(args.order.as_deref())
                .map(SortOrder::parse)
                .transpose()?
                .unwrap_or_default(),
            sort: non_blank(args.sort.as_deref())
                .map(ProgramActivitySort::parse)
                .transpose()?
                .unwrap_or_default(),
            page,
            limit,
        })
    }

    pub fn to_query_params(&self) -> QueryParams {
        let mut params = Vec::with_capacity(6);
        if let Some(fiscal_year) = &self.fiscal_year {
            params.push(("fiscal_year".to_string(), fiscal_year.clone()));
        }
        if let Some(filter) = &self.filter {
            params.push(("filter".to_string(), filter.clone()));
        }
        params.push(("order".to_string(), self.order.as_str().to_string()));
        params.push(("sort".to_string(), self.sort.as_str().to_string()));
        params.push(("page".to_string(), self.page.to_string()));
        params.push(("limit".to_string(), self.limit.to_string()));
        params
    }
}

fn bounded_limit(limit: u32, max_limit: u32) -> Result<u32, ValidationError> {
    if limit == 0 || limit > max_limit {
        return Err(ValidationError::out_of_range(
            "limit",
            format!("limit must be between 1 and {max_limit}"),
        ));
    }
    Ok(limit)
}

fn positive(field: &'static str, raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    let value = parse_u32(field, raw)?;
    if value == 0 {
        return Err(ValidationError::out_of_range(field, format!("{field} must be >= 1")));
    }
    Ok(Some(value.to_string()))
}
