use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::award::merge_extra;
use crate::models::common::{
    Agency, AwardTypeCode, Pagination, TimePeriod, WireEnum, parse_award_type_codes,
};
use crate::models::parse::{lenient_string, non_blank, optional_list, parse_flag, to_wire};

pub const GEOGRAPHY_SEARCH_ENDPOINT: &str = "search/spending_by_geography/";
pub const DEFAULT_GEOGRAPHY_SORT: &str = "aggregated_amount";

static STATE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z]{2}|[0-9]{2})$").expect("state pattern compiles"));
static FIVE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}$").expect("five digit pattern compiles"));
static DISTRICT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}[0-9]{2,}$").expect("district pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographicScope {
    PlaceOfPerformance,
    RecipientLocation,
}

impl WireEnum for GeographicScope {
    const FIELD: &'static str = "scope";
    const VARIANTS: &'static [Self] = &[Self::PlaceOfPerformance, Self::RecipientLocation];

    fn as_str(self) -> &'static str {
        match self {
            Self::PlaceOfPerformance => "place_of_performance",
            Self::RecipientLocation => "recipient_location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeographicLayer {
    State,
    County,
    District,
    Zip,
}

impl WireEnum for GeographicLayer {
    const FIELD: &'static str = "geo_layer";
    const VARIANTS: &'static [Self] = &[Self::State, Self::County, Self::District, Self::Zip];

    fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::County => "county",
            Self::District => "district",
            Self::Zip => "zip",
        }
    }
}

impl GeographicLayer {
    /// Checks the shape of one filter code for this layer.
    pub fn validate_code(self, code: &str) -> Result<(), ValidationError> {
        let (valid, expectation) = match self {
            Self::State => (
                STATE_CODE.is_match(code),
                "state codes must be 2-letter postal codes or 2-digit FIPS codes",
            ),
            Self::County => (
                FIVE_DIGITS.is_match(code),
                "county codes must be 5-digit FIPS codes",
            ),
            Self::Zip => (FIVE_DIGITS.is_match(code), "zip codes must be 5-digit codes"),
            Self::District => (
                DISTRICT_CODE.is_match(code),
                "district codes must be a state code followed by the district number",
            ),
        };

        if valid {
            Ok(())
        } else {
            Err(ValidationError::format(
                "geo_layer_filters",
                format!("{expectation} (layer '{}'): {code}", self.as_str()),
            ))
        }
    }
}

/// Flat, agent-facing parameters of the geography search tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeographySearchParams {
    #[serde(default, deserialize_with = "lenient_string")]
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub geo_layer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub geo_layer_filters: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub award_types: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub agencies: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recipients: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subawards: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub limit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sort: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographySearchFilters {
    pub time_period: Vec<TimePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_type_codes: Option<Vec<AwardTypeCode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agencies: Option<Vec<Agency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_search_text: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographySearchRequest {
    pub scope: GeographicScope,
    pub geo_layer: GeographicLayer,
    pub geo_layer_filters: Vec<String>,
    pub filters: GeographySearchFilters,
    pub sort: String,
    pub subawards: bool,
    #[serde(flatten)]
    pub pagination: Pagination,
    #[serde(skip)]
    pub extra: Map<String, Value>,
}

impl GeographySearchRequest {
    pub fn from_params(
        params: &GeographySearchParams,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let scope = non_blank(params.scope.as_deref())
            .ok_or(ValidationError::MissingField("scope"))
            .and_then(GeographicScope::parse)?;
        let geo_layer = non_blank(params.geo_layer.as_deref())
            .ok_or(ValidationError::MissingField("geo_layer"))
            .and_then(GeographicLayer::parse)?;

        let geo_layer_filters = optional_list(params.geo_layer_filters.as_deref())
            .ok_or(ValidationError::MissingField("geo_layer_filters"))?;
        for code in &geo_layer_filters {
            geo_layer.validate_code(code)?;
        }

        let award_type_codes = match non_blank(params.award_types.as_deref()) {
            Some(raw) => Some(parse_award_type_codes(raw)?),
            None => None,
        };
        let agencies = match non_blank(params.agencies.as_deref()) {
            Some(raw) => Some(Agency::parse_list(raw)?),
            None => None,
        };

        let filters = GeographySearchFilters {
            time_period: TimePeriod::from_params(
                params.start_date.as_deref(),
                params.end_date.as_deref(),
            )?,
            award_type_codes: award_type_codes.filter(|codes| !codes.is_empty()),
            agencies: agencies.filter(|agencies| !agencies.is_empty()),
            recipient_search_text: optional_list(params.recipients.as_deref()),
        };

        Ok(Self {
            scope,
            geo_layer,
            geo_layer_filters,
            filters,
            sort: non_blank(params.sort.as_deref())
                .unwrap_or(DEFAULT_GEOGRAPHY_SORT)
                .to_string(),
            subawards: parse_flag(params.subawards.as_deref(), false),
            pagination: Pagination::from_params(
                params.page.as_deref(),
                params.limit.as_deref(),
                params.order.as_deref(),
                max_limit,
            )?,
            extra: Map::new(),
        })
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn to_api_payload(&self) -> Value {
        let mut payload = to_wire(self);
        merge_extra(&mut payload, &self.extra);
        payload
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(layer: &str, filters: &str) -> GeographySearchParams {
        GeographySearchParams {
            scope: Some("place_of_performance".to_string()),
            geo_layer: Some(layer.to_string()),
            geo_layer_filters: Some(filters.to_string()),
            start_date: Some("2023-10-01".to_string()),
            end_date: Some("2024-09-30".to_string()),
            ..GeographySearchParams::default()
        }
    }

    #[test]
    fn state_codes_must_be_two_letters_or_two_digits() {
        for code in ["WA", "ca", "53", "06"] {
            assert!(GeographicLayer::State.validate_code(code).is_ok(), "{code}");
        }
        for code in ["W", "WAS", "W1", "5", "530", ""] {
            assert!(GeographicLayer::State.validate_code(code).is_err(), "{code}");
        }
    }

    #[test]
    fn county_zip_and_district_shapes() {
        assert!(GeographicLayer::County.validate_code("53033").is_ok());
        assert!(GeographicLayer::County.validate_code("5303").is_err());
        assert!(GeographicLayer::Zip.validate_code("98101").is_ok());
        assert!(GeographicLayer::Zip.validate_code("9810A").is_err());
        assert!(GeographicLayer::District.validate_code("WA01").is_ok());
        assert!(GeographicLayer::District.validate_code("CA123").is_ok());
        assert!(GeographicLayer::District.validate_code("WA1").is_err());
        assert!(GeographicLayer::District.validate_code("0101").is_err());
    }

    #[test]
    fn bad_code_error_names_code_and_layer() {
        let err = GeographySearchRequest::from_params(&params("county", "53033,ABCDE"), 100)
            .expect_err("ABCDE is not a FIPS code");
        let message = err.to_string();
        assert!(message.contains("ABCDE"));
        assert!(message.contains("county"));
    }

    #[test]
    fn payload_carries_defaults_and_drops_unset_filters() {
        let payload = GeographySearchRequest::from_params(&params("state", "WA, CA"), 100)
            .expect("valid")
            .to_api_payload();

        assert_eq!(
            payload,
            json!({
                "scope": "place_of_performance",
                "geo_layer": "state",
                "geo_layer_filters": ["WA", "CA"],
                "filters": {
                    "time_period": [{"start_date": "2023-10-01", "end_date": "2024-09-30"}]
                },
                "sort": "aggregated_amount",
                "subawards": false,
                "page": 1,
                "limit": 100,
                "order": "desc"
            })
        );
    }

    #[test]
    fn optional_filters_and_required_fields() {
        let full = GeographySearchParams {
            award_types: Some("A,B,C,D".to_string()),
            agencies: Some("Department of Defense".to_string()),
            recipients: Some("Boeing".to_string()),
            ..params("zip", "98101")
        };
        let payload = GeographySearchRequest::from_params(&full, 100)
            .expect("valid")
            .to_api_payload();
        assert_eq!(payload["filters"]["award_type_codes"], json!(["A", "B", "C", "D"]));
        assert_eq!(payload["filters"]["agencies"][0]["name"], json!("Department of Defense"));
        assert_eq!(payload["filters"]["recipient_search_text"], json!(["Boeing"]));

        let missing_filters = GeographySearchParams {
            geo_layer_filters: Some(" , ".to_string()),
            ..params("state", "WA")
        };
        assert_eq!(
            GeographySearchRequest::from_params(&missing_filters, 100),
            Err(ValidationError::MissingField("geo_layer_filters"))
        );

        let bad_scope = GeographySearchParams {
            scope: Some("everywhere".to_string()),
            ..params("state", "WA")
        };
        assert!(matches!(
            GeographySearchRequest::from_params(&bad_scope, 100),
            Err(ValidationError::InvalidEnumValue { field: "scope", .. })
        ));

        assert!(GeographySearchRequest::from_params(&params("state", "WA"), 50).is_ok());
        let over_limit = GeographySearchParams {
            limit: Some("500".to_string()),
            ..params("state", "WA")
        };
        assert!(matches!(
            GeographySearchRequest::from_params(&over_limit, 100),
            Err(ValidationError::OutOfRange { field: "limit", .. })
        ));
    }
}
