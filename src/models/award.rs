use serde::{Deserialize, Serialize};
use serde_json::map::Entry;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::common::{
    Agency, AwardTypeCode, Pagination, TimePeriod, parse_award_type_codes,
};
use crate::models::parse::{
    drop_nulls, lenient_string, non_blank, optional_list, parse_amount, parse_flag, split_on,
    to_wire,
};
use crate::pagination::Paginated;

pub const AWARD_SEARCH_ENDPOINT: &str = "search/spending_by_award/";

pub const DEFAULT_AWARD_FIELDS: [&str; 8] = [
    "Award ID",
    "Recipient Name",
    "Start Date",
    "End Date",
    "Award Amount",
    "Awarding Agency",
    "Awarding Sub Agency",
    "Award Type",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AwardAmount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

impl AwardAmount {
    /// Parses `min-max;min-;-max` ranges. The split happens on the first `-`;
    /// tokens without one are skipped.
    pub fn parse_ranges(raw: &str) -> Result<Vec<Self>, ValidationError> {
        let mut ranges = Vec::new();
        for token in split_on(raw, ';') {
            let Some((lower, upper)) = token.split_once('-') else {
                tracing::debug!(token, "award amount token has no '-', skipping");
                continue;
            };

            let range = Self {
                lower_bound: parse_amount("award_amounts", lower)?,
                upper_bound: parse_amount("award_amounts", upper)?,
            };

            match (range.lower_bound, range.upper_bound) {
                (None, None) => {
                    tracing::debug!(token, "award amount token has no bounds, skipping");
                    continue;
                }
                (Some(lower), Some(upper)) if lower > upper => {
                    return Err(ValidationError::out_of_range(
                        "award_amounts",
                        format!("lower bound {lower} exceeds upper bound {upper}"),
                    ));
                }
                _ => ranges.push(range),
            }
        }
        Ok(ranges)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramActivityObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ProgramActivityObject {
    /// Parses `name|code;name|code`. Either side may be blank; a token with no
    /// `|` is a name.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_on(raw, ';')
            .iter()
            .filter_map(|token| {
                let (name, code) = token.split_once('|').unwrap_or((token.as_str(), ""));
                let activity = Self {
                    name: non_blank(Some(name)).map(ToString::to_string),
                    code: non_blank(Some(code)).map(ToString::to_string),
                };
                (activity.name.is_some() || activity.code.is_some()).then_some(activity)
            })
            .collect()
    }
}

/// Flat, agent-facing parameters of the award search tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwardSearchParams {
    #[serde(default, deserialize_with = "lenient_string")]
    pub award_type_codes: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub agencies: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recipients: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub award_ids: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub keywords: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub award_amounts: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub program_activities: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fields: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sort: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subawards: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub limit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardSearchFilters {
    pub time_period: Vec<TimePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_type_codes: Option<Vec<AwardTypeCode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agencies: Option<Vec<Agency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_search_text: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award_amounts: Option<Vec<AwardAmount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_activities: Option<Vec<ProgramActivityObject>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardSearchRequest {
    pub filters: AwardSearchFilters,
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    pub subawards: bool,
    #[serde(flatten)]
    pub pagination: Pagination,
    /// Pass-through keys merged into the top level of the payload last.
    #[serde(skip)]
    pub extra: Map<String, Value>,
}

impl AwardSearchRequest {
    pub fn from_params(
        params: &AwardSearchParams,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let award_type_codes = match non_blank(params.award_type_codes.as_deref()) {
            Some(raw) => Some(parse_award_type_codes(raw)?),
            None => None,
        };
        let agencies = match non_blank(params.agencies.as_deref()) {
            Some(raw) => Some(Agency::parse_list(raw)?),
            None => None,
        };
        let award_amounts = match non_blank(params.award_amounts.as_deref()) {
            Some(raw) => Some(AwardAmount::parse_ranges(raw)?),
            None => None,
        };
        let program_activities = non_blank(params.program_activities.as_deref())
            .map(ProgramActivityObject::parse_list);

        let filters = AwardSearchFilters {
            time_period: TimePeriod::from_params(
                params.start_date.as_deref(),
                params.end_date.as_deref(),
            )?,
            award_type_codes: award_type_codes.filter(|codes| !codes.is_empty()),
            agencies: agencies.filter(|agencies| !agencies.is_empty()),
            recipient_search_text: optional_list(params.recipients.as_deref()),
            award_ids: optional_list(params.award_ids.as_deref()),
            keywords: optional_list(params.keywords.as_deref()),
            award_amounts: award_amounts.filter(|ranges| !ranges.is_empty()),
            program_activities: program_activities.filter(|items| !items.is_empty()),
        };

        let fields = optional_list(params.fields.as_deref()).unwrap_or_else(|| {
            DEFAULT_AWARD_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect()
        });

        Ok(Self {
            filters,
            fields,
            sort: non_blank(params.sort.as_deref()).map(ToString::to_string),
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

impl Paginated for AwardSearchRequest {
    fn page(&self) -> u32 {
        self.pagination.page
    }

    fn set_page(&mut self, page: u32) {
        self.pagination.page = page;
    }
}

/// Adds `extra` keys the typed request did not emit. Keys already present in
/// the payload (`page`, `limit`, `filters`, ...) are never overwritten.
pub(crate) fn merge_extra(payload: &mut Value, extra: &Map<String, Value>) {
    let Value::Object(map) = payload else {
        return;
    };
    for (key, value) in extra {
        let mut value = value.clone();
        drop_nulls(&mut value);
        if value.is_null() {
            continue;
        }
        match map.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(_) => {
                tracing::debug!(
                    key = key.as_str(),
                    "extra field shadows a request field, ignoring"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn base_params() -> AwardSearchParams {
        AwardSearchParams {
            start_date: Some("2023-10-01".to_string()),
            end_date: Some("2024-09-30".to_string()),
            ..AwardSearchParams::default()
        }
    }

    fn contains_null(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Array(items) => items.iter().any(contains_null),
            Value::Object(map) => map.values().any(contains_null),
            _ => false,
        }
    }

    #[test]
    fn builds_defense_contract_payload() {
        let params = AwardSearchParams {
            award_type_codes: Some("A,B".to_string()),
            agencies: Some(
                "awarding:toptier:Department of Defense:Department of Defense".to_string(),
            ),
            ..base_params()
        };

        let payload = AwardSearchRequest::from_params(&params, 100)
            .expect("valid request")
            .to_api_payload();

        assert_eq!(payload["filters"]["award_type_codes"], json!(["A", "B"]));
        assert_eq!(
            payload["filters"]["agencies"][0],
            json!({
                "name": "Department of Defense",
                "type": "awarding",
                "tier": "toptier",
                "top_tier_name": "Department of Defense"
            })
        );
        assert_eq!(
            payload["filters"]["time_period"],
            json!([{"start_date": "2023-10-01", "end_date": "2024-09-30"}])
        );
        assert_eq!(payload["page"], json!(1));
        assert_eq!(payload["limit"], json!(100));
        assert_eq!(payload["order"], json!("desc"));
        assert_eq!(payload["subawards"], json!(false));
        assert_eq!(payload["fields"].as_array().map(Vec::len), Some(8));
    }

    #[test]
    fn payload_omits_every_unset_field() {
        let payload = AwardSearchRequest::from_params(&base_params(), 100)
            .expect("valid")
            .to_api_payload();

        let filters = payload["filters"].as_object().expect("filters object");
        assert_eq!(filters.keys().collect::<Vec<_>>(), vec!["time_period"]);
        assert!(payload.get("sort").is_none());
        assert!(payload.get("pagination").is_none());
        assert!(!contains_null(&payload));
    }

    #[test]
    fn optional_filters_are_parsed_from_flat_strings() {
        let params = AwardSearchParams {
            recipients: Some("Lockheed Martin, Boeing".to_string()),
            keywords: Some("cybersecurity".to_string()),
            award_ids: Some("CONT_AWD_1, CONT_AWD_2".to_string()),
            award_amounts: Some("1000000-;-500;10-20".to_string()),
            program_activities: Some("IT Spending|0001;|0002".to_string()),
            fields: Some("Award ID,Award Amount".to_string()),
            sort: Some("Award Amount".to_string()),
            subawards: Some("YES".to_string()),
            ..base_params()
        };

        let payload = AwardSearchRequest::from_params(&params, 100)
            .expect("valid")
            .to_api_payload();

        assert_eq!(
            payload["filters"]["recipient_search_text"],
            json!(["Lockheed Martin", "Boeing"])
        );
        assert_eq!(
            payload["filters"]["award_amounts"],
            json!([
                {"lower_bound": 1000000.0},
                {"upper_bound": 500.0},
                {"lower_bound": 10.0, "upper_bound": 20.0}
            ])
        );
        assert_eq!(
            payload["filters"]["program_activities"],
            json!([{"name": "IT Spending", "code": "0001"}, {"code": "0002"}])
        );
        assert_eq!(payload["fields"], json!(["Award ID", "Award Amount"]));
        assert_eq!(payload["sort"], json!("Award Amount"));
        assert_eq!(payload["subawards"], json!(true));
        assert!(!contains_null(&payload));
    }

    #[test]
    fn amount_ranges_follow_documented_edge_cases() {
        let ranges = AwardAmount::parse_ranges("5-;nodash;-;-7").expect("valid");
        assert_eq!(
            ranges,
            vec![
                AwardAmount {
                    lower_bound: Some(5.0),
                    upper_bound: None
                },
                AwardAmount {
                    lower_bound: None,
                    upper_bound: Some(7.0)
                },
            ]
        );

        assert!(matches!(
            AwardAmount::parse_ranges("abc-10"),
            Err(ValidationError::InvalidNumber { .. })
        ));
        assert!(matches!(
            AwardAmount::parse_ranges("10-5"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn invalid_award_type_code_is_rejected() {
        let params = AwardSearchParams {
            award_type_codes: Some("A,ZZ".to_string()),
            ..base_params()
        };
        let err = AwardSearchRequest::from_params(&params, 100).expect_err("ZZ invalid");
        assert!(matches!(err, ValidationError::InvalidEnumValue { .. }));
    }

    #[test]
    fn missing_dates_are_reported() {
        let err = AwardSearchRequest::from_params(&AwardSearchParams::default(), 100)
            .expect_err("dates required");
        assert_eq!(err, ValidationError::MissingField("start_date"));
    }

    #[test]
    fn extra_fields_never_override_request_fields() {
        let mut extra = Map::new();
        extra.insert("spending_level".to_string(), json!("awards"));
        extra.insert("ignored".to_string(), Value::Null);
        extra.insert("limit".to_string(), json!(500));
        extra.insert("page".to_string(), json!(7));
        extra.insert("filters".to_string(), json!({}));

        let mut request = AwardSearchRequest::from_params(&base_params(), 100)
            .expect("valid")
            .with_extra(extra);
        request.set_page(2);
        let payload = request.to_api_payload();

        assert_eq!(payload["spending_level"], json!("awards"));
        assert_eq!(payload["limit"], json!(100));
        assert_eq!(payload["page"], json!(2));
        assert!(payload["filters"].get("time_period").is_some());
        assert!(payload.get("ignored").is_none());
    }
}
