use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::models::common::{Pagination, WireEnum};
use crate::models::parse::{lenient_string, non_blank, to_wire};

pub const RECIPIENT_SEARCH_ENDPOINT: &str = "recipient/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientAwardType {
    #[default]
    All,
    Contracts,
    Grants,
    Loans,
    DirectPayments,
    OtherFinancialAssistance,
}

impl WireEnum for RecipientAwardType {
    const FIELD: &'static str = "award_type";
    const VARIANTS: &'static [Self] = &[
        Self::All,
        Self::Contracts,
        Self::Grants,
        Self::Loans,
        Self::DirectPayments,
        Self::OtherFinancialAssistance,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Contracts => "contracts",
            Self::Grants => "grants",
            Self::Loans => "loans",
            Self::DirectPayments => "direct_payments",
            Self::OtherFinancialAssistance => "other_financial_assistance",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientSort {
    #[default]
    Amount,
    Name,
    Duns,
}

impl WireEnum for RecipientSort {
    const FIELD: &'static str = "sort";
    const VARIANTS: &'static [Self] = &[Self::Amount, Self::Name, Self::Duns];

    fn as_str(self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Name => "name",
            Self::Duns => "duns",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientSearchParams {
    #[serde(default, deserialize_with = "lenient_string")]
    pub keyword: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub award_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sort: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub limit: Option<String>,
}

/// Recipients with spending in the trailing twelve months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub award_type: RecipientAwardType,
    pub sort: RecipientSort,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl RecipientSearchRequest {
    pub fn from_params(
        params: &RecipientSearchParams,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let award_type = match non_blank(params.award_type.as_deref()) {
            Some(raw) => RecipientAwardType::parse(raw)?,
            None => RecipientAwardType::default(),
        };
        let sort = match non_blank(params.sort.as_deref()) {
            Some(raw) => RecipientSort::parse(raw)?,
            None => RecipientSort::default(),
        };

        Ok(Self {
            keyword: non_blank(params.keyword.as_deref()).map(ToString::to_string),
            award_type,
            sort,
            pagination: Pagination::from_params(
                params.page.as_deref(),
                params.limit.as_deref(),
                params.order.as_deref(),
                max_limit,
            )?,
        })
    }

    pub fn to_api_payload(&self) -> Value {
        to_wire(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_produce_minimal_payload() {
        let payload = RecipientSearchRequest::from_params(&RecipientSearchParams::default(), 100)
            .expect("defaults are valid")
            .to_api_payload();

        assert_eq!(
            payload,
            json!({
                "award_type": "all",
                "sort": "amount",
                "order": "desc",
                "page": 1,
                "limit": 100
            })
        );
    }

    #[test]
    fn keyword_and_enumerations_are_carried() {
        let params = RecipientSearchParams {
            keyword: Some(" Boeing ".to_string()),
            award_type: Some("direct_payments".to_string()),
            sort: Some("name".to_string()),
            order: Some("asc".to_string()),
            limit: Some("10".to_string()),
            ..RecipientSearchParams::default()
        };
        let payload = RecipientSearchRequest::from_params(&params, 100)
            .expect("valid")
            .to_api_payload();

        assert_eq!(payload["keyword"], json!("Boeing"));
        assert_eq!(payload["award_type"], json!("direct_payments"));
        assert_eq!(payload["sort"], json!("name"));
        assert_eq!(payload["order"], json!("asc"));
        assert_eq!(payload["limit"], json!(10));
    }

    #[test]
    fn invalid_enumerations_are_rejected() {
        let bad_type = RecipientSearchParams {
            award_type: Some("subsidies".to_string()),
            ..RecipientSearchParams::default()
        };
        assert!(matches!(
            RecipientSearchRequest::from_params(&bad_type, 100),
            Err(ValidationError::InvalidEnumValue { field: "award_type", .. })
        ));

        let bad_sort = RecipientSearchParams {
            sort: Some("uei".to_string()),
            ..RecipientSearchParams::default()
        };
        assert!(matches!(
            RecipientSearchRequest::from_params(&bad_sort, 100),
            Err(ValidationError::InvalidEnumValue { field: "sort", .. })
        ));

        let bad_order = RecipientSearchParams {
            order: Some("sideways".to_string()),
            ..RecipientSearchParams::default()
        };
        assert!(matches!(
            RecipientSearchRequest::from_params(&bad_order, 100),
            Err(ValidationError::InvalidEnumValue { field: "order", .. })
        ));
    }
}
