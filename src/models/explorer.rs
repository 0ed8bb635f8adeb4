//! Spending Explorer requests.
//!
//! The three general types (`budget_function`, `agency`, `object_class`) are
//! entry points that only take a fiscal year and quarter. The remaining types
//! drill down and accept any combination of grouping identifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::models::common::WireEnum;
use crate::models::parse::{lenient_string, non_blank, to_wire};

pub const SPENDING_EXPLORER_ENDPOINT: &str = "spending/";

/// Spending Explorer data is not published before this fiscal year.
pub const FIRST_FISCAL_YEAR: u32 = 2017;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorerType {
    BudgetFunction,
    Agency,
    ObjectClass,
    FederalAccount,
    Recipient,
    Award,
    BudgetSubfunction,
    ProgramActivity,
}

impl ExplorerType {
    pub fn is_general(self) -> bool {
        matches!(self, Self::BudgetFunction | Self::Agency | Self::ObjectClass)
    }
}

impl WireEnum for ExplorerType {
    const FIELD: &'static str = "type";
    const VARIANTS: &'static [Self] = &[
        Self::BudgetFunction,
        Self::Agency,
        Self::ObjectClass,
        Self::FederalAccount,
        Self::Recipient,
        Self::Award,
        Self::BudgetSubfunction,
        Self::ProgramActivity,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::BudgetFunction => "budget_function",
            Self::Agency => "agency",
            Self::ObjectClass => "object_class",
            Self::FederalAccount => "federal_account",
            Self::Recipient => "recipient",
            Self::Award => "award",
            Self::BudgetSubfunction => "budget_subfunction",
            Self::ProgramActivity => "program_activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quarter {
    #[serde(rename = "1")]
    Q1,
    #[serde(rename = "2")]
    Q2,
    #[serde(rename = "3")]
    Q3,
    #[serde(rename = "4")]
    Q4,
}

impl WireEnum for Quarter {
    const FIELD: &'static str = "quarter";
    const VARIANTS: &'static [Self] = &[Self::Q1, Self::Q2, Self::Q3, Self::Q4];

    fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "1",
            Self::Q2 => "2",
            Self::Q3 => "3",
            Self::Q4 => "4",
        }
    }
}

/// Fiscal month, 1 (October) through 12 (September).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    #[serde(rename = "1")]
    P1,
    #[serde(rename = "2")]
    P2,
    #[serde(rename = "3")]
    P3,
    #[serde(rename = "4")]
    P4,
    #[serde(rename = "5")]
    P5,
    #[serde(rename = "6")]
    P6,
    #[serde(rename = "7")]
    P7,
    #[serde(rename = "8")]
    P8,
    #[serde(rename = "9")]
    P9,
    #[serde(rename = "10")]
    P10,
    #[serde(rename = "11")]
    P11,
    #[serde(rename = "12")]
    P12,
}

impl WireEnum for Period {
    const FIELD: &'static str = "period";
    const VARIANTS: &'static [Self] = &[
        Self::P1,
        Self::P2,
        Self::P3,
        Self::P4,
        Self::P5,
        Self::P6,
        Self::P7,
        Self::P8,
        Self::P9,
        Self::P10,
        Self::P11,
        Self::P12,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "1",
            Self::P2 => "2",
            Self::P3 => "3",
            Self::P4 => "4",
            Self::P5 => "5",
            Self::P6 => "6",
            Self::P7 => "7",
            Self::P8 => "8",
            Self::P9 => "9",
            Self::P10 => "10",
            Self::P11 => "11",
            Self::P12 => "12",
        }
    }
}

/// Validates a 4-digit fiscal year no earlier than [`FIRST_FISCAL_YEAR`].
pub fn parse_fiscal_year(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::format(
            field,
            format!("'{value}' is not a 4-digit fiscal year"),
        ));
    }
    let year = value
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        })?;
    if year < FIRST_FISCAL_YEAR {
        return Err(ValidationError::out_of_range(
            field,
            format!("data not available prior to FY {FIRST_FISCAL_YEAR}, got {year}"),
        ));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralFilter {
    pub fy: String,
    pub quarter: Quarter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailedFilter {
    pub fy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<Quarter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federal_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_subfunction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_activity: Option<String>,
}

impl DetailedFilter {
    fn drill_down_fields(&self) -> Vec<&'static str> {
        [
            ("agency", &self.agency),
            ("federal_account", &self.federal_account),
            ("object_class", &self.object_class),
            ("budget_function", &self.budget_function),
            ("budget_subfunction", &self.budget_subfunction),
            ("recipient", &self.recipient),
            ("program_activity", &self.program_activity),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_some())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExplorerFilter {
    General(GeneralFilter),
    Detailed(DetailedFilter),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpendingExplorerParams {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub explorer_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fy: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quarter: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub agency: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub federal_account: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub object_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub budget_function: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub budget_subfunction: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recipient: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub program_activity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpendingExplorerRequest {
    #[serde(rename = "type")]
    pub explorer_type: ExplorerType,
    pub filters: ExplorerFilter,
}

impl SpendingExplorerRequest {
    pub fn from_params(params: &SpendingExplorerParams) -> Result<Self, ValidationError> {
        let explorer_type = non_blank(params.explorer_type.as_deref())
            .ok_or(ValidationError::MissingField("type"))
            .and_then(ExplorerType::parse)?;
        let fy = non_blank(params.fy.as_deref())
            .ok_or(ValidationError::MissingField("fy"))
            .and_then(|raw| parse_fiscal_year("fy", raw))?;

        let quarter = non_blank(params.quarter.as_deref())
            .map(Quarter::parse)
            .transpose()?;
        let period = non_blank(params.period.as_deref())
            .map(Period::parse)
            .transpose()?;
        if quarter.is_some() && period.is_some() {
            return Err(ValidationError::format(
                "period",
                "specify either quarter or period, not both",
            ));
        }

        let text = |raw: &Option<String>| non_blank(raw.as_deref()).map(ToString::to_string);
        let detailed = DetailedFilter {
            fy,
            quarter,
            period,
            agency: text(&params.agency),
            federal_account: text(&params.federal_account),
            object_class: text(&params.object_class),
            budget_function: text(&params.budget_function),
            budget_subfunction: text(&params.budget_subfunction),
            recipient: text(&params.recipient),
            program_activity: text(&params.program_activity),
        };

        let filters = if explorer_type.is_general() {
            let Some(quarter) = detailed.quarter else {
                return Err(ValidationError::MissingField("quarter"));
            };
            if detailed.period.is_some() {
                return Err(ValidationError::format(
                    "period",
                    format!("type '{}' takes a quarter, not a period", explorer_type.as_str()),
                ));
            }
            let drill_down = detailed.drill_down_fields();
            if !drill_down.is_empty() {
                return Err(ValidationError::format(
                    "filters",
                    format!(
                        "type '{}' does not accept drill-down filters: {}",
                        explorer_type.as_str(),
                        drill_down.join(", ")
                    ),
                ));
            }
            ExplorerFilter::General(GeneralFilter {
                fy: detailed.fy,
                quarter,
            })
        } else {
            ExplorerFilter::Detailed(detailed)
        };

        Ok(Self {
            explorer_type,
            filters,
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

    fn params(explorer_type: &str, fy: &str) -> SpendingExplorerParams {
        SpendingExplorerParams {
            explorer_type: Some(explorer_type.to_string()),
            fy: Some(fy.to_string()),
            ..SpendingExplorerParams::default()
        }
    }

    #[test]
    fn general_type_requires_quarter() {
        let err = SpendingExplorerRequest::from_params(&params("agency", "2024"))
            .expect_err("quarter required");
        assert_eq!(err, ValidationError::MissingField("quarter"));

        let ok = SpendingExplorerRequest::from_params(&SpendingExplorerParams {
            quarter: Some("4".to_string()),
            ..params("agency", "2024")
        })
        .expect("valid");
        assert_eq!(
            ok.to_api_payload(),
            json!({"type": "agency", "filters": {"fy": "2024", "quarter": "4"}})
        );
    }

    #[test]
    fn detailed_type_allows_missing_quarter() {
        let request = SpendingExplorerRequest::from_params(&SpendingExplorerParams {
            recipient: Some("abc-123".to_string()),
            ..params("recipient", "2023")
        })
        .expect("valid");

        assert!(matches!(request.filters, ExplorerFilter::Detailed(_)));
        assert_eq!(
            request.to_api_payload(),
            json!({"type": "recipient", "filters": {"fy": "2023", "recipient": "abc-123"}})
        );
    }

    #[test]
    fn detailed_type_carries_drill_down_identifiers() {
        let request = SpendingExplorerRequest::from_params(&SpendingExplorerParams {
            period: Some("12".to_string()),
            agency: Some("012".to_string()),
            federal_account: Some("1234".to_string()),
            ..params("federal_account", "2024")
        })
        .expect("valid");

        assert_eq!(
            request.to_api_payload(),
            json!({
                "type": "federal_account",
                "filters": {
                    "fy": "2024",
                    "period": "12",
                    "agency": "012",
                    "federal_account": "1234"
                }
            })
        );
    }

    #[test]
    fn fiscal_year_floor_and_shape() {
        assert!(matches!(
            SpendingExplorerRequest::from_params(&params("award", "2016")),
            Err(ValidationError::OutOfRange { field: "fy", .. })
        ));
        assert!(matches!(
            SpendingExplorerRequest::from_params(&params("award", "24")),
            Err(ValidationError::InvalidFormat { field: "fy", .. })
        ));
        assert!(matches!(
            SpendingExplorerRequest::from_params(&params("award", "FY24")),
            Err(ValidationError::InvalidFormat { field: "fy", .. })
        ));
        assert!(SpendingExplorerRequest::from_params(&params("award", "2017")).is_ok());
    }

    #[test]
    fn quarter_period_conflicts_and_ranges() {
        let both = SpendingExplorerParams {
            quarter: Some("1".to_string()),
            period: Some("3".to_string()),
            ..params("award", "2024")
        };
        assert!(SpendingExplorerRequest::from_params(&both).is_err());

        let bad_quarter = SpendingExplorerParams {
            quarter: Some("5".to_string()),
            ..params("award", "2024")
        };
        assert!(matches!(
            SpendingExplorerRequest::from_params(&bad_quarter),
            Err(ValidationError::InvalidEnumValue { field: "quarter", .. })
        ));

        let bad_period = SpendingExplorerParams {
            period: Some("13".to_string()),
            ..params("award", "2024")
        };
        assert!(matches!(
            SpendingExplorerRequest::from_params(&bad_period),
            Err(ValidationError::InvalidEnumValue { field: "period", .. })
        ));
    }

    #[test]
    fn general_type_rejects_drill_down_filters() {
        let request = SpendingExplorerParams {
            quarter: Some("2".to_string()),
            agency: Some("012".to_string()),
            ..params("budget_function", "2024")
        };
        let err = SpendingExplorerRequest::from_params(&request).expect_err("general only");
        assert!(err.to_string().contains("agency"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            SpendingExplorerRequest::from_params(&params("department", "2024")),
            Err(ValidationError::InvalidEnumValue { field: "type", .. })
        ));
    }
}
