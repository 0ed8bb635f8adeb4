use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ValidationError;
use crate::models::parse::{non_blank, parse_u32, split_list};

/// A closed set of string codes the upstream API accepts.
pub trait WireEnum: Sized + Copy + 'static {
    /// Field name reported in validation errors.
    const FIELD: &'static str;
    const VARIANTS: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.as_str() == value)
            .ok_or_else(|| ValidationError::invalid_enum(Self::FIELD, value, &Self::expected()))
    }

    fn expected() -> Vec<&'static str> {
        Self::VARIANTS.iter().map(|variant| variant.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AwardTypeCode {
    #[serde(rename = "A")]
    BpaCall,
    #[serde(rename = "B")]
    PurchaseOrder,
    #[serde(rename = "C")]
    DeliveryOrder,
    #[serde(rename = "D")]
    DefinitiveContract,
    #[serde(rename = "02")]
    BlockGrant,
    #[serde(rename = "03")]
    FormulaGrant,
    #[serde(rename = "04")]
    ProjectGrant,
    #[serde(rename = "05")]
    CooperativeAgreement,
    #[serde(rename = "06")]
    DirectPaymentSpecifiedUse,
    #[serde(rename = "10")]
    DirectPaymentUnrestricted,
    #[serde(rename = "07")]
    DirectLoan,
    #[serde(rename = "08")]
    GuaranteedLoan,
    #[serde(rename = "09")]
    Insurance,
    #[serde(rename = "11")]
    OtherFinancialAssistance,
    #[serde(rename = "-1")]
    Unknown,
    #[serde(rename = "IDV")]
    Idv,
}

impl WireEnum for AwardTypeCode {
    const FIELD: &'static str = "award_type_codes";
    const VARIANTS: &'static [Self] = &[
        Self::BpaCall,
        Self::PurchaseOrder,
        Self::DeliveryOrder,
        Self::DefinitiveContract,
        Self::BlockGrant,
        Self::FormulaGrant,
        Self::ProjectGrant,
        Self::CooperativeAgreement,
        Self::DirectPaymentSpecifiedUse,
        Self::DirectPaymentUnrestricted,
        Self::DirectLoan,
        Self::GuaranteedLoan,
        Self::Insurance,
        Self::OtherFinancialAssistance,
        Self::Unknown,
        Self::Idv,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::BpaCall => "A",
            Self::PurchaseOrder => "B",
            Self::DeliveryOrder => "C",
            Self::DefinitiveContract => "D",
            Self::BlockGrant => "02",
            Self::FormulaGrant => "03",
            Self::ProjectGrant => "04",
            Self::CooperativeAgreement => "05",
            Self::DirectPaymentSpecifiedUse => "06",
            Self::DirectPaymentUnrestricted => "10",
            Self::DirectLoan => "07",
            Self::GuaranteedLoan => "08",
            Self::Insurance => "09",
            Self::OtherFinancialAssistance => "11",
            Self::Unknown => "-1",
            Self::Idv => "IDV",
        }
    }
}

/// Parses a comma list of award type codes, rejecting the first unknown code.
pub fn parse_award_type_codes(raw: &str) -> Result<Vec<AwardTypeCode>, ValidationError> {
    split_list(raw)
        .iter()
        .map(|code| AwardTypeCode::parse(code))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgencyType {
    #[default]
    Awarding,
    Funding,
}

impl WireEnum for AgencyType {
    const FIELD: &'static str = "agency type";
    const VARIANTS: &'static [Self] = &[Self::Awarding, Self::Funding];

    fn as_str(self) -> &'static str {
        match self {
            Self::Awarding => "awarding",
            Self::Funding => "funding",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgencyTier {
    #[default]
    Toptier,
    Subtier,
}

impl WireEnum for AgencyTier {
    const FIELD: &'static str = "agency tier";
    const VARIANTS: &'static [Self] = &[Self::Toptier, Self::Subtier];

    fn as_str(self) -> &'static str {
        match self {
            Self::Toptier => "toptier",
            Self::Subtier => "subtier",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl WireEnum for SortOrder {
    const FIELD: &'static str = "order";
    const VARIANTS: &'static [Self] = &[Self::Asc, Self::Desc];

    fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePeriod {
    pub start_date: String,
    pub end_date: String,
}

impl TimePeriod {
    /// Validates both dates as `YYYY-MM-DD` and requires `start <= end`.
    pub fn new(start_date: &str, end_date: &str) -> Result<Self, ValidationError> {
        let start = parse_date("start_date", start_date)?;
        let end = parse_date("end_date", end_date)?;
        if start > end {
            return Err(ValidationError::out_of_range(
                "time_period",
                format!("start_date {start} is after end_date {end}"),
            ));
        }
        Ok(Self {
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
        })
    }

    /// Builds the single-element `time_period` list both search endpoints take.
    pub fn from_params(
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<Self>, ValidationError> {
        let start = non_blank(start_date).ok_or(ValidationError::MissingField("start_date"))?;
        let end = non_blank(end_date).ok_or(ValidationError::MissingField("end_date"))?;
        Ok(vec![Self::new(start, end)?])
    }
}

fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::format(field, format!("'{}' is not a YYYY-MM-DD date", raw.trim()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agency {
    pub name: String,
    #[serde(rename = "type")]
    pub agency_type: AgencyType,
    pub tier: AgencyTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_tier_name: Option<String>,
}

impl Agency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agency_type: AgencyType::default(),
            tier: AgencyTier::default(),
            top_tier_name: None,
        }
    }

    /// Parses `name`, `type:name`, `tier:top_tier_name:name` or
    /// `type:tier:top_tier_name:name`.
    ///
    /// Any other number of segments keeps the whole string as the name.
    pub fn parse(agency_str: &str) -> Result<Self, ValidationError> {
        let agency_str = agency_str.trim();
        let parts = agency_str.split(':').map(str::trim).collect::<Vec<_>>();

        let agency = match parts.as_slice() {
            [name] => Self::new(*name),
            [agency_type, name] => Self {
                agency_type: AgencyType::parse(agency_type)?,
                ..Self::new(*name)
            },
            [tier, top_tier_name, name] => Self {
                tier: AgencyTier::parse(tier)?,
                top_tier_name: optional_segment(top_tier_name),
                ..Self::new(*name)
            },
            [agency_type, tier, top_tier_name, name] => Self {
                agency_type: AgencyType::parse(agency_type)?,
                tier: AgencyTier::parse(tier)?,
                top_tier_name: optional_segment(top_tier_name),
                ..Self::new(*name)
            },
            _ => {
                tracing::debug!(
                    agency = agency_str,
                    segments = parts.len(),
                    "unrecognised agency grammar, using whole string as name"
                );
                Self::new(agency_str)
            }
        };

        if agency.name.is_empty() {
            return Err(ValidationError::format(
                "agencies",
                format!("agency '{agency_str}' has an empty name"),
            ));
        }
        Ok(agency)
    }

    /// Parses a comma-separated list of agency strings.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, ValidationError> {
        split_list(raw).iter().map(|token| Self::parse(token)).collect()
    }
}

fn optional_segment(segment: &str) -> Option<String> {
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub order: SortOrder,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 100,
            order: SortOrder::Desc,
        }
    }
}

impl Pagination {
    /// `page >= 1`, `1 <= limit <= max_limit`; the default limit is capped by
    /// `max_limit` as well.
    pub fn from_params(
        page: Option<&str>,
        limit: Option<&str>,
        order: Option<&str>,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let defaults = Self::default();

        let page = match non_blank(page) {
            Some(raw) => parse_u32("page", raw)?,
            None => defaults.page,
        };
        if page == 0 {
            return Err(ValidationError::out_of_range("page", "page must be >= 1"));
        }

        let limit = match non_blank(limit) {
            Some(raw) => parse_u32("limit", raw)?,
            None => defaults.limit.min(max_limit),
        };
        if limit == 0 || limit > max_limit {
            return Err(ValidationError::out_of_range(
                "limit",
                format!("limit must be between 1 and {max_limit}, got {limit}"),
            ));
        }

        let order = match non_blank(order) {
            Some(raw) => SortOrder::parse(raw)?,
            None => defaults.order,
        };

        Ok(Self { page, limit, order })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn agency_grammar_covers_all_segment_counts() {
        assert_eq!(
            Agency::parse("Department of Defense").expect("name only"),
            Agency::new("Department of Defense")
        );

        let funding = Agency::parse("funding:NASA").expect("type:name");
        assert_eq!(funding.agency_type, AgencyType::Funding);
        assert_eq!(funding.tier, AgencyTier::Toptier);
        assert_eq!(funding.name, "NASA");

        let subtier = Agency::parse("subtier:Department of Defense:Department of the Army")
            .expect("tier:top:name");
        assert_eq!(subtier.agency_type, AgencyType::Awarding);
        assert_eq!(subtier.tier, AgencyTier::Subtier);
        assert_eq!(subtier.top_tier_name.as_deref(), Some("Department of Defense"));
        assert_eq!(subtier.name, "Department of the Army");

        let full = Agency::parse("funding:subtier:Department of Energy:Office of Science")
            .expect("type:tier:top:name");
        assert_eq!(full.agency_type, AgencyType::Funding);
        assert_eq!(full.tier, AgencyTier::Subtier);
        assert_eq!(full.name, "Office of Science");
    }

    #[test]
    fn agency_with_too_many_segments_falls_back_to_name() {
        let agency = Agency::parse("a:b:c:d:e").expect("fallback never fails");
        assert_eq!(agency, Agency::new("a:b:c:d:e"));
    }

    #[test]
    fn agency_rejects_unknown_type_and_tier_tokens() {
        let err = Agency::parse("granting:NASA").expect_err("bad type");
        assert!(matches!(err, ValidationError::InvalidEnumValue { field: "agency type", .. }));

        let err = Agency::parse("awarding:middle:X:Y").expect_err("bad tier");
        assert!(matches!(err, ValidationError::InvalidEnumValue { field: "agency tier", .. }));

        assert!(Agency::parse("awarding:").is_err());
    }

    #[test]
    fn agency_serializes_without_absent_top_tier_name() {
        let value = serde_json::to_value(Agency::new("NASA")).expect("serialize");
        assert_eq!(
            value,
            json!({"name": "NASA", "type": "awarding", "tier": "toptier"})
        );
    }

    #[test]
    fn award_type_codes_validate_item_by_item() {
        let codes = parse_award_type_codes("A, 02,-1,IDV").expect("valid codes");
        assert_eq!(
            codes,
            vec![
                AwardTypeCode::BpaCall,
                AwardTypeCode::BlockGrant,
                AwardTypeCode::Unknown,
                AwardTypeCode::Idv
            ]
        );

        let err = parse_award_type_codes("A,Z").expect_err("Z is not a code");
        assert_eq!(
            err,
            ValidationError::InvalidEnumValue {
                field: "award_type_codes",
                value: "Z".to_string(),
                expected: AwardTypeCode::expected().join(", "),
            }
        );
    }

    #[test]
    fn time_period_requires_ordered_calendar_dates() {
        let period = TimePeriod::new("2023-10-01", "2024-09-30").expect("valid");
        assert_eq!(period.start_date, "2023-10-01");

        assert!(matches!(
            TimePeriod::new("2023-02-30", "2024-01-01"),
            Err(ValidationError::InvalidFormat { field: "start_date", .. })
        ));
        assert!(matches!(
            TimePeriod::new("2024-01-01", "01/02/2024"),
            Err(ValidationError::InvalidFormat { field: "end_date", .. })
        ));
        assert!(matches!(
            TimePeriod::new("2024-09-30", "2023-10-01"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(
            TimePeriod::from_params(None, Some("2024-01-01")),
            Err(ValidationError::MissingField("start_date"))
        );
    }

    #[test]
    fn pagination_enforces_bounds_and_order() {
        let defaults = Pagination::from_params(None, None, None, 100).expect("defaults");
        assert_eq!(defaults, Pagination::default());

        let custom = Pagination::from_params(Some("3"), Some("25"), Some("asc"), 100)
            .expect("custom");
        assert_eq!(
            custom,
            Pagination {
                page: 3,
                limit: 25,
                order: SortOrder::Asc
            }
        );

        assert!(Pagination::from_params(Some("0"), None, None, 100).is_err());
        assert!(Pagination::from_params(None, Some("101"), None, 100).is_err());
        assert!(Pagination::from_params(None, Some("ten"), None, 100).is_err());
        assert!(matches!(
            Pagination::from_params(None, None, Some("up"), 100),
            Err(ValidationError::InvalidEnumValue { field: "order", .. })
        ));
    }
}
