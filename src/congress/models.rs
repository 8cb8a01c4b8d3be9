//! Wire shapes for the Congress.gov v3 API.
//!
//! Only the fields the ingestion pipeline reads are modelled. Numeric fields
//! that the upstream sometimes renders as strings go through [`lenient_i32`].

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

/// Accepts `119`, `"119"`, or `null`.
pub fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => i32::try_from(n).map(Some).map_err(serde::de::Error::custom),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Entry of `GET /congress`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCongress {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub start_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Depiction {
    pub image_url: Option<String>,
    pub attribution: Option<String>,
}

/// Entry of `GET /member`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMember {
    pub bioguide_id: String,
    pub name: String,
    pub state: Option<String>,
    pub depiction: Option<Depiction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberDetailEnvelope {
    pub member: ApiMemberDetail,
}

/// Body of `GET /member/{bioguideId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMemberDetail {
    pub bioguide_id: String,
    #[serde(default)]
    pub terms: Vec<ApiTerm>,
    #[serde(default)]
    pub party_history: Vec<ApiPartyEntry>,
    #[serde(default)]
    pub leadership: Vec<ApiLeadership>,
    pub address_information: Option<AddressInformation>,
    pub official_website_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub birth_year: Option<i32>,
    pub depiction: Option<Depiction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTerm {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub congress: Option<i32>,
    pub chamber: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub start_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub end_year: Option<i32>,
    pub state_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub district: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPartyEntry {
    pub party_name: String,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub start_year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLeadership {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub congress: Option<i32>,
    #[serde(rename = "type")]
    pub role: Option<String>,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInformation {
    pub office_address: Option<String>,
    pub phone_number: Option<String>,
}

/// Entry of `sponsored-legislation` / `cosponsored-legislation`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiLegislationItem {
    #[serde(default, deserialize_with = "lenient_i32")]
    pub congress: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestAction {
    pub action_date: Option<NaiveDate>,
    pub text: Option<String>,
}

/// Entry of `GET /bill/{congress}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBill {
    #[serde(deserialize_with = "lenient_i32")]
    pub congress: Option<i32>,
    #[serde(rename = "type")]
    pub bill_type: String,
    #[serde(deserialize_with = "lenient_i32")]
    pub number: Option<i32>,
    pub title: Option<String>,
    pub origin_chamber: Option<String>,
    pub latest_action: Option<LatestAction>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextVersionsEnvelope {
    #[serde(default)]
    pub text_versions: Vec<ApiTextVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiTextVersion {
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub formats: Vec<ApiTextFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiTextFormat {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl TextVersionsEnvelope {
    /// PDF link of the first listed text version, which upstream orders newest first.
    pub fn latest_pdf(&self) -> Option<&str> {
        self.text_versions
            .first()?
            .formats
            .iter()
            .find(|f| f.kind.eq_ignore_ascii_case("pdf"))
            .map(|f| f.url.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecordEnvelope {
    #[serde(default)]
    pub daily_congressional_record: Vec<ApiDailyIssue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDailyIssue {
    /// ISO timestamp such as `2025-07-30T04:00:00Z`.
    pub issue_date: String,
}

impl ApiDailyIssue {
    pub fn date(&self) -> Option<NaiveDate> {
        let day = self.issue_date.split('T').next()?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}
