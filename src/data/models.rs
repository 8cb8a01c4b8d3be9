//! Persisted entities and the inputs used to reconcile them.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// First session convened in 1789; each one lasts two years.
const FIRST_SESSION_YEAR: i32 = 1789;

/// A numbered Congress and the dates it sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub number: i32,
    pub start_date: NaiveDate,
    /// Exclusive: the next session starts on this date.
    pub end_date: NaiveDate,
}

impl Session {
    /// Dates derived from the session number alone: Jan 3 of
    /// `1789 + 2(n-1)` through Jan 3 two years later.
    pub fn derived(number: i32) -> Self {
        let start_year = FIRST_SESSION_YEAR + 2 * (number - 1);
        Self {
            number,
            start_date: january_third(start_year),
            end_date: january_third(start_year + 2),
        }
    }

    /// Number of the session sitting on `date`.
    pub fn number_for_date(date: NaiveDate) -> i32 {
        let year = date.year();
        let mut start_year = year - (year - FIRST_SESSION_YEAR).rem_euclid(2);
        if date < january_third(start_year) {
            start_year -= 2;
        }
        ((start_year - FIRST_SESSION_YEAR) / 2 + 1).max(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date < self.end_date
    }
}

fn january_third(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 3).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn as_str(self) -> &'static str {
        match self {
            Chamber::House => "House",
            Chamber::Senate => "Senate",
        }
    }

    /// Accepts upstream spellings such as "House of Representatives".
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.starts_with("house") {
            Some(Chamber::House)
        } else if lowered.starts_with("senate") {
            Some(Chamber::Senate)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Member {
    pub id: i32,
    pub bioguide_id: String,
    pub name: String,
    pub state: String,
    pub image_url: Option<String>,
    pub image_attribution: Option<String>,
    /// True once details and every membership have been recorded.
    pub fully_processed: bool,
    pub last_updated: DateTime<Utc>,
}

/// Directory-level member fields as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub bioguide_id: String,
    pub name: String,
    pub state: String,
    pub image_url: Option<String>,
    pub image_attribution: Option<String>,
}

impl Member {
    pub fn matches(&self, record: &MemberRecord) -> bool {
        self.name == record.name
            && self.state == record.state
            && self.image_url == record.image_url
            && self.image_attribution == record.image_attribution
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Membership {
    pub member_id: i32,
    pub session_number: i32,
    pub chamber: String,
    pub party: String,
    pub district: Option<i32>,
    pub leadership_role: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub sponsored_count: i32,
    pub cosponsored_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub session_number: i32,
    pub chamber: Chamber,
    pub party: String,
    pub district: Option<i32>,
    pub leadership_role: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub sponsored_count: i32,
    pub cosponsored_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MemberDetail {
    pub member_id: i32,
    pub birth_year: Option<i32>,
    pub website_url: Option<String>,
    pub phone_number: Option<String>,
    pub office_address: Option<String>,
    pub depiction_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDetailRecord {
    pub birth_year: Option<i32>,
    pub website_url: Option<String>,
    pub phone_number: Option<String>,
    pub office_address: Option<String>,
    pub depiction_url: Option<String>,
}

/// Everything learned about a member from one successful detail fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEnrichment {
    pub detail: MemberDetailRecord,
    pub memberships: Vec<MembershipRecord>,
}

/// Natural key of a bill: `(session, type, number)`, type lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BillKey {
    pub session_number: i32,
    pub bill_type: String,
    pub number: i32,
}

impl BillKey {
    pub fn new(session_number: i32, bill_type: &str, number: i32) -> Self {
        Self {
            session_number,
            bill_type: bill_type.trim().to_ascii_lowercase(),
            number,
        }
    }
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", self.bill_type, self.number, self.session_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bill {
    pub id: i32,
    pub session_number: i32,
    pub bill_type: String,
    pub number: i32,
    pub title: Option<String>,
    pub origin_chamber: Option<String>,
    pub latest_action_date: Option<NaiveDate>,
    pub latest_action_text: Option<String>,
    pub url: Option<String>,
    /// Document the current summary was generated from.
    pub full_text_url: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    pub fn key(&self) -> BillKey {
        BillKey::new(self.session_number, &self.bill_type, self.number)
    }

    pub fn matches(&self, record: &BillRecord) -> bool {
        self.title == record.title
            && self.origin_chamber == record.origin_chamber
            && self.latest_action_date == record.latest_action_date
            && self.latest_action_text == record.latest_action_text
            && self.url == record.url
            && self.full_text_url == record.full_text_url
            && self.summary == record.summary
            && self.tags == record.tags
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillRecord {
    pub key: BillKey,
    pub title: Option<String>,
    pub origin_chamber: Option<String>,
    pub latest_action_date: Option<NaiveDate>,
    pub latest_action_text: Option<String>,
    pub url: Option<String>,
    pub full_text_url: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyRecord {
    pub issue_date: NaiveDate,
    pub summary: Option<String>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRecordInput {
    pub issue_date: NaiveDate,
    pub summary: Option<String>,
    pub pdf_url: Option<String>,
}

/// Result of an upsert: the stored row and whether it was newly inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled<T> {
    pub entity: T,
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_derived_session_dates() {
        let first = Session::derived(1);
        assert_eq!(first.start_date, date(1789, 1, 3));
        assert_eq!(first.end_date, date(1791, 1, 3));

        let current = Session::derived(119);
        assert_eq!(current.start_date, date(2025, 1, 3));
        assert_eq!(current.end_date, date(2027, 1, 3));
    }

    #[test]
    fn test_number_for_date() {
        assert_eq!(Session::number_for_date(date(2025, 1, 3)), 119);
        assert_eq!(Session::number_for_date(date(2026, 10, 17)), 119);
        assert_eq!(Session::number_for_date(date(2025, 1, 2)), 118);
        assert_eq!(Session::number_for_date(date(2027, 1, 3)), 120);
        assert_eq!(Session::number_for_date(date(1789, 6, 1)), 1);
        assert_eq!(Session::number_for_date(date(1700, 1, 1)), 1);
    }

    #[test]
    fn test_derived_session_contains_its_dates() {
        for n in [1, 73, 118, 119] {
            let session = Session::derived(n);
            assert!(session.contains(session.start_date));
            assert!(!session.contains(session.end_date));
            assert_eq!(Session::number_for_date(session.start_date), n);
        }
    }

    #[test]
    fn test_chamber_parse() {
        assert_eq!(Chamber::parse("House of Representatives"), Some(Chamber::House));
        assert_eq!(Chamber::parse("Senate"), Some(Chamber::Senate));
        assert_eq!(Chamber::parse("Joint"), None);
    }

    #[test]
    fn test_bill_key_normalizes_type() {
        let key = BillKey::new(119, " HR ", 1);
        assert_eq!(key.bill_type, "hr");
        assert_eq!(key.to_string(), "hr1-119");
    }
}
