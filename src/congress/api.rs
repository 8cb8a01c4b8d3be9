//! Typed operations over the Congress.gov v3 API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use super::errors::CongressApiError;
use super::fetch::Fetcher;
use super::models::{
    ApiBill, ApiCongress, ApiLegislationItem, ApiMember, ApiMemberDetail, DailyRecordEnvelope,
    MemberDetailEnvelope, TextVersionsEnvelope,
};
use super::pagination::{Walk, walk};

/// Bill-like listings that can be browsed a page at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Listing {
    Bill,
    Law,
}

impl Listing {
    pub fn as_str(self) -> &'static str {
        match self {
            Listing::Bill => "bill",
            Listing::Law => "law",
        }
    }
}

/// A member's legislative activity, counted per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Sponsored,
    Cosponsored,
}

impl Activity {
    fn path(self) -> &'static str {
        match self {
            Activity::Sponsored => "sponsored-legislation",
            Activity::Cosponsored => "cosponsored-legislation",
        }
    }

    fn field(self) -> &'static str {
        match self {
            Activity::Sponsored => "sponsoredLegislation",
            Activity::Cosponsored => "cosponsoredLegislation",
        }
    }
}

/// One page of a bill or law listing.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub items: Vec<Value>,
    pub count: Option<u64>,
}

/// Bill identity as it appears in upstream paths, e.g. `119/hr/1`.
#[derive(Debug, Clone, Copy)]
pub struct BillPath<'a> {
    pub session: i32,
    pub bill_type: &'a str,
    pub number: i32,
}

const UPSTREAM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub struct CongressApi {
    fetcher: Fetcher,
}

impl CongressApi {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// All sessions known to the upstream.
    pub async fn congresses(&self) -> Result<Walk<ApiCongress>, CongressApiError> {
        walk(&self.fetcher, self.fetcher.endpoint("congress")?, "congresses").await
    }

    /// The full member directory.
    pub async fn members(&self) -> Result<Walk<ApiMember>, CongressApiError> {
        walk(&self.fetcher, self.fetcher.endpoint("member")?, "members").await
    }

    pub async fn member_detail(&self, bioguide_id: &str) -> Result<ApiMemberDetail, CongressApiError> {
        let url = self.fetcher.endpoint(&format!("member/{bioguide_id}"))?;
        let envelope: MemberDetailEnvelope = self.fetcher.get_json(&url).await?;
        Ok(envelope.member)
    }

    /// Counts a member's sponsored or cosponsored items per session.
    ///
    /// A partial traversal would undercount, so anything short of a complete
    /// walk is reported as an error.
    pub async fn activity_counts(
        &self,
        bioguide_id: &str,
        activity: Activity,
    ) -> Result<BTreeMap<i32, u32>, CongressApiError> {
        let url = self
            .fetcher
            .endpoint(&format!("member/{bioguide_id}/{}", activity.path()))?;
        let walk: Walk<ApiLegislationItem> = walk(&self.fetcher, url, activity.field()).await?;
        if !walk.complete {
            return Err(CongressApiError::IncompleteWalk {
                url: format!("member/{bioguide_id}/{}", activity.path()),
                pages: walk.pages,
            });
        }

        let mut counts = BTreeMap::new();
        for item in walk.items {
            if let Some(session) = item.congress {
                *counts.entry(session).or_insert(0) += 1;
            }
        }
        debug!(bioguide_id, activity = activity.path(), sessions = counts.len(), "counted activity");
        Ok(counts)
    }

    /// Bills in `session` whose upstream record changed inside the window.
    pub async fn bills_updated(
        &self,
        session: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Walk<ApiBill>, CongressApiError> {
        let mut url = self.fetcher.endpoint(&format!("bill/{session}"))?;
        url.query_pairs_mut()
            .append_pair("fromDateTime", &from.format(UPSTREAM_TIME_FORMAT).to_string())
            .append_pair("toDateTime", &to.format(UPSTREAM_TIME_FORMAT).to_string())
            .append_pair("sort", "updateDate desc");
        walk(&self.fetcher, url, "bills").await
    }

    /// PDF link of the most recent text version, if the bill has text yet.
    pub async fn bill_text_pdf(&self, bill: BillPath<'_>) -> Result<Option<String>, CongressApiError> {
        let url = self.fetcher.endpoint(&format!(
            "bill/{}/{}/{}/text",
            bill.session, bill.bill_type, bill.number
        ))?;
        let envelope: TextVersionsEnvelope = self.fetcher.get_json(&url).await?;
        Ok(envelope.latest_pdf().map(str::to_string))
    }

    /// Issue date of the most recent daily Congressional Record.
    pub async fn latest_daily_issue(&self) -> Result<Option<NaiveDate>, CongressApiError> {
        let mut url = self.fetcher.endpoint("daily-congressional-record")?;
        url.query_pairs_mut().append_pair("limit", "1");
        let envelope: DailyRecordEnvelope = self.fetcher.get_json(&url).await?;
        Ok(envelope
            .daily_congressional_record
            .first()
            .and_then(|issue| issue.date()))
    }

    /// Digest PDF link for the record issued on `date`.
    pub async fn record_digest_pdf(&self, date: NaiveDate) -> Result<Option<String>, CongressApiError> {
        let mut url = self.fetcher.endpoint("congressional-record")?;
        url.query_pairs_mut()
            .append_pair("y", &date.format("%Y").to_string())
            .append_pair("m", &date.format("%-m").to_string())
            .append_pair("d", &date.format("%-d").to_string());
        let body: Value = self.fetcher.get_json(&url).await?;
        Ok(body
            .pointer("/Results/Issues/0/Links/Digest/PDF/0/Url")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Downloads a document referenced by the API.
    pub async fn document(&self, url: &str) -> Result<Vec<u8>, CongressApiError> {
        let url = Url::parse(url).map_err(|source| CongressApiError::InvalidEndpoint {
            path: url.to_string(),
            source,
        })?;
        self.fetcher.get_bytes(&url).await
    }

    /// A single page of a listing, used for browsing rather than ingestion.
    pub async fn listing_page(
        &self,
        listing: Listing,
        session: i32,
        offset: u64,
        limit: u32,
    ) -> Result<ListingPage, CongressApiError> {
        let mut url = self
            .fetcher
            .endpoint(&format!("{}/{session}", listing.as_str()))?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());

        let body: Value = self.fetcher.get_json(&url).await?;
        let items = body
            .get("bills")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let count = body.pointer("/pagination/count").and_then(Value::as_u64);
        Ok(ListingPage { items, count })
    }
}
