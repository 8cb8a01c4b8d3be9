//! Reference data: sessions, the member directory, and per-member enrichment.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::congress::models::{ApiCongress, ApiMember, ApiMemberDetail};
use crate::congress::{Activity, CongressApi};
use crate::data::Store;
use crate::data::models::{
    Chamber, MemberDetailRecord, MemberEnrichment, MemberRecord, MembershipRecord, Session,
};
use crate::ingest::fan_out::fan_out;
use crate::utils::fmt_duration;

static SESSION_NUMBER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\s*(\d+)").unwrap());

const UNKNOWN_PARTY: &str = "Unknown";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncCounts {
    pub seen: usize,
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub pending: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Maps an upstream `/congress` entry to a session.
///
/// The number comes from the leading digits of the name ("119th Congress");
/// dates run Jan 3 of the start year to Jan 3 after the end year.
pub fn session_from_api(congress: &ApiCongress) -> Option<Session> {
    let number: i32 = SESSION_NUMBER
        .captures(&congress.name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let start_year = congress.start_year?;
    let end_year = congress.end_year.unwrap_or(start_year + 1);
    Some(Session {
        number,
        start_date: NaiveDate::from_ymd_opt(start_year, 1, 3)?,
        end_date: NaiveDate::from_ymd_opt(end_year + 1, 1, 3)?,
    })
}

/// Pulls `/congress` and reconciles every session it lists.
#[tracing::instrument(skip_all)]
pub async fn sync_sessions(api: &CongressApi, store: &dyn Store) -> Result<SyncCounts> {
    let walk = api.congresses().await.context("failed to list sessions")?;
    let mut counts = SyncCounts {
        seen: walk.items.len(),
        skipped: walk.skipped,
        ..Default::default()
    };

    for congress in &walk.items {
        let Some(session) = session_from_api(congress) else {
            warn!(name = %congress.name, "session entry has no usable number or years");
            counts.skipped += 1;
            continue;
        };
        if store.reconcile_session(&session).await?.created {
            counts.created += 1;
        }
    }

    info!(
        seen = counts.seen,
        created = counts.created,
        skipped = counts.skipped,
        complete = walk.complete,
        "session sync completed"
    );
    Ok(counts)
}

/// Creates sessions 1 through the one sitting on `today` with derived dates.
/// Stored sessions are left as they are.
pub async fn seed_sessions(store: &dyn Store, today: NaiveDate) -> Result<SyncCounts> {
    let current = Session::number_for_date(today);
    let existing: Vec<i32> = store.sessions().await?.iter().map(|s| s.number).collect();

    let mut counts = SyncCounts::default();
    for number in 1..=current {
        counts.seen += 1;
        if existing.contains(&number) {
            continue;
        }
        store.reconcile_session(&Session::derived(number)).await?;
        counts.created += 1;
    }
    info!(current, created = counts.created, "sessions seeded");
    Ok(counts)
}

fn member_record(member: &ApiMember) -> MemberRecord {
    let depiction = member.depiction.clone().unwrap_or_default();
    MemberRecord {
        bioguide_id: member.bioguide_id.clone(),
        name: member.name.trim().to_string(),
        state: member.state.clone().unwrap_or_default(),
        image_url: depiction.image_url,
        image_attribution: depiction.attribution,
    }
}

/// Walks the member directory and reconciles each entry.
#[tracing::instrument(skip_all)]
pub async fn sync_members(api: &CongressApi, store: &dyn Store) -> Result<SyncCounts> {
    let start = Instant::now();
    let walk = api.members().await.context("failed to list members")?;
    let mut counts = SyncCounts {
        seen: walk.items.len(),
        skipped: walk.skipped,
        ..Default::default()
    };

    for member in &walk.items {
        if member.bioguide_id.trim().is_empty() {
            counts.skipped += 1;
            continue;
        }
        if store.reconcile_member(&member_record(member)).await?.created {
            counts.created += 1;
        }
    }

    if !walk.complete {
        warn!(pages = walk.pages, "member directory walk stopped early");
    }
    info!(
        seen = counts.seen,
        created = counts.created,
        skipped = counts.skipped,
        duration = fmt_duration(start.elapsed()),
        "member sync completed"
    );
    Ok(counts)
}

#[derive(Debug, Clone)]
struct PendingMember {
    id: i32,
    bioguide_id: String,
}

impl fmt::Display for PendingMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bioguide_id)
    }
}

/// Fetches details and activity for every member not yet fully processed,
/// `workers` at a time. Only members whose fetches all succeed are written.
#[tracing::instrument(skip_all, fields(workers = workers))]
pub async fn enrich_pending(
    api: &CongressApi,
    store: &dyn Store,
    workers: usize,
) -> Result<EnrichmentReport> {
    let pending: Vec<PendingMember> = store
        .members_pending_enrichment()
        .await?
        .into_iter()
        .map(|m| PendingMember {
            id: m.id,
            bioguide_id: m.bioguide_id,
        })
        .collect();

    if pending.is_empty() {
        debug!("no members pending enrichment");
        return Ok(EnrichmentReport::default());
    }

    let start = Instant::now();
    let total = pending.len();
    info!(pending = total, "enriching members");

    let outcome = fan_out(pending, workers, "member_enrichment", |member| async move {
        let enrichment = fetch_enrichment(api, &member.bioguide_id).await?;
        store.record_enrichment(member.id, &enrichment).await?;
        Ok(enrichment.memberships.len())
    })
    .await;

    let report = EnrichmentReport {
        pending: total,
        enriched: outcome.succeeded.len(),
        failed: outcome.failed.len(),
    };
    info!(
        enriched = report.enriched,
        failed = report.failed,
        duration = fmt_duration(start.elapsed()),
        "member enrichment completed"
    );
    Ok(report)
}

/// Detail, then sponsored counts, then cosponsored counts for one member.
async fn fetch_enrichment(api: &CongressApi, bioguide_id: &str) -> Result<MemberEnrichment> {
    let detail = api.member_detail(bioguide_id).await?;
    let sponsored = api.activity_counts(bioguide_id, Activity::Sponsored).await?;
    let cosponsored = api.activity_counts(bioguide_id, Activity::Cosponsored).await?;
    build_enrichment(&detail, &sponsored, &cosponsored)
}

/// Party in effect when a term began: the latest history entry starting on
/// or before `term_start`.
fn party_for_term(detail: &ApiMemberDetail, term_start: Option<i32>) -> String {
    let Some(term_start) = term_start else {
        return UNKNOWN_PARTY.to_string();
    };
    detail
        .party_history
        .iter()
        .filter_map(|p| p.start_year.filter(|&y| y <= term_start).map(|y| (y, p)))
        .max_by_key(|(y, _)| *y)
        .map(|(_, p)| p.party_name.clone())
        .unwrap_or_else(|| UNKNOWN_PARTY.to_string())
}

fn count_for(counts: &BTreeMap<i32, u32>, session: i32) -> i32 {
    counts
        .get(&session)
        .map(|&c| i32::try_from(c).unwrap_or(i32::MAX))
        .unwrap_or(0)
}

/// Turns one member's detail and activity counts into rows to record.
///
/// One membership per session; when two terms share a session the later one
/// in the list wins. A member without any usable term is malformed.
pub fn build_enrichment(
    detail: &ApiMemberDetail,
    sponsored: &BTreeMap<i32, u32>,
    cosponsored: &BTreeMap<i32, u32>,
) -> Result<MemberEnrichment> {
    if detail.terms.is_empty() {
        bail!("member {} has no terms", detail.bioguide_id);
    }

    let mut by_session: BTreeMap<i32, MembershipRecord> = BTreeMap::new();
    for term in &detail.terms {
        let Some(session) = term.congress else {
            continue;
        };
        let Some(chamber) = term.chamber.as_deref().and_then(Chamber::parse) else {
            debug!(bioguide_id = %detail.bioguide_id, session, "term has unknown chamber");
            continue;
        };

        let leadership_role = detail
            .leadership
            .iter()
            .find(|l| l.congress == Some(session))
            .and_then(|l| l.role.clone());

        by_session.insert(
            session,
            MembershipRecord {
                session_number: session,
                chamber,
                party: party_for_term(detail, term.start_year),
                district: match chamber {
                    Chamber::House => term.district,
                    Chamber::Senate => None,
                },
                leadership_role,
                start_year: term.start_year,
                end_year: term.end_year,
                sponsored_count: count_for(sponsored, session),
                cosponsored_count: count_for(cosponsored, session),
            },
        );
    }

    if by_session.is_empty() {
        bail!("member {} has no usable terms", detail.bioguide_id);
    }

    let address = detail.address_information.clone().unwrap_or_default();
    Ok(MemberEnrichment {
        detail: MemberDetailRecord {
            birth_year: detail.birth_year,
            website_url: detail.official_website_url.clone(),
            phone_number: address.phone_number,
            office_address: address.office_address,
            depiction_url: detail.depiction.as_ref().and_then(|d| d.image_url.clone()),
        },
        memberships: by_session.into_values().collect(),
    })
}
