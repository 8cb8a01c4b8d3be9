//! In-process [`Store`] with the same reconcile semantics as the Postgres
//! one. Used by one-off runs without a database and by tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::data::models::{
    Bill, BillKey, BillRecord, DailyRecord, DailyRecordInput, Member, MemberDetail,
    MemberEnrichment, MemberRecord, Membership, Reconciled, Session,
};
use crate::data::store::Store;

#[derive(Default)]
struct Inner {
    sessions: BTreeMap<i32, Session>,
    members: HashMap<String, Member>,
    next_member_id: i32,
    details: HashMap<i32, MemberDetail>,
    memberships: BTreeMap<(i32, i32), Membership>,
    bills: BTreeMap<BillKey, Bill>,
    next_bill_id: i32,
    records: BTreeMap<NaiveDate, DailyRecord>,
    kv: HashMap<String, (String, Option<DateTime<Utc>>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    pub async fn membership_count(&self) -> usize {
        self.inner.lock().await.memberships.len()
    }

    pub async fn bill_count(&self) -> usize {
        self.inner.lock().await.bills.len()
    }

    pub async fn all_members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.inner.lock().await.members.values().cloned().collect();
        members.sort_by_key(|m| m.id);
        members
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn reconcile_session(&self, session: &Session) -> Result<Reconciled<Session>> {
        let mut inner = self.inner.lock().await;
        let created = inner.sessions.insert(session.number, session.clone()).is_none();
        Ok(Reconciled {
            entity: session.clone(),
            created,
        })
    }

    async fn sessions(&self) -> Result<Vec<Session>> {
        Ok(self.inner.lock().await.sessions.values().rev().cloned().collect())
    }

    async fn reconcile_member(&self, record: &MemberRecord) -> Result<Reconciled<Member>> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.members.get_mut(&record.bioguide_id) {
            if !existing.matches(record) {
                existing.name = record.name.clone();
                existing.state = record.state.clone();
                existing.image_url = record.image_url.clone();
                existing.image_attribution = record.image_attribution.clone();
                existing.last_updated = Utc::now();
            }
            return Ok(Reconciled {
                entity: existing.clone(),
                created: false,
            });
        }

        inner.next_member_id += 1;
        let member = Member {
            id: inner.next_member_id,
            bioguide_id: record.bioguide_id.clone(),
            name: record.name.clone(),
            state: record.state.clone(),
            image_url: record.image_url.clone(),
            image_attribution: record.image_attribution.clone(),
            fully_processed: false,
            last_updated: Utc::now(),
        };
        inner.members.insert(record.bioguide_id.clone(), member.clone());
        Ok(Reconciled {
            entity: member,
            created: true,
        })
    }

    async fn member(&self, bioguide_id: &str) -> Result<Option<Member>> {
        Ok(self.inner.lock().await.members.get(bioguide_id).cloned())
    }

    async fn members_pending_enrichment(&self) -> Result<Vec<Member>> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<Member> = inner
            .members
            .values()
            .filter(|m| !m.fully_processed)
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.id);
        Ok(pending)
    }

    async fn record_enrichment(&self, member_id: i32, enrichment: &MemberEnrichment) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.members.values().any(|m| m.id == member_id) {
            return Err(anyhow!("member {member_id} does not exist"));
        }

        for membership in &enrichment.memberships {
            inner
                .sessions
                .entry(membership.session_number)
                .or_insert_with(|| Session::derived(membership.session_number));
        }

        let detail = &enrichment.detail;
        let now = Utc::now();
        let updated_at = match inner.details.get(&member_id) {
            Some(existing)
                if existing.birth_year == detail.birth_year
                    && existing.website_url == detail.website_url
                    && existing.phone_number == detail.phone_number
                    && existing.office_address == detail.office_address
                    && existing.depiction_url == detail.depiction_url =>
            {
                existing.updated_at
            }
            _ => now,
        };
        inner.details.insert(
            member_id,
            MemberDetail {
                member_id,
                birth_year: detail.birth_year,
                website_url: detail.website_url.clone(),
                phone_number: detail.phone_number.clone(),
                office_address: detail.office_address.clone(),
                depiction_url: detail.depiction_url.clone(),
                updated_at,
            },
        );

        for record in &enrichment.memberships {
            let key = (member_id, record.session_number);
            let (sponsored, cosponsored) = inner
                .memberships
                .get(&key)
                .map(|m| (m.sponsored_count, m.cosponsored_count))
                .unwrap_or((0, 0));
            inner.memberships.insert(
                key,
                Membership {
                    member_id,
                    session_number: record.session_number,
                    chamber: record.chamber.as_str().to_string(),
                    party: record.party.clone(),
                    district: record.district,
                    leadership_role: record.leadership_role.clone(),
                    start_year: record.start_year,
                    end_year: record.end_year,
                    sponsored_count: sponsored.max(record.sponsored_count),
                    cosponsored_count: cosponsored.max(record.cosponsored_count),
                },
            );
        }

        if let Some(member) = inner.members.values_mut().find(|m| m.id == member_id) {
            member.fully_processed = true;
        }
        Ok(())
    }

    async fn member_detail(&self, member_id: i32) -> Result<Option<MemberDetail>> {
        Ok(self.inner.lock().await.details.get(&member_id).cloned())
    }

    async fn memberships(&self, member_id: i32) -> Result<Vec<Membership>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .memberships
            .range((member_id, i32::MIN)..=(member_id, i32::MAX))
            .rev()
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn clear_incomplete_members(&self) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let incomplete: Vec<i32> = inner
            .memberships
            .values()
            .filter(|m| m.sponsored_count == 0 || m.cosponsored_count == 0)
            .map(|m| m.member_id)
            .collect();

        let mut cleared = 0;
        for member in inner.members.values_mut() {
            if member.fully_processed && incomplete.contains(&member.id) {
                member.fully_processed = false;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn find_bill(&self, key: &BillKey) -> Result<Option<Bill>> {
        Ok(self.inner.lock().await.bills.get(key).cloned())
    }

    async fn reconcile_bill(&self, record: &BillRecord) -> Result<Reconciled<Bill>> {
        let mut inner = self.inner.lock().await;
        let session = record.key.session_number;
        inner
            .sessions
            .entry(session)
            .or_insert_with(|| Session::derived(session));

        if let Some(existing) = inner.bills.get_mut(&record.key) {
            if !existing.matches(record) {
                apply_bill(existing, record);
                existing.updated_at = Utc::now();
            }
            return Ok(Reconciled {
                entity: existing.clone(),
                created: false,
            });
        }

        inner.next_bill_id += 1;
        let mut bill = Bill {
            id: inner.next_bill_id,
            session_number: record.key.session_number,
            bill_type: record.key.bill_type.clone(),
            number: record.key.number,
            title: None,
            origin_chamber: None,
            latest_action_date: None,
            latest_action_text: None,
            url: None,
            full_text_url: None,
            summary: None,
            tags: Vec::new(),
            updated_at: Utc::now(),
        };
        apply_bill(&mut bill, record);
        inner.bills.insert(record.key.clone(), bill.clone());
        Ok(Reconciled {
            entity: bill,
            created: true,
        })
    }

    async fn recent_bills(&self, limit: i64) -> Result<Vec<Bill>> {
        let inner = self.inner.lock().await;
        let mut bills: Vec<Bill> = inner.bills.values().cloned().collect();
        // Newest action first, undated last, then newest row.
        bills.sort_by(|a, b| {
            b.latest_action_date
                .cmp(&a.latest_action_date)
                .then(b.id.cmp(&a.id))
        });
        bills.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(bills)
    }

    async fn daily_record(&self, issue_date: NaiveDate) -> Result<Option<DailyRecord>> {
        Ok(self.inner.lock().await.records.get(&issue_date).cloned())
    }

    async fn insert_daily_record(&self, input: &DailyRecordInput) -> Result<Reconciled<DailyRecord>> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.records.get(&input.issue_date) {
            return Ok(Reconciled {
                entity: existing.clone(),
                created: false,
            });
        }
        let record = DailyRecord {
            issue_date: input.issue_date,
            summary: input.summary.clone(),
            pdf_url: input.pdf_url.clone(),
            created_at: Utc::now(),
        };
        inner.records.insert(input.issue_date, record.clone());
        Ok(Reconciled {
            entity: record,
            created: true,
        })
    }

    async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.kv.get(key).and_then(|(value, expires_at)| match expires_at {
            Some(at) if *at <= Utc::now() => None,
            _ => Some(value.clone()),
        }))
    }

    async fn kv_set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);
        self.inner
            .lock()
            .await
            .kv
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}

fn apply_bill(bill: &mut Bill, record: &BillRecord) {
    bill.title = record.title.clone();
    bill.origin_chamber = record.origin_chamber.clone();
    bill.latest_action_date = record.latest_action_date;
    bill.latest_action_text = record.latest_action_text.clone();
    bill.url = record.url.clone();
    bill.full_text_url = record.full_text_url.clone();
    bill.summary = record.summary.clone();
    bill.tags = record.tags.clone();
}
