//! Database operations for members, their details, and their memberships.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::data::models::{
    Member, MemberDetail, MemberEnrichment, MemberRecord, Membership, Reconciled, Session,
};
use crate::data::{PageWindow, sessions};

const MEMBER_COLUMNS: &str =
    "id, bioguide_id, name, state, image_url, image_attribution, fully_processed, last_updated";

#[derive(sqlx::FromRow)]
struct MemberRow {
    #[sqlx(flatten)]
    member: Member,
    created: bool,
}

/// Insert or update a member keyed on `bioguide_id`.
///
/// `last_updated` only advances when one of the directory fields changed.
pub async fn upsert(pool: &PgPool, record: &MemberRecord) -> Result<Reconciled<Member>> {
    let row = sqlx::query_as::<_, MemberRow>(
        r#"
        INSERT INTO members (bioguide_id, name, state, image_url, image_attribution)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (bioguide_id) DO UPDATE SET
            name = EXCLUDED.name,
            state = EXCLUDED.state,
            image_url = EXCLUDED.image_url,
            image_attribution = EXCLUDED.image_attribution,
            last_updated = CASE
                WHEN (members.name, members.state, members.image_url, members.image_attribution)
                     IS DISTINCT FROM
                     (EXCLUDED.name, EXCLUDED.state, EXCLUDED.image_url, EXCLUDED.image_attribution)
                THEN now()
                ELSE members.last_updated
            END
        RETURNING id, bioguide_id, name, state, image_url, image_attribution,
                  fully_processed, last_updated, (xmax = 0) AS created
        "#,
    )
    .bind(&record.bioguide_id)
    .bind(&record.name)
    .bind(&record.state)
    .bind(&record.image_url)
    .bind(&record.image_attribution)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert member {}", record.bioguide_id))?;

    Ok(Reconciled {
        entity: row.member,
        created: row.created,
    })
}

pub async fn get_by_bioguide(pool: &PgPool, bioguide_id: &str) -> Result<Option<Member>> {
    sqlx::query_as::<_, Member>(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members WHERE bioguide_id = $1"
    ))
    .bind(bioguide_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch member")
}

pub async fn pending_enrichment(pool: &PgPool) -> Result<Vec<Member>> {
    sqlx::query_as::<_, Member>(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members WHERE NOT fully_processed ORDER BY id"
    ))
    .fetch_all(pool)
    .await
    .context("failed to fetch members pending enrichment")
}

/// Write details and memberships in one transaction, then mark the member
/// fully processed. Counters only ever grow.
pub async fn record_enrichment(
    pool: &PgPool,
    member_id: i32,
    enrichment: &MemberEnrichment,
) -> Result<()> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let referenced: Vec<Session> = enrichment
        .memberships
        .iter()
        .map(|m| Session::derived(m.session_number))
        .collect();
    sessions::ensure_exist(&mut *tx, &referenced).await?;

    let detail = &enrichment.detail;
    sqlx::query(
        r#"
        INSERT INTO member_details
            (member_id, birth_year, website_url, phone_number, office_address, depiction_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (member_id) DO UPDATE SET
            birth_year = EXCLUDED.birth_year,
            website_url = EXCLUDED.website_url,
            phone_number = EXCLUDED.phone_number,
            office_address = EXCLUDED.office_address,
            depiction_url = EXCLUDED.depiction_url,
            updated_at = CASE
                WHEN (member_details.birth_year, member_details.website_url,
                      member_details.phone_number, member_details.office_address,
                      member_details.depiction_url)
                     IS DISTINCT FROM
                     (EXCLUDED.birth_year, EXCLUDED.website_url, EXCLUDED.phone_number,
                      EXCLUDED.office_address, EXCLUDED.depiction_url)
                THEN now()
                ELSE member_details.updated_at
            END
        "#,
    )
    .bind(member_id)
    .bind(detail.birth_year)
    .bind(&detail.website_url)
    .bind(&detail.phone_number)
    .bind(&detail.office_address)
    .bind(&detail.depiction_url)
    .execute(&mut *tx)
    .await
    .context("failed to upsert member details")?;

    if !enrichment.memberships.is_empty() {
        let memberships = &enrichment.memberships;
        let session_numbers: Vec<i32> = memberships.iter().map(|m| m.session_number).collect();
        let chambers: Vec<&str> = memberships.iter().map(|m| m.chamber.as_str()).collect();
        let parties: Vec<&str> = memberships.iter().map(|m| m.party.as_str()).collect();
        let districts: Vec<Option<i32>> = memberships.iter().map(|m| m.district).collect();
        let roles: Vec<Option<&str>> = memberships
            .iter()
            .map(|m| m.leadership_role.as_deref())
            .collect();
        let start_years: Vec<Option<i32>> = memberships.iter().map(|m| m.start_year).collect();
        let end_years: Vec<Option<i32>> = memberships.iter().map(|m| m.end_year).collect();
        let sponsored: Vec<i32> = memberships.iter().map(|m| m.sponsored_count).collect();
        let cosponsored: Vec<i32> = memberships.iter().map(|m| m.cosponsored_count).collect();

        sqlx::query(
            r#"
            INSERT INTO memberships
                (member_id, session_number, chamber, party, district, leadership_role,
                 start_year, end_year, sponsored_count, cosponsored_count)
            SELECT $1, v.*
            FROM UNNEST($2::int4[], $3::text[], $4::text[], $5::int4[], $6::text[],
                        $7::int4[], $8::int4[], $9::int4[], $10::int4[])
                AS v(session_number, chamber, party, district, leadership_role,
                     start_year, end_year, sponsored_count, cosponsored_count)
            ON CONFLICT (member_id, session_number) DO UPDATE SET
                chamber = EXCLUDED.chamber,
                party = EXCLUDED.party,
                district = EXCLUDED.district,
                leadership_role = EXCLUDED.leadership_role,
                start_year = EXCLUDED.start_year,
                end_year = EXCLUDED.end_year,
                sponsored_count = GREATEST(memberships.sponsored_count, EXCLUDED.sponsored_count),
                cosponsored_count = GREATEST(memberships.cosponsored_count, EXCLUDED.cosponsored_count)
            "#,
        )
        .bind(member_id)
        .bind(&session_numbers)
        .bind(&chambers)
        .bind(&parties)
        .bind(&districts)
        .bind(&roles)
        .bind(&start_years)
        .bind(&end_years)
        .bind(&sponsored)
        .bind(&cosponsored)
        .execute(&mut *tx)
        .await
        .context("failed to upsert memberships")?;
    }

    sqlx::query("UPDATE members SET fully_processed = TRUE WHERE id = $1")
        .bind(member_id)
        .execute(&mut *tx)
        .await
        .context("failed to mark member processed")?;

    tx.commit().await.context("failed to commit enrichment")?;
    Ok(())
}

pub async fn get_detail(pool: &PgPool, member_id: i32) -> Result<Option<MemberDetail>> {
    sqlx::query_as::<_, MemberDetail>(
        r#"
        SELECT member_id, birth_year, website_url, phone_number, office_address,
               depiction_url, updated_at
        FROM member_details WHERE member_id = $1
        "#,
    )
    .bind(member_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch member details")
}

pub async fn get_memberships(pool: &PgPool, member_id: i32) -> Result<Vec<Membership>> {
    sqlx::query_as::<_, Membership>(
        r#"
        SELECT member_id, session_number, chamber, party, district, leadership_role,
               start_year, end_year, sponsored_count, cosponsored_count
        FROM memberships WHERE member_id = $1
        ORDER BY session_number DESC
        "#,
    )
    .bind(member_id)
    .fetch_all(pool)
    .await
    .context("failed to fetch memberships")
}

pub async fn clear_incomplete(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE members SET fully_processed = FALSE
        WHERE fully_processed
          AND id IN (
              SELECT member_id FROM memberships
              WHERE sponsored_count = 0 OR cosponsored_count = 0
          )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to clear incomplete members")?;
    Ok(result.rows_affected())
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    12
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberSort {
    /// Most recently serving first.
    #[default]
    Recent,
    Name,
    State,
}

impl MemberSort {
    fn order_by(self) -> &'static str {
        match self {
            MemberSort::Recent => "latest.session_number DESC NULLS LAST, m.name",
            MemberSort::Name => "m.name, m.state",
            MemberSort::State => "m.state, m.name",
        }
    }
}

/// Query parameters for `GET /api/members`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListParams {
    pub search: Option<String>,
    pub state: Option<String>,
    pub chamber: Option<String>,
    pub party: Option<String>,
    #[serde(default)]
    pub sort: MemberSort,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

/// A member plus their most recent membership, for directory listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub bioguide_id: String,
    pub name: String,
    pub state: String,
    pub image_url: Option<String>,
    pub chamber: Option<String>,
    pub party: Option<String>,
    pub district: Option<i32>,
    pub latest_session: Option<i32>,
    #[serde(skip)]
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListResponse {
    pub members: Vec<MemberSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

pub async fn list(pool: &PgPool, params: &MemberListParams) -> Result<MemberListResponse> {
    let window = PageWindow::new(params.page, params.per_page);
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let sql = format!(
        r#"
        SELECT m.bioguide_id, m.name, m.state, m.image_url,
               latest.chamber, latest.party, latest.district,
               latest.session_number AS latest_session,
               COUNT(*) OVER () AS total_count
        FROM members m
        LEFT JOIN LATERAL (
            SELECT chamber, party, district, session_number
            FROM memberships ms
            WHERE ms.member_id = m.id
            ORDER BY ms.session_number DESC
            LIMIT 1
        ) latest ON TRUE
        WHERE ($1::text IS NULL OR m.name ILIKE '%' || $1 || '%' OR m.state ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR m.state ILIKE $2)
          AND ($3::text IS NULL OR latest.chamber ILIKE $3)
          AND ($4::text IS NULL OR latest.party ILIKE $4 || '%')
        ORDER BY {order_by}
        LIMIT $5 OFFSET $6
        "#,
        order_by = params.sort.order_by()
    );
    let rows = sqlx::query_as::<_, MemberSummary>(&sql)
        .bind(search)
        .bind(params.state.as_deref())
        .bind(params.chamber.as_deref())
        .bind(params.party.as_deref())
        .bind(window.per_page)
        .bind(window.offset)
        .fetch_all(pool)
        .await
        .context("failed to list members")?;

    let total = rows.first().map_or(0, |r| r.total_count);
    Ok(MemberListResponse {
        members: rows,
        total,
        page: window.page,
        per_page: window.per_page,
    })
}

/// Full member profile for `GET /api/members/{bioguide_id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    #[serde(flatten)]
    pub member: Member,
    pub detail: Option<MemberDetail>,
    pub memberships: Vec<Membership>,
}

pub async fn profile(pool: &PgPool, bioguide_id: &str) -> Result<Option<MemberProfile>> {
    let Some(member) = get_by_bioguide(pool, bioguide_id).await? else {
        return Ok(None);
    };
    let (detail, memberships) = tokio::try_join!(
        get_detail(pool, member.id),
        get_memberships(pool, member.id)
    )?;
    Ok(Some(MemberProfile {
        member,
        detail,
        memberships,
    }))
}
