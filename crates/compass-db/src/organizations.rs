//! Organization catalog implementation.
//!
//! Read-mostly reference data. Classification code objects and enrichment
//! collections live in JSONB columns; a stored value whose shape no longer
//! matches the closed structs fails the read with a validation error rather
//! than leaking malformed data downstream.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use compass_core::{
    Error, NewOrganization, Organization, OrganizationCatalog, OrganizationEnrichment,
    OrganizationSearchFilters, Result,
};

use crate::catalog_filter::{CatalogFilterQueryBuilder, QueryParam};

/// Column list shared by every read path so `org_from_row` sees a
/// consistent row shape.
const ORG_COLUMNS: &str = "id, ein, name, sort_name, ico, street, city, state, zip, \
     group_exemption, subsection, classification, ruling, affiliation, deductibility, \
     foundation, activity_codes, organization_code, status, tax_period, asset_code, \
     income_code, filing_req_code, pf_filing_req_code, acct_period, asset_amt, \
     income_amt, revenue_amt, ntee_code, mission, tagline, why_support, \
     one_sentence_summary, unique_trait, target_audience, geographic_focus, keywords, \
     activities, social_media_urls, donation_url, email_addresses, logo_url, \
     website_url, confirmed_at, created_at_utc, updated_at_utc";

/// Predicate for the swipe-deck subset. Computed from the row, never a
/// stored flag, so enrichment updates change eligibility immediately.
const RECOMMENDABLE: &str =
    "website_url IS NOT NULL AND confirmed_at IS NOT NULL AND cardinality(keywords) > 0";

/// PostgreSQL implementation of OrganizationCatalog.
pub struct PgOrganizationCatalog {
    pool: Pool<Postgres>,
}

impl PgOrganizationCatalog {
    /// Create a new PgOrganizationCatalog with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn required_json<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<T> {
    let value: JsonValue = row.try_get(column).map_err(Error::Database)?;
    serde_json::from_value(value)
        .map_err(|e| Error::Validation(format!("stored {} is malformed: {}", column, e)))
}

fn optional_json<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<Option<T>> {
    let value: Option<JsonValue> = row.try_get(column).map_err(Error::Database)?;
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| Error::Validation(format!("stored {} is malformed: {}", column, e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<JsonValue> {
    serde_json::to_value(value).map_err(Error::from)
}

fn opt_to_json<T: Serialize>(value: &Option<T>) -> Result<Option<JsonValue>> {
    value.as_ref().map(serde_json::to_value).transpose().map_err(Error::from)
}

fn org_from_row(row: &PgRow) -> Result<Organization> {
    Ok(Organization {
        id: row.try_get("id").map_err(Error::Database)?,
        ein: row.try_get("ein").map_err(Error::Database)?,
        name: row.try_get("name").map_err(Error::Database)?,
        sort_name: row.try_get("sort_name").map_err(Error::Database)?,
        ico: row.try_get("ico").map_err(Error::Database)?,
        street: row.try_get("street").map_err(Error::Database)?,
        city: row.try_get("city").map_err(Error::Database)?,
        state: row.try_get("state").map_err(Error::Database)?,
        zip: row.try_get("zip").map_err(Error::Database)?,
        group_exemption: row.try_get("group_exemption").map_err(Error::Database)?,
        subsection: row.try_get("subsection").map_err(Error::Database)?,
        classification: row.try_get("classification").map_err(Error::Database)?,
        ruling: row.try_get("ruling").map_err(Error::Database)?,
        affiliation: required_json(row, "affiliation")?,
        deductibility: optional_json(row, "deductibility")?,
        foundation: optional_json(row, "foundation")?,
        activity_codes: required_json(row, "activity_codes")?,
        organization_code: optional_json(row, "organization_code")?,
        status: required_json(row, "status")?,
        tax_period: row.try_get("tax_period").map_err(Error::Database)?,
        asset_code: required_json(row, "asset_code")?,
        income_code: row.try_get("income_code").map_err(Error::Database)?,
        filing_req_code: required_json(row, "filing_req_code")?,
        pf_filing_req_code: optional_json(row, "pf_filing_req_code")?,
        acct_period: row.try_get("acct_period").map_err(Error::Database)?,
        asset_amt: row.try_get("asset_amt").map_err(Error::Database)?,
        income_amt: row.try_get("income_amt").map_err(Error::Database)?,
        revenue_amt: row.try_get("revenue_amt").map_err(Error::Database)?,
        ntee_code: optional_json(row, "ntee_code")?,
        mission: row.try_get("mission").map_err(Error::Database)?,
        tagline: row.try_get("tagline").map_err(Error::Database)?,
        why_support: row.try_get("why_support").map_err(Error::Database)?,
        one_sentence_summary: row
            .try_get("one_sentence_summary")
            .map_err(Error::Database)?,
        unique_trait: row.try_get("unique_trait").map_err(Error::Database)?,
        target_audience: row.try_get("target_audience").map_err(Error::Database)?,
        geographic_focus: row.try_get("geographic_focus").map_err(Error::Database)?,
        keywords: row.try_get("keywords").map_err(Error::Database)?,
        activities: required_json(row, "activities")?,
        social_media_urls: optional_json(row, "social_media_urls")?,
        donation_url: row.try_get("donation_url").map_err(Error::Database)?,
        email_addresses: row.try_get("email_addresses").map_err(Error::Database)?,
        logo_url: row.try_get("logo_url").map_err(Error::Database)?,
        website_url: row.try_get("website_url").map_err(Error::Database)?,
        confirmed_at: row.try_get("confirmed_at").map_err(Error::Database)?,
        created_at_utc: row.try_get("created_at_utc").map_err(Error::Database)?,
        updated_at_utc: row.try_get("updated_at_utc").map_err(Error::Database)?,
    })
}

#[async_trait]
impl OrganizationCatalog for PgOrganizationCatalog {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tax_exempt_organization WHERE id = $1",
            ORG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(org_from_row).transpose()
    }

    async fn get_by_ein(&self, ein: &str) -> Result<Option<Organization>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tax_exempt_organization WHERE ein = $1",
            ORG_COLUMNS
        ))
        .bind(ein)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(org_from_row).transpose()
    }

    async fn search(
        &self,
        filters: &OrganizationSearchFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Organization>> {
        let (where_clause, params) =
            CatalogFilterQueryBuilder::new(filters.clone(), 0).build();
        let sql = format!(
            "SELECT {} FROM tax_exempt_organization WHERE {} \
             ORDER BY name ASC LIMIT ${} OFFSET ${}",
            ORG_COLUMNS,
            where_clause,
            params.len() + 1,
            params.len() + 2,
        );

        let mut query = sqlx::query(&sql);
        for param in params {
            query = match param {
                QueryParam::String(s) => query.bind(s),
                QueryParam::Int(i) => query.bind(i),
            };
        }

        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(org_from_row).collect()
    }

    async fn get_recommended(&self, limit: i64) -> Result<Vec<Organization>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tax_exempt_organization WHERE {} ORDER BY name ASC LIMIT $1",
            ORG_COLUMNS, RECOMMENDABLE
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(org_from_row).collect()
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Organization>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM tax_exempt_organization WHERE id = ANY($1)",
            ORG_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(org_from_row).collect()
    }

    async fn insert(&self, org: NewOrganization) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tax_exempt_organization
                (id, ein, name, sort_name, ico, street, city, state, zip,
                 group_exemption, subsection, classification, ruling, affiliation,
                 deductibility, foundation, activity_codes, organization_code, status,
                 tax_period, asset_code, income_code, filing_req_code,
                 pf_filing_req_code, acct_period, asset_amt, income_amt, revenue_amt,
                 ntee_code, created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, $28, $29, $30, $30)
            "#,
        )
        .bind(id)
        .bind(&org.ein)
        .bind(&org.name)
        .bind(&org.sort_name)
        .bind(&org.ico)
        .bind(&org.street)
        .bind(&org.city)
        .bind(&org.state)
        .bind(&org.zip)
        .bind(&org.group_exemption)
        .bind(&org.subsection)
        .bind(&org.classification)
        .bind(&org.ruling)
        .bind(to_json(&org.affiliation)?)
        .bind(opt_to_json(&org.deductibility)?)
        .bind(opt_to_json(&org.foundation)?)
        .bind(to_json(&org.activity_codes)?)
        .bind(opt_to_json(&org.organization_code)?)
        .bind(to_json(&org.status)?)
        .bind(&org.tax_period)
        .bind(to_json(&org.asset_code)?)
        .bind(&org.income_code)
        .bind(to_json(&org.filing_req_code)?)
        .bind(opt_to_json(&org.pf_filing_req_code)?)
        .bind(&org.acct_period)
        .bind(org.asset_amt)
        .bind(org.income_amt)
        .bind(org.revenue_amt)
        .bind(opt_to_json(&org.ntee_code)?)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(e) => {
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false)
                {
                    Err(Error::Conflict(format!(
                        "organization with EIN {} already exists",
                        org.ein
                    )))
                } else {
                    Err(Error::Database(e))
                }
            }
        }
    }

    async fn update_enrichment(
        &self,
        ein: &str,
        enrichment: OrganizationEnrichment,
    ) -> Result<Option<Organization>> {
        let now = Utc::now();

        // NULL binds fall through COALESCE, leaving the stored value intact.
        let row = sqlx::query(&format!(
            r#"
            UPDATE tax_exempt_organization SET
                mission = COALESCE($2, mission),
                tagline = COALESCE($3, tagline),
                why_support = COALESCE($4, why_support),
                one_sentence_summary = COALESCE($5, one_sentence_summary),
                unique_trait = COALESCE($6, unique_trait),
                target_audience = COALESCE($7, target_audience),
                geographic_focus = COALESCE($8, geographic_focus),
                keywords = COALESCE($9, keywords),
                activities = COALESCE($10, activities),
                social_media_urls = COALESCE($11, social_media_urls),
                donation_url = COALESCE($12, donation_url),
                email_addresses = COALESCE($13, email_addresses),
                logo_url = COALESCE($14, logo_url),
                website_url = COALESCE($15, website_url),
                confirmed_at = COALESCE($16, confirmed_at),
                updated_at_utc = $17
            WHERE ein = $1
            RETURNING {}
            "#,
            ORG_COLUMNS
        ))
        .bind(ein)
        .bind(&enrichment.mission)
        .bind(&enrichment.tagline)
        .bind(&enrichment.why_support)
        .bind(&enrichment.one_sentence_summary)
        .bind(&enrichment.unique_trait)
        .bind(&enrichment.target_audience)
        .bind(&enrichment.geographic_focus)
        .bind(&enrichment.keywords)
        .bind(opt_to_json(&enrichment.activities)?)
        .bind(opt_to_json(&enrichment.social_media_urls)?)
        .bind(&enrichment.donation_url)
        .bind(&enrichment.email_addresses)
        .bind(&enrichment.logo_url)
        .bind(&enrichment.website_url)
        .bind(enrichment.confirmed_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(org_from_row).transpose()
    }

    async fn delete_by_ein(&self, ein: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tax_exempt_organization WHERE ein = $1")
            .bind(ein)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tax_exempt_organization")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.try_get("count").map_err(Error::Database)
    }
}
