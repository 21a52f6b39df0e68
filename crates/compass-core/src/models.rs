//! Core data models for the Cause Compass organization catalog.
//!
//! The catalog entity mirrors the IRS exempt-organization record shape:
//! flat registry columns plus small fixed-shape classification code objects.
//! Code objects are closed structs — a stored document whose shape does not
//! match fails the read with a validation error instead of leaking malformed
//! data to rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CLASSIFICATION CODE TYPES
// =============================================================================

/// Affiliation code with its descriptive breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AffiliationCode {
    pub code: String,
    pub code_name: String,
    pub description: String,
}

/// Generic code + description pair (deductibility, foundation, status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeDescription {
    pub code: String,
    pub description: String,
}

/// IRS activity code with its category grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityCode {
    pub code: String,
    pub description: String,
    pub category: String,
}

/// Organization code (corporation, trust, association, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizationCode {
    pub code: String,
    #[serde(rename = "type")]
    pub org_type: String,
}

/// Asset code bracket with inclusive dollar bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetCode {
    pub code: String,
    pub lower_limit: i64,
    /// `None` for the open-ended top bracket.
    #[serde(default)]
    pub upper_limit: Option<i64>,
}

/// Filing requirement code with the IRS form it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilingRequirementCode {
    pub code: String,
    pub description: String,
    pub form_number: String,
}

/// NTEE major group (the letter prefix of the full code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NteeMajorCode {
    pub code: String,
    pub title: String,
    pub description: String,
}

/// Full NTEE classification embedding its major group record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NteeCode {
    pub code: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub major_code: NteeMajorCode,
}

// =============================================================================
// ENRICHMENT TYPES
// =============================================================================

/// A named activity the organization runs, from the enrichment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Activity {
    pub name: String,
    pub description: String,
}

/// Social and contact URLs discovered during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialMediaUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

// =============================================================================
// ORGANIZATION
// =============================================================================

/// A nonprofit organization record from the catalog.
///
/// Read-mostly reference data, not owned by any session. The EIN is unique
/// across the catalog; the `id` is the stable identifier liked lists point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,

    // Core registry info
    pub ein: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ico: Option<String>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_exemption: Option<String>,

    // Tax/legal classification
    pub subsection: String,
    pub classification: String,
    pub ruling: String,
    pub affiliation: AffiliationCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deductibility: Option<CodeDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundation: Option<CodeDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activity_codes: Vec<ActivityCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_code: Option<OrganizationCode>,
    pub status: CodeDescription,

    // Financial info
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_period: Option<String>,
    pub asset_code: AssetCode,
    pub income_code: String,
    pub filing_req_code: FilingRequirementCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pf_filing_req_code: Option<FilingRequirementCode>,
    pub acct_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_amt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_amt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_amt: Option<i64>,

    // NTEE classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntee_code: Option<NteeCode>,

    // Enrichment: descriptive fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_support: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_sentence_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_trait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<Activity>,

    // Enrichment: contact surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media_urls: Option<SocialMediaUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,

    /// When the external enrichment confirmation completed, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,

    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl Organization {
    /// The recommendable predicate: website present, enrichment confirmed,
    /// keywords non-empty. Computed, never a stored flag.
    pub fn is_recommendable(&self) -> bool {
        self.website_url.is_some() && self.confirmed_at.is_some() && !self.keywords.is_empty()
    }
}

/// Payload for inserting a catalog record (ingestion side).
///
/// Identical to [`Organization`] minus the generated id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrganization {
    pub ein: String,
    pub name: String,
    #[serde(default)]
    pub sort_name: Option<String>,
    #[serde(default)]
    pub ico: Option<String>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default)]
    pub group_exemption: Option<String>,
    pub subsection: String,
    pub classification: String,
    pub ruling: String,
    pub affiliation: AffiliationCode,
    #[serde(default)]
    pub deductibility: Option<CodeDescription>,
    #[serde(default)]
    pub foundation: Option<CodeDescription>,
    #[serde(default)]
    pub activity_codes: Vec<ActivityCode>,
    #[serde(default)]
    pub organization_code: Option<OrganizationCode>,
    pub status: CodeDescription,
    #[serde(default)]
    pub tax_period: Option<String>,
    pub asset_code: AssetCode,
    pub income_code: String,
    pub filing_req_code: FilingRequirementCode,
    #[serde(default)]
    pub pf_filing_req_code: Option<FilingRequirementCode>,
    pub acct_period: String,
    #[serde(default)]
    pub asset_amt: Option<i64>,
    #[serde(default)]
    pub income_amt: Option<i64>,
    #[serde(default)]
    pub revenue_amt: Option<i64>,
    #[serde(default)]
    pub ntee_code: Option<NteeCode>,
}

/// Enrichment fields applied to an existing catalog record by EIN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizationEnrichment {
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub why_support: Option<String>,
    #[serde(default)]
    pub one_sentence_summary: Option<String>,
    #[serde(default)]
    pub unique_trait: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub geographic_focus: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub activities: Option<Vec<Activity>>,
    #[serde(default)]
    pub social_media_urls: Option<SocialMediaUrls>,
    #[serde(default)]
    pub donation_url: Option<String>,
    #[serde(default)]
    pub email_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    /// Set when the confirmation crawl verified the organization.
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_org() -> Organization {
        Organization {
            id: Uuid::new_v4(),
            ein: "13-1628174".to_string(),
            name: "Test Charity".to_string(),
            sort_name: None,
            ico: None,
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
            group_exemption: None,
            subsection: "03".to_string(),
            classification: "1000".to_string(),
            ruling: "196712".to_string(),
            affiliation: AffiliationCode {
                code: "3".to_string(),
                code_name: "Independent".to_string(),
                description: "Independent organization".to_string(),
            },
            deductibility: None,
            foundation: None,
            activity_codes: vec![],
            organization_code: None,
            status: CodeDescription {
                code: "01".to_string(),
                description: "Unconditional exemption".to_string(),
            },
            tax_period: None,
            asset_code: AssetCode {
                code: "3".to_string(),
                lower_limit: 25_000,
                upper_limit: Some(100_000),
            },
            income_code: "3".to_string(),
            filing_req_code: FilingRequirementCode {
                code: "01".to_string(),
                description: "990 (all other)".to_string(),
                form_number: "990".to_string(),
            },
            pf_filing_req_code: None,
            acct_period: "12".to_string(),
            asset_amt: Some(50_000),
            income_amt: None,
            revenue_amt: None,
            ntee_code: None,
            mission: None,
            tagline: None,
            why_support: None,
            one_sentence_summary: None,
            unique_trait: None,
            target_audience: None,
            geographic_focus: None,
            keywords: vec![],
            activities: vec![],
            social_media_urls: None,
            donation_url: None,
            email_addresses: vec![],
            logo_url: None,
            website_url: None,
            confirmed_at: None,
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
        }
    }

    #[test]
    fn test_bare_registry_record_is_not_recommendable() {
        assert!(!minimal_org().is_recommendable());
    }

    #[test]
    fn test_recommendable_requires_all_three_conditions() {
        let mut org = minimal_org();
        org.website_url = Some("https://example.org".to_string());
        org.confirmed_at = Some(Utc::now());
        org.keywords = vec!["conservation".to_string()];
        assert!(org.is_recommendable());

        let mut no_site = org.clone();
        no_site.website_url = None;
        assert!(!no_site.is_recommendable());

        let mut unconfirmed = org.clone();
        unconfirmed.confirmed_at = None;
        assert!(!unconfirmed.is_recommendable());

        let mut no_keywords = org;
        no_keywords.keywords.clear();
        assert!(!no_keywords.is_recommendable());
    }

    #[test]
    fn test_organization_code_serde_rename() {
        let code = OrganizationCode {
            code: "1".to_string(),
            org_type: "Corporation".to_string(),
        };
        let json = serde_json::to_value(&code).unwrap();
        assert_eq!(json["type"], "Corporation");
    }

    #[test]
    fn test_ntee_code_shape_mismatch_rejected() {
        // Missing the embedded major_code record
        let malformed = serde_json::json!({
            "code": "C30",
            "title": "Natural Resources Conservation",
            "description": "..."
        });
        assert!(serde_json::from_value::<NteeCode>(malformed).is_err());

        // Unknown extra field
        let extra = serde_json::json!({
            "code": "C30",
            "title": "t",
            "description": "d",
            "major_code": {"code": "C", "title": "Environment", "description": "d"},
            "bogus": 1
        });
        assert!(serde_json::from_value::<NteeCode>(extra).is_err());
    }

    #[test]
    fn test_asset_code_open_top_bracket() {
        let json = serde_json::json!({"code": "9", "lower_limit": 50000000});
        let code: AssetCode = serde_json::from_value(json).unwrap();
        assert_eq!(code.upper_limit, None);
    }
}
