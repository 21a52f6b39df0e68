//! Core traits for Cause Compass store abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewOrganization, Organization, OrganizationEnrichment};
use crate::preferences::{Preferences, PreferencesPatch};

// =============================================================================
// PREFERENCE STORE
// =============================================================================

/// Repository for the one-per-session preference document.
///
/// Absence of a document is not an error on any read path: `get` returns
/// the empty default and `delete` is idempotent.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Replace the whole document, creating it if absent. The write is a
    /// single atomic upsert; validation failures reject it entirely.
    async fn upsert(&self, session_id: &str, prefs: Preferences) -> Result<Preferences>;

    /// Fetch the stored document, or the empty default when none exists.
    async fn get(&self, session_id: &str) -> Result<Preferences>;

    /// Merge only the fields the patch names; everything else keeps its
    /// prior value. Creates the document when absent.
    async fn update_partial(&self, session_id: &str, patch: PreferencesPatch)
        -> Result<Preferences>;

    /// Remove the document. No error when it was already absent.
    async fn delete(&self, session_id: &str) -> Result<()>;
}

// =============================================================================
// LIKED-ORGANIZATION STORE
// =============================================================================

/// Repository for the per-session set of liked organization references.
///
/// (session, organization) pairs are unique; add and remove are idempotent
/// single atomic statements, so concurrent swipes commute.
#[async_trait]
pub trait LikedOrganizationRepository: Send + Sync {
    /// Insert into the set if absent; a repeat like is a no-op.
    /// Returns the updated set in insertion order.
    async fn add(&self, session_id: &str, organization_id: Uuid) -> Result<Vec<Uuid>>;

    /// Remove from the set; a no-op when absent.
    async fn remove(&self, session_id: &str, organization_id: Uuid) -> Result<()>;

    /// Members in insertion order.
    async fn list(&self, session_id: &str) -> Result<Vec<Uuid>>;

    /// Remove every member for the session (used by "start over").
    async fn clear(&self, session_id: &str) -> Result<()>;
}

// =============================================================================
// ORGANIZATION CATALOG
// =============================================================================

/// Conjunctive filters for catalog search. Every set field must match;
/// either financial bound may be given alone (both inclusive).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationSearchFilters {
    /// Case-insensitive substring match on the organization name.
    pub name: Option<String>,
    /// Exact EIN match.
    pub ein: Option<String>,
    /// Exact state match.
    pub state: Option<String>,
    /// Exact city match.
    pub city: Option<String>,
    /// NTEE code prefix match ("C" matches every environment code).
    pub ntee_prefix: Option<String>,
    /// Inclusive lower bound on asset amount.
    pub asset_amt_min: Option<i64>,
    /// Inclusive upper bound on asset amount.
    pub asset_amt_max: Option<i64>,
}

impl OrganizationSearchFilters {
    /// Whether no filter is set at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.ein.is_none()
            && self.state.is_none()
            && self.city.is_none()
            && self.ntee_prefix.is_none()
            && self.asset_amt_min.is_none()
            && self.asset_amt_max.is_none()
    }
}

/// The read-mostly nonprofit reference catalog, plus the ingestion-side
/// mutations the enrichment pipeline uses.
#[async_trait]
pub trait OrganizationCatalog: Send + Sync {
    /// Point lookup by catalog identifier. Absence is `None`, not an error.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>>;

    /// Point lookup by EIN. Absence is `None`, not an error.
    async fn get_by_ein(&self, ein: &str) -> Result<Option<Organization>>;

    /// Filtered page of the catalog, sorted by name ascending for
    /// deterministic paging.
    async fn search(
        &self,
        filters: &OrganizationSearchFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Organization>>;

    /// Organizations passing the recommendable predicate (website present,
    /// enrichment confirmed, keywords non-empty), sorted by name. The same
    /// predicate for every caller; no personalization.
    async fn get_recommended(&self, limit: i64) -> Result<Vec<Organization>>;

    /// Batch lookup in a single query. Empty input yields empty output
    /// without a round-trip.
    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Organization>>;

    /// Insert a new catalog record. A pre-existing EIN is a conflict,
    /// never a silent merge.
    async fn insert(&self, org: NewOrganization) -> Result<Uuid>;

    /// Apply enrichment fields to an existing record by EIN.
    /// Returns `None` when no record carries that EIN.
    async fn update_enrichment(
        &self,
        ein: &str,
        enrichment: OrganizationEnrichment,
    ) -> Result<Option<Organization>>;

    /// Delete by EIN. Returns whether a record was removed.
    async fn delete_by_ein(&self, ein: &str) -> Result<bool>;

    /// Total catalog size.
    async fn count(&self) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_are_empty() {
        assert!(OrganizationSearchFilters::default().is_empty());
    }

    #[test]
    fn test_single_bound_marks_filters_non_empty() {
        let filters = OrganizationSearchFilters {
            asset_amt_min: Some(1_000_000),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }
}
