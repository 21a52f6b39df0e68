//! Recommendation and query facade over the session stores and the catalog.
//!
//! Thin by design: every method is one or two store calls with no caching
//! and no cross-call state. Handlers go through this layer instead of the
//! repositories so the trait seams stay mockable.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use compass_core::{
    LikedOrganizationRepository, Organization, OrganizationCatalog, PreferenceRepository,
    Preferences, Result,
};
use compass_db::{
    Database, PgLikedOrganizationRepository, PgOrganizationCatalog, PgPreferenceRepository,
};

/// Default deck size when the caller does not bound it.
pub const DEFAULT_DECK_LIMIT: i64 = 50;

/// Facade over the preference store, the liked set, and the catalog.
#[derive(Clone)]
pub struct CompassService {
    preferences: Arc<dyn PreferenceRepository>,
    likes: Arc<dyn LikedOrganizationRepository>,
    catalog: Arc<dyn OrganizationCatalog>,
}

impl CompassService {
    /// Create a service backed by the PostgreSQL repositories.
    pub fn new(db: &Database) -> Self {
        Self {
            preferences: Arc::new(PgPreferenceRepository::new(db.pool.clone())),
            likes: Arc::new(PgLikedOrganizationRepository::new(db.pool.clone())),
            catalog: Arc::new(PgOrganizationCatalog::new(db.pool.clone())),
        }
    }

    /// Create a service over arbitrary store implementations (tests).
    pub fn with_stores(
        preferences: Arc<dyn PreferenceRepository>,
        likes: Arc<dyn LikedOrganizationRepository>,
        catalog: Arc<dyn OrganizationCatalog>,
    ) -> Self {
        Self {
            preferences,
            likes,
            catalog,
        }
    }

    /// The swipe deck: the recommendable subset of the catalog, name-ordered.
    ///
    /// Preferences are read for future personalization but do not filter the
    /// deck yet; every session sees the same subset. The deck is finite and
    /// not restartable, cursor tracking is the caller's concern.
    pub async fn discover_deck(&self, session_id: &str, limit: i64) -> Result<Vec<Organization>> {
        let _prefs: Preferences = self.preferences.get(session_id).await?;
        let deck = self.catalog.get_recommended(limit).await?;
        debug!(
            subsystem = "service",
            component = "compass",
            op = "discover_deck",
            session_id = session_id,
            result_count = deck.len(),
            "built discover deck"
        );
        Ok(deck)
    }

    /// The session's liked organizations, resolved in insertion order.
    pub async fn my_causes(&self, session_id: &str) -> Result<Vec<Organization>> {
        let ids = self.likes.list(session_id).await?;
        let orgs = self.catalog.get_by_ids(&ids).await?;

        // Batch lookup gives no order guarantee; restore insertion order.
        let mut by_id: std::collections::HashMap<Uuid, Organization> =
            orgs.into_iter().map(|o| (o.id, o)).collect();
        Ok(ids.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }

    /// Record a like; a repeat like is a no-op. Returns the updated set.
    pub async fn like(&self, session_id: &str, organization_id: Uuid) -> Result<Vec<Uuid>> {
        self.likes.add(session_id, organization_id).await
    }

    /// Remove a like; a no-op when absent.
    pub async fn unlike(&self, session_id: &str, organization_id: Uuid) -> Result<()> {
        self.likes.remove(session_id, organization_id).await
    }

    /// The liked ids in insertion order.
    pub async fn liked_ids(&self, session_id: &str) -> Result<Vec<Uuid>> {
        self.likes.list(session_id).await
    }

    /// Clear the liked set.
    pub async fn clear_likes(&self, session_id: &str) -> Result<()> {
        self.likes.clear(session_id).await
    }

    /// Start over: delete the preference document and clear the liked set.
    /// Cookie expiry is the HTTP layer's job.
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        self.preferences.delete(session_id).await?;
        self.likes.clear(session_id).await?;
        debug!(
            subsystem = "service",
            component = "compass",
            op = "reset",
            session_id = session_id,
            "session reset"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    use compass_core::{
        AffiliationCode, AssetCode, CodeDescription, Error, FilingRequirementCode,
        NewOrganization, OrganizationEnrichment, OrganizationSearchFilters, PreferencesPatch,
    };

    fn org(name: &str, recommendable: bool) -> Organization {
        Organization {
            id: Uuid::new_v4(),
            ein: format!("00-{:07}", rand_suffix()),
            name: name.to_string(),
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
            asset_amt: None,
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
            keywords: if recommendable {
                vec!["water".to_string()]
            } else {
                vec![]
            },
            activities: vec![],
            social_media_urls: None,
            donation_url: None,
            email_addresses: vec![],
            logo_url: None,
            website_url: recommendable.then(|| "https://example.org".to_string()),
            confirmed_at: recommendable.then(Utc::now),
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
        }
    }

    fn rand_suffix() -> u32 {
        Uuid::new_v4().as_u128() as u32 % 10_000_000
    }

    #[derive(Default)]
    struct MemoryStores {
        prefs: Mutex<std::collections::HashMap<String, Preferences>>,
        likes: Mutex<Vec<(String, Uuid)>>,
        orgs: Mutex<Vec<Organization>>,
    }

    struct MemoryPrefs(Arc<MemoryStores>);
    struct MemoryLikes(Arc<MemoryStores>);
    struct MemoryCatalog(Arc<MemoryStores>);

    #[async_trait]
    impl PreferenceRepository for MemoryPrefs {
        async fn upsert(&self, session_id: &str, prefs: Preferences) -> Result<Preferences> {
            self.0
                .prefs
                .lock()
                .unwrap()
                .insert(session_id.to_string(), prefs.clone());
            Ok(prefs)
        }

        async fn get(&self, session_id: &str) -> Result<Preferences> {
            Ok(self
                .0
                .prefs
                .lock()
                .unwrap()
                .get(session_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn update_partial(
            &self,
            session_id: &str,
            patch: PreferencesPatch,
        ) -> Result<Preferences> {
            let mut prefs = self.get(session_id).await?;
            patch.apply(&mut prefs);
            self.upsert(session_id, prefs).await
        }

        async fn delete(&self, session_id: &str) -> Result<()> {
            self.0.prefs.lock().unwrap().remove(session_id);
            Ok(())
        }
    }

    #[async_trait]
    impl LikedOrganizationRepository for MemoryLikes {
        async fn add(&self, session_id: &str, organization_id: Uuid) -> Result<Vec<Uuid>> {
            let mut likes = self.0.likes.lock().unwrap();
            let pair = (session_id.to_string(), organization_id);
            if !likes.contains(&pair) {
                likes.push(pair);
            }
            Ok(likes
                .iter()
                .filter(|(s, _)| s == session_id)
                .map(|(_, id)| *id)
                .collect())
        }

        async fn remove(&self, session_id: &str, organization_id: Uuid) -> Result<()> {
            self.0
                .likes
                .lock()
                .unwrap()
                .retain(|(s, id)| !(s == session_id && *id == organization_id));
            Ok(())
        }

        async fn list(&self, session_id: &str) -> Result<Vec<Uuid>> {
            Ok(self
                .0
                .likes
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| s == session_id)
                .map(|(_, id)| *id)
                .collect())
        }

        async fn clear(&self, session_id: &str) -> Result<()> {
            self.0.likes.lock().unwrap().retain(|(s, _)| s != session_id);
            Ok(())
        }
    }

    #[async_trait]
    impl OrganizationCatalog for MemoryCatalog {
        async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>> {
            Ok(self
                .0
                .orgs
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == id)
                .cloned())
        }

        async fn get_by_ein(&self, ein: &str) -> Result<Option<Organization>> {
            Ok(self
                .0
                .orgs
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.ein == ein)
                .cloned())
        }

        async fn search(
            &self,
            _filters: &OrganizationSearchFilters,
            _limit: i64,
            _offset: i64,
        ) -> Result<Vec<Organization>> {
            Ok(self.0.orgs.lock().unwrap().clone())
        }

        async fn get_recommended(&self, limit: i64) -> Result<Vec<Organization>> {
            let mut orgs: Vec<Organization> = self
                .0
                .orgs
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.is_recommendable())
                .cloned()
                .collect();
            orgs.sort_by(|a, b| a.name.cmp(&b.name));
            orgs.truncate(limit as usize);
            Ok(orgs)
        }

        async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Organization>> {
            // Deliberately reversed to prove the facade restores insertion order
            let orgs = self.0.orgs.lock().unwrap();
            let mut found: Vec<Organization> = ids
                .iter()
                .filter_map(|id| orgs.iter().find(|o| o.id == *id).cloned())
                .collect();
            found.reverse();
            Ok(found)
        }

        async fn insert(&self, _org: NewOrganization) -> Result<Uuid> {
            Err(Error::Internal("not used in these tests".to_string()))
        }

        async fn update_enrichment(
            &self,
            _ein: &str,
            _enrichment: OrganizationEnrichment,
        ) -> Result<Option<Organization>> {
            Ok(None)
        }

        async fn delete_by_ein(&self, _ein: &str) -> Result<bool> {
            Ok(false)
        }

        async fn count(&self) -> Result<i64> {
            Ok(self.0.orgs.lock().unwrap().len() as i64)
        }
    }

    fn service_with(orgs: Vec<Organization>) -> (CompassService, Arc<MemoryStores>) {
        let stores = Arc::new(MemoryStores::default());
        *stores.orgs.lock().unwrap() = orgs;
        let service = CompassService::with_stores(
            Arc::new(MemoryPrefs(stores.clone())),
            Arc::new(MemoryLikes(stores.clone())),
            Arc::new(MemoryCatalog(stores.clone())),
        );
        (service, stores)
    }

    #[tokio::test]
    async fn test_discover_deck_is_recommendable_only() {
        let enriched = org("Enriched", true);
        let bare = org("Bare", false);
        let (service, _) = service_with(vec![bare, enriched.clone()]);

        let deck = service.discover_deck("s1", 10).await.unwrap();
        assert_eq!(deck.len(), 1);
        assert_eq!(deck[0].id, enriched.id);
    }

    #[tokio::test]
    async fn test_my_causes_preserves_insertion_order() {
        let a = org("Alpha", true);
        let b = org("Beta", true);
        let c = org("Gamma", false);
        let (service, _) = service_with(vec![a.clone(), b.clone(), c.clone()]);

        for o in [&c, &a, &b] {
            service.like("s1", o.id).await.unwrap();
        }

        let causes = service.my_causes("s1").await.unwrap();
        let ids: Vec<Uuid> = causes.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_like_twice_is_single_membership() {
        let target = org("Once", true);
        let (service, _) = service_with(vec![target.clone()]);

        service.like("s1", target.id).await.unwrap();
        let after = service.like("s1", target.id).await.unwrap();
        assert_eq!(after, vec![target.id]);

        service.unlike("s1", target.id).await.unwrap();
        assert!(service.liked_ids("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_both_stores() {
        let target = org("Gone", true);
        let (service, stores) = service_with(vec![target.clone()]);

        service.like("s1", target.id).await.unwrap();
        stores.prefs.lock().unwrap().insert(
            "s1".to_string(),
            Preferences {
                causes: vec![compass_core::CauseTag::Environment],
                ..Default::default()
            },
        );

        service.reset("s1").await.unwrap();

        assert!(service.liked_ids("s1").await.unwrap().is_empty());
        assert!(stores.prefs.lock().unwrap().get("s1").is_none());
    }
}
