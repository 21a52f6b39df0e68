//! # compass-core
//!
//! Core types, traits, and abstractions for Cause Compass.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other Cause Compass crates depend on: the validated preference
//! document, the organization catalog models, the store traits, anonymous
//! session identity, and the onboarding wizard state machine.

pub mod error;
pub mod logging;
pub mod models;
pub mod preferences;
pub mod session;
pub mod traits;
pub mod wizard;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::{
    Activity, ActivityCode, AffiliationCode, AssetCode, CodeDescription, FilingRequirementCode,
    NewOrganization, NteeCode, NteeMajorCode, Organization, OrganizationCode,
    OrganizationEnrichment, SocialMediaUrls,
};
pub use preferences::{
    parse_tags, CauseTag, ChangeScope, HelpMethod, LocationAnswer, OpenEndedReflection,
    Preferences, PreferencesPatch,
};
pub use session::{
    is_valid_session_id, new_session_id, HAS_PREFERENCES_COOKIE, SESSION_COOKIE,
    SESSION_COOKIE_MAX_AGE_SECS, SESSION_ID_LEN,
};
pub use traits::{
    LikedOrganizationRepository, OrganizationCatalog, OrganizationSearchFilters,
    PreferenceRepository,
};
pub use wizard::{OnboardingWizard, StepAnswer, StepKind, WizardStep};
