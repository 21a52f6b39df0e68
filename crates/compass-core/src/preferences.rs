//! User preference document and its validated field enums.
//!
//! The preference document is a closed shape: every tag field is a fixed
//! enumeration and unknown values are rejected at the boundary rather than
//! passed through to storage. Absence of a document is valid and is modeled
//! as [`Preferences::default`], never as an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Cause categories selectable during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CauseTag {
    Environment,
    Education,
    Health,
    Poverty,
    Rights,
    Arts,
    Animals,
    Disaster,
    MentalHealth,
    Food,
    Technology,
    Community,
}

impl CauseTag {
    /// All recognized cause tags, in onboarding display order.
    pub const ALL: [CauseTag; 12] = [
        CauseTag::Environment,
        CauseTag::Education,
        CauseTag::Health,
        CauseTag::Poverty,
        CauseTag::Rights,
        CauseTag::Arts,
        CauseTag::Animals,
        CauseTag::Disaster,
        CauseTag::MentalHealth,
        CauseTag::Food,
        CauseTag::Technology,
        CauseTag::Community,
    ];

    /// Wire/storage representation of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            CauseTag::Environment => "environment",
            CauseTag::Education => "education",
            CauseTag::Health => "health",
            CauseTag::Poverty => "poverty",
            CauseTag::Rights => "rights",
            CauseTag::Arts => "arts",
            CauseTag::Animals => "animals",
            CauseTag::Disaster => "disaster",
            CauseTag::MentalHealth => "mental-health",
            CauseTag::Food => "food",
            CauseTag::Technology => "technology",
            CauseTag::Community => "community",
        }
    }
}

impl fmt::Display for CauseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CauseTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unrecognized cause tag: {}", s)))
    }
}

/// Ways a user prefers to help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpMethod {
    Donating,
    Volunteering,
    Sharing,
    Connecting,
    Learning,
}

impl HelpMethod {
    /// All recognized help methods.
    pub const ALL: [HelpMethod; 5] = [
        HelpMethod::Donating,
        HelpMethod::Volunteering,
        HelpMethod::Sharing,
        HelpMethod::Connecting,
        HelpMethod::Learning,
    ];

    /// Wire/storage representation of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HelpMethod::Donating => "donating",
            HelpMethod::Volunteering => "volunteering",
            HelpMethod::Sharing => "sharing",
            HelpMethod::Connecting => "connecting",
            HelpMethod::Learning => "learning",
        }
    }
}

impl fmt::Display for HelpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HelpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unrecognized help method: {}", s)))
    }
}

/// Where the user wants change to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeScope {
    Local,
    National,
    Global,
}

impl ChangeScope {
    /// Wire/storage representation of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeScope::Local => "local",
            ChangeScope::National => "national",
            ChangeScope::Global => "global",
        }
    }
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(ChangeScope::Local),
            "national" => Ok(ChangeScope::National),
            "global" => Ok(ChangeScope::Global),
            other => Err(Error::Validation(format!(
                "unrecognized change scope: {}",
                other
            ))),
        }
    }
}

/// Outcome of the optional location question.
///
/// Every variant is a terminal answer: a denied or skipped prompt still
/// counts as "answered" for wizard advancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LocationAnswer {
    /// User granted access and coordinates were captured.
    Granted { latitude: f64, longitude: f64 },
    /// User denied the browser permission prompt.
    Denied,
    /// User skipped the question.
    Skipped,
    /// Geolocation is not available on the device.
    Unavailable,
}

/// The rotating open-ended reflection prompt with the user's answer.
///
/// The question text is stored alongside the answer because the prompt
/// rotates between sessions and the answer is meaningless without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenEndedReflection {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// One preference document per session.
///
/// All fields are optional; the default value is the canonical
/// "no preferences yet" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ended: Option<OpenEndedReflection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<CauseTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub help_methods: Vec<HelpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_scope: Option<ChangeScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationAnswer>,
}

impl Preferences {
    /// Whether the document carries no answers at all.
    pub fn is_empty(&self) -> bool {
        self.open_ended.is_none()
            && self.causes.is_empty()
            && self.help_methods.is_empty()
            && self.change_scope.is_none()
            && self.location.is_none()
    }
}

/// Partial preference update with a closed whitelist of mergeable fields.
///
/// Unknown keys are rejected during deserialization; a `None` field means
/// "leave the stored value unchanged", not "clear it".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ended: Option<OpenEndedReflection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<CauseTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_methods: Option<Vec<HelpMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_scope: Option<ChangeScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationAnswer>,
}

impl PreferencesPatch {
    /// Whether the patch names no fields at all.
    pub fn is_empty(&self) -> bool {
        self.open_ended.is_none()
            && self.causes.is_none()
            && self.help_methods.is_none()
            && self.change_scope.is_none()
            && self.location.is_none()
    }

    /// Merge this patch into an existing document. Fields the patch does not
    /// name retain their prior values.
    pub fn apply(self, prefs: &mut Preferences) {
        if let Some(open_ended) = self.open_ended {
            prefs.open_ended = Some(open_ended);
        }
        if let Some(causes) = self.causes {
            prefs.causes = causes;
        }
        if let Some(help_methods) = self.help_methods {
            prefs.help_methods = help_methods;
        }
        if let Some(change_scope) = self.change_scope {
            prefs.change_scope = Some(change_scope);
        }
        if let Some(location) = self.location {
            prefs.location = Some(location);
        }
    }
}

/// Parse a stored list of tag strings back into enum values.
///
/// Any unrecognized value fails the whole read with a validation error
/// rather than silently dropping entries.
pub fn parse_tags<T: FromStr<Err = Error>>(raw: &[String]) -> Result<Vec<T>> {
    raw.iter().map(|s| s.parse()).collect()
}
