//! Shared types used across the statute corpus.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::StatuteError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed jurisdiction identifier.
///
/// The id is the hex SHA-256 of the canonical JSON document `{"name": <name>}`,
/// so the same name always yields the same id across runs and processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JurisdictionId(String);

impl JurisdictionId {
    /// Derive the id for a jurisdiction name.
    ///
    /// # Errors
    /// Returns error if the name is empty or only whitespace.
    pub fn from_name(name: &str) -> Result<Self, StatuteError> {
        if name.trim().is_empty() {
            return Err(StatuteError::Validation(
                "jurisdiction must have a name".to_string(),
            ));
        }

        let canonical = serde_json::json!({ "name": name }).to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(Self(hex::encode(digest)))
    }

    /// Wrap an id that was produced elsewhere (e.g. a remote registry).
    ///
    /// # Errors
    /// Returns error if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, StatuteError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StatuteError::Validation(
                "jurisdiction id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JurisdictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Corpus categories. The serialized name doubles as the directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// State or federal constitution
    Constitution,
    /// Codified statutes
    Statutes,
    /// Rules of court
    RulesOfCourt,
    /// Administrative codes
    AdministrativeCodes,
    /// Code of Federal Regulations
    CodeOfFederalRegulations,
    /// United States Code
    UnitedStatesCode,
    /// Federal Rules of Appellate Procedure
    FederalRulesOfAppellateProcedure,
    /// Federal Rules of Civil Procedure
    FederalRulesOfCivilProcedure,
    /// Federal Rules of Criminal Procedure
    FederalRulesOfCriminalProcedure,
    /// Federal Rules of Evidence
    FederalRulesOfEvidence,
    /// Federal bankruptcy rules
    BankruptcyRules,
    /// Rules governing section 2254 and 2255 proceedings
    RulesOfGoverning,
    /// Rules of the Foreign Intelligence Surveillance Court
    RulesOfTheForeignIntelligenceSurveillanceCourt,
    /// Forms accompanying the federal rules of procedure
    FormsAccompanyingTheFederalRulesOfProcedure,
}

impl Category {
    /// Categories every state driver is expected to provide.
    pub const STATE: [Category; 4] = [
        Category::Constitution,
        Category::Statutes,
        Category::RulesOfCourt,
        Category::AdministrativeCodes,
    ];

    /// Directory name of the category.
    #[must_use]
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Constitution => "constitution",
            Self::Statutes => "statutes",
            Self::RulesOfCourt => "rulesOfCourt",
            Self::AdministrativeCodes => "administrativeCodes",
            Self::CodeOfFederalRegulations => "codeOfFederalRegulations",
            Self::UnitedStatesCode => "unitedStatesCode",
            Self::FederalRulesOfAppellateProcedure => "federalRulesOfAppellateProcedure",
            Self::FederalRulesOfCivilProcedure => "federalRulesOfCivilProcedure",
            Self::FederalRulesOfCriminalProcedure => "federalRulesOfCriminalProcedure",
            Self::FederalRulesOfEvidence => "federalRulesOfEvidence",
            Self::BankruptcyRules => "bankruptcyRules",
            Self::RulesOfGoverning => "rulesOfGoverning",
            Self::RulesOfTheForeignIntelligenceSurveillanceCourt => {
                "rulesOfTheForeignIntelligenceSurveillanceCourt"
            }
            Self::FormsAccompanyingTheFederalRulesOfProcedure => {
                "formsAccompanyingTheFederalRulesOfProcedure"
            }
        }
    }

    /// Whether the category only exists in the federal corpus.
    #[must_use]
    pub fn is_federal_only(&self) -> bool {
        !Self::STATE.contains(self)
    }

    /// Parse a category from a case-insensitive name.
    ///
    /// Accepts the directory names plus the short aliases `court`, `rules`
    /// (rules of court) and `administrative`, `codes` (administrative codes).
    ///
    /// # Errors
    /// Returns error if the name matches no category.
    pub fn parse(name: &str) -> Result<Self, StatuteError> {
        let lowered = name.trim().to_lowercase();
        match lowered.as_str() {
            "court" | "rules" => return Ok(Self::RulesOfCourt),
            "administrative" | "codes" => return Ok(Self::AdministrativeCodes),
            _ => {}
        }

        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| c.dir_name().to_lowercase() == lowered)
            .ok_or_else(|| StatuteError::UnknownCategory(name.to_string()))
    }
}

const ALL_CATEGORIES: [Category; 14] = [
    Category::Constitution,
    Category::Statutes,
    Category::RulesOfCourt,
    Category::AdministrativeCodes,
    Category::CodeOfFederalRegulations,
    Category::UnitedStatesCode,
    Category::FederalRulesOfAppellateProcedure,
    Category::FederalRulesOfCivilProcedure,
    Category::FederalRulesOfCriminalProcedure,
    Category::FederalRulesOfEvidence,
    Category::BankruptcyRules,
    Category::RulesOfGoverning,
    Category::RulesOfTheForeignIntelligenceSurveillanceCourt,
    Category::FormsAccompanyingTheFederalRulesOfProcedure,
];

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Top-level partition of the corpus on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CorpusScope {
    /// A state jurisdiction, stored under `states/<name>`
    State(String),
    /// The federal corpus, stored under `federal`
    Federal,
}

impl CorpusScope {
    /// Leading directory segments for this scope.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::State(name) => vec!["states".to_string(), name.clone()],
            Self::Federal => vec!["federal".to_string()],
        }
    }
}

impl fmt::Display for CorpusScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(name) => write!(f, "states/{name}"),
            Self::Federal => f.write_str("federal"),
        }
    }
}
