use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::SimError;

/// Weighted categorical distribution: category label -> weight.
/// Weights need not sum to exactly 1.0; the sampler normalizes.
pub type Distribution = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Race {
    White,
    Black,
    Hispanic,
    Asian,
    Other,
    Multiracial,
}

impl Race {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "white" => Race::White,
            "black" => Race::Black,
            "hispanic" => Race::Hispanic,
            "asian" => Race::Asian,
            "multiracial" => Race::Multiracial,
            _ => Race::Other,
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Race::White => "White",
            Race::Black => "Black",
            Race::Hispanic => "Hispanic",
            Race::Asian => "Asian",
            Race::Other => "Other",
            Race::Multiracial => "Multiracial",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    LessThanHighSchool,
    HighSchool,
    SomeCollege,
    College,
    Postgraduate,
}

impl EducationLevel {
    /// Bucket a raw survey education string into a coarse level.
    /// Survey waves are inconsistent about wording ("4-year", "College degree",
    /// "Post-grad", "Postgraduate Degree"), so matching goes through this.
    pub fn from_label(label: &str) -> Option<Self> {
        let norm = label.trim().to_lowercase();
        if norm.is_empty() {
            return None;
        }
        if norm.contains("no hs") || norm.contains("less than") {
            Some(EducationLevel::LessThanHighSchool)
        } else if norm.contains("high school") {
            Some(EducationLevel::HighSchool)
        } else if norm.contains("2-year") || norm.contains("some college") || norm.contains("associate") {
            Some(EducationLevel::SomeCollege)
        } else if norm.contains("post") || norm.contains("graduate degree") {
            Some(EducationLevel::Postgraduate)
        } else if norm.contains("4-year") || norm.contains("college") || norm.contains("bachelor") {
            Some(EducationLevel::College)
        } else {
            None
        }
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EducationLevel::LessThanHighSchool => "Less than High School",
            EducationLevel::HighSchool => "High School",
            EducationLevel::SomeCollege => "Some College",
            EducationLevel::College => "College Degree",
            EducationLevel::Postgraduate => "Postgraduate Degree",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoliticalParty {
    Democrat,
    Republican,
    Independent,
    Other,
}

impl PoliticalParty {
    pub fn from_label(label: &str) -> Self {
        let norm = label.trim().to_lowercase();
        // "Independent/Lean Democrat" counts as Independent, so check that first
        if norm.starts_with("independent") {
            PoliticalParty::Independent
        } else if norm.contains("democrat") {
            PoliticalParty::Democrat
        } else if norm.contains("republican") {
            PoliticalParty::Republican
        } else if norm == "other" {
            PoliticalParty::Other
        } else {
            PoliticalParty::Independent
        }
    }
}

impl fmt::Display for PoliticalParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoliticalParty::Democrat => "Democrat",
            PoliticalParty::Republican => "Republican",
            PoliticalParty::Independent => "Independent",
            PoliticalParty::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ideology {
    VeryLiberal,
    Liberal,
    Moderate,
    Conservative,
    VeryConservative,
}

impl Ideology {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "very liberal" => Ideology::VeryLiberal,
            "liberal" => Ideology::Liberal,
            "conservative" => Ideology::Conservative,
            "very conservative" => Ideology::VeryConservative,
            _ => Ideology::Moderate,
        }
    }
}

impl fmt::Display for Ideology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ideology::VeryLiberal => "Very Liberal",
            Ideology::Liberal => "Liberal",
            Ideology::Moderate => "Moderate",
            Ideology::Conservative => "Conservative",
            Ideology::VeryConservative => "Very Conservative",
        };
        write!(f, "{}", s)
    }
}

/// One real record from the survey corpus. Parsed once at load time and
/// never mutated; matching works on the raw label strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyRespondent {
    pub dwid: String,
    pub age_group: String,
    pub gender: String,
    pub race: String,
    pub education: String,
    pub income: String,
    pub employment_status: String,
    pub marital_status: String,
    pub party_id: String,
    pub ideology: String,
    pub vote_2024: String,
    pub vote_2022: String,
    pub vote_history: String,
    pub issue_positions: HashMap<String, String>,
    pub top_issues: Vec<String>,
    pub news_sources: Vec<String>,
    pub values_cluster: Option<String>,
    pub survey_state: String,
    pub inputzip: Option<String>,
}

/// Per-axis target demographics for a precinct. Field names match the
/// JSON config files (precincts_*.json).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default)]
    pub age_distribution: Distribution,
    #[serde(default)]
    pub race_distribution: Distribution,
    #[serde(default)]
    pub education_distribution: Distribution,
    #[serde(default)]
    pub income_distribution: Distribution,
    #[serde(default)]
    pub employment_status: Distribution,
    #[serde(default)]
    pub marital_status: Distribution,
    #[serde(default)]
    pub party_distribution: Distribution,
    #[serde(default)]
    pub ideology_distribution: Distribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecinctProfile {
    pub id: String,
    pub name: String,
    pub state: String,
    pub county: String,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub demographics: Demographics,
    #[serde(default = "default_expected_voters")]
    pub expected_voters: u32,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_expected_voters() -> u32 {
    1000
}

#[derive(Debug, Deserialize)]
struct PrecinctConfigFile {
    precincts: Vec<PrecinctProfile>,
}

/// Load precinct profiles from a JSON config file of the form
/// `{"precincts": [...]}`.
pub fn load_precinct_profiles(path: &Path) -> Result<Vec<PrecinctProfile>, SimError> {
    let text = std::fs::read_to_string(path)?;
    let config: PrecinctConfigFile = serde_json::from_str(&text)?;
    Ok(config.precincts)
}

/// A synthesized voter. Every field is a concrete render-ready value.
/// `source_respondent_id` is present only when the persona was built from
/// a matched survey respondent; a fallback persona leaves it absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub age: u8,
    pub gender: String,
    pub race: Race,
    pub education: EducationLevel,
    pub income_bracket: String,
    pub employment_status: String,
    pub marital_status: String,
    pub precinct_id: String,
    pub county: String,
    pub neighborhood: Option<String>,
    pub party_id: PoliticalParty,
    pub ideology: Ideology,
    pub vote_history: HashMap<String, String>,
    pub top_issues: Vec<String>,
    pub issue_positions: HashMap<String, String>,
    pub news_sources: Vec<String>,
    pub source_respondent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Choice,
    Scale,
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollQuestion {
    pub id: String,
    pub question: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub scale_range: Option<(f64, f64)>,
}

impl PollQuestion {
    pub fn choice(id: &str, question: &str, options: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            question: question.to_string(),
            question_type: QuestionType::Choice,
            options: Some(options),
            scale_range: None,
        }
    }

    pub fn scale(id: &str, question: &str, low: f64, high: f64) -> Self {
        Self {
            id: id.to_string(),
            question: question.to_string(),
            question_type: QuestionType::Scale,
            options: None,
            scale_range: Some((low, high)),
        }
    }

    pub fn open(id: &str, question: &str) -> Self {
        Self {
            id: id.to_string(),
            question: question.to_string(),
            question_type: QuestionType::Open,
            options: None,
            scale_range: None,
        }
    }
}

/// One successful prompt/response round trip. Confidence is advisory only
/// and never feeds into aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    pub persona_id: String,
    pub question_id: String,
    pub response: String,
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Aggregated answers for one question. The variant is chosen from the
/// question type alone, never from the response content. A scale question
/// where nothing parsed reports `Stats(None)` rather than made-up numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AggregatedResult {
    Counts(HashMap<String, u32>),
    Stats(Option<ScaleStats>),
    Raw(Vec<String>),
}
