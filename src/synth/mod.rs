pub mod fallback;
pub mod matcher;
pub mod sampler;

use chrono::Utc;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    EducationLevel, Ideology, Persona, PoliticalParty, PrecinctProfile, Race, SurveyRespondent,
};
use crate::survey::{MatchCriteria, SurveyCorpus};

use matcher::{GenderOverrides, RespondentMatcher};
use sampler::{Sampler, UNKNOWN};

const MAX_CANDIDATES: usize = 20;
const MAX_TOP_ISSUES: usize = 10;
const MAX_NEWS_SOURCES: usize = 8;

/// Sampled (still label-valued) demographics for one voter, prior to
/// respondent matching.
struct SampledDemographics {
    age: u8,
    age_group: String,
    gender: String,
    race: String,
    education: String,
    income_bracket: String,
    employment_status: String,
    marital_status: String,
    party_id: String,
    ideology: String,
}

/// Turns a precinct's target distributions plus the survey corpus into
/// concrete personas. Synthesis never fails for a well-formed profile:
/// missing axes degrade to "Unknown" and a missing match degrades to the
/// rule-based fallback tables.
pub struct PersonaSynthesizer {
    matcher: RespondentMatcher,
    sampler: Sampler,
}

impl PersonaSynthesizer {
    pub fn new(corpus: Arc<SurveyCorpus>) -> Self {
        Self {
            matcher: RespondentMatcher::new(corpus),
            sampler: Sampler::new(),
        }
    }

    /// Fully deterministic construction for tests and reproducible runs.
    pub fn with_sampler(corpus: Arc<SurveyCorpus>, sampler: Sampler) -> Self {
        Self {
            matcher: RespondentMatcher::new(corpus),
            sampler,
        }
    }

    /// Full control over the override table and RNG, for tuned locales.
    pub fn with_config(corpus: Arc<SurveyCorpus>, overrides: GenderOverrides, sampler: Sampler) -> Self {
        Self {
            matcher: RespondentMatcher::with_overrides(corpus, overrides),
            sampler,
        }
    }

    pub fn synthesize_one(&mut self, precinct: &PrecinctProfile) -> Persona {
        let sampled = self.sample_demographics(precinct);

        let criteria = MatchCriteria {
            age_group: sampled.age_group.clone(),
            race: sampled.race.clone(),
            gender: sampled.gender.clone(),
            education: sampled.education.clone(),
            // "Unknown" would filter out every respondent, so only constrain
            // on party when the axis actually produced a value
            party_id: (sampled.party_id != UNKNOWN).then(|| sampled.party_id.clone()),
            ..Default::default()
        };

        let (chosen, num_candidates) = {
            let candidates = self.matcher.find_candidates(&criteria, MAX_CANDIDATES);
            let n = candidates.len();
            (self.sampler.pick(&candidates).map(|r| (*r).clone()), n)
        };

        match chosen {
            Some(source) => {
                debug!(
                    "Persona from respondent {} ({} candidates)",
                    source.dwid, num_candidates
                );
                self.build_matched(precinct, &sampled, &source)
            }
            None => {
                debug!(
                    "No respondent match for {}/{}/{}/{}; using fallback tables",
                    sampled.age_group, sampled.race, sampled.gender, sampled.education
                );
                self.build_fallback(precinct, &sampled)
            }
        }
    }

    /// n independent draws; personas share no state beyond the RNG stream.
    pub fn synthesize_many(&mut self, precinct: &PrecinctProfile, n: usize) -> Vec<Persona> {
        info!("Generating {} voters for precinct {} ({})", n, precinct.id, precinct.name);
        let voters: Vec<Persona> = (0..n).map(|_| self.synthesize_one(precinct)).collect();
        info!("Generated {} voters for {}", voters.len(), precinct.id);
        voters
    }

    fn sample_demographics(&mut self, precinct: &PrecinctProfile) -> SampledDemographics {
        let d = &precinct.demographics;
        let age_group = self.sampler.sample_or_unknown(&d.age_distribution, "age");
        let race = self.sampler.sample_or_unknown(&d.race_distribution, "race");
        let gender = self.matcher.sample_gender(&mut self.sampler, &race);
        let education = self
            .sampler
            .sample_or_unknown(&d.education_distribution, "education");
        let income_bracket = self.sampler.sample_or_unknown(&d.income_distribution, "income");
        let employment_status = self
            .sampler
            .sample_or_unknown(&d.employment_status, "employment");
        let marital_status = self.sampler.sample_or_unknown(&d.marital_status, "marital");
        let party_id = self.sampler.sample_or_unknown(&d.party_distribution, "party");
        let ideology = self
            .sampler
            .sample_or_unknown(&d.ideology_distribution, "ideology");
        let age = self.sampler.sample_age(&age_group);

        SampledDemographics {
            age,
            age_group,
            gender,
            race,
            education,
            income_bracket,
            employment_status,
            marital_status,
            party_id,
            ideology,
        }
    }

    fn build_matched(
        &mut self,
        precinct: &PrecinctProfile,
        sampled: &SampledDemographics,
        source: &SurveyRespondent,
    ) -> Persona {
        let mut top_issues = source.top_issues.clone();
        top_issues.truncate(MAX_TOP_ISSUES);
        let mut news_sources = source.news_sources.clone();
        news_sources.truncate(MAX_NEWS_SOURCES);

        let mut persona = self.base_persona(precinct, sampled);
        persona.top_issues = top_issues;
        persona.issue_positions = source.issue_positions.clone();
        persona.news_sources = news_sources;
        persona.vote_history = vote_history_of(source);
        persona.source_respondent_id = Some(source.dwid.clone());
        persona
    }

    fn build_fallback(&mut self, precinct: &PrecinctProfile, sampled: &SampledDemographics) -> Persona {
        let ideology = Ideology::from_label(&sampled.ideology);
        let top_issues = fallback::fallback_issues(&mut self.sampler, ideology);
        let news_sources = fallback::fallback_news_sources(&mut self.sampler, sampled.age);

        let mut persona = self.base_persona(precinct, sampled);
        persona.top_issues = top_issues;
        persona.news_sources = news_sources;
        persona
    }

    fn base_persona(&self, precinct: &PrecinctProfile, sampled: &SampledDemographics) -> Persona {
        Persona {
            id: Uuid::new_v4().to_string(),
            age: sampled.age,
            gender: sampled.gender.clone(),
            race: Race::from_label(&sampled.race),
            education: EducationLevel::from_label(&sampled.education)
                .unwrap_or(EducationLevel::SomeCollege),
            income_bracket: sampled.income_bracket.clone(),
            employment_status: sampled.employment_status.clone(),
            marital_status: sampled.marital_status.clone(),
            precinct_id: precinct.id.clone(),
            county: precinct.county.clone(),
            neighborhood: precinct.neighborhood.clone(),
            party_id: PoliticalParty::from_label(&sampled.party_id),
            ideology: Ideology::from_label(&sampled.ideology),
            vote_history: HashMap::new(),
            top_issues: Vec::new(),
            issue_positions: HashMap::new(),
            news_sources: Vec::new(),
            source_respondent_id: None,
            created_at: Utc::now(),
        }
    }
}

fn vote_history_of(source: &SurveyRespondent) -> HashMap<String, String> {
    let mut history = HashMap::new();
    if !source.vote_2024.is_empty() {
        history.insert("2024".to_string(), source.vote_2024.clone());
    }
    if !source.vote_2022.is_empty() {
        history.insert("2022".to_string(), source.vote_2022.clone());
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Demographics, Distribution, MAX_AGE, MIN_AGE};
    use crate::survey::parse_tsv;

    fn point_mass(label: &str) -> Distribution {
        [(label.to_string(), 1.0)].into()
    }

    fn test_precinct() -> PrecinctProfile {
        PrecinctProfile {
            id: "SF-P01-Mission".to_string(),
            name: "Mission District".to_string(),
            state: "CA".to_string(),
            county: "San Francisco".to_string(),
            neighborhood: Some("Mission".to_string()),
            demographics: Demographics {
                age_distribution: point_mass("40-49"),
                race_distribution: point_mass("White"),
                education_distribution: point_mass("4-year"),
                income_distribution: point_mass("$50-75K"),
                employment_status: point_mass("Employed full time"),
                marital_status: point_mass("Married"),
                party_distribution: point_mass("Strong Democrat"),
                ideology_distribution: point_mass("Liberal"),
                ..Default::default()
            },
            expected_voters: 100,
            description: None,
        }
    }

    const MATCHING_TSV: &str = "DWID\tAGE_GROUPS\tgender\tRACE\tEDUCATION\tPARTY_ID_COMBINED\tIDEO5\tVOTE_CHOICE_INDEX_2024\tFAVOR04_gun_control\tissues_top5_1\tissues_top5_2\tSOURCES1_npr\n\
match1\t40-49\tWoman\tWhite\t4-year\tStrong Democrat\tLiberal\tKamala Harris\tFavor\tHousing\tTransit\tselected\n\
match2\t40-49\tMan\tWhite\t4-year\tStrong Democrat\tLiberal\tKamala Harris\tFavor\tHousing\tTransit\tselected\n";

    #[test]
    fn matched_persona_copies_respondent_lists_verbatim() {
        let corpus = Arc::new(SurveyCorpus::from_respondents(parse_tsv(MATCHING_TSV)));
        let mut synthesizer =
            PersonaSynthesizer::with_sampler(Arc::clone(&corpus), Sampler::seeded(1));
        let persona = synthesizer.synthesize_one(&test_precinct());

        let source_id = persona
            .source_respondent_id
            .as_deref()
            .expect("a matching respondent exists");
        let source = corpus
            .respondents()
            .iter()
            .find(|r| r.dwid == source_id)
            .expect("source id refers to a real respondent");
        assert_eq!(persona.top_issues, source.top_issues);
        assert_eq!(persona.news_sources, source.news_sources);
        assert_eq!(persona.issue_positions, source.issue_positions);
        assert_eq!(persona.vote_history.get("2024").map(String::as_str), Some("Kamala Harris"));
    }

    #[test]
    fn fallback_persona_has_nonempty_rule_based_lists() {
        let mut synthesizer =
            PersonaSynthesizer::with_sampler(Arc::new(SurveyCorpus::empty()), Sampler::seeded(1));
        let persona = synthesizer.synthesize_one(&test_precinct());

        assert!(persona.source_respondent_id.is_none());
        assert!(!persona.top_issues.is_empty());
        assert!(persona.top_issues.len() <= 5);
        assert_eq!(persona.news_sources.len(), 3);
        assert!(persona.issue_positions.is_empty());
    }

    #[test]
    fn synthesis_survives_missing_distributions() {
        let precinct = PrecinctProfile {
            demographics: Demographics::default(),
            ..test_precinct()
        };
        let mut synthesizer =
            PersonaSynthesizer::with_sampler(Arc::new(SurveyCorpus::empty()), Sampler::seeded(1));
        let persona = synthesizer.synthesize_one(&precinct);
        assert_eq!(persona.income_bracket, "Unknown");
        assert_eq!(persona.ideology, Ideology::Moderate);
        assert!((MIN_AGE..=MAX_AGE).contains(&persona.age));
    }

    #[test]
    fn every_age_band_yields_valid_persona_ages() {
        for band in ["18-29", "30-39", "40-49", "50-64", "65+"] {
            let precinct = PrecinctProfile {
                demographics: Demographics {
                    age_distribution: point_mass(band),
                    ..Default::default()
                },
                ..test_precinct()
            };
            let mut synthesizer = PersonaSynthesizer::with_sampler(
                Arc::new(SurveyCorpus::empty()),
                Sampler::seeded(4),
            );
            for persona in synthesizer.synthesize_many(&precinct, 200) {
                assert!(
                    (MIN_AGE..=MAX_AGE).contains(&persona.age),
                    "band {} gave {}",
                    band,
                    persona.age
                );
            }
        }
    }

    #[test]
    fn synthesize_many_returns_requested_count() {
        let mut synthesizer =
            PersonaSynthesizer::with_sampler(Arc::new(SurveyCorpus::empty()), Sampler::seeded(6));
        let personas = synthesizer.synthesize_many(&test_precinct(), 25);
        assert_eq!(personas.len(), 25);
        // Each persona carries its precinct attribution
        assert!(personas.iter().all(|p| p.precinct_id == "SF-P01-Mission"));
        assert!(personas.iter().all(|p| p.county == "San Francisco"));
    }
}
