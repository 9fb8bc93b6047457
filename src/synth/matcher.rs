use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Distribution, SurveyRespondent};
use crate::survey::{MatchCriteria, SurveyCorpus};

use super::sampler::Sampler;

/// Gender draws are conditioned on the already-sampled race rather than
/// sampled independently; surveys show small but real skews. The table is
/// configuration data so it can be tuned per locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenderOverrides {
    pub base: Distribution,
    pub by_race: HashMap<String, Distribution>,
}

impl Default for GenderOverrides {
    fn default() -> Self {
        let base: Distribution =
            [("Man".to_string(), 0.48), ("Woman".to_string(), 0.52)].into();
        let mut by_race = HashMap::new();
        by_race.insert(
            "Asian".to_string(),
            [("Man".to_string(), 0.50), ("Woman".to_string(), 0.50)].into(),
        );
        by_race.insert(
            "Black".to_string(),
            [("Man".to_string(), 0.46), ("Woman".to_string(), 0.54)].into(),
        );
        Self { base, by_race }
    }
}

impl GenderOverrides {
    fn distribution_for(&self, race: &str) -> &Distribution {
        self.by_race.get(race).unwrap_or(&self.base)
    }
}

/// Bridges sampled demographics to real survey respondents.
pub struct RespondentMatcher {
    corpus: Arc<SurveyCorpus>,
    overrides: GenderOverrides,
}

impl RespondentMatcher {
    pub fn new(corpus: Arc<SurveyCorpus>) -> Self {
        Self { corpus, overrides: GenderOverrides::default() }
    }

    pub fn with_overrides(corpus: Arc<SurveyCorpus>, overrides: GenderOverrides) -> Self {
        Self { corpus, overrides }
    }

    /// Sample a gender correlated with the sampled race.
    pub fn sample_gender(&self, sampler: &mut Sampler, race: &str) -> String {
        sampler.sample_or_unknown(self.overrides.distribution_for(race), "gender")
    }

    /// Up to `max_candidates` respondents matching the sampled axes.
    pub fn find_candidates(
        &self,
        criteria: &MatchCriteria,
        max_candidates: usize,
    ) -> Vec<&SurveyRespondent> {
        self.corpus.find_matches(criteria, max_candidates)
    }
}
