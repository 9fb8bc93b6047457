use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::models::{EducationLevel, SurveyRespondent};

/// Values the survey files use for "no answer".
fn is_missing(value: &str) -> bool {
    matches!(value, "" | "N/A" | "nan" | "NaN")
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Demographic criteria for matching against the corpus. Age band, race,
/// gender and education are required; the rest narrow the match when set.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    pub age_group: String,
    pub race: String,
    pub gender: String,
    pub education: String,
    pub party_id: Option<String>,
    pub values_cluster: Option<String>,
    pub state: Option<String>,
}

/// Modal template built by aggregating matching respondents.
#[derive(Debug, Clone)]
pub struct RespondentProfile {
    pub issue_positions: HashMap<String, String>,
    pub top_issues: Vec<String>,
    pub news_sources: Vec<String>,
    pub vote_2024: String,
    pub num_matches: usize,
}

/// The loaded survey corpus. Respondents keep their load order, which makes
/// `find_matches` a deterministic prefix scan.
pub struct SurveyCorpus {
    respondents: Vec<SurveyRespondent>,
}

impl SurveyCorpus {
    pub fn from_respondents(respondents: Vec<SurveyRespondent>) -> Self {
        Self { respondents }
    }

    pub fn empty() -> Self {
        Self { respondents: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.respondents.is_empty()
    }

    pub fn respondents(&self) -> &[SurveyRespondent] {
        &self.respondents
    }

    /// Load every survey wave under `dir`. Each subdirectory is one wave
    /// holding tab-separated data files. An unreadable directory yields an
    /// empty corpus so callers can still run with pure fallback synthesis.
    pub fn load_dir(dir: &Path) -> Self {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Survey directory {} unreadable ({}); starting with empty corpus", dir.display(), e);
                return Self::empty();
            }
        };

        let mut respondents = Vec::new();
        let mut waves = 0usize;

        let mut wave_dirs: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        wave_dirs.sort();

        for wave_dir in wave_dirs {
            let wave_name = wave_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut files: Vec<_> = match fs::read_dir(&wave_dir) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        matches!(
                            p.extension().and_then(|e| e.to_str()),
                            Some("txt") | Some("tsv")
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!("Skipping wave {}: {}", wave_name, e);
                    continue;
                }
            };
            files.sort();

            if files.is_empty() {
                warn!("No data file found in wave {}", wave_name);
                continue;
            }

            let before = respondents.len();
            for file in files {
                match fs::read_to_string(&file) {
                    Ok(text) => respondents.extend(parse_tsv(&text)),
                    Err(e) => warn!("Error reading {}: {}", file.display(), e),
                }
            }
            info!(
                "Loaded {} respondents from wave {}",
                respondents.len() - before,
                wave_name
            );
            waves += 1;
        }

        info!(
            "Survey corpus loaded: {} respondents across {} wave(s)",
            respondents.len(),
            waves
        );
        Self { respondents }
    }

    /// Scan the corpus in load order and return up to `max_matches`
    /// respondents satisfying the criteria. The scan stops as soon as the
    /// cap is reached, so the result is a filtered prefix of the corpus.
    pub fn find_matches(&self, criteria: &MatchCriteria, max_matches: usize) -> Vec<&SurveyRespondent> {
        let mut matches = Vec::new();

        for respondent in &self.respondents {
            if !fields_match(&respondent.age_group, &criteria.age_group) {
                continue;
            }
            if !fields_match(&respondent.race, &criteria.race) {
                continue;
            }
            if !fields_match(&respondent.gender, &criteria.gender) {
                continue;
            }
            if !education_matches(&respondent.education, &criteria.education) {
                continue;
            }
            if let Some(party) = &criteria.party_id {
                if !fields_match(&respondent.party_id, party) {
                    continue;
                }
            }
            if let Some(cluster) = &criteria.values_cluster {
                match &respondent.values_cluster {
                    Some(c) if fields_match(c, cluster) => {}
                    _ => continue,
                }
            }
            if let Some(state) = &criteria.state {
                if !fields_match(&respondent.survey_state, state) {
                    continue;
                }
            }

            matches.push(respondent);
            if matches.len() >= max_matches {
                break;
            }
        }

        matches
    }

    /// Aggregate up to 50 matches into a modal template: most common
    /// position per issue, the 10 most frequent ranked issues, the 8 most
    /// frequent news sources.
    pub fn profile(&self, criteria: &MatchCriteria) -> Option<RespondentProfile> {
        let matches = self.find_matches(criteria, 50);
        if matches.is_empty() {
            return None;
        }

        let mut position_counts: HashMap<&str, HashMap<&str, usize>> = HashMap::new();
        for r in &matches {
            for (issue, position) in &r.issue_positions {
                *position_counts
                    .entry(issue)
                    .or_default()
                    .entry(position)
                    .or_insert(0) += 1;
            }
        }
        let issue_positions = position_counts
            .into_iter()
            .filter_map(|(issue, positions)| {
                modal(positions).map(|p| (issue.to_string(), p.to_string()))
            })
            .collect();

        let mut issue_counts: HashMap<&str, usize> = HashMap::new();
        let mut source_counts: HashMap<&str, usize> = HashMap::new();
        let mut vote_counts: HashMap<&str, usize> = HashMap::new();
        for r in &matches {
            for issue in &r.top_issues {
                *issue_counts.entry(issue).or_insert(0) += 1;
            }
            for source in &r.news_sources {
                *source_counts.entry(source).or_insert(0) += 1;
            }
            if !r.vote_2024.is_empty() {
                *vote_counts.entry(&r.vote_2024).or_insert(0) += 1;
            }
        }

        Some(RespondentProfile {
            issue_positions,
            top_issues: most_common(issue_counts, 10),
            news_sources: most_common(source_counts, 8),
            vote_2024: modal(vote_counts).unwrap_or("Unknown").to_string(),
            num_matches: matches.len(),
        })
    }
}

fn fields_match(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Education matches through the coarse bucket rather than the raw string,
/// since waves word the same level differently. Two labels that both fail
/// to bucket fall back to exact comparison.
fn education_matches(a: &str, b: &str) -> bool {
    match (EducationLevel::from_label(a), EducationLevel::from_label(b)) {
        (Some(left), Some(right)) => left == right,
        _ => fields_match(a, b),
    }
}

fn modal<K: Ord + Copy>(counts: HashMap<K, usize>) -> Option<K> {
    // Tie-break on the key so the result is stable
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(k, _)| k)
}

fn most_common(counts: HashMap<&str, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(limit).map(|(s, _)| s.to_string()).collect()
}

/// Parse one tab-separated survey file. The first line is the header row.
/// Rows that fail to parse or are missing any of the critical demographic
/// fields are dropped with a warning; the rest of the file still loads.
pub fn parse_tsv(text: &str) -> Vec<SurveyRespondent> {
    let mut lines = text.lines();
    let headers: Vec<&str> = match lines.next() {
        Some(line) => line.split('\t').map(|h| h.trim()).collect(),
        None => return Vec::new(),
    };

    let mut respondents = Vec::new();
    let mut dropped = 0usize;

    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        match parse_row(&headers, &fields) {
            Some(respondent) => respondents.push(respondent),
            None => {
                dropped += 1;
                warn!("Dropping survey row {} (missing critical fields)", line_no + 2);
            }
        }
    }

    if dropped > 0 {
        warn!("Dropped {} of {} survey rows", dropped, dropped + respondents.len());
    }
    respondents
}

fn parse_row(headers: &[&str], fields: &[&str]) -> Option<SurveyRespondent> {
    let get = |name: &str| -> String {
        headers
            .iter()
            .position(|h| *h == name)
            .and_then(|i| fields.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let age_group = get("AGE_GROUPS");
    let gender = get("gender");
    let race = get("RACE");
    let party_id = get("PARTY_ID_COMBINED");

    // A record without these cannot be matched against sampled demographics
    if [&age_group, &gender, &race, &party_id]
        .iter()
        .any(|v| is_missing(v))
    {
        return None;
    }

    let mut issue_positions = HashMap::new();
    let mut top_issue_cols = Vec::new();
    let mut source_cols = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        let value = fields.get(i).map(|v| v.trim()).unwrap_or("");
        if let Some(issue) = header.strip_prefix("FAVOR04_") {
            if !is_missing(value) {
                issue_positions.insert(title_case(issue), value.to_string());
            }
        } else if header.starts_with("issues_top5_") {
            if !is_missing(value) {
                top_issue_cols.push((*header, value.to_string()));
            }
        } else if let Some(source) = header.strip_prefix("SOURCES1_") {
            if value == "selected" {
                source_cols.push((*header, title_case(source)));
            }
        }
    }

    // Column order carries the self-ranking for top issues
    top_issue_cols.sort_by(|a, b| a.0.cmp(b.0));
    source_cols.sort_by(|a, b| a.0.cmp(b.0));

    let values_cluster = {
        let raw = get("PEORIA_VALUES_CLUSTER_2_0");
        if is_missing(&raw) { None } else { Some(raw) }
    };
    let inputzip = {
        let raw = get("inputzip");
        if is_missing(&raw) { None } else { Some(raw) }
    };

    Some(SurveyRespondent {
        dwid: get("DWID"),
        age_group,
        gender,
        race,
        education: get("EDUCATION"),
        income: get("faminc_new"),
        employment_status: get("EMPLOYMENT_STATUS"),
        marital_status: get("MARITAL_STATUS"),
        party_id,
        ideology: get("IDEO5"),
        vote_2024: get("VOTE_CHOICE_INDEX_2024"),
        vote_2022: get("VOTE_CHOICE_INDEX_2022"),
        vote_history: get("vote_history"),
        issue_positions,
        top_issues: top_issue_cols.into_iter().map(|(_, v)| v).collect(),
        news_sources: source_cols.into_iter().map(|(_, v)| v).collect(),
        values_cluster,
        survey_state: get("STATE"),
        inputzip,
    })
}

/// "gun_control" -> "Gun Control"
fn title_case(raw: &str) -> String {
    raw.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "DWID\tAGE_GROUPS\tgender\tRACE\tEDUCATION\tfaminc_new\tEMPLOYMENT_STATUS\tMARITAL_STATUS\tPARTY_ID_COMBINED\tIDEO5\tVOTE_CHOICE_INDEX_2024\tVOTE_CHOICE_INDEX_2022\tvote_history\tFAVOR04_gun_control\tissues_top5_1\tissues_top5_2\tSOURCES1_cable_news\tSOURCES1_npr\tPEORIA_VALUES_CLUSTER_2_0\tSTATE\tinputzip\n\
r1\t40-49\tWoman\tWhite\t4-year\t$50-75K\tEmployed full time\tMarried\tStrong Democrat\tLiberal\tKamala Harris\tJoe Biden\t4 / 4 votes\tFavor\tEconomy\tHealthcare\tselected\tnot selected\tSuper Seculars\tCA\t94110\n\
r2\t40-49\tWoman\tWhite\tCollege degree\t$50-75K\tEmployed part time\tMarried\tRepublican\tConservative\tDonald Trump\tN/A\t3 / 4 votes\tOppose\tImmigration\tN/A\tnot selected\tselected\tnan\tFL\t33101\n\
r3\t\tMan\tBlack\tHigh school graduate\t\t\t\tIndependent\tModerate\t\t\t\t\t\t\t\t\t\tNY\t\n\
r4\t18-29\tMan\tAsian\tPost-grad\t$100-150K\tEmployed full time\tNever married\tIndependent/Lean Democrat\tVery Liberal\tKamala Harris\t\t1 / 1 votes\tFavor\tClimate change\t\tselected\tselected\t\tCA\t94016\n";

    fn sample_corpus() -> SurveyCorpus {
        SurveyCorpus::from_respondents(parse_tsv(SAMPLE))
    }

    #[test]
    fn parse_drops_rows_missing_critical_fields() {
        let corpus = sample_corpus();
        // r3 has no age group
        assert_eq!(corpus.len(), 3);
        assert!(corpus.respondents().iter().all(|r| !r.age_group.is_empty()));
    }

    #[test]
    fn parse_extracts_prefixed_columns() {
        let corpus = sample_corpus();
        let r1 = &corpus.respondents()[0];
        assert_eq!(r1.dwid, "r1");
        assert_eq!(r1.issue_positions.get("Gun Control").map(String::as_str), Some("Favor"));
        assert_eq!(r1.top_issues, vec!["Economy", "Healthcare"]);
        assert_eq!(r1.news_sources, vec!["Cable News"]);
        assert_eq!(r1.values_cluster.as_deref(), Some("Super Seculars"));

        let r2 = &corpus.respondents()[1];
        // "N/A" in issues_top5_2 is missing, not a value
        assert_eq!(r2.top_issues, vec!["Immigration"]);
        assert_eq!(r2.news_sources, vec!["Npr"]);
        assert_eq!(r2.values_cluster, None);
    }

    #[test]
    fn find_matches_buckets_education() {
        let corpus = sample_corpus();
        let criteria = MatchCriteria {
            age_group: "40-49".into(),
            race: "white".into(),
            gender: "WOMAN ".into(),
            education: "College Degree".into(),
            ..Default::default()
        };
        // Both "4-year" and "College degree" bucket to the same level
        let matches = corpus.find_matches(&criteria, 20);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].dwid, "r1");
        assert_eq!(matches[1].dwid, "r2");
    }

    #[test]
    fn find_matches_honors_optional_party_filter() {
        let corpus = sample_corpus();
        let criteria = MatchCriteria {
            age_group: "40-49".into(),
            race: "White".into(),
            gender: "Woman".into(),
            education: "4-year".into(),
            party_id: Some("Republican".into()),
            ..Default::default()
        };
        let matches = corpus.find_matches(&criteria, 20);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].dwid, "r2");
    }

    #[test]
    fn find_matches_is_a_load_order_prefix() {
        let corpus = sample_corpus();
        let criteria = MatchCriteria {
            age_group: "40-49".into(),
            race: "White".into(),
            gender: "Woman".into(),
            education: "4-year".into(),
            ..Default::default()
        };
        let capped = corpus.find_matches(&criteria, 1);
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].dwid, "r1");
    }

    #[test]
    fn empty_source_yields_empty_corpus() {
        let corpus = SurveyCorpus::load_dir(Path::new("/nonexistent/survey/dir"));
        assert!(corpus.is_empty());
        assert!(corpus.find_matches(&MatchCriteria::default(), 5).is_empty());
    }

    #[test]
    fn profile_aggregates_modal_values() {
        let corpus = sample_corpus();
        let criteria = MatchCriteria {
            age_group: "40-49".into(),
            race: "White".into(),
            gender: "Woman".into(),
            education: "College Degree".into(),
            ..Default::default()
        };
        let profile = corpus.profile(&criteria).expect("matches exist");
        assert_eq!(profile.num_matches, 2);
        assert!(profile.top_issues.contains(&"Economy".to_string()));
        assert!(profile.top_issues.contains(&"Immigration".to_string()));
    }
}
