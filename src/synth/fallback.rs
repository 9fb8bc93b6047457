use lazy_static::lazy_static;

use crate::models::Ideology;

use super::sampler::Sampler;

/// Rule-based default tables used when no survey respondent matches the
/// sampled demographics. Issue sets follow ideology; news diets follow age.

const FALLBACK_ISSUE_COUNT: usize = 5;
const FALLBACK_SOURCE_COUNT: usize = 3;

/// Below this age the fallback news diet skews toward social platforms.
const YOUNG_CUTOFF: u8 = 35;

lazy_static! {
    static ref VERY_LIBERAL_ISSUES: Vec<&'static str> = vec![
        "Climate change",
        "Social justice",
        "Healthcare access",
        "Economic inequality",
        "Voting rights",
    ];
    static ref LIBERAL_ISSUES: Vec<&'static str> = vec![
        "Healthcare",
        "Education",
        "Economy",
        "Climate change",
        "Social services",
    ];
    static ref MODERATE_ISSUES: Vec<&'static str> = vec![
        "Economy",
        "Healthcare",
        "Immigration",
        "Education",
        "National security",
    ];
    static ref CONSERVATIVE_ISSUES: Vec<&'static str> = vec![
        "Economy",
        "National security",
        "Immigration",
        "Gun rights",
        "Tax reform",
    ];
    static ref VERY_CONSERVATIVE_ISSUES: Vec<&'static str> = vec![
        "Gun rights",
        "Immigration",
        "National debt",
        "Traditional values",
        "Energy independence",
    ];
    static ref YOUNG_SOURCES: Vec<&'static str> = vec![
        "Twitter/X",
        "TikTok",
        "Instagram",
        "YouTube",
        "CNN",
        "MSNBC",
        "Fox News",
        "Reuters",
    ];
    static ref OLDER_SOURCES: Vec<&'static str> = vec![
        "Cable news",
        "Local TV news",
        "Newspapers",
        "Facebook",
        "Fox News",
        "CNN",
        "MSNBC",
        "NPR",
    ];
}

fn issue_set(ideology: Ideology) -> &'static [&'static str] {
    match ideology {
        Ideology::VeryLiberal => &VERY_LIBERAL_ISSUES,
        Ideology::Liberal => &LIBERAL_ISSUES,
        Ideology::Moderate => &MODERATE_ISSUES,
        Ideology::Conservative => &CONSERVATIVE_ISSUES,
        Ideology::VeryConservative => &VERY_CONSERVATIVE_ISSUES,
    }
}

/// Up to five issues sampled from the ideology's candidate set.
pub fn fallback_issues(sampler: &mut Sampler, ideology: Ideology) -> Vec<String> {
    sampler
        .pick_n(issue_set(ideology), FALLBACK_ISSUE_COUNT)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Exactly three news sources from the age-appropriate table.
pub fn fallback_news_sources(sampler: &mut Sampler, age: u8) -> Vec<String> {
    let pool: &[&str] = if age < YOUNG_CUTOFF { &YOUNG_SOURCES } else { &OLDER_SOURCES };
    sampler
        .pick_n(pool, FALLBACK_SOURCE_COUNT)
        .into_iter()
        .map(str::to_string)
        .collect()
}
