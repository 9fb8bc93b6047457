use std::collections::HashMap;

use crate::models::{AggregatedResult, PollQuestion, PollResponse, QuestionType, ScaleStats};

/// Reduce one question's responses into a typed summary. Pure: depends only
/// on the question type and the response set, so repeated calls over the
/// same inputs are identical.
pub fn aggregate(responses: &[PollResponse], question: &PollQuestion) -> AggregatedResult {
    match question.question_type {
        QuestionType::Choice => AggregatedResult::Counts(count_choices(responses)),
        QuestionType::Scale => AggregatedResult::Stats(scale_stats(responses)),
        QuestionType::Open => AggregatedResult::Raw(
            responses.iter().map(|r| r.response.clone()).collect(),
        ),
    }
}

/// Uppercase-normalized counts. Labels outside the question's choice list
/// still get counted under their own key; restricting to schema labels is
/// a display-time decision, not an aggregation one.
fn count_choices(responses: &[PollResponse]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for response in responses {
        let label = response.response.trim().to_uppercase();
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Numeric stats over the responses that parse as floats. Unparsable
/// responses are skipped, not zeroed; if nothing parses there are no stats.
fn scale_stats(responses: &[PollResponse]) -> Option<ScaleStats> {
    let values: Vec<f64> = responses
        .iter()
        .filter_map(|r| r.response.trim().parse::<f64>().ok())
        .collect();

    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    Some(ScaleStats { mean: sum / count as f64, min, max, count })
}
