use crate::models::{Persona, PollQuestion, QuestionType};

/// The one place persona attributes become natural-language text. Pure
/// string assembly: missing optional fields render as empty, never panic.

fn join_first(items: &[String], n: usize) -> String {
    items
        .iter()
        .take(n)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the in-character biography prompt for a persona, with an optional
/// recent-news block.
pub fn render(persona: &Persona, context: &str) -> String {
    let locale = persona
        .neighborhood
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(&persona.county);

    let news_block = if context.trim().is_empty() {
        String::new()
    } else {
        format!("Recent local news context:\n{}\n\n", context.trim())
    };

    format!(
        "You are a {age}-year-old {race} {gender} from {locale}.\n\n\
         Personal details:\n\
         - Education: {education}\n\
         - Income: {income}\n\
         - Employment: {employment}\n\
         - Marital status: {marital}\n\n\
         Political views:\n\
         - Party: {party}\n\
         - Ideology: {ideology}\n\
         - Top issues you care about: {issues}\n\
         - You primarily get news from: {sources}\n\n\
         {news_block}\
         Answer as this voter would respond, based on your demographics, ideology, and life experience.",
        age = persona.age,
        race = persona.race,
        gender = persona.gender,
        locale = locale,
        education = persona.education,
        income = persona.income_bracket,
        employment = persona.employment_status,
        marital = persona.marital_status,
        party = persona.party_id,
        ideology = persona.ideology,
        issues = join_first(&persona.top_issues, 3),
        sources = join_first(&persona.news_sources, 3),
        news_block = news_block,
    )
}

/// Biography plus the question being polled. Choice questions list their
/// options; scale questions state the inclusive numeric range.
pub fn render_poll(persona: &Persona, question: &PollQuestion, context: &str) -> String {
    let mut prompt = render(persona, context);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(&question.question);

    match question.question_type {
        QuestionType::Choice => {
            if let Some(options) = &question.options {
                if !options.is_empty() {
                    prompt.push_str("\nOptions: ");
                    prompt.push_str(&options.join(", "));
                }
            }
        }
        QuestionType::Scale => {
            if let Some((low, high)) = question.scale_range {
                prompt.push_str(&format!(
                    "\nAnswer with a single number between {} and {}.",
                    low, high
                ));
            }
        }
        QuestionType::Open => {}
    }

    prompt
}
