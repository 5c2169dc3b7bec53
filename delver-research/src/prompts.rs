//! Prompt construction for the research pipeline
//!
//! Every prompt that expects structured output states the exact JSON shape
//! of its typed contract; the provider module parses responses back into
//! those types.

use std::collections::BTreeSet;

/// System prompt shared by all generation calls
pub fn system_prompt() -> String {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    format!(
        "You are an expert researcher. Today is {today}. Follow these instructions when responding:\n\
         - You may be asked to research subjects after your knowledge cutoff; assume the user is \
           right when presented with news.\n\
         - The user is a highly experienced analyst. Be as detailed as possible and make sure your \
           responses are correct.\n\
         - Be highly organized, suggest solutions the user may not have considered, and be \
           proactive with anticipating their needs.\n\
         - Mistakes erode the user's trust, so be accurate and thorough. Value good arguments over \
           authorities, and consider new technologies and contrarian ideas.\n\
         - You may use high levels of speculation or prediction, but flag it clearly."
    )
}

/// Prompt for planning up to `num_queries` search queries on a topic
pub fn plan_queries(topic: &str, prior_learnings: &BTreeSet<String>, num_queries: usize) -> String {
    let mut prompt = format!(
        "Given the following topic from the user, generate a list of search queries to research \
         the topic. Return a maximum of {num_queries} queries, but feel free to return fewer if \
         the topic is clear. Each query must explore a unique direction and must not overlap with \
         the others.\n\n<topic>{topic}</topic>\n"
    );

    if !prior_learnings.is_empty() {
        prompt.push_str(
            "\nUse these learnings from previous research to generate more specific queries:\n",
        );
        for learning in prior_learnings {
            prompt.push_str(&format!("- {learning}\n"));
        }
    }

    prompt.push_str(
        "\nRespond with a JSON object of the following shape, and nothing else:\n\
         {\"queries\": [{\"query\": \"<the search query>\", \"research_goal\": \"<the goal this \
         query advances and the directions it opens up once answered>\"}]}",
    );
    prompt
}

/// Prompt for extracting learnings and follow-up questions from retrieved
/// content
pub fn extract_learnings(
    query_text: &str,
    contents: &[String],
    num_learnings: usize,
    num_follow_ups: usize,
) -> String {
    let mut prompt = format!(
        "Given the following contents retrieved for the search query <query>{query_text}</query>, \
         generate a list of learnings from the contents. Return a maximum of {num_learnings} \
         learnings, but feel free to return fewer if the contents are thin. Each learning must be \
         unique, concise and information-dense: include entities, metrics, numbers and dates \
         whenever the contents mention them. Then generate up to {num_follow_ups} follow-up \
         questions that would deepen the research.\n\n<contents>\n"
    );
    for content in contents {
        prompt.push_str(&format!("<content>\n{content}\n</content>\n"));
    }
    prompt.push_str(
        "</contents>\n\nRespond with a JSON object of the following shape, and nothing else:\n\
         {\"learnings\": [\"<a learning>\"], \"follow_up_questions\": [\"<a question>\"]}",
    );
    prompt
}

/// Prompt for the long-form final report
///
/// The sources section is appended mechanically by the synthesizer, so the
/// model is told not to produce one.
pub fn final_report(topic: &str, learnings: &BTreeSet<String>) -> String {
    let mut prompt = format!(
        "Given the following topic from the user, write a final report on the topic using the \
         learnings from research. Make it as detailed as possible, aim for 3 or more pages, and \
         include ALL the learnings:\n\n<topic>{topic}</topic>\n\n<learnings>\n"
    );
    for learning in learnings {
        prompt.push_str(&format!("<learning>\n{learning}\n</learning>\n"));
    }
    prompt.push_str(
        "</learnings>\n\nRespond in Markdown. Do not include a sources or references section; it \
         is appended separately.",
    );
    if learnings.is_empty() {
        prompt.push_str(
            "\n\nNo learnings were gathered; state clearly that the research found nothing \
             conclusive and describe what could be tried next.",
        );
    }
    prompt
}

/// Prompt for the short direct answer
pub fn final_answer(topic: &str, learnings: &BTreeSet<String>) -> String {
    let mut prompt = format!(
        "Given the following topic from the user, write a short final answer on the topic using \
         the learnings from research. Follow the format the topic asks for, if any; keep the \
         answer as concise as possible, ideally a few words or a sentence.\n\n\
         <topic>{topic}</topic>\n\n<learnings>\n"
    );
    for learning in learnings {
        prompt.push_str(&format!("<learning>\n{learning}\n</learning>\n"));
    }
    prompt.push_str("</learnings>");
    if learnings.is_empty() {
        prompt.push_str("\n\nNo learnings were gathered; answer that the research was inconclusive.");
    }
    prompt
}

/// Continuation query text for a recursive research branch
pub fn continuation_query(research_goal: &str, follow_ups: &[String]) -> String {
    let mut text = format!("Previous research goal: {research_goal}\nFollow-up research directions:\n");
    for question in follow_ups {
        text.push_str(&format!("- {question}\n"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_prompt_embeds_topic_and_learnings() {
        let mut prior = BTreeSet::new();
        prior.insert("rust 1.0 shipped in 2015".to_string());
        let prompt = plan_queries("history of rust", &prior, 4);
        assert!(prompt.contains("<topic>history of rust</topic>"));
        assert!(prompt.contains("rust 1.0 shipped in 2015"));
        assert!(prompt.contains("maximum of 4"));
    }

    #[test]
    fn extraction_prompt_wraps_each_content() {
        let contents = vec!["first doc".to_string(), "second doc".to_string()];
        let prompt = extract_learnings("some query", &contents, 3, 2);
        assert_eq!(prompt.matches("<content>").count(), 2);
        assert!(prompt.contains("first doc"));
        assert!(prompt.contains("second doc"));
    }

    #[test]
    fn continuation_lists_follow_ups() {
        let text = continuation_query(
            "understand adoption",
            &["Which companies adopted it?".to_string()],
        );
        assert!(text.starts_with("Previous research goal: understand adoption"));
        assert!(text.contains("- Which companies adopted it?"));
    }
}
