//! Prompt templates for the three LLM operations.
//!
//! Each operation is a single one-shot prompt. The templates use named
//! placeholders substituted with `str::replace`; user-supplied text is
//! inserted verbatim, so the prompts instruct the model to treat it as data.

/// Extracts atomic factual statements from a conversation transcript.
///
/// The model must answer with a strict JSON object
/// `{"memories":[{"data":"..."}]}`; anything else is treated as
/// "nothing to remember".
pub const FACT_EXTRACTION: &str = r#"You are a memory extraction system for a personal AI assistant. Read the conversation below and extract facts worth remembering about the user for future conversations.

Extract only:
- Factual statements about the user (name, age, location, relationships, health)
- Preferences (likes, dislikes, habits)
- Identifying context (job, projects, plans)

Rules:
- Each memory must be a single standalone sentence that makes sense without the conversation.
- Do not extract assistant statements, questions, or speculation.
- Do not invent facts that are not stated.
- If there is nothing worth remembering, return an empty list.

Respond with only a JSON object of this exact shape, no explanation:
{"memories": [{"data": "..."}, {"data": "..."}]}

Conversation:
{conversation}"#;

/// Merges a new statement into an existing memory.
///
/// The model must answer with only the merged text.
pub const MERGE_MEMORIES: &str = r#"You maintain a memory store for a personal AI assistant. Two memory entries below describe the same fact about the user. Merge them into one entry.

Rules:
- Preserve all factual information from both entries.
- When the entries conflict, the new entry wins.
- Remove duplicated phrasing; keep the result a single concise statement.
- The pronouns "I", "Me", "My" and the word "User" all denote the user.
- Respond with only the merged memory text, no quotes, no explanation.

Existing memory:
{existing}

New memory:
{new}"#;

/// Reorders search results by relevance to the query.
///
/// The model must answer with `{"ranked_indices":[...]}` referencing input
/// positions; omitted positions are dropped from the final list.
pub const RERANK_RESULTS: &str = r#"You rank memory search results for a personal AI assistant. Given the query and the numbered candidate memories below, order the candidates from most to least relevant to the query.

Rules:
- Reference candidates by their zero-based index.
- Leave out candidates that are irrelevant to the query.
- Respond with only a JSON object of this exact shape, no explanation:
{"ranked_indices": [2, 0, 1]}

Query:
{query}

Candidates:
{candidates}"#;

/// Renders the extraction prompt for a transcript.
#[must_use]
pub fn fact_extraction(conversation: &str) -> String {
    render(FACT_EXTRACTION, &[("{conversation}", conversation)])
}

/// Renders the merge prompt for an existing/new memory pair.
#[must_use]
pub fn merge_memories(existing: &str, new: &str) -> String {
    render(MERGE_MEMORIES, &[("{existing}", existing), ("{new}", new)])
}

/// Renders the rerank prompt for a query and numbered candidate list.
#[must_use]
pub fn rerank_results(query: &str, candidates: &str) -> String {
    render(
        RERANK_RESULTS,
        &[("{query}", query), ("{candidates}", candidates)],
    )
}

/// Substitutes every placeholder in a single pass over the template.
///
/// Only the template is scanned for placeholder tokens; substituted values
/// go straight into the output, so a memory or query containing a literal
/// `{new}` or `{candidates}` is carried through untouched.
fn render(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((offset, key, value)) = substitutions
        .iter()
        .filter_map(|(key, value)| rest.find(key).map(|offset| (offset, *key, *value)))
        .min_by_key(|(offset, _, _)| *offset)
    {
        rendered.push_str(&rest[..offset]);
        rendered.push_str(value);
        rest = &rest[offset + key.len()..];
    }
    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_embeds_conversation() {
        let prompt = fact_extraction("user: My name is Zack.");
        assert!(prompt.contains("user: My name is Zack."));
        assert!(prompt.contains("\"memories\""));
        assert!(!prompt.contains("{conversation}"));
    }

    #[test]
    fn test_merge_prompt_embeds_both_sides() {
        let prompt = merge_memories("Likes tea", "Prefers green tea");
        assert!(prompt.contains("Likes tea"));
        assert!(prompt.contains("Prefers green tea"));
        assert!(prompt.contains("the new entry wins"));
    }

    #[test]
    fn test_rerank_prompt_embeds_query_and_candidates() {
        let prompt = rerank_results("food", "0. pizza\n1. jogging");
        assert!(prompt.contains("Query:\nfood"));
        assert!(prompt.contains("1. jogging"));
        assert!(prompt.contains("ranked_indices"));
    }

    #[test]
    fn test_merge_value_containing_placeholder_token_survives() {
        // A memory whose text contains a literal later placeholder must
        // not be re-substituted.
        let prompt = merge_memories("User wrote {new} in a doc", "User prefers tea");
        assert!(prompt.contains("User wrote {new} in a doc"));
        assert!(prompt.contains("User prefers tea"));
    }

    #[test]
    fn test_rerank_query_containing_placeholder_token_survives() {
        let prompt = rerank_results("what is {candidates}?", "0. a fact");
        assert!(prompt.contains("Query:\nwhat is {candidates}?"));
        assert!(prompt.contains("0. a fact"));
    }

    #[test]
    fn test_render_handles_adjacent_and_missing_placeholders() {
        assert_eq!(render("{a}{b}", &[("{a}", "x"), ("{b}", "y")]), "xy");
        assert_eq!(render("no tokens here", &[("{a}", "x")]), "no tokens here");
    }
}
