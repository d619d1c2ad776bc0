//! Grounding prompt assembly.

use crate::document::DocumentSource;
use crate::vectorstore::sort_by_relevance;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const INSTRUCTIONS: &str = r#"You are "Seva Sahayak" - an expert AI assistant for Punjab Government services. Your task is to answer user questions based ONLY on the provided context from official documents.

IMPORTANT INSTRUCTIONS:
- The documents contain information in both English and Punjabi languages
- Extract and use ALL relevant information from the context, regardless of language
- If you find information in Punjabi text, translate it to English in your response
- Look for key information like: procedures, required documents, fees, timelines, office addresses, contact details
- If the answer is partially available, provide what information you can find and specify what's missing
- Be thorough - check ALL context sections for relevant information
- Provide step-by-step procedures when available
- Include specific details like fees, required documents, and office locations
- After providing the answer, cite your sources using the exact format: [Source: Document Name, Page X]"#;

/// Renders the prompt sent to the language model.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    min_relevance: f32,
    max_sources: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self { min_relevance: -0.2, max_sources: 6 }
    }
}

impl PromptAssembler {
    /// Keep sources scoring strictly above `min_relevance`, at most `max_sources` of them.
    pub fn new(min_relevance: f32, max_sources: usize) -> Self {
        Self { min_relevance, max_sources }
    }

    /// Build the prompt for `query` grounded on `sources`.
    ///
    /// With no qualifying sources the context block is empty but the
    /// instructions and question are still present.
    pub fn assemble(&self, query: &str, sources: &[DocumentSource]) -> String {
        let mut selected: Vec<DocumentSource> =
            sources.iter().filter(|s| s.relevance_score > self.min_relevance).cloned().collect();
        sort_by_relevance(&mut selected);
        selected.truncate(self.max_sources);

        let context = selected
            .iter()
            .enumerate()
            .map(|(i, source)| render_context(i + 1, source))
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        format!(
            "{INSTRUCTIONS}\n\n\
             CONTEXT AVAILABLE ({count} sources found):\n---\n{context}\n---\n\n\
             USER QUESTION: {query}\n\n\
             DETAILED ANSWER (extract all relevant information from the context):",
            count = selected.len(),
        )
    }
}

fn render_context(position: usize, source: &DocumentSource) -> String {
    let page = source.page.map(|page| format!(", Page {page}")).unwrap_or_default();
    format!(
        "Context {position} (from '{document}'{page}, Relevance: {pct:.1}%)\n{content}",
        document = source.document,
        pct = source.relevance_score * 100.0,
        content = source.content,
    )
}
