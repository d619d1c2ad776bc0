//! Terminal formatting for answers, search hits, and reports.

use seva_rag::{DebugSearch, DocumentSource, HealthReport, HealthStatus, IngestReport};
use seva_rag::{CollectionInfo, QueryResponse};

/// Maximum characters shown for a source snippet.
const SNIPPET_MAX_LEN: usize = 200;

/// Format an answer with its numbered sources.
pub fn format_answer(response: &QueryResponse) -> String {
    let mut output = format!("{}\n", response.answer.trim());
    if !response.sources.is_empty() {
        output.push_str("\nSources:\n");
        for (i, source) in response.sources.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, source_label(source)));
        }
    }
    output
}

/// Format a debug search with content previews.
pub fn format_search(search: &DebugSearch) -> String {
    let mut output = format!(
        "Query: {}\nCollection: {} ({} chunks)\nSources found: {}\n",
        search.query,
        search.collection.name,
        search.collection.count,
        search.sources.len()
    );
    for (i, source) in search.sources.iter().enumerate() {
        output.push_str(&format!(
            "\n{}. {}\n   {}\n",
            i + 1,
            source_label(source),
            truncate_text(&source.content, SNIPPET_MAX_LEN)
        ));
    }
    output
}

pub fn format_ingest(report: &IngestReport) -> String {
    if report.chunks_created == 0 {
        return "No content extracted from PDFs\n".to_string();
    }
    format!(
        "PDF processing completed successfully\n\
         Documents processed: {}\n\
         Chunks created: {}\n\
         Vector database entries: {}\n\
         Documents: {}\n",
        report.documents_processed,
        report.chunks_created,
        report.vector_entries,
        report.documents.join(", ")
    )
}

pub fn format_stats(info: &CollectionInfo) -> String {
    format!("Collection: {}\nChunks: {}\n", info.name, info.count)
}

pub fn format_health(report: &HealthReport) -> String {
    match report.status {
        HealthStatus::Healthy => format!(
            "healthy: {} ({} chunks)\n",
            report.collection.as_deref().unwrap_or("unknown"),
            report.count.unwrap_or_default()
        ),
        HealthStatus::Unhealthy => {
            format!("unhealthy: {}\n", report.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

fn source_label(source: &DocumentSource) -> String {
    let page = source.page.map(|page| format!(", Page {page}")).unwrap_or_default();
    format!("{}{page} (relevance {:.1}%)", source.document, source.relevance_score * 100.0)
}

/// Truncate to at most `max_chars` characters, appending `...` when cut.
fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}
