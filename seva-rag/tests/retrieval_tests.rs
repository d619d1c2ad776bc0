//! End-to-end ingest, retrieval, and answer tests against the in-memory backend.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use seva_rag::{
    ChunkMetadata, CollectionInfo, DocumentChunk, DocumentSource, EmbeddingProvider,
    HealthStatus, InMemoryVectorStore, NO_INFORMATION_ANSWER, QueryExpander, RagConfig, RagError,
    RagService, Result, Retriever, TextExtractor, TextGenerator, VectorBackend, VectorStore,
};
use tokio::time::Instant;

const DIM: usize = 32;

const RESIDENCE_GUIDE: &str = "To apply for a residence certificate, visit the nearest Sewa \
    Kendra with proof of address. Required documents include an Aadhaar card, a ration card, \
    and a recent electricity bill. The government fee is Rs 50 per certificate.";

/// Deterministic bag-of-words embedding: each lowercase word bumps one bucket.
struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
            % DIM;
        vector[bucket] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Fails for any text containing `marker`, embeds everything else.
struct FlakyEmbedder {
    marker: &'static str,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(self.marker) {
            return Err(RagError::Embedding {
                provider: "flaky".to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        Ok(bag_of_words(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// An external backend that is never reachable.
struct UnreachableBackend;

#[async_trait]
impl VectorBackend for UnreachableBackend {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn probe(&self) -> Result<()> {
        Err(RagError::BackendUnavailable {
            backend: "unreachable".to_string(),
            message: "connection refused".to_string(),
        })
    }

    async fn add(&self, _chunks: &[DocumentChunk]) -> Result<()> {
        unreachable!("store must not use a backend that failed its probe")
    }

    async fn search(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<DocumentSource>> {
        unreachable!("store must not use a backend that failed its probe")
    }

    async fn text_search(&self, _: &str, _: usize) -> Result<Vec<DocumentSource>> {
        unreachable!("store must not use a backend that failed its probe")
    }

    async fn clear(&self) -> Result<()> {
        unreachable!("store must not use a backend that failed its probe")
    }

    async fn info(&self) -> Result<CollectionInfo> {
        unreachable!("store must not use a backend that failed its probe")
    }
}

/// Reachable backend whose vector search and stats always fail.
struct BrokenSearchBackend {
    inner: InMemoryVectorStore,
}

#[async_trait]
impl VectorBackend for BrokenSearchBackend {
    fn name(&self) -> &str {
        "broken-search"
    }

    async fn add(&self, chunks: &[DocumentChunk]) -> Result<()> {
        self.inner.add(chunks).await
    }

    async fn search(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<DocumentSource>> {
        Err(RagError::Search {
            backend: "broken-search".to_string(),
            message: "internal server error".to_string(),
        })
    }

    async fn text_search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentSource>> {
        self.inner.text_search(query, top_k).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn info(&self) -> Result<CollectionInfo> {
        Err(RagError::VectorStore {
            backend: "broken-search".to_string(),
            message: "count failed".to_string(),
        })
    }
}

/// Records prompts and answers with a canned string.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Apply at the Sewa Kendra. [Source: residence_guide, Page 1]".to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation {
            provider: "test".to_string(),
            message: "upstream 503".to_string(),
        })
    }
}

/// Reads files as plain text; a file containing `corrupt` fails extraction.
struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text = std::fs::read_to_string(path).map_err(|e| RagError::Extraction {
            document: path.display().to_string(),
            message: e.to_string(),
        })?;
        if text.contains("corrupt") {
            return Err(RagError::Extraction {
                document: path.display().to_string(),
                message: "invalid xref table".to_string(),
            });
        }
        Ok(text)
    }
}

/// Holds its thread inside `extract` until released, or gives up after five seconds.
#[derive(Default)]
struct GatedExtractor {
    started: AtomicBool,
    release: AtomicBool,
    released_in_time: AtomicBool,
}

impl TextExtractor for GatedExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        self.started.store(true, Ordering::SeqCst);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !self.release.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.released_in_time.store(self.release.load(Ordering::SeqCst), Ordering::SeqCst);
        PlainTextExtractor.extract(path)
    }
}

fn test_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(100)
        .chunk_overlap(20)
        .ingest_batch_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn chunk(document: &str, index: u32, content: &str) -> DocumentChunk {
    DocumentChunk {
        id: format!("{document}_chunk_{index}"),
        content: content.to_string(),
        metadata: ChunkMetadata {
            document: document.to_string(),
            page: index / 2 + 1,
            chunk_index: index,
        },
        embedding: None,
    }
}

fn service_with(
    store: Arc<VectorStore>,
    generator: Arc<dyn TextGenerator>,
    config: RagConfig,
) -> RagService {
    RagService::builder()
        .config(config)
        .vector_store(store)
        .generator(generator)
        .extractor(Arc::new(PlainTextExtractor))
        .build()
        .unwrap()
}

#[tokio::test]
async fn residence_guide_end_to_end() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let generator = Arc::new(RecordingGenerator::default());
    let service = service_with(store.clone(), generator.clone(), config);

    let chunks = seva_rag::chunking::chunk_text(RESIDENCE_GUIDE, "residence_guide", 100, 20);
    assert_eq!(chunks.len(), 3);
    service.ingest(&chunks).await.unwrap();
    assert_eq!(service.stats().await.unwrap().count, 3);

    let query = "How do I apply for a residence certificate?";
    let variants = QueryExpander::new().expand(query);
    assert_eq!(variants[0], query);
    assert!(variants.iter().any(|v| v == "residence certificate application"));

    let sources = service.retrieve(query).await.unwrap();
    assert_eq!(sources.len(), 3);
    assert!(sources.iter().all(|s| s.document == "residence_guide"));
    for pair in sources.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }

    let response = service.answer(query).await.unwrap();
    assert!(response.answer.contains("[Source: residence_guide, Page 1]"));
    assert_eq!(response.sources.len(), 3);

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Context 1 (from 'residence_guide', Page "));
    assert!(prompts[0].contains(&format!("USER QUESTION: {query}")));
}

#[tokio::test]
async fn retrieval_searches_at_most_max_variants() {
    let config = test_config();
    let embedder = Arc::new(HashEmbedder::new());
    let store = Arc::new(VectorStore::in_memory(embedder.clone(), &config));
    let retriever = Retriever::new(store, QueryExpander::new());

    // Residence and apply rules both fire, yielding eleven variants.
    retriever.retrieve("apply for residence", 8, 3).await.unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

    // Max of zero still searches the original query.
    retriever.retrieve("apply for residence", 8, 0).await.unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn duplicate_hits_across_variants_are_collapsed() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    store
        .add_documents(&[
            chunk("income_guide", 0, "income certificate application form"),
            chunk("income_guide", 1, "salary certificate from employer"),
        ])
        .await
        .unwrap();

    let retriever = Retriever::new(store, QueryExpander::new());
    let sources = retriever.retrieve("income", 8, 3).await.unwrap();

    // Every variant returns both chunks; only two distinct contents survive.
    assert_eq!(sources.len(), 2);
    assert_ne!(sources[0].content, sources[1].content);
}

#[tokio::test]
async fn empty_corpus_yields_no_information_answer() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let generator = Arc::new(RecordingGenerator::default());
    let service = service_with(store, generator.clone(), config);

    assert!(service.retrieve("income certificate").await.unwrap().is_empty());

    let response = service.answer("income certificate").await.unwrap();
    assert_eq!(response.answer, NO_INFORMATION_ANSWER);
    assert!(response.sources.is_empty());
    assert!(generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn blank_query_is_rejected_before_retrieval() {
    let config = test_config();
    let embedder = Arc::new(HashEmbedder::new());
    let store = Arc::new(VectorStore::in_memory(embedder.clone(), &config));
    let service = service_with(store, Arc::new(RecordingGenerator::default()), config);

    let err = service.answer("   \n").await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    assert_eq!(err.user_message(), "Message is required and must be a non-empty string");
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generation_failure_is_terminal_and_generic_to_users() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let service = service_with(store, Arc::new(FailingGenerator), config);
    service.ingest(&[chunk("fees", 0, "The fee is Rs 50.")]).await.unwrap();

    let err = service.answer("What is the fee?").await.unwrap_err();
    assert!(matches!(err, RagError::Generation { .. }));
    assert_eq!(err.user_message(), "Failed to process your question. Please try again.");
}

#[tokio::test]
async fn answer_returns_at_most_eight_sources() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let service = service_with(store, Arc::new(RecordingGenerator::default()), config);

    let chunks: Vec<DocumentChunk> = (0..20)
        .map(|i| chunk("fees", i, &format!("fee schedule entry {i} costs Rs {}", i * 10)))
        .collect();
    service.ingest(&chunks).await.unwrap();

    let response = service.answer("fee schedule").await.unwrap();
    assert_eq!(response.sources.len(), 8);
}

#[tokio::test]
async fn unreachable_backend_falls_back_to_memory() {
    let config = test_config();
    let store = VectorStore::connect(
        Arc::new(UnreachableBackend),
        Arc::new(HashEmbedder::new()),
        &config,
    )
    .await;

    assert!(store.is_in_memory());
    assert_eq!(store.backend_name(), "in-memory");

    store.add_documents(&[chunk("guide", 0, "Apply online.")]).await.unwrap();
    let info = store.collection_info().await.unwrap();
    assert_eq!(info.name, "seva-sahayak-documents (Memory)");
    assert_eq!(info.count, 1);
}

#[tokio::test]
async fn failed_vector_search_falls_back_to_text_search() {
    let config = test_config();
    let backend = Arc::new(BrokenSearchBackend { inner: InMemoryVectorStore::new() });
    let store = VectorStore::connect(backend, Arc::new(HashEmbedder::new()), &config).await;
    assert!(!store.is_in_memory());

    store
        .add_documents(&[
            chunk("guide", 0, "Visit the Sewa Kendra with your documents."),
            chunk("guide", 1, "Offices are closed on Sundays."),
        ])
        .await
        .unwrap();

    let sources = store.search_similar("sewa kendra", 8).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].relevance_score, 0.5);
    assert_eq!(sources[0].content, "Visit the Sewa Kendra with your documents.");
}

#[tokio::test]
async fn chunks_that_fail_to_embed_are_still_stored() {
    let config = test_config();
    let store = VectorStore::in_memory(Arc::new(FlakyEmbedder { marker: "Punjab" }), &config);

    store
        .add_documents(&[
            chunk("guide", 0, "Domicile certificate for Punjab residents."),
            chunk("guide", 1, "Income certificate for salaried applicants."),
        ])
        .await
        .unwrap();
    assert_eq!(store.collection_info().await.unwrap().count, 2);

    // The unembedded chunk still answers through containment scoring.
    let sources = store.search_similar("domicile", 8).await.unwrap();
    let domicile = sources
        .iter()
        .find(|s| s.content.starts_with("Domicile"))
        .expect("unembedded chunk should be searchable");
    assert_eq!(domicile.relevance_score, 0.5);
}

#[tokio::test]
async fn hits_at_or_below_similarity_threshold_are_dropped() {
    let chunks = [
        chunk("kendra", 0, "Sewa Kendra fee schedule."),
        chunk("kendra", 1, "Sewa Kendra opening hours."),
    ];

    // Unembedded chunks score 0.5 when they contain the query and 0.1 otherwise.
    let loose = test_config();
    let store = VectorStore::in_memory(Arc::new(FlakyEmbedder { marker: "Sewa" }), &loose);
    store.add_documents(&chunks).await.unwrap();
    assert_eq!(store.search_similar("fee", 8).await.unwrap().len(), 2);

    let strict = RagConfig::builder().similarity_threshold(0.1).build().unwrap();
    let store = VectorStore::in_memory(Arc::new(FlakyEmbedder { marker: "Sewa" }), &strict);
    store.add_documents(&chunks).await.unwrap();
    let sources = store.search_similar("fee", 8).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].content, "Sewa Kendra fee schedule.");
}

#[tokio::test]
async fn failed_query_embedding_degrades_to_text_search() {
    let config = test_config();
    let store = VectorStore::in_memory(Arc::new(FlakyEmbedder { marker: "Fee" }), &config);
    let chunks = [chunk("hours", 0, "Office hours are 9 to 5."), chunk("fees", 0, "Fee: Rs 50")];
    store.add_documents(&chunks).await.unwrap();

    // A vector search would rank both chunks; text search only returns the match.
    let sources = store.search_similar("Fee: Rs", 8).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].content, "Fee: Rs 50");
    assert_eq!(sources[0].relevance_score, 0.5);
}

#[tokio::test(start_paused = true)]
async fn ingest_batches_are_spaced_by_the_configured_delay() {
    let config = RagConfig::builder()
        .ingest_batch_size(2)
        .ingest_batch_delay(Duration::from_secs(1))
        .build()
        .unwrap();
    let store = VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config);
    let chunks: Vec<DocumentChunk> =
        (0..5).map(|i| chunk("guide", i, &format!("step {i} of the process"))).collect();

    let start = Instant::now();
    store.add_documents(&chunks).await.unwrap();

    // Three batches, two pauses, none after the last batch.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(store.collection_info().await.unwrap().count, 5);
}

#[tokio::test]
async fn reingest_replaces_the_corpus() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let service = service_with(store, Arc::new(RecordingGenerator::default()), config);

    let first: Vec<DocumentChunk> = (0..4).map(|i| chunk("old", i, &format!("old {i}"))).collect();
    service.ingest(&first).await.unwrap();
    service.ingest(&[chunk("new", 0, "new content")]).await.unwrap();

    assert_eq!(service.stats().await.unwrap().count, 1);
}

#[tokio::test]
async fn ingest_directory_skips_failed_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("residence_guide.pdf"), RESIDENCE_GUIDE).unwrap();
    std::fs::write(dir.path().join("fees.PDF"), "The government fee is Rs 50.").unwrap();
    std::fs::write(dir.path().join("broken.pdf"), "corrupt").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a source document").unwrap();

    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let service = service_with(store, Arc::new(RecordingGenerator::default()), config);

    let report = service.ingest_directory(dir.path()).await.unwrap();
    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.chunks_created, 4);
    assert_eq!(report.vector_entries, 4);
    assert_eq!(report.documents, vec!["fees".to_string(), "residence_guide".to_string()]);
}

#[tokio::test]
async fn slow_extraction_does_not_block_other_requests() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("residence_guide.pdf"), RESIDENCE_GUIDE).unwrap();

    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let extractor = Arc::new(GatedExtractor::default());
    let service = Arc::new(
        RagService::builder()
            .config(config)
            .vector_store(store)
            .generator(Arc::new(RecordingGenerator::default()))
            .extractor(extractor.clone())
            .build()
            .unwrap(),
    );
    service.ingest(&[chunk("existing", 0, "kept")]).await.unwrap();

    let ingest = tokio::spawn({
        let service = service.clone();
        let dir = dir.path().to_path_buf();
        async move { service.ingest_directory(&dir).await }
    });
    while !extractor.started.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The runtime thread must stay free while the extractor is parked.
    let info = service.stats().await.unwrap();
    assert_eq!(info.count, 1);
    extractor.release.store(true, Ordering::SeqCst);

    let report = ingest.await.unwrap().unwrap();
    assert!(extractor.released_in_time.load(Ordering::SeqCst));
    assert_eq!(report.documents, vec!["residence_guide".to_string()]);
    assert_eq!(report.chunks_created, 3);
}

#[tokio::test]
async fn empty_extraction_leaves_existing_corpus_alone() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("blank.pdf"), "   \n  ").unwrap();

    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let service = service_with(store, Arc::new(RecordingGenerator::default()), config);
    service.ingest(&[chunk("existing", 0, "kept")]).await.unwrap();

    let report = service.ingest_directory(dir.path()).await.unwrap();
    assert_eq!(report.chunks_created, 0);
    assert_eq!(report.documents_processed, 0);
    assert_eq!(service.stats().await.unwrap().count, 1);
}

#[tokio::test]
async fn health_check_reports_both_states() {
    let config = test_config();
    let store = Arc::new(VectorStore::in_memory(Arc::new(HashEmbedder::new()), &config));
    let healthy = service_with(store, Arc::new(RecordingGenerator::default()), config.clone());
    let report = healthy.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.collection.as_deref(), Some("seva-sahayak-documents (Memory)"));
    assert_eq!(report.count, Some(0));

    let backend = Arc::new(BrokenSearchBackend { inner: InMemoryVectorStore::new() });
    let store =
        Arc::new(VectorStore::connect(backend, Arc::new(HashEmbedder::new()), &config).await);
    let unhealthy = service_with(store, Arc::new(RecordingGenerator::default()), config);
    let report = unhealthy.health_check().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.error.unwrap().contains("count failed"));
}

#[tokio::test]
async fn debug_search_skips_expansion() {
    let config = test_config();
    let embedder = Arc::new(HashEmbedder::new());
    let store = Arc::new(VectorStore::in_memory(embedder.clone(), &config));
    let service = service_with(store, Arc::new(RecordingGenerator::default()), config);
    service.ingest(&[chunk("income", 0, "income certificate details")]).await.unwrap();
    let after_ingest = embedder.calls.load(Ordering::SeqCst);

    let debug = service.debug_search("income", 10).await.unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), after_ingest + 1);
    assert_eq!(debug.query, "income");
    assert_eq!(debug.collection.count, 1);
    assert_eq!(debug.sources.len(), 1);
}
