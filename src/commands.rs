use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{Config, EmbeddingProvider};
use crate::conflicts::ConflictDocument;
use crate::documents::{DocumentType, KeywordClassifier, Metadata, MetadataValue, keys};
use crate::embeddings::OllamaEmbedder;
use crate::extraction::{DocumentFormat, extract_key_info, extract_text};
use crate::retrieval::RetrievalService;

const PREVIEW_CHARS: usize = 200;

/// Parse a `key=value` tag given on the command line
#[inline]
pub fn parse_tag(raw: &str) -> Result<(String, MetadataValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid tag '{raw}': expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid tag '{raw}': key cannot be empty"));
    }
    Ok((key.to_string(), MetadataValue::parse_loose(value.trim())))
}

async fn load_service() -> Result<RetrievalService> {
    let config = Config::load_default().context("Failed to load configuration")?;
    RetrievalService::new(&config)
        .await
        .context("Failed to initialize retrieval service")
}

fn progress_bar(len: usize, template: &str) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(len as u64).with_style(
            ProgressStyle::with_template(template).expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

fn preview(text: &str, chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() > chars {
        format!("{}...", flattened.chars().take(chars).collect::<String>())
    } else {
        flattened
    }
}

/// Index one or more files into the collection for `document_type`
#[inline]
pub async fn index_files(
    paths: &[PathBuf],
    document_type: DocumentType,
    doc_id: Option<String>,
    tags: Vec<(String, MetadataValue)>,
) -> Result<()> {
    if doc_id.is_some() && paths.len() > 1 {
        bail!("--doc-id can only be used when indexing a single file");
    }

    let service = load_service().await?;
    let mut base_metadata: Metadata = tags.into_iter().collect();
    if let Some(doc_id) = doc_id {
        base_metadata.insert(keys::DOC_ID.to_string(), doc_id.into());
    }

    let bar = progress_bar(paths.len(), "{bar:30} [{pos}/{len}] Indexing {msg}");
    let mut failures = 0;

    for path in paths {
        bar.set_message(path.display().to_string());
        match service
            .index_file(path, document_type, base_metadata.clone())
            .await
        {
            Ok(report) => {
                bar.suspend(|| {
                    println!(
                        "{} {} → {} ({} chunks, {} words)",
                        style("✓").green(),
                        path.display(),
                        report.doc_id,
                        report.chunks_indexed,
                        report.word_count
                    );
                });
            }
            Err(e) => {
                failures += 1;
                error!("Failed to index {}: {}", path.display(), e);
                bar.suspend(|| {
                    println!("{} {}: {}", style("✗").red(), path.display(), e);
                });
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "Indexed {} of {} files into {}",
        paths.len() - failures,
        paths.len(),
        document_type.collection_name()
    );

    if failures > 0 {
        bail!("{} files failed to index", failures);
    }
    Ok(())
}

/// Index a directory tree, classifying files by name
#[inline]
pub async fn index_directory(dir: &Path) -> Result<()> {
    let service = load_service().await?;

    let spinner = progress_bar(0, "{spinner} Indexing {msg}");
    spinner.set_message(dir.display().to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let report = service
        .index_directory(dir, &KeywordClassifier::default())
        .await;
    spinner.finish_and_clear();
    let report = report.with_context(|| format!("Failed to index {}", dir.display()))?;

    for file in &report.indexed {
        println!(
            "{} {} → {} [{}] ({} chunks)",
            style("✓").green(),
            file.path.display(),
            file.report.doc_id,
            file.report.document_type,
            file.report.chunks_indexed
        );
    }
    for file in &report.failed {
        println!("{} {}: {}", style("✗").red(), file.path.display(), file.error);
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} unsupported files", report.skipped.len());
    }

    println!();
    println!(
        "Indexed {} files ({} chunks), {} failed",
        report.indexed.len(),
        report.total_chunks(),
        report.failed.len()
    );
    Ok(())
}

/// Load the built-in sample RFQs and bids
#[inline]
pub async fn seed_samples() -> Result<()> {
    let service = load_service().await?;
    let reports = service.seed_samples().await?;

    for report in &reports {
        println!(
            "{} {} [{}] ({} chunks)",
            style("✓").green(),
            report.doc_id,
            report.document_type,
            report.chunks_indexed
        );
    }
    println!("Seeded {} sample documents", reports.len());
    Ok(())
}

/// Search one collection and print ranked hits
#[inline]
pub async fn search(query: &str, document_type: DocumentType, k: Option<usize>) -> Result<()> {
    let service = load_service().await?;
    let k = k.unwrap_or(service.retrieval_config().default_top_k);
    let outcome = service.search(query, document_type, k).await?;

    if let Some(message) = &outcome.message {
        println!("{}", style(message).yellow());
        println!("Use 'bid-rag index' or 'bid-rag seed' to add documents.");
        return Ok(());
    }

    println!(
        "Top {} results from {}:",
        outcome.total_found(),
        document_type.collection_name()
    );
    println!();
    for (rank, hit) in outcome.results.iter().enumerate() {
        let source = hit
            .metadata
            .get(keys::SOURCE_FILE)
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "{}. {} {}",
            rank + 1,
            style(&hit.id).bold(),
            style(format!("(similarity {:.3})", hit.similarity_score)).cyan()
        );
        if !source.is_empty() {
            println!("   Source: {}", source);
        }
        println!("   {}", preview(&hit.text, PREVIEW_CHARS));
        println!();
    }
    Ok(())
}

/// Print the historical bids and RFQ chunks most relevant to an RFQ
#[inline]
pub async fn bid_context(
    file: Option<PathBuf>,
    text: Option<String>,
    n_bids: Option<usize>,
    n_rfq: Option<usize>,
) -> Result<()> {
    let service = load_service().await?;

    let rfq_text = match (file, text) {
        (Some(path), None) => {
            let format = DocumentFormat::from_path(&path)?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            service.extract(bytes, format).await?.text
        }
        (None, Some(text)) => text,
        _ => bail!("provide either an RFQ file or --text"),
    };

    let bundle = service
        .get_context_for_bid(
            &rfq_text,
            n_bids.unwrap_or(service.retrieval_config().n_historical_bids),
            n_rfq.unwrap_or(service.retrieval_config().n_rfq_chunks),
        )
        .await?;

    println!("{}", style("Historical bids").bold().yellow());
    if bundle.historical_bids.is_empty() {
        println!("   (none indexed)");
    }
    for hit in &bundle.historical_bids {
        println!("   {:.3}  {}", hit.similarity_score, hit.id);
        println!("          {}", preview(&hit.text, 120));
    }

    println!();
    println!("{}", style("Similar RFQ chunks").bold().yellow());
    if bundle.similar_rfqs.is_empty() {
        println!("   (none indexed)");
    }
    for hit in &bundle.similar_rfqs {
        println!("   {:.3}  {}", hit.similarity_score, hit.id);
        println!("          {}", preview(&hit.text, 120));
    }

    println!();
    println!("Total context chunks: {}", bundle.total_context_chunks);
    Ok(())
}

/// Compare a batch of files pairwise and report likely conflicts
#[inline]
pub async fn check_conflicts(files: &[PathBuf], threshold: Option<f32>) -> Result<()> {
    let service = load_service().await?;
    let threshold = threshold.unwrap_or(service.conflict_threshold());

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let format = DocumentFormat::from_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let extracted = service.extract(bytes, format).await?;
        let label = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        documents.push(ConflictDocument::new(extracted.text, label));
    }

    let findings = service.detect_conflicts(&documents, threshold).await?;

    if findings.is_empty() {
        println!(
            "{} No conflicts above {:.2} among {} documents",
            style("✓").green(),
            threshold,
            documents.len()
        );
        return Ok(());
    }

    println!(
        "{} {} potential conflicts (threshold {:.2}):",
        style("⚠").yellow(),
        findings.len(),
        threshold
    );
    println!();
    for finding in &findings {
        println!(
            "{} ↔ {}  similarity {:.3}  severity {}",
            style(&finding.label_a).bold(),
            style(&finding.label_b).bold(),
            finding.similarity_score,
            finding.severity
        );
        println!("   A: {}", preview(&finding.preview_a, 120));
        println!("   B: {}", preview(&finding.preview_b, 120));
        println!();
    }
    Ok(())
}

/// Extract a file without indexing it and show what was found
#[inline]
pub async fn inspect_file(path: &Path) -> Result<()> {
    let format = DocumentFormat::from_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let extracted = tokio::task::spawn_blocking(move || extract_text(&bytes, format))
        .await
        .context("Extraction task failed")??;

    println!("{}", style(path.display()).bold());
    println!("   Format: {}", extracted.format);
    println!("   Characters: {}", extracted.char_count());
    println!("   Words: {}", extracted.word_count());
    for (key, value) in &extracted.properties {
        println!("   {}: {}", key, value);
    }

    let key_info = extract_key_info(&extracted.text);
    let sections = [
        ("Dates", &key_info.dates),
        ("Monetary values", &key_info.monetary_values),
        ("Percentages", &key_info.percentages),
        ("Emails", &key_info.emails),
        ("Phone numbers", &key_info.phone_numbers),
    ];
    println!();
    for (title, values) in sections {
        if !values.is_empty() {
            println!("   {}: {}", title, values.join(", "));
        }
    }

    println!();
    println!("{}", preview(&extracted.text, 500));
    Ok(())
}

/// Print per-collection record counts
#[inline]
pub async fn show_stats() -> Result<()> {
    let service = load_service().await?;
    let stats = service.stats().await?;

    println!("Model: {} ({} dimensions)", stats.model, stats.embedding_dimension);
    println!("Storage: {}", stats.storage);
    println!();
    for collection in &stats.collections {
        println!(
            "   {:<20} {:>8} chunks  [{}]",
            collection.collection, collection.count, collection.document_type
        );
    }
    println!("   {:<20} {:>8} chunks", "total", stats.total_records());
    Ok(())
}

/// List ledger rows, optionally for one document type
#[inline]
pub async fn list_documents(document_type: Option<DocumentType>) -> Result<()> {
    let service = load_service().await?;
    let documents = service.list_documents(document_type).await?;

    if documents.is_empty() {
        println!("No documents have been indexed yet.");
        println!("Use 'bid-rag index' or 'bid-rag seed' to add documents.");
        return Ok(());
    }

    println!("Indexed documents ({} total):", documents.len());
    println!();
    for document in &documents {
        println!("📄 {} [{}]", document.doc_id, document.document_type);
        println!("   Source: {} ({})", document.source_file, document.file_type);
        println!(
            "   Chunks: {}, words: {}, characters: {}",
            document.chunk_count, document.word_count, document.char_count
        );
        println!(
            "   Indexed: {}",
            document.indexed_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
    }
    Ok(())
}

/// Remove every record of one document type
#[inline]
pub async fn clear_collection(document_type: DocumentType, assume_yes: bool) -> Result<()> {
    if !assume_yes
        && !Confirm::new()
            .with_prompt(format!(
                "Delete every record in {}? This cannot be undone.",
                document_type.collection_name()
            ))
            .default(false)
            .interact()?
    {
        println!("Nothing deleted.");
        return Ok(());
    }

    let service = load_service().await?;
    let removed = service.clear_collection(document_type).await?;
    info!("Cleared {} via CLI", document_type.collection_name());
    println!(
        "{} Cleared {} ({} documents removed)",
        style("✓").green(),
        document_type.collection_name(),
        removed
    );
    Ok(())
}

/// Show configuration, model availability, storage and consistency
#[inline]
pub async fn show_status(repair: bool) -> Result<()> {
    let config = Config::load_default().unwrap_or_default();

    println!("📊 Bid RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    println!("   Base directory: {}", config.get_base_dir().display());
    println!(
        "   Embeddings: {} / {} ({} dimensions)",
        config.embedding.provider, config.embedding.model, config.embedding.dimension
    );
    println!(
        "   Chunking: {} characters, {} overlap",
        config.chunking.chunk_size, config.chunking.overlap
    );
    println!("   Storage: {}", config.storage.backend);

    if config.embedding.provider == EmbeddingProvider::Ollama {
        println!();
        println!("🤖 Ollama Status:");
        let embedding = config.embedding.clone();
        let health = tokio::task::spawn_blocking(move || {
            OllamaEmbedder::new(&embedding)
                .map_err(anyhow::Error::from)
                .and_then(|client| client.health_check())
        })
        .await
        .context("Health check task failed")?;
        match health {
            Ok(()) => println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.embedding.ollama.host, config.embedding.ollama.port
            ),
            Err(e) => println!("   ❌ Ollama: {}", e),
        }
    }

    println!();
    println!("🗄️  Storage Status:");
    let service = match RetrievalService::new(&config).await {
        Ok(service) => {
            println!("   ✅ Vector store and ledger: Connected");
            service
        }
        Err(e) => {
            println!("   ❌ Failed to open storage - {}", e);
            return Ok(());
        }
    };

    match service.stats().await {
        Ok(stats) => {
            for collection in &stats.collections {
                println!("   📊 {}: {} chunks", collection.collection, collection.count);
            }
        }
        Err(e) => println!("   ⚠️  Failed to read collection stats: {}", e),
    }

    println!();
    println!("🔍 Consistency:");
    match service.check_consistency().await {
        Ok(report) if report.is_consistent => {
            println!("   ✅ {}", report.summary());
        }
        Ok(report) => {
            println!("   ⚠️  {}", report.summary());
            for issue in report.inconsistent_collections() {
                println!(
                    "   🚫 {}: {} chunks in ledger, {} records stored",
                    issue.collection, issue.ledger_chunks, issue.stored_records
                );
            }

            if repair {
                match service.repair_consistency().await {
                    Ok(pruned) => println!("   🔧 Pruned {} stale chunks", pruned),
                    Err(e) => {
                        warn!("Repair failed: {}", e);
                        println!("   ❌ Repair failed: {}", e);
                    }
                }
            } else {
                println!("   💡 Run 'bid-rag status --repair' to prune stale chunks");
            }
        }
        Err(e) => println!("   ❌ Failed to check consistency: {}", e),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'bid-rag index <files> --type rfq' to index documents");
    println!("   • Use 'bid-rag search <query> --type bid' to query a collection");
    println!("   • Use 'bid-rag context <rfq-file>' to assemble drafting context");

    Ok(())
}
