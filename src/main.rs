use anyhow::Result;
use bid_rag::commands::{
    bid_context, check_conflicts, clear_collection, index_directory, index_files, inspect_file,
    list_documents, parse_tag, search, seed_samples, show_stats, show_status,
};
use bid_rag::config::{run_interactive_config, show_config};
use bid_rag::documents::{DocumentType, MetadataValue};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bid-rag")]
#[command(about = "Document indexing, retrieval and conflict checks for construction bids")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embeddings, chunking and storage
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index one or more files into a collection
    Index {
        /// Files to index (PDF, DOCX, XLSX, TXT, EML, MSG)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Collection to index into
        #[arg(long = "type", value_enum)]
        document_type: DocumentType,
        /// Document id to use instead of the file name (single file only)
        #[arg(long)]
        doc_id: Option<String>,
        /// Extra metadata as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, MetadataValue)>,
    },
    /// Index a directory tree, choosing each file's collection from its name
    IndexDir {
        dir: PathBuf,
    },
    /// Load the built-in sample RFQs and bids
    Seed,
    /// Search one collection
    Search {
        query: String,
        #[arg(long = "type", value_enum, default_value = "rfq")]
        document_type: DocumentType,
        /// Number of results (defaults to the configured top k)
        #[arg(long)]
        k: Option<usize>,
    },
    /// Retrieve historical bids and similar RFQ chunks for an RFQ
    Context {
        /// RFQ file to draft against
        #[arg(conflicts_with = "text", required_unless_present = "text")]
        file: Option<PathBuf>,
        /// RFQ text given inline
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        bids: Option<usize>,
        #[arg(long)]
        rfq_chunks: Option<usize>,
    },
    /// Compare files pairwise and flag highly similar pairs
    Conflicts {
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
        /// Similarity above which a pair is reported
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Extract a file without indexing it
    Inspect {
        file: PathBuf,
    },
    /// Show record counts per collection
    Stats,
    /// List indexed documents
    Documents {
        #[arg(long = "type", value_enum)]
        document_type: Option<DocumentType>,
    },
    /// Delete every record of one collection
    Clear {
        #[arg(value_enum)]
        document_type: DocumentType,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show configuration, storage and consistency status
    Status {
        /// Prune stored chunks the ledger does not account for
        #[arg(long)]
        repair: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index {
            paths,
            document_type,
            doc_id,
            tags,
        } => {
            index_files(&paths, document_type, doc_id, tags).await?;
        }
        Commands::IndexDir { dir } => {
            index_directory(&dir).await?;
        }
        Commands::Seed => {
            seed_samples().await?;
        }
        Commands::Search {
            query,
            document_type,
            k,
        } => {
            search(&query, document_type, k).await?;
        }
        Commands::Context {
            file,
            text,
            bids,
            rfq_chunks,
        } => {
            bid_context(file, text, bids, rfq_chunks).await?;
        }
        Commands::Conflicts { files, threshold } => {
            check_conflicts(&files, threshold).await?;
        }
        Commands::Inspect { file } => {
            inspect_file(&file).await?;
        }
        Commands::Stats => {
            show_stats().await?;
        }
        Commands::Documents { document_type } => {
            list_documents(document_type).await?;
        }
        Commands::Clear { document_type, yes } => {
            clear_collection(document_type, yes).await?;
        }
        Commands::Status { repair } => {
            show_status(repair).await?;
        }
    }

    Ok(())
}
