use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use scribepack::{
    Chunk, DEFAULT_TARGET_TOKENS, NewDocument, OutputFormat, TiktokenCounter, TranscriptDb,
    aggregate_segments, document_from_media, load_segments, render,
};

/// Scribepack - token-aware transcript chunking
///
/// Consumes recognized speech segments (a JSON array of text + tick
/// intervals) and folds them into token-budgeted chunks for rendering or
/// SQLite storage.
#[derive(Parser, Debug)]
#[command(name = "scribepack")]
#[command(version, about = "Token-aware transcript chunking with SQLite storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a segment file into chunks and render them
    Chunk(ChunkArgs),
    /// Aggregate a segment file and store document + chunks in a database
    Store(StoreArgs),
    /// Render the stored chunks of a document
    Show(ShowArgs),
    /// Print statistics for a stored document
    Stats(StatsArgs),
    /// Delete a stored document (soft by default)
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
struct ChunkArgs {
    /// Path to the recognized-segment JSON file
    #[arg(value_name = "SEGMENTS")]
    segments: PathBuf,

    /// Target token budget per chunk
    #[arg(short, long, default_value_t = DEFAULT_TARGET_TOKENS)]
    tokens: usize,

    /// Output format: json, srt, vtt or txt
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Path to the recognized-segment JSON file
    #[arg(value_name = "SEGMENTS")]
    segments: PathBuf,

    /// Database file path
    #[arg(long, value_name = "PATH")]
    db: PathBuf,

    /// Source media file for document metadata (size, content hash)
    #[arg(long, value_name = "FILE")]
    media: Option<PathBuf>,

    /// Target token budget per chunk
    #[arg(short, long, default_value_t = DEFAULT_TARGET_TOKENS)]
    tokens: usize,

    /// Recognition language tag stored on the document
    #[arg(short, long, default_value = "en-US")]
    language: String,

    /// Document title (defaults to the media or segment file name)
    #[arg(long)]
    title: Option<String>,

    /// Document authors
    #[arg(long, num_args = 1..)]
    authors: Vec<String>,

    /// Document keywords
    #[arg(long, num_args = 1..)]
    keywords: Vec<String>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Document id
    #[arg(value_name = "DOCUMENT_ID")]
    document_id: String,

    /// Database file path
    #[arg(long, value_name = "PATH")]
    db: PathBuf,

    /// Output format: json, srt, vtt or txt
    #[arg(short, long, default_value = "json")]
    format: String,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Document id
    #[arg(value_name = "DOCUMENT_ID")]
    document_id: String,

    /// Database file path
    #[arg(long, value_name = "PATH")]
    db: PathBuf,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Document id
    #[arg(value_name = "DOCUMENT_ID")]
    document_id: String,

    /// Database file path
    #[arg(long, value_name = "PATH")]
    db: PathBuf,

    /// Remove the document row and its chunks instead of marking deleted
    #[arg(long)]
    hard: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Chunk(args) => run_chunk(args),
        Command::Store(args) => run_store(args),
        Command::Show(args) => run_show(args),
        Command::Stats(args) => run_stats(args),
        Command::Delete(args) => run_delete(args),
    }
}

fn chunk_segment_file(path: &Path, target_tokens: usize) -> Result<Vec<Chunk>> {
    let segments = load_segments(path)?;
    let counter = TiktokenCounter::new()?;
    let chunks = aggregate_segments(&segments, target_tokens, &counter)?;
    Ok(chunks)
}

fn run_chunk(args: ChunkArgs) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let chunks = chunk_segment_file(&args.segments, args.tokens)?;
    let output = render(&chunks, format);

    match args.output {
        Some(path) => {
            std::fs::write(&path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            println!("Wrote {} chunks to {}", chunks.len(), path.display());
        }
        None => println!("{output}"),
    }
    Ok(())
}

fn run_store(args: StoreArgs) -> Result<()> {
    let chunks = chunk_segment_file(&args.segments, args.tokens)?;

    let fields = match &args.media {
        Some(media) => document_from_media(
            media,
            args.title.clone(),
            args.authors.clone(),
            args.keywords.clone(),
            Some(args.language.clone()),
        )?,
        None => {
            let name = args
                .segments
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| args.segments.display().to_string());
            NewDocument {
                doc_title: args.title.clone().or(Some(name.clone())),
                name,
                language: Some(args.language.clone()),
                doc_authors: args.authors.clone(),
                doc_keywords: args.keywords.clone(),
                ..Default::default()
            }
        }
    };

    let mut db = TranscriptDb::open(&args.db)?;
    let document_id = db.create_document(&fields)?;
    let chunk_ids = db.create_chunks_batch(&document_id, &chunks)?;

    println!("Document ID: {document_id}");
    println!("Chunks created: {}", chunk_ids.len());
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let db = TranscriptDb::open(&args.db)?;
    let stored = db.get_chunks_by_document(&args.document_id)?;
    if stored.is_empty() && db.get_document(&args.document_id)?.is_none() {
        anyhow::bail!("Document not found: {}", args.document_id);
    }

    let chunks: Vec<Chunk> = stored.into_iter().map(Chunk::from).collect();
    println!("{}", render(&chunks, format));
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let db = TranscriptDb::open(&args.db)?;
    let stats = db
        .get_document_stats(&args.document_id)?
        .with_context(|| format!("Document not found: {}", args.document_id))?;

    println!("Document:    {}", stats.document_id);
    println!("Name:        {}", stats.name);
    println!("Uploaded:    {}", stats.upload_time.to_rfc3339());
    match stats.file_size {
        Some(size) => println!("File size:   {size} bytes"),
        None => println!("File size:   unknown"),
    }
    println!("Chunks:      {}", stats.chunk_count);
    println!("Archived:    {}", stats.is_archived);
    println!("Deleted:     {}", stats.is_deleted);
    Ok(())
}

fn run_delete(args: DeleteArgs) -> Result<()> {
    let mut db = TranscriptDb::open(&args.db)?;
    let deleted = db.delete_document(&args.document_id, !args.hard)?;
    if !deleted {
        anyhow::bail!("Document not found: {}", args.document_id);
    }
    let mode = if args.hard { "Hard" } else { "Soft" };
    println!("{mode} deleted document {}", args.document_id);
    Ok(())
}
