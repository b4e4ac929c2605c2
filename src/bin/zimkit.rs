//! zimkit command-line tool
//!
//! Inspect, extract from, verify and create archives

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use zimkit::config::{FromToml, WriterConfig};
use zimkit::text::{beautify_file_size, beautify_integer};
use zimkit::writer::{ArchiveWriter, DirectorySource};
use zimkit::{CompressionMethod, Reader, ReaderConfig};

#[derive(Parser, Debug)]
#[command(name = "zimkit")]
#[command(about = "Inspect and build offline content archives")]
struct Args {
    /// Reader settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show header fields and metadata
    Info {
        archive: PathBuf,
        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries
    List {
        archive: PathBuf,
        /// Only this namespace
        #[arg(short, long)]
        namespace: Option<char>,
        /// Title order instead of URL order
        #[arg(long)]
        by_title: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print or save the content at a path such as /A/Main_Page
    Get {
        archive: PathBuf,
        url: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Title suggestions for a prefix
    Suggest {
        archive: PathBuf,
        prefix: String,
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Print a random page path
    Random { archive: PathBuf },
    /// Check the MD5 checksum
    Verify { archive: PathBuf },
    /// Build an archive from a directory tree
    Create {
        /// Directory to import
        source: PathBuf,
        /// Archive to write
        output: PathBuf,
        /// Main page, relative to the source directory
        #[arg(long)]
        main_page: Option<String>,
        /// Cluster compression (zstd, lz4, none)
        #[arg(long)]
        compression: Option<String>,
        /// Compression level
        #[arg(long)]
        level: Option<i32>,
        /// Cluster size threshold in bytes
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Writer settings (TOML), overridden by the flags above
        #[arg(long)]
        writer_config: Option<PathBuf>,
        /// Extra metadata as KEY=VALUE
        #[arg(short, long = "meta")]
        meta: Vec<String>,
    },
}

/// Parse compression method from CLI string
fn parse_compression(s: &str) -> Result<CompressionMethod> {
    match s.to_lowercase().as_str() {
        "zstd" => Ok(CompressionMethod::Zstd),
        "lz4" => Ok(CompressionMethod::Lz4),
        "none" => Ok(CompressionMethod::None),
        _ => bail!(
            "Invalid compression '{}'. Valid options: zstd, lz4, none",
            s
        ),
    }
}

fn open_reader(path: &PathBuf, config: &ReaderConfig) -> Result<Reader> {
    Reader::open_with_config(path, config.clone())
        .with_context(|| format!("Failed to open archive {}", path.display()))
}

fn info(reader: &mut Reader, json: bool) -> Result<()> {
    let metadata = reader.metadata()?;
    if json {
        println!("{}", metadata.to_json()?);
        return Ok(());
    }

    let header = *reader.archive().header();
    let namespaces = reader.archive_mut().namespaces()?;
    println!("Title:        {}", metadata.title);
    println!("Id:           {}", metadata.id);
    println!("Description:  {}", metadata.description);
    println!("Language:     {}", metadata.language);
    println!("Date:         {}", metadata.date);
    println!("Creator:      {}", metadata.creator);
    println!("Publisher:    {}", metadata.publisher);
    println!("Articles:     {}", beautify_integer(metadata.article_count as u64));
    println!("Media:        {}", beautify_integer(metadata.media_count as u64));
    println!("Entries:      {}", beautify_integer(metadata.global_count as u64));
    println!("Clusters:     {}", beautify_integer(header.cluster_count as u64));
    println!("Namespaces:   {}", namespaces);
    println!("Size:         {}", beautify_file_size(metadata.file_size));
    println!("Version:      {}.{}", header.version_major, header.version_minor);
    println!("Main page:    {}", metadata.main_page.as_deref().unwrap_or("-"));
    println!("Checksum:     {}", if metadata.has_checksum { "yes" } else { "no" });
    Ok(())
}

fn list(reader: &mut Reader, namespace: Option<char>, by_title: bool, limit: Option<usize>) -> Result<()> {
    let archive = reader.archive_mut();
    let entries = if by_title {
        archive.entries_by_title()
    } else {
        archive.entries()
    };

    let mut shown = 0;
    for entry in entries {
        let entry = entry?;
        if namespace.is_some_and(|ns| ns != entry.namespace) {
            continue;
        }
        if limit.is_some_and(|limit| shown >= limit) {
            break;
        }
        shown += 1;

        let kind = if let Some(target) = entry.redirect_index() {
            format!("-> #{}", target)
        } else if entry.is_deleted() {
            "deleted".to_string()
        } else if entry.is_link_target() {
            "linktarget".to_string()
        } else {
            String::new()
        };
        println!("{}\t{}\t{}", entry.long_url(), entry.title, kind);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let reader_config = match &args.config {
        Some(path) => ReaderConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ReaderConfig::default(),
    };

    match args.command {
        Command::Info { archive, json } => {
            let mut reader = open_reader(&archive, &reader_config)?;
            info(&mut reader, json)?;
        }
        Command::List {
            archive,
            namespace,
            by_title,
            limit,
        } => {
            let mut reader = open_reader(&archive, &reader_config)?;
            list(&mut reader, namespace, by_title, limit)?;
        }
        Command::Get {
            archive,
            url,
            output,
        } => {
            let mut reader = open_reader(&archive, &reader_config)?;
            let content = match reader.content_by_url(&url)? {
                Some(content) => content,
                None => bail!("No content at {}", url),
            };
            info!("{} ({}, {} bytes)", content.base_url, content.mime_type, content.article_size);
            match output {
                Some(path) => std::fs::write(&path, &content.data)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout().write_all(&content.data)?,
            }
        }
        Command::Suggest {
            archive,
            prefix,
            limit,
        } => {
            let mut reader = open_reader(&archive, &reader_config)?;
            reader.search_suggestions_smart(&prefix, limit)?;
            while let Some(suggestion) = reader.next_suggestion() {
                println!("{}\t{}", suggestion.title, suggestion.url);
            }
        }
        Command::Random { archive } => {
            let mut reader = open_reader(&archive, &reader_config)?;
            match reader.random_page_url()? {
                Some(url) => println!("{}", url),
                None => bail!("Archive has no content pages"),
            }
        }
        Command::Verify { archive } => {
            let mut reader = open_reader(&archive, &reader_config)?;
            if !reader.can_check_integrity() {
                bail!("{} has no checksum", archive.display());
            }
            reader
                .archive_mut()
                .check_integrity()
                .with_context(|| format!("{} is corrupted", archive.display()))?;
            println!("{}: OK", archive.display());
        }
        Command::Create {
            source,
            output,
            main_page,
            compression,
            level,
            chunk_size,
            writer_config,
            meta,
        } => {
            let mut config = match &writer_config {
                Some(path) => WriterConfig::from_toml_file(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => WriterConfig::default(),
            };
            if let Some(compression) = compression {
                config.compression = parse_compression(&compression)?;
            }
            if let Some(level) = level {
                config.compression_level = level;
            }
            if let Some(chunk_size) = chunk_size {
                config.min_chunk_size = chunk_size;
            }

            let mut articles = DirectorySource::new(&source)
                .with_context(|| format!("Failed to scan {}", source.display()))?;
            for item in &meta {
                let (key, value) = item
                    .split_once('=')
                    .with_context(|| format!("Metadata '{}' is not KEY=VALUE", item))?;
                articles = articles.with_metadata(key, value);
            }
            if let Some(main_page) = &main_page {
                articles = articles.with_main_page(main_page);
            }

            let summary = ArchiveWriter::new(config).create(&output, &mut articles)?;
            println!(
                "Wrote {} ({} entries, {} redirects, {} clusters, {})",
                summary.path.display(),
                beautify_integer(summary.article_count as u64),
                summary.redirect_count,
                summary.cluster_count,
                beautify_file_size(summary.file_size)
            );
        }
    }

    Ok(())
}
