//! hashdex - content-addressed inventory of a directory tree.
//!
//! Usage:
//!   hashdex index [ROOT]          Hash every file under ROOT into a CSV manifest
//!   hashdex diff EXTERNAL         Compare the manifest with a sha1sum/md5sum listing
//!   hashdex dups                  Report duplicate content in the manifest
//!   hashdex signatures -o OUT     Write a compact hash-size index
//!   hashdex --help                Show help

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hashdex_analyze::{DuplicateConfig, DuplicateFinder, ExternalManifest, extern_diff};
use hashdex_core::{IndexConfig, ReuseMode, default_manifest_path};
use hashdex_scan::{IndexPipeline, IndexProgress, load_prior};
use hashdex_store::{FileDatabase, SignatureIndex};

#[derive(Parser)]
#[command(
    name = "hashdex",
    version,
    about = "Content-addressed inventory of a directory tree",
    long_about = "hashdex walks a directory tree, hashes every regular file and \
                  writes a CSV manifest. The manifest can then be compared with \
                  checksum listings produced elsewhere, searched for duplicate \
                  content, or condensed into a signature index."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hash every file under a root into a manifest
    Index {
        /// Tree to index
        #[arg(env = "TRACK_ROOT", default_value = ".")]
        root: PathBuf,

        /// Manifest path (defaults to <ROOT>/hashdex.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also compute MD5 in the same pass
        #[arg(long)]
        md5: bool,

        /// Reuse digests from the previous manifest
        #[arg(long, default_value = "off")]
        reuse: ReuseArg,

        /// Hash worker threads (0 = one per core, at most 8)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Leave zero-length files out of the manifest
        #[arg(long)]
        skip_empty: bool,

        /// Skip dot-files and dot-directories
        #[arg(long)]
        no_hidden: bool,

        /// Glob pattern to ignore (repeatable)
        #[arg(long = "ignore", value_name = "PAT")]
        ignore: Vec<String>,

        /// Seconds to wait for a file to open (0 = wait forever)
        #[arg(long, default_value = "10")]
        open_timeout: f64,
    },

    /// Compare the manifest with an external checksum listing
    Diff {
        /// Listing in sha1sum/md5sum format
        external: PathBuf,

        #[command(flatten)]
        source: ManifestSource,

        /// Print only paths missing from the listing
        #[arg(long)]
        local: bool,

        /// Print only listing paths missing locally
        #[arg(long)]
        remote: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Report duplicate content in the manifest
    Dups {
        #[command(flatten)]
        source: ManifestSource,

        /// Minimum file size to consider (e.g., "1KB", "1MB")
        #[arg(short, long, default_value = "1")]
        min_size: String,

        /// Maximum number of duplicate groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Write or query a hash-size signature index
    Signatures {
        #[command(flatten)]
        source: ManifestSource,

        /// Where to write the index
        #[arg(short, long, required_unless_present = "index")]
        output: Option<PathBuf>,

        /// Existing index to query
        #[arg(long, requires = "has_size", conflicts_with = "output")]
        index: Option<PathBuf>,

        /// Size to look up in the index
        #[arg(long, requires = "index")]
        has_size: Option<u64>,
    },
}

/// Where to find the local manifest.
#[derive(Args)]
struct ManifestSource {
    /// Manifest file (takes precedence over --root)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Indexed root whose default manifest to use
    #[arg(long, env = "TRACK_ROOT")]
    root: Option<PathBuf>,
}

impl ManifestSource {
    fn path(&self) -> PathBuf {
        match (&self.manifest, &self.root) {
            (Some(manifest), _) => manifest.clone(),
            (None, Some(root)) => default_manifest_path(root),
            (None, None) => default_manifest_path(Path::new(".")),
        }
    }

    fn open(&self) -> Result<FileDatabase> {
        let path = self.path();
        FileDatabase::open(&path).wrap_err_with(|| format!("Cannot load manifest {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReuseArg {
    /// Hash every file
    Off,
    /// Same path, size and mtime
    Path,
    /// Same size only (fast, can be wrong)
    Size,
}

impl From<ReuseArg> for ReuseMode {
    fn from(arg: ReuseArg) -> Self {
        match arg {
            ReuseArg::Off => ReuseMode::Off,
            ReuseArg::Path => ReuseMode::SamePath,
            ReuseArg::Size => ReuseMode::SameSize,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Index {
            root,
            output,
            md5,
            reuse,
            jobs,
            skip_empty,
            no_hidden,
            ignore,
            open_timeout,
        } => {
            let open_timeout = parse_open_timeout(open_timeout)?;
            let config = IndexConfig::builder()
                .root(root)
                .output(output)
                .workers(jobs)
                .compute_md5(md5)
                .open_timeout(open_timeout)
                .reuse(ReuseMode::from(reuse))
                .skip_empty(skip_empty)
                .include_hidden(!no_hidden)
                .ignore_patterns(ignore)
                .build()
                .wrap_err("Invalid index options")?;
            run_index(config)?;
        }
        Command::Diff {
            external,
            source,
            local,
            remote,
            format,
        } => {
            run_diff(&external, &source, local, remote, format)?;
        }
        Command::Dups {
            source,
            min_size,
            top,
            format,
        } => {
            run_dups(&source, &min_size, top, format)?;
        }
        Command::Signatures {
            source,
            output,
            index,
            has_size,
        } => {
            if let (Some(index), Some(size)) = (index, has_size) {
                return lookup_signature_size(&index, size);
            }
            if let Some(output) = output {
                run_signatures(&source, &output)?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "hashdex=debug,warn"
    } else {
        "hashdex=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Index a tree, reusing the previous manifest when asked.
fn run_index(config: IndexConfig) -> Result<()> {
    let prior = match config.reuse {
        ReuseMode::Off => FileDatabase::default(),
        _ => load_prior(&config.manifest_path()),
    };
    if config.reuse != ReuseMode::Off {
        info!(records = prior.len(), "reuse cache loaded");
    }

    let pipeline = IndexPipeline::new(config).with_database(prior);
    let mut progress_rx = pipeline.subscribe();
    let printer = thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            loop {
                match progress_rx.blocking_recv() {
                    Ok(progress) => print_progress(&progress),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            eprintln!();
        })
        .wrap_err("Cannot start progress thread")?;

    let result = pipeline.run();
    drop(pipeline);
    let _ = printer.join();

    let summary = result.wrap_err("Indexing failed")?;
    println!(
        "{} files, {} in {:.2}s -> {}",
        summary.records,
        format_size(summary.bytes),
        summary.duration.as_secs_f64(),
        summary.manifest.display()
    );
    if summary.cache_hits > 0 {
        println!("{} digests reused", summary.cache_hits);
    }
    if summary.errors > 0 {
        warn!(errors = summary.errors, "some files could not be hashed; see the error column");
    }
    Ok(())
}

fn print_progress(progress: &IndexProgress) {
    let mut stderr = std::io::stderr().lock();
    let _ = write!(
        stderr,
        "\r{} files ({}), {} hashed, {} errors, {:.0} files/s   ",
        progress.files_walked,
        format_size(progress.bytes_walked),
        progress.files_hashed,
        progress.errors_count,
        progress.files_per_second()
    );
    let _ = stderr.flush();
}

/// Compare the local manifest with an external listing.
fn run_diff(
    external: &Path,
    source: &ManifestSource,
    local_only: bool,
    remote_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let remote = ExternalManifest::open(external)
        .wrap_err_with(|| format!("Cannot parse listing {}", external.display()))?;
    let local = source.open()?;
    let diff = extern_diff(&local, &remote);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&diff)?);
        }
        OutputFormat::Text => {
            let both = local_only == remote_only;
            if local_only || both {
                for path in &diff.local_only {
                    if both {
                        println!("local: {path}");
                    } else {
                        println!("{path}");
                    }
                }
            }
            if remote_only || both {
                for path in &diff.remote_only {
                    if both {
                        println!("remote: {path}");
                    } else {
                        println!("{path}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Report duplicate content.
fn run_dups(source: &ManifestSource, min_size: &str, top_n: usize, format: OutputFormat) -> Result<()> {
    let min_bytes = parse_size(min_size)?;
    let db = source.open()?;

    let dup_config = DuplicateConfig::builder()
        .min_size(min_bytes)
        .max_groups(top_n)
        .build()
        .wrap_err("Invalid duplicate options")?;
    let report = DuplicateFinder::with_config(dup_config).find_duplicates(&db);

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate Content Report");
            println!("{}", "─".repeat(70));
            println!();

            if !report.has_duplicates() {
                println!(" No duplicate files found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.groups.len(),
                    report.files_with_duplicates
                );
                println!(
                    " Total wasted space: {}",
                    format_size(report.total_wasted_space)
                );
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} each, {} wasted) {}",
                        i + 1,
                        group.count(),
                        format_size(group.size),
                        format_size(group.wasted_bytes),
                        group.hash
                    );
                    for path in &group.paths {
                        println!("   {path}");
                    }
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Build a signature index from the manifest.
fn run_signatures(source: &ManifestSource, output: &Path) -> Result<()> {
    let manifest = source.path();
    let index = SignatureIndex::from_manifest(&manifest)
        .wrap_err_with(|| format!("Cannot load manifest {}", manifest.display()))?;
    index
        .save(output)
        .wrap_err_with(|| format!("Cannot write {}", output.display()))?;
    println!("{} signatures -> {}", index.len(), output.display());
    Ok(())
}

/// Exit 0 if any signature has `size`, 1 otherwise.
fn lookup_signature_size(index: &Path, size: u64) -> Result<ExitCode> {
    let index = SignatureIndex::open(index)
        .wrap_err_with(|| format!("Cannot load index {}", index.display()))?;
    if index.has_size(size) {
        println!("present");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("absent");
        Ok(ExitCode::FAILURE)
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Seconds from the command line as an open timeout; zero or less disables it.
fn parse_open_timeout(secs: f64) -> Result<Option<Duration>> {
    if secs.is_nan() || secs <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .wrap_err_with(|| format!("Invalid open timeout: {secs}"))
}

/// Parse a size string (e.g., "512", "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(digits_end);
    let num: f64 = num
        .parse()
        .wrap_err_with(|| format!("Invalid size: {s:?}"))?;

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => bail!("Unknown size unit {other:?}"),
    };

    Ok((num * multiplier as f64) as u64)
}
