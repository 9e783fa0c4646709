//! vcscan - Version-control-aware file scanner and content hasher.
//!
//! Usage:
//!   vcscan files [PATH]        List and hash the files git would build from
//!   vcscan root [PATH]         Print the repository root
//!   vcscan info [PATH]         Print branch, commit and origin
//!   vcscan hash FILE           Print the git blob hash of a file
//!   vcscan fetch URL --name N  Check out a remote source
//!   vcscan --help              Show help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use vcscan_core::{FileEntry, ScanRequest, SourceKind, VcsConfig};
use vcscan_git::GitHandler;

#[derive(Parser)]
#[command(
    name = "vcscan",
    version,
    about = "A version-control-aware file scanner and content hasher",
    long_about = "vcscan lists the files of a git working tree the way a build \
                  system sees them, with git-compatible content hashes.\n\n\
                  Set VCSCAN_LOG (e.g. `VCSCAN_LOG=vcscan=debug`) for diagnostics."
)]
struct Cli {
    /// TOML config file (defaults to built-in settings)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List and hash files
    Files {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Include pattern (repeatable)
        #[arg(short, long)]
        include: Vec<String>,

        /// Exclude pattern (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Never prompt for credentials
        #[arg(long)]
        no_prompt: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the root of the repository containing a path
    Root {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Print branch, commit and origin of a working tree
    Info {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the git blob hash of a file or symlink
    Hash { file: PathBuf },

    /// Check out (or update) a remote source given as `<url>#<ref>`
    Fetch {
        url: String,

        /// Name of the source
        #[arg(short, long)]
        name: String,

        /// Kind of the source
        #[arg(short, long, default_value = "project")]
        kind: KindArg,

        /// Update an existing checkout to the latest commit of its ref
        #[arg(short, long)]
        update: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum KindArg {
    #[default]
    Project,
    Module,
    Action,
}

impl From<KindArg> for SourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Project => SourceKind::Project,
            KindArg::Module => SourceKind::Module,
            KindArg::Action => SourceKind::Action,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => VcsConfig::load(path).context("Failed to load config")?,
        None => VcsConfig::new(std::env::current_dir().context("Invalid working directory")?),
    };
    tracing::debug!(config = ?config, "Loaded configuration");
    let handler = GitHandler::new(config);

    match cli.command {
        Command::Files {
            path,
            include,
            exclude,
            no_prompt,
            json,
        } => {
            run_files(&handler, path, include, exclude, no_prompt, json).await?;
        }
        Command::Root { path } => {
            let root = handler.get_repo_root(&path, false).await?;
            println!("{}", root.display());
        }
        Command::Info { path, json } => {
            let info = handler.get_path_info(&path, false).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("branch: {}", info.branch);
                println!("commit: {}", info.commit_hash);
                println!("origin: {}", info.origin_url);
            }
        }
        Command::Hash { file } => {
            run_hash(&handler, &file).await?;
        }
        Command::Fetch {
            url,
            name,
            kind,
            update,
        } => {
            let kind = SourceKind::from(kind);
            let path = handler.ensure_remote_source(&url, &name, kind, true).await?;
            if update {
                handler.update_remote_source(&url, &name, kind, true).await?;
            }
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Install the log subscriber; a no-op if one is already set.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env("VCSCAN_LOG").unwrap_or_else(|_| EnvFilter::new("vcscan=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_files(
    handler: &GitHandler,
    path: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    no_prompt: bool,
    json: bool,
) -> Result<()> {
    let mut builder = ScanRequest::builder();
    builder.path(path).exclude(exclude).fail_on_prompt(no_prompt);
    if !include.is_empty() {
        builder.include(include);
    }
    let request = builder.build().context("Invalid scan request")?;

    let files = handler.get_files(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else {
        for file in &files {
            println!("{}", format_entry(file));
        }
        let profile = handler.hash_profile();
        eprintln!(
            "{} files, {} hashed in {:.2}s",
            files.len(),
            profile.calls,
            profile.total.as_secs_f64()
        );
    }

    Ok(())
}

async fn run_hash(handler: &GitHandler, file: &Path) -> Result<()> {
    let metadata = tokio::fs::symlink_metadata(file)
        .await
        .with_context(|| format!("Cannot stat {}", file.display()))?;
    if metadata.is_dir() {
        bail!("{} is a directory", file.display());
    }

    let hash = handler.hash_object(&metadata, file).await;
    if hash.is_empty() {
        bail!("Could not hash {}", file.display());
    }
    println!("{hash}");
    Ok(())
}

/// One line of text output: hash (or `-`), path, and a marker for symlinks.
fn format_entry(file: &FileEntry) -> String {
    let hash = if file.has_hash() { file.hash.as_str() } else { "-" };
    let marker = if file.is_symlink() { " @" } else { "" };
    format!("{hash}  {}{marker}", file.path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry() {
        let file = FileEntry::new("/repo/a.txt", "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(format_entry(&file), "ce013625030ba8dba906f756967f9e9ca394464a  /repo/a.txt");

        let link = FileEntry::new("/repo/link", "").with_mode("120000");
        assert_eq!(format_entry(&link), "-  /repo/link @");
    }
}
