use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

use protoloc::{
    config::CONFIG_FILE_NAME, run_workflow, AppConfig, Completion, ExtractStats, Extractor,
    MergeStats, Merger, ParatranzClient, Progress, RemoteSync, Runner, WorkflowOutcome,
};

/// Protoloc - extract, sync and merge prototype translations
#[derive(Parser, Debug)]
#[command(name = "protoloc")]
#[command(author, version, long_about = None)]
struct Cli {
    /// Settings file (missing file means defaults)
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract translatable text into a catalog
    Extract {
        /// Root of the prototype tree to scan
        #[arg(long)]
        scan_dir: Option<String>,

        /// Catalog file to write (a directory in folder-grouped mode)
        #[arg(short, long)]
        output: Option<String>,

        /// Record fields to extract (e.g. "name,description,suffix")
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Rescan every file, ignoring the change cache
        #[arg(long)]
        full: bool,

        /// Keep values that look like localization key references
        #[arg(long)]
        keep_symbolic: bool,

        /// Write one catalog per top-level folder
        #[arg(long)]
        by_folder: bool,
    },

    /// Merge a translated catalog back into the documents
    Merge {
        /// Root of the prototype tree to merge into
        #[arg(long)]
        scan_dir: Option<String>,

        /// Translated catalog to apply
        #[arg(short, long)]
        catalog: Option<String>,

        /// Directory for merged documents
        #[arg(short, long)]
        output: Option<String>,

        /// Record fields to merge
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Upload extracted catalogs to the translation service
    Upload {
        /// Catalog file or directory (defaults to the configured output)
        path: Option<String>,

        #[arg(long)]
        project_id: Option<u64>,

        #[arg(long)]
        token: Option<String>,
    },

    /// Download the translated catalog from the service
    Download {
        /// Where to save the catalog (defaults to the configured path)
        output: Option<String>,

        #[arg(long)]
        project_id: Option<u64>,

        #[arg(long)]
        token: Option<String>,
    },

    /// Run extract, upload, download and merge in sequence
    Workflow {
        #[arg(long)]
        project_id: Option<u64>,

        #[arg(long)]
        token: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config);

    if let Err(e) = run(cli.command, config) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Extract {
            scan_dir,
            output,
            fields,
            full,
            keep_symbolic,
            by_folder,
        } => {
            let scan_dir = scan_dir.unwrap_or(config.scan_dir);
            let output = output.unwrap_or(config.extract_output);
            let by_folder = by_folder || config.by_folder;

            let mut extractor = Extractor::new(&scan_dir);
            extractor.set_fields(if fields.is_empty() {
                config.fields
            } else {
                fields
            });
            extractor.set_incremental(config.incremental && !full);
            extractor.set_filter_symbolic(config.filter_symbolic && !keep_symbolic);

            println!("Extracting from {}", scan_dir.bold());
            let progress = ConsoleProgress::new();
            let completion = if by_folder {
                extractor.run_by_folder(Path::new(&output), &progress)?
            } else {
                extractor.run(Path::new(&output), &progress)?
            };
            match completion {
                Completion::Finished(stats) => print_extract_summary(&stats, &output),
                Completion::Cancelled => println!("{}", "Extraction cancelled".yellow()),
            }
            Ok(())
        }

        Command::Merge {
            scan_dir,
            catalog,
            output,
            fields,
        } => {
            let scan_dir = scan_dir.unwrap_or(config.scan_dir);
            let catalog = catalog.unwrap_or(config.translation_file);
            let output = output.unwrap_or(config.merge_output);

            let mut merger = Merger::new(&scan_dir, &output);
            merger.set_fields(if fields.is_empty() {
                config.fields
            } else {
                fields
            });

            println!("Merging {} into {}", catalog.bold(), scan_dir.bold());
            let progress = ConsoleProgress::new();
            match merger.run(Path::new(&catalog), &progress)? {
                Completion::Finished(stats) => print_merge_summary(&stats, &output),
                Completion::Cancelled => println!("{}", "Merge cancelled".yellow()),
            }
            Ok(())
        }

        Command::Upload {
            path,
            project_id,
            token,
        } => {
            let client = build_client(project_id, token, &config)?;
            let path = path.unwrap_or(config.extract_output);
            client.upload(Path::new(&path))?;
            println!("{}", "Upload finished".green());
            Ok(())
        }

        Command::Download {
            output,
            project_id,
            token,
        } => {
            let client = build_client(project_id, token, &config)?;
            let output = output.unwrap_or(config.translation_file);
            client.download(Path::new(&output))?;
            println!("{} {}", "Saved translations to".green(), output.bold());
            Ok(())
        }

        Command::Workflow { project_id, token } => {
            let client = build_client(project_id, token, &config)?;
            let runner = Runner::new();
            let progress = ConsoleProgress::new();
            let outcome = runner.run(|| run_workflow(&config, &client, &progress))?;
            match outcome {
                WorkflowOutcome::Completed => {
                    println!(
                        "{} merged documents are under {}",
                        "Workflow finished:".green().bold(),
                        config.merge_output.bold()
                    );
                }
                WorkflowOutcome::Cancelled => println!("{}", "Workflow cancelled".yellow()),
            }
            Ok(())
        }
    }
}

fn build_client(
    project_id: Option<u64>,
    token: Option<String>,
    config: &AppConfig,
) -> anyhow::Result<ParatranzClient> {
    let project_id = resolve_setting(
        project_id,
        env::var("PZ_PROJECT_ID").ok().and_then(|v| v.parse().ok()),
        config.project_id,
    )
    .context("no project id: pass --project-id, set PZ_PROJECT_ID, or add it to config.json")?;
    let token = resolve_setting(
        token,
        env::var("PARATRANZ_TOKEN").ok(),
        config.token.clone(),
    )
    .context("no API token: pass --token, set PARATRANZ_TOKEN, or add it to config.json")?;
    Ok(ParatranzClient::new(project_id, token)?)
}

/// Command-line flag beats the environment, which beats the settings file.
fn resolve_setting<T>(flag: Option<T>, env_value: Option<T>, config_value: Option<T>) -> Option<T> {
    flag.or(env_value).or(config_value)
}

fn print_extract_summary(stats: &ExtractStats, output: &str) {
    println!(
        "{} {} strings from {} of {} files -> {}",
        "Extracted".green().bold(),
        stats.total_strings.to_string().bold(),
        stats.files_with_text,
        stats.files_scanned,
        output.bold()
    );
    for (field, count) in &stats.by_field {
        println!("  {}: {}", field, count);
    }
    if stats.files_skipped > 0 {
        println!("  unchanged files skipped: {}", stats.files_skipped);
    }
    if stats.symbolic_skipped > 0 {
        println!("  symbolic references dropped: {}", stats.symbolic_skipped);
    }
    if stats.pre_translated > 0 {
        println!("  pre-translated entries: {}", stats.pre_translated);
    }
    if stats.group_count > 0 {
        println!("  catalogs written: {}", stats.group_count);
    }
}

fn print_merge_summary(stats: &MergeStats, output: &str) {
    println!(
        "{} {} translations into {} files -> {}",
        "Merged".green().bold(),
        stats.applied.to_string().bold(),
        stats.files_modified,
        output.bold()
    );
    if stats.skipped > 0 {
        println!("  already up to date: {}", stats.skipped);
    }
    if stats.unused > 0 {
        println!(
            "  {} {}",
            "unused translations:".yellow(),
            stats.unused
        );
    }
}

/// File-level progress printer; only reports when the percentage moves.
struct ConsoleProgress {
    last_percent: AtomicUsize,
}

impl ConsoleProgress {
    fn new() -> Self {
        Self {
            last_percent: AtomicUsize::new(usize::MAX),
        }
    }
}

impl Progress for ConsoleProgress {
    fn report(&self, current: usize, total: usize, message: &str) {
        let percent = progress_percent(current, total);
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            println!("{} {}", format!("[{:3}%]", percent).cyan(), message);
        }
    }
}

fn progress_percent(current: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        current * 100 / total
    }
}
