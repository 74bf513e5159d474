//! CLI entry point for `emlkit`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use emlkit::config::Config;
use emlkit::export::download::{self, DirectorySink};
use emlkit::import::{self, ImportOptions, ImportReport, ImportSession};
use emlkit::model::message::{collect_pdf_attachments, Message};
use emlkit::model::source::InputFile;
use emlkit::parser::MessageDecoder;
use emlkit::pdf::merge;
use emlkit::pdf::print::{self, CommandPrinter, PrintOutcome};

/// Decode .eml/.msg files and merge their PDF attachments.
#[derive(Parser)]
#[command(name = "emlkit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode messages and show their headers, body and attachments
    Show {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Save the attachments of messages to a directory
    Attachments {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only save PDF attachments
        #[arg(long)]
        pdf_only: bool,
    },
    /// Merge the PDF attachments of messages into one document
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Send the merged document to the print command as well
        #[arg(long)]
        print: bool,
    },
    /// Print a PDF file with the configured print command
    Print { path: PathBuf },
    /// Export messages as plain text files
    Export {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Show the config and log file locations
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        init: bool,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = emlkit::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show { files, json } => cmd_show(&files, json, &config),
        Commands::Attachments {
            files,
            output,
            pdf_only,
        } => cmd_attachments(&files, output, pdf_only, &config),
        Commands::Merge {
            files,
            output,
            print,
        } => cmd_merge(&files, output, print, &config),
        Commands::Print { path } => cmd_print(&path, &config),
        Commands::Export { files, output } => cmd_export(&files, output, &config),
        Commands::Config { init } => cmd_config(init, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = emlkit::config::log_file_path(config);
    let log_dir = log_path.parent().unwrap_or(Path::new("."));
    let log_name = log_path.file_name().unwrap_or_default();
    if std::fs::create_dir_all(log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print where settings and logs live; with `init`, write the config file.
fn cmd_config(init: bool, config: &Config) -> anyhow::Result<()> {
    if init {
        emlkit::config::save_config(config)?;
    }
    match emlkit::config::config_file_path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory available)"),
    }
    println!(
        "Log file:    {}",
        emlkit::config::log_file_path(config).display()
    );
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emlkit", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Read and decode the given files as one import batch.
fn load_messages(files: &[PathBuf], pdf_only: bool, config: &Config) -> anyhow::Result<ImportReport> {
    let mut inputs = Vec::with_capacity(files.len());
    for path in files {
        inputs.push(InputFile::load(path)?);
    }

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Decoding [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let decoder = MessageDecoder::from_config(config);
    let options = ImportOptions {
        pdf_only: pdf_only || config.import.pdf_only,
    };
    let mut session = ImportSession::new();
    let report = import::import_batch(
        &mut session,
        &decoder,
        inputs,
        &options,
        Some(&|current: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }),
    );
    pb.finish_and_clear();

    for failure in &report.failures {
        eprintln!("  Failed: {} ({})", failure.file_name, failure.error);
    }
    for name in &report.skipped {
        eprintln!("  Skipped unsupported file: {name}");
    }
    for name in &report.duplicates {
        eprintln!("  Skipped duplicate file: {name}");
    }

    Ok(report)
}

/// Resolve the output directory from the flag, the config, or the cwd.
fn output_dir(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.or_else(|| config.export.default_output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Decode messages and print them.
fn cmd_show(files: &[PathBuf], json: bool, config: &Config) -> anyhow::Result<()> {
    let report = load_messages(files, false, config)?;

    if json {
        print_messages_json(&report)?;
    } else {
        for message in &report.messages {
            print_message(message);
        }
    }
    Ok(())
}

/// Save attachments of every decoded message.
fn cmd_attachments(
    files: &[PathBuf],
    output: Option<PathBuf>,
    pdf_only: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let report = load_messages(files, pdf_only, config)?;
    let total = report.attachment_count();
    if total == 0 {
        println!("  No attachments found.");
        return Ok(());
    }

    let dir = output_dir(output, config);
    let mut sink = DirectorySink::new(&dir);
    let saved = download::save_attachments(
        &mut sink,
        report.messages.iter().flat_map(|m| m.attachments.iter()),
    );

    for (name, error) in &saved.failed {
        eprintln!("  Could not save {name}: {error}");
    }
    println!(
        "  Saved {} of {} attachment(s) to {}",
        saved.saved.len(),
        total,
        dir.display()
    );
    Ok(())
}

/// Merge all PDF attachments of the given messages.
fn cmd_merge(
    files: &[PathBuf],
    output: Option<PathBuf>,
    print_after: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let report = load_messages(files, true, config)?;
    let pdfs = collect_pdf_attachments(&report.messages);
    drop(report);

    println!("  Merging {} PDF attachment(s)", pdfs.len());
    let start = Instant::now();
    let outcome = merge::merge_pdfs(&pdfs)?;
    drop(pdfs);

    for failure in &outcome.failures {
        eprintln!("  Skipped: {failure}");
    }

    let dir = output_dir(output, config);
    let mut sink = DirectorySink::new(&dir);
    let path = download::save_merged(&mut sink, &outcome.bytes, &config.merge.file_prefix)?;

    println!();
    println!("  Merge complete:");
    println!("  {:<25} {}", "Documents merged", outcome.merged);
    println!("  {:<25} {}", "Documents skipped", outcome.failures.len());
    println!("  {:<25} {}", "Pages", outcome.page_count);
    println!(
        "  {:<25} {}",
        "Output size",
        format_size(outcome.bytes.len() as u64, BINARY)
    );
    println!("  {:<25} {:.2?}", "Time", start.elapsed());
    println!("  {:<25} {}", "Output file", path.display());
    println!();

    if print_after {
        report_print(send_to_printer(outcome.bytes, config));
    }
    Ok(())
}

/// Print a PDF file from disk.
fn cmd_print(path: &Path, config: &Config) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)
        .map_err(|e| emlkit::error::EmlError::io(path, e))?;
    report_print(send_to_printer(bytes, config));
    Ok(())
}

fn send_to_printer(bytes: Vec<u8>, config: &Config) -> PrintOutcome {
    let printer = Arc::new(CommandPrinter::from_config(&config.print));
    let outcome = print::print_pdf(
        bytes,
        printer.clone(),
        Duration::from_secs(config.print.timeout_secs),
    );
    if outcome == PrintOutcome::TimedOut {
        // The process may exit before the worker thread drops its spool file.
        printer.discard_spools();
    }
    outcome
}

fn report_print(outcome: PrintOutcome) {
    match outcome {
        PrintOutcome::Completed => println!("  Sent to printer."),
        PrintOutcome::TimedOut => println!("  Print command still running, continuing."),
        PrintOutcome::Failed(reason) => eprintln!("  Printing failed: {reason}"),
    }
}

/// Export every decoded message as a text file.
fn cmd_export(files: &[PathBuf], output: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let report = load_messages(files, false, config)?;
    let dir = output_dir(output, config);

    let pb = ProgressBar::new(report.messages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Exporting [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut count = 0usize;
    for (i, message) in report.messages.iter().enumerate() {
        pb.set_position(i as u64);
        emlkit::export::text::export_text(message, &dir)?;
        count += 1;
    }
    pb.finish_and_clear();
    println!("  Exported {} .txt file(s) to {}", count, dir.display());
    Ok(())
}

/// Print one message in a human-readable layout.
fn print_message(message: &Message) {
    println!();
    println!(
        "  {:<12} {} ({})",
        "File",
        message.source_file_name,
        format_size(message.source_file_size, BINARY)
    );
    println!("  {:<12} {}", "From", message.sender);
    println!("  {:<12} {}", "To", message.recipients);
    println!("  {:<12} {}", "Subject", message.subject);
    println!("  {:<12} {}", "Date", message.sent_at);
    println!("  {}", "-".repeat(72));
    for line in message.body.lines() {
        println!("  {line}");
    }

    if !message.attachments.is_empty() {
        println!();
        println!(
            "  {:<4} {:<40} {:<12} {:>10}",
            "#", "Attachment", "Kind", "Size"
        );
        for (i, att) in message.attachments.iter().enumerate() {
            let name: String = att.name.chars().take(39).collect();
            println!(
                "  {:<4} {:<40} {:<12} {:>10}",
                i + 1,
                name,
                att.kind,
                att.size.to_string()
            );
        }
    }
    println!();
}

/// Print decoded messages and failures as JSON.
fn print_messages_json(report: &ImportReport) -> anyhow::Result<()> {
    let failures: Vec<serde_json::Value> = report
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "file": f.file_name,
                "error": f.error.to_string(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "message_count": report.messages.len(),
        "messages": report.messages,
        "failures": failures,
        "duplicates": report.duplicates,
        "skipped": report.skipped,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
