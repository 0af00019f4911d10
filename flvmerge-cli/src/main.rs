//! flvmerge CLI - concatenate FLV files into a single continuous stream.

use clap::Parser;
use console::style;
use flvmerge::{FileStats, MergeError, MergeSummary, Merger};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// Output mode for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Normal output with progress bar.
    Normal,
    /// JSON output for programmatic parsing.
    Json,
    /// Quiet mode with minimal output.
    Quiet,
    /// Verbose mode with per-tag logging.
    Verbose,
}

/// Command-line arguments for the flvmerge tool.
#[derive(Parser, Debug)]
#[command(name = "flvmerge")]
#[command(version)]
#[command(about = "Concatenate FLV files into a single continuous stream")]
#[command(long_about = "flvmerge joins FLV files back to back, shifting timestamps so\n\
    playback time keeps increasing across the joins, keeping exactly one\n\
    metadata tag, and rewriting its duration and filesize fields once the\n\
    final totals are known.\n\n\
    Inputs that fail to parse are skipped; the merge continues with the\n\
    remaining files and the exit status reports the failure.\n\n\
    EXAMPLES:\n    \
    flvmerge part1.flv part2.flv\n    \
    flvmerge -o show.flv part1.flv part2.flv part3.flv\n    \
    flvmerge --json part1.flv part2.flv")]
struct Args {
    /// Input FLV files, merged in the order given
    inputs: Vec<PathBuf>,

    /// Output file path (overwritten if it exists)
    #[arg(short, long, default_value = "out.flv")]
    output: PathBuf,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose output (per-file and per-tag details)
    #[arg(short, long, conflicts_with = "quiet", conflicts_with = "json")]
    verbose: bool,

    /// Quiet mode (only print the output path on success)
    #[arg(short, long, conflicts_with = "verbose", conflicts_with = "json")]
    quiet: bool,

    /// JSON output mode for programmatic parsing
    #[arg(long, conflicts_with = "verbose", conflicts_with = "quiet")]
    json: bool,
}

impl Args {
    /// Determine the output mode based on flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Result of one input file, for reporting.
#[derive(Debug, Serialize)]
struct InputReport {
    /// Input path.
    path: String,
    /// Whether the file merged completely.
    merged: bool,
    /// Video tags written (merged files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    video_tags: Option<u64>,
    /// Audio tags written (merged files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_tags: Option<u64>,
    /// Script tags seen (merged files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    script_tags: Option<u64>,
    /// Bytes contributed to the output (merged files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes_out: Option<u64>,
    /// Failure description (failed files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl InputReport {
    fn merged(path: &PathBuf, stats: FileStats) -> Self {
        Self {
            path: path.display().to_string(),
            merged: true,
            video_tags: Some(stats.video_tags),
            audio_tags: Some(stats.audio_tags),
            script_tags: Some(stats.script_tags),
            bytes_out: Some(stats.bytes_out),
            error: None,
        }
    }

    fn failed(path: &PathBuf, err: &MergeError) -> Self {
        Self {
            path: path.display().to_string(),
            merged: false,
            video_tags: None,
            audio_tags: None,
            script_tags: None,
            bytes_out: None,
            error: Some(err.to_string()),
        }
    }
}

/// JSON completion output structure.
#[derive(Debug, Serialize)]
struct JsonCompleteOutput {
    /// Type of message.
    #[serde(rename = "type")]
    msg_type: String,
    /// Output path.
    output: String,
    /// Final output size in bytes.
    total_bytes: u64,
    /// Accumulated duration in seconds.
    duration_seconds: f64,
    /// Whether the duration field was patched.
    duration_patched: bool,
    /// Whether the filesize field was patched.
    filesize_patched: bool,
    /// Number of inputs that failed.
    failed: usize,
    /// Per-input results.
    inputs: Vec<InputReport>,
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let output_mode = args.output_mode();

    // Initialize logging (not in JSON or quiet mode)
    if output_mode != OutputMode::Json && output_mode != OutputMode::Quiet {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(if args.verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            })
            .with_target(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    let out_file = File::create(&args.output)?;
    let mut merger = Merger::new(BufWriter::new(out_file));

    let progress_bar = if (output_mode == OutputMode::Normal || output_mode == OutputMode::Verbose)
        && !args.no_progress
        && !args.inputs.is_empty()
    {
        let pb = ProgressBar::new(args.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let print_line = |line: String| match &progress_bar {
        Some(pb) => pb.println(line),
        None if output_mode == OutputMode::Normal || output_mode == OutputMode::Verbose => {
            println!("{}", line)
        }
        None => {}
    };

    let start = Instant::now();
    let mut reports = Vec::with_capacity(args.inputs.len());

    for path in &args.inputs {
        if let Some(pb) = &progress_bar {
            pb.set_message(path.display().to_string());
        }

        match merger.append_path(path) {
            Ok(stats) => {
                debug!(path = %path.display(), ?stats, "input merged");
                print_line(format!(
                    "  {} {} ({} video, {} audio, {} script, {})",
                    style("✓").green(),
                    path.display(),
                    stats.video_tags,
                    stats.audio_tags,
                    stats.script_tags,
                    format_size(stats.bytes_out),
                ));
                reports.push(InputReport::merged(path, stats));
            }
            Err(err) if err.is_fatal() => {
                if let Some(pb) = &progress_bar {
                    pb.finish_and_clear();
                }
                if output_mode == OutputMode::Json {
                    let error = serde_json::json!({
                        "type": "error",
                        "path": path.display().to_string(),
                        "message": err.to_string(),
                    });
                    println!("{}", error);
                    std::process::exit(1);
                }
                return Err(anyhow::Error::from(err)
                    .context(format!("aborting merge at {}", path.display())));
            }
            Err(err) => {
                print_line(format!(
                    "  {} {} - {}",
                    style("✗").red(),
                    path.display(),
                    err
                ));
                reports.push(InputReport::failed(path, &err));
            }
        }

        if let Some(pb) = &progress_bar {
            pb.inc(1);
        }
    }

    let summary = merger.finalize()?;
    let elapsed = start.elapsed();

    if let Some(pb) = &progress_bar {
        pb.finish_and_clear();
    }

    let failed = reports.iter().filter(|r| !r.merged).count();

    match output_mode {
        OutputMode::Json => {
            let output = JsonCompleteOutput {
                msg_type: "complete".to_string(),
                output: args.output.display().to_string(),
                total_bytes: summary.total_bytes,
                duration_seconds: summary.duration_seconds,
                duration_patched: summary.duration_patched,
                filesize_patched: summary.filesize_patched,
                failed,
                inputs: reports,
            };
            if let Ok(json) = serde_json::to_string(&output) {
                println!("{}", json);
            }
        }
        OutputMode::Quiet => {
            println!("{}", args.output.display());
        }
        OutputMode::Normal | OutputMode::Verbose => {
            print_summary(&args, &summary, failed, reports.len(), elapsed.as_secs_f64());
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(
    args: &Args,
    summary: &MergeSummary,
    failed: usize,
    total: usize,
    elapsed_seconds: f64,
) {
    println!();
    println!("{}", style("Merge complete:").cyan().bold());
    println!(
        "  Inputs:     {}{}",
        total,
        if failed > 0 {
            format!(" ({} failed)", style(failed).red())
        } else {
            String::new()
        }
    );
    println!(
        "  Duration:   {}",
        if summary.duration_patched {
            format!("{:.3}s", summary.duration_seconds)
        } else {
            "unknown (no metadata found)".to_string()
        }
    );
    println!(
        "  Total size: {} ({} bytes)",
        format_size(summary.total_bytes),
        summary.total_bytes
    );
    println!("  Time:       {:.2}s", elapsed_seconds);
    println!();
    println!(
        "{} {}",
        style("Output saved to:").white(),
        style(args.output.display()).green().bold()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with(quiet: bool, verbose: bool, json: bool) -> Args {
        Args {
            inputs: vec![PathBuf::from("a.flv")],
            output: PathBuf::from("out.flv"),
            no_progress: false,
            verbose,
            quiet,
            json,
        }
    }

    #[test]
    fn test_output_mode_selection() {
        assert_eq!(args_with(false, false, false).output_mode(), OutputMode::Normal);
        assert_eq!(args_with(true, false, false).output_mode(), OutputMode::Quiet);
        assert_eq!(args_with(false, true, false).output_mode(), OutputMode::Verbose);
        assert_eq!(args_with(false, false, true).output_mode(), OutputMode::Json);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.00 GB");
    }

    #[test]
    fn test_input_report_serialization() {
        let stats = FileStats {
            video_tags: 3,
            audio_tags: 2,
            script_tags: 1,
            bytes_out: 4096,
            last_timestamp_ms: Some(120),
        };
        let report = InputReport::merged(&PathBuf::from("a.flv"), stats);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"merged\":true"));
        assert!(json.contains("\"video_tags\":3"));
        assert!(!json.contains("error"));

        let err = MergeError::InvalidSignature("XLV".to_string());
        let report = InputReport::failed(&PathBuf::from("b.flv"), &err);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"merged\":false"));
        assert!(json.contains("XLV"));
        assert!(!json.contains("video_tags"));
    }
}
