//! Command-line interface
//!
//! `serve` runs the inference host, `predict` runs one offline transform and
//! `info` describes a model directory.

use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::handler::ModelHandler;
use crate::predictor::ArtifactPredictor;
use crate::server::{run_server, ServerConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

// Progress goes to stderr so `predict` can stream its payload on stdout.
fn step_run(msg: &str) {
    eprint!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    eprintln!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "multimodal-serve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve multimodal predictors over content-typed requests")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the inference server
    Serve {
        /// Model directory containing predictor.json
        #[arg(short, long, env = "SM_MODEL_DIR")]
        model_dir: Option<PathBuf>,

        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one request body through the model
    Predict {
        /// Model directory containing predictor.json
        #[arg(short, long)]
        model_dir: PathBuf,

        /// Request body file
        #[arg(short, long)]
        input: PathBuf,

        /// Input content type (e.g. text/csv, application/x-autogluon-parquet)
        #[arg(short, long)]
        content_type: String,

        /// Requested output content type
        #[arg(short, long, default_value = "application/json")]
        accept: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show model information
    Info {
        /// Model directory containing predictor.json
        #[arg(short, long)]
        model_dir: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_predict(
    model_dir: &Path,
    input: &Path,
    content_type: &str,
    accept: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    step_run("Loading model");
    let start = Instant::now();
    let handler = ModelHandler::load::<ArtifactPredictor>(model_dir)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run("Reading input");
    let body = std::fs::read(input)?;
    step_done(&format!("{} bytes", body.len()));

    step_run("Transforming");
    let start = Instant::now();
    let (payload, output_type) = handler.transform(&body, content_type, accept)?;
    step_done(&format!("{} · {:?}", output_type, start.elapsed()));

    match output {
        Some(path) => {
            std::fs::write(path, &payload)?;
            eprintln!("  {} {}", ok("✓"), kv("Saved to", &path.display().to_string()));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&payload)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub fn cmd_info(model_dir: &Path) -> anyhow::Result<()> {
    let handler = ModelHandler::load::<ArtifactPredictor>(model_dir)?;
    let predictor = handler.predictor();
    section("Model Info");

    println!("  {:<14} {}", muted("Directory"), model_dir.display());
    println!("  {:<14} {}", muted("Problem type"), predictor.problem_type());
    println!("  {:<14} {}", muted("Label"), predictor.label());
    println!(
        "  {:<14} {}",
        muted("Image column"),
        predictor.column_types().image_column().unwrap_or("none")
    );
    println!();

    println!("  {:<24} {:<16}", muted("Column"), muted("Type"));
    println!("  {}", dim(&"─".repeat(40)));
    for (name, column_type) in predictor.column_types().iter() {
        let marker = if name == predictor.label() { " (label)" } else { "" };
        println!(
            "  {:<24} {:<16}",
            format!("{}{}", name, marker),
            format!("{:?}", column_type).truecolor(140, 140, 140),
        );
    }

    println!();
    Ok(())
}

pub async fn cmd_serve(
    model_dir: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(model_dir) = model_dir {
        config.model_dir = model_dir;
    }
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "multimodal-serve".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Model  ", &config.model_dir.display().to_string()));
    line_box(&kv("Ping   ", &format!("http://{}:{}/ping", config.host, config.port)));
    line_box(&kv("Invoke ", &format!("http://{}:{}/invocations", config.host, config.port)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "hi".red());
        assert_eq!(strip_ansi(&colored), "hi");
    }

    #[test]
    fn test_predict_args() {
        let cli = Cli::parse_from([
            "multimodal-serve",
            "predict",
            "--model-dir",
            "model",
            "--input",
            "body.csv",
            "--content-type",
            "text/csv",
        ]);
        match cli.command {
            Commands::Predict { accept, output, content_type, .. } => {
                assert_eq!(accept, "application/json");
                assert_eq!(content_type, "text/csv");
                assert!(output.is_none());
            }
            _ => panic!("expected predict"),
        }
    }
}
