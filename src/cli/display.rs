//! Terminal output: live fragments, spinner, results and failures.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use llm_scaffold::{
    AppType, Event, EventHandler, GenerationError, MaterializeReport, PipelineState, ProjectOutput,
};

/// Echoes fragments to stdout as they arrive.
pub struct LiveFragments;

impl EventHandler for LiveFragments {
    fn on_event(&self, event: Event) {
        let mut stdout = std::io::stdout().lock();
        match event {
            Event::Fragment { chunk } => {
                let _ = write!(stdout, "{}", chunk.dimmed());
                let _ = stdout.flush();
            }
            Event::InvocationEnd { .. } => {
                let _ = writeln!(stdout);
            }
            _ => {}
        }
    }
}

/// Spinner on stderr while waiting for a non-streamed response.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed}")
        {
            bar.set_style(style);
        }
        bar.set_message("Waiting for the model");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl EventHandler for Spinner {
    fn on_event(&self, event: Event) {
        match event {
            Event::StateChanged { state } => match state {
                PipelineState::Collecting => self.bar.set_message("Waiting for the model"),
                PipelineState::Extracting | PipelineState::Parsing => {
                    self.bar.set_message("Checking the response")
                }
                _ => {}
            },
            Event::InvocationEnd { .. } => self.bar.finish_and_clear(),
            _ => {}
        }
    }
}

pub fn print_banner() {
    println!("\n{}\n", "LLM Scaffold: project generator".cyan().bold());
}

pub fn print_generating(model: &str, backend: &str) {
    println!(
        "\n{} {}\n",
        "Generating code...".blue(),
        format!("({} via {})", model, backend).dimmed()
    );
}

/// Report a failed run: what went wrong, then everything the model sent.
pub fn print_failure(err: &GenerationError) {
    eprintln!("\n{} {}", "Generation failed:".red().bold(), err);
    let raw = err.raw_text();
    if raw.is_empty() {
        eprintln!("{}", "(no model text was received)".dimmed());
    } else {
        let heading = if err.response_complete() {
            "Raw model response:"
        } else {
            "Partial model response:"
        };
        eprintln!("\n{}\n{}", heading.yellow(), raw);
    }
}

pub fn print_written(name: &str, project: &ProjectOutput, report: &MaterializeReport) {
    println!(
        "\n{}\n",
        format!("Writing files to {}/", report.base_dir.display()).green()
    );
    for file in &report.files {
        let marker = if file.overwritten { "~" } else { "+" };
        println!(
            "  {} {} {}",
            marker.yellow(),
            file.relative,
            format!("({} bytes)", file.bytes).dimmed()
        );
    }

    let undeclared = project.undeclared_files();
    if !undeclared.is_empty() {
        println!(
            "\n{} {}",
            "note:".yellow(),
            format!(
                "{} file(s) not listed in fileStructure: {}",
                undeclared.len(),
                undeclared.join(", ")
            )
            .dimmed()
        );
    }
    if report.overwritten() > 0 {
        println!(
            "{} {} existing file(s) overwritten",
            "note:".yellow(),
            report.overwritten()
        );
    }

    println!(
        "\n{}\n",
        format!("Project '{}' created successfully!", name).green().bold()
    );
}

/// Result of `extract`: the files that would be written.
pub fn print_extracted(project: &ProjectOutput) {
    println!(
        "{} {} file(s)",
        "Valid project:".green().bold(),
        project.len()
    );
    for (path, content) in project.files() {
        println!("  {} {}", path, format!("({} bytes)", content.len()).dimmed());
    }
}

pub fn print_templates() {
    for app in AppType::ALL {
        println!("{:<12} {}", app.tag().bold(), app.label());
    }
}

pub fn print_cancelled() {
    println!("{}", "Cancelled.".red());
}
