//! pagemill CLI - paginated-document linearization tool

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pagemill::{
    validate_output, CommandOcr, JsonSource, Mode, PageSelection, PageSource, Pipeline, RunConfig,
};

#[derive(Parser)]
#[command(name = "pagemill")]
#[command(version)]
#[command(about = "Linearize paginated documents into structured Markdown", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a fragment-dump document to Markdown with assets
    Convert {
        /// Input fragment-dump JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Processing mode
        #[arg(long, value_enum, default_value = "fast")]
        mode: RunMode,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Clear the ledger and reprocess everything
        #[arg(long)]
        force: bool,

        /// Insert a table of contents after the run
        #[arg(long)]
        toc: bool,

        /// Dump per-page fragment JSON under logs/
        #[arg(long)]
        dump_pages: bool,

        /// External optical-recognition program (tesseract CLI convention)
        #[arg(long, value_name = "PROGRAM")]
        ocr_command: Option<String>,

        /// Language passed to the optical-recognition program
        #[arg(long, default_value = "eng")]
        ocr_lang: String,

        /// Fence language used for code blocks with no stronger signal
        #[arg(long, default_value = "csharp")]
        code_language: String,

        /// Collaborator timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Validate a previously produced output directory
    Validate {
        /// Output directory to check
        #[arg(value_name = "DIR")]
        output: PathBuf,
    },

    /// Show information about a fragment-dump document
    Info {
        /// Input fragment-dump JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum RunMode {
    /// Fast extraction; recognition only on near-zero yield
    Fast,
    /// Thorough extraction with eager fallback
    Accurate,
}

impl From<RunMode> for Mode {
    fn from(mode: RunMode) -> Self {
        match mode {
            RunMode::Fast => Mode::Fast,
            RunMode::Accurate => Mode::Accurate,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            mode,
            pages,
            force,
            toc,
            dump_pages,
            ocr_command,
            ocr_lang,
            code_language,
            timeout,
        } => cmd_convert(
            &input,
            output.as_deref(),
            mode,
            pages.as_deref(),
            force,
            toc,
            dump_pages,
            ocr_command.as_deref(),
            &ocr_lang,
            &code_language,
            timeout,
        ),
        Commands::Validate { output } => cmd_validate(&output),
        Commands::Info { input } => cmd_info(&input),
    };

    match result {
        Ok(code) if code != 0 => std::process::exit(code),
        Ok(_) => {}
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    mode: RunMode,
    pages: Option<&str>,
    force: bool,
    toc: bool,
    dump_pages: bool,
    ocr_command: Option<&str>,
    ocr_lang: &str,
    code_language: &str,
    timeout: u64,
) -> Result<i32, Box<dyn std::error::Error>> {
    let output_dir = output.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}_output", stem))
    });

    let page_selection = match pages {
        Some(p) => PageSelection::parse(p)?,
        None => PageSelection::All,
    };

    let config = RunConfig::new()
        .with_mode(mode.into())
        .with_pages(page_selection)
        .with_force(force)
        .with_toc(toc)
        .with_page_dumps(dump_pages)
        .with_default_language(code_language)
        .with_timeout(Duration::from_secs(timeout));

    let source = JsonSource::open(input)?;
    let mut pipeline = Pipeline::new(source, config);
    if let Some(program) = ocr_command {
        pipeline = pipeline.with_ocr(CommandOcr::new(program, ocr_lang));
    }

    let total = pipeline.selected_pages()?.len() as u64;
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let report = pipeline.run_with_progress(&output_dir, |page, _| {
        pb.set_message(format!("page {}", page));
        pb.inc(1);
    })?;
    pb.finish_with_message("done");

    println!();
    println!("{}", "Run summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Processed".bold(), report.processed.len());
    println!("{}: {}", "Skipped".bold(), report.skipped.len());
    println!("{}: {}", "OCR pages".bold(), report.ocr_pages.len());
    println!("{}: {:.2}s", "Duration".bold(), report.duration.as_secs_f64());
    println!("{}: {}", "Output".bold(), output_dir.display());

    if report.is_clean() {
        Ok(0)
    } else {
        println!();
        println!("{}", "Degraded pages".yellow().bold());
        for warning in &report.warnings {
            println!(
                "  {} page {}: {}",
                "!".yellow(),
                warning.page,
                warning.message
            );
        }
        Ok(2)
    }
}

fn cmd_validate(output: &Path) -> Result<i32, Box<dyn std::error::Error>> {
    let report = validate_output(output)?;

    if report.is_ok() {
        println!("{}", "Validation passed".green().bold());
        Ok(0)
    } else {
        for problem in &report.problems {
            println!("{} {}", "✗".red(), problem);
        }
        Ok(1)
    }
}

fn cmd_info(input: &Path) -> Result<i32, Box<dyn std::error::Error>> {
    let source = JsonSource::open(input)?;
    let metadata = source.metadata();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), source.page_count());
    println!("{}: {}", "Title".bold(), metadata.display_title());
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }
    if let Some(ref producer) = metadata.producer {
        println!("{}: {}", "Producer".bold(), producer);
    }

    let mut fragments = 0usize;
    let mut chars = 0usize;
    for page in 1..=source.page_count() {
        if let Ok(page_fragments) = source.fragments(page) {
            fragments += page_fragments.len();
            chars += page_fragments.iter().map(|f| f.char_count()).sum::<usize>();
        }
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Fragments".bold(), fragments);
    println!("{}: {}", "Characters".bold(), chars);

    Ok(0)
}
