//! Extract pronunciation data (IPA transcriptions, audio-file references,
//! regional accent tags) from a Wiktionary XML export.
//!
//! The pipeline runs in persisted stages so a large corpus can be processed
//! incrementally: `ingest` streams the dump into word/text records, `extract`
//! filters each entry down to its pronunciation section and interprets the
//! templates there, and `compare` measures the strict extractor against a
//! template-agnostic matcher.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use clap::{Parser, Subcommand};

mod ingest;
mod parallel;
mod pipeline;
mod pronunciation;
mod section;
mod template;

use ingest::{print_ingest_stats, run_ingest};
use parallel::ParallelConfig;
use pipeline::{
    load_entries, load_stage, print_compare_stats, print_extract_stats, run_compare, run_extract,
    ExtractOptions,
};
use template::{tokenize, Token};

#[derive(Parser)]
#[command(name = "wiktionary-pron-rust")]
#[command(about = "Extract IPA and audio pronunciation data from Wiktionary XML dumps")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Stream an XML dump into word/text JSONL records
    Ingest {
        /// Input XML file (.xml or .xml.bz2)
        input: PathBuf,

        /// Output JSONL file
        output: PathBuf,

        /// Limit number of entries to extract (for testing)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run the extraction stages over ingested records
    Extract {
        /// JSONL file produced by `ingest`
        input: PathBuf,

        /// Directory for per-stage dictionaries and miss files
        out_dir: PathBuf,

        /// Language section title to extract
        #[arg(long, default_value = "english")]
        language: String,

        /// Pronunciation section title within the language section
        #[arg(long, default_value = "pronunciation")]
        section: String,

        /// Number of worker threads (0 = auto-detect)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
    },

    /// Compare strict and lenient IPA extraction over a pron.json stage file
    Compare {
        /// pron.json produced by `extract`
        input: PathBuf,

        /// Directory for ipa_lenient.json and ipa_diff.json
        out_dir: PathBuf,

        /// Number of worker threads (0 = auto-detect)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,
    },

    /// Parse a wikitext file and print its templates as JSON records
    Templates {
        /// Wikitext input file
        input: PathBuf,
    },
}

/// Open a dump file, transparently decompressing `.bz2` inputs.
fn open_dump(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(if path.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    })
}

fn thread_config(threads: usize) -> ParallelConfig {
    let mut config = ParallelConfig::default();
    if threads > 0 {
        config.num_threads = threads;
    }
    config
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Ingest { input, output, limit } => {
            if !args.quiet {
                println!("Parsing: {}", input.display());
                println!("Output: {}", output.display());
                if let Some(limit) = limit {
                    println!("Limit: {} entries", limit);
                }
                println!();
            }

            let reader = open_dump(&input)?;
            let out = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let mut writer = BufWriter::with_capacity(256 * 1024, out);

            let stats = run_ingest(reader, &mut writer, limit, args.quiet)?;
            if !args.quiet {
                print_ingest_stats(&stats);
            }
        }

        Command::Extract { input, out_dir, language, section, threads } => {
            let entries = load_entries(&input)?;
            if !args.quiet {
                println!("Entries: {} ({})", entries.len(), input.display());
                println!("Output: {}", out_dir.display());
                println!();
            }

            let opts = ExtractOptions {
                language,
                section,
                config: thread_config(threads),
            };
            let stats = run_extract(&entries, &out_dir, &opts)?;
            if !args.quiet {
                print_extract_stats(&stats);
            }
        }

        Command::Compare { input, out_dir, threads } => {
            let pron: BTreeMap<String, String> = load_stage(&input)?;
            let stats = run_compare(&pron, &out_dir, &thread_config(threads))?;
            if !args.quiet {
                print_compare_stats(&stats);
            }
        }

        Command::Templates { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let mut stdout = std::io::stdout().lock();
            for token in tokenize(&text) {
                if let Token::Template(template) = token {
                    serde_json::to_writer(&mut stdout, &template)
                        .context("writing template record")?;
                    writeln!(stdout)?;
                }
            }
        }
    }

    Ok(())
}
