//! Batch pipeline: per-stage dictionaries with hit/miss splitting and JSON
//! persistence.
//!
//! Each stage maps an entry dictionary to its result dictionary and a
//! companion miss dictionary, so a multi-stage run over a large corpus can
//! resume from any stage file and its misses can be inspected instead of
//! being discarded.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ingest::WordRecord;
use crate::parallel::{map_filter_parallel, ParallelConfig};
use crate::pronunciation::{extract_ipa_lenient, extract_pronunciation, PronunciationRecord};
use crate::section::filter_sections;

/// Stage results that count as a miss when empty.
pub trait StageValue {
    fn is_miss(&self) -> bool;
}

impl StageValue for String {
    fn is_miss(&self) -> bool {
        self.is_empty()
    }
}

impl StageValue for PronunciationRecord {
    fn is_miss(&self) -> bool {
        self.is_empty()
    }
}

impl StageValue for Vec<String> {
    fn is_miss(&self) -> bool {
        self.is_empty()
    }
}

/// Hits and misses of one pipeline stage. Misses map the entry name to the
/// stage's input value so they can be inspected or re-fed directly.
pub struct StageOutput<V> {
    pub hits: BTreeMap<String, V>,
    pub misses: BTreeMap<String, String>,
}

impl<V> Default for StageOutput<V> {
    fn default() -> Self {
        Self {
            hits: BTreeMap::new(),
            misses: BTreeMap::new(),
        }
    }
}

/// Apply `f` to every entry; empty results go to the miss map.
pub fn map_filter<V: StageValue>(
    entries: &BTreeMap<String, String>,
    f: impl Fn(&str) -> V,
) -> StageOutput<V> {
    let mut out = StageOutput::default();
    for (word, text) in entries {
        let value = f(text);
        if value.is_miss() {
            out.misses.insert(word.clone(), text.clone());
        } else {
            out.hits.insert(word.clone(), value);
        }
    }
    out
}

/// Load the ingest stage's JSONL records into an entry dictionary.
pub fn load_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut entries = BTreeMap::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: WordRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed record", path.display(), n + 1))?;
        entries.insert(record.word, record.text);
    }
    Ok(entries)
}

/// Write one stage dictionary as a JSON object map.
pub fn save_stage<V: Serialize>(map: &BTreeMap<String, V>, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), map)
        .with_context(|| format!("writing {}", path.display()))
}

/// Load a stage dictionary written by [`save_stage`].
pub fn load_stage<V: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, V>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

/// Options for a batch extraction run.
pub struct ExtractOptions {
    /// Language section title, e.g. "english".
    pub language: String,
    /// Pronunciation section title within the language section.
    pub section: String,
    pub config: ParallelConfig,
}

/// Counters for one extraction run.
#[derive(Debug, Default)]
pub struct ExtractStats {
    pub entries: usize,
    pub lang_hits: usize,
    pub lang_misses: usize,
    pub pron_hits: usize,
    pub pron_misses: usize,
    pub ipa_hits: usize,
    pub ipa_misses: usize,
    pub elapsed: Duration,
}

/// Run the three extraction stages over an entry dictionary, persisting each
/// stage's hits and misses under `out_dir`.
///
/// Stage files: `lang.json`, `pron.json`, `ipa.json`, each with a matching
/// `*_miss.json`. A later run can reload any of them with [`load_stage`].
pub fn run_extract(
    entries: &BTreeMap<String, String>,
    out_dir: &Path,
    opts: &ExtractOptions,
) -> Result<ExtractStats> {
    let start_time = Instant::now();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let lang = map_filter_parallel(
        entries,
        |text| filter_sections(text, &[opts.language.as_str()]),
        &opts.config,
    );
    info!("language stage: {} hits, {} misses", lang.hits.len(), lang.misses.len());
    save_stage(&lang.hits, &out_dir.join("lang.json"))?;
    save_stage(&lang.misses, &out_dir.join("lang_miss.json"))?;

    let pron = map_filter_parallel(
        &lang.hits,
        |text| filter_sections(text, &[opts.section.as_str()]),
        &opts.config,
    );
    info!("pronunciation stage: {} hits, {} misses", pron.hits.len(), pron.misses.len());
    save_stage(&pron.hits, &out_dir.join("pron.json"))?;
    save_stage(&pron.misses, &out_dir.join("pron_miss.json"))?;

    let ipa = map_filter_parallel(&pron.hits, extract_pronunciation, &opts.config);
    info!("record stage: {} hits, {} misses", ipa.hits.len(), ipa.misses.len());
    save_stage(&ipa.hits, &out_dir.join("ipa.json"))?;
    save_stage(&ipa.misses, &out_dir.join("ipa_miss.json"))?;

    Ok(ExtractStats {
        entries: entries.len(),
        lang_hits: lang.hits.len(),
        lang_misses: lang.misses.len(),
        pron_hits: pron.hits.len(),
        pron_misses: pron.misses.len(),
        ipa_hits: ipa.hits.len(),
        ipa_misses: ipa.misses.len(),
        elapsed: start_time.elapsed(),
    })
}

pub fn print_extract_stats(stats: &ExtractStats) {
    println!();
    println!("============================================================");
    println!("Entries in: {}", stats.entries);
    println!("Language sections: {} hits, {} misses", stats.lang_hits, stats.lang_misses);
    println!("Pronunciation sections: {} hits, {} misses", stats.pron_hits, stats.pron_misses);
    println!("Pronunciation records: {} hits, {} misses", stats.ipa_hits, stats.ipa_misses);
    println!(
        "Time: {}m {}s",
        stats.elapsed.as_secs() / 60,
        stats.elapsed.as_secs() % 60
    );
    println!("============================================================");
}

/// Counters for one comparison run.
#[derive(Debug, Default)]
pub struct CompareStats {
    pub entries: usize,
    pub strict_hits: usize,
    pub lenient_hits: usize,
    pub diverging: usize,
    pub elapsed: Duration,
}

/// Entries where the lenient matcher found transcriptions the strict
/// extractor did not: lenient hits missing from the strict output, or with
/// more transcriptions than the strict IPA list. Values are the entries'
/// pronunciation-section inputs, for inspection.
fn divergence(
    strict: &BTreeMap<String, PronunciationRecord>,
    lenient: &BTreeMap<String, Vec<String>>,
    inputs: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut diff = BTreeMap::new();
    for (word, transcriptions) in lenient {
        let strict_count = strict.get(word).map(|record| record.ipa.len()).unwrap_or(0);
        if transcriptions.len() > strict_count {
            if let Some(input) = inputs.get(word) {
                diff.insert(word.clone(), input.clone());
            }
        }
    }
    diff
}

/// Compare strict template-driven extraction with the lenient matcher over a
/// persisted pronunciation-section dictionary. The two outputs are compared,
/// never merged; the divergence dictionary is persisted for inspection.
pub fn run_compare(
    pron: &BTreeMap<String, String>,
    out_dir: &Path,
    config: &ParallelConfig,
) -> Result<CompareStats> {
    let start_time = Instant::now();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let strict = map_filter_parallel(pron, extract_pronunciation, config);
    let lenient = map_filter_parallel(pron, extract_ipa_lenient, config);
    let diff = divergence(&strict.hits, &lenient.hits, pron);
    info!(
        "strict {} / lenient {} / diverging {}",
        strict.hits.len(),
        lenient.hits.len(),
        diff.len()
    );

    save_stage(&lenient.hits, &out_dir.join("ipa_lenient.json"))?;
    save_stage(&diff, &out_dir.join("ipa_diff.json"))?;

    Ok(CompareStats {
        entries: pron.len(),
        strict_hits: strict.hits.len(),
        lenient_hits: lenient.hits.len(),
        diverging: diff.len(),
        elapsed: start_time.elapsed(),
    })
}

pub fn print_compare_stats(stats: &CompareStats) {
    println!();
    println!("============================================================");
    println!("Pronunciation sections in: {}", stats.entries);
    println!("Strict extractor hits: {}", stats.strict_hits);
    println!("Lenient matcher hits: {}", stats.lenient_hits);
    println!("Diverging entries: {}", stats.diverging);
    println!(
        "Time: {}m {}s",
        stats.elapsed.as_secs() / 60,
        stats.elapsed.as_secs() % 60
    );
    println!("============================================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(word: &str, text: &str) -> (String, String) {
        (word.to_string(), text.to_string())
    }

    #[test]
    fn map_filter_splits_hits_and_misses_without_losing_keys() {
        let entries: BTreeMap<String, String> = [
            entry("you", "==English==\nbody\n"),
            entry("perro", "==Spanish==\ncuerpo\n"),
        ]
        .into();

        let out = map_filter(&entries, |text| filter_sections(text, &["english"]));
        assert_eq!(out.hits.len(), 1);
        assert_eq!(out.misses.len(), 1);
        assert_eq!(out.hits["you"], "==English==\nbody\n");
        assert_eq!(out.misses["perro"], "==Spanish==\ncuerpo\n");
    }

    #[test]
    fn stages_chain_from_raw_text_to_records() {
        let doc = "==English==\n\
                   ===Pronunciation===\n\
                   * {{a|UK}} {{IPA|/juː/|lang=en}}\n\
                   ===Noun===\n\
                   # second person\n\
                   ==Spanish==\n\
                   nada\n";
        let entries: BTreeMap<String, String> = [entry("you", doc)].into();

        let lang = map_filter(&entries, |text| filter_sections(text, &["english"]));
        let pron = map_filter(&lang.hits, |text| filter_sections(text, &["pronunciation"]));
        let ipa = map_filter(&pron.hits, extract_pronunciation);

        assert_eq!(
            pron.hits["you"],
            "===Pronunciation===\n* {{a|UK}} {{IPA|/juː/|lang=en}}\n"
        );
        let record = &ipa.hits["you"];
        assert_eq!(record.ipa.len(), 1);
        assert_eq!(record.ipa[0].ipa, "/juː/");
        assert_eq!(record.ipa[0].accent, "GB");
    }

    #[test]
    fn empty_record_counts_as_miss() {
        let entries: BTreeMap<String, String> =
            [entry("diddle", "* {{IPA|[ˈdɪdəɫ]|lang=en}}\n")].into();
        let out = map_filter(&entries, extract_pronunciation);
        assert!(out.hits.is_empty());
        assert_eq!(out.misses.len(), 1);
    }

    #[test]
    fn divergence_tracks_lenient_surplus() {
        // Strict sees the {{IPA}} template; lenient also sees the bare span.
        let pron: BTreeMap<String, String> = [
            entry("you", "* {{IPA|/juː/|lang=en}} also /jə/ unstressed\n"),
            entry("miasma", "* {{IPA|/maɪˈæzmə/|lang=en}}\n"),
            entry("templateless", "* pronounced /zed/\n"),
        ]
        .into();

        let strict = map_filter(&pron, extract_pronunciation);
        let lenient = map_filter(&pron, extract_ipa_lenient);
        let diff = divergence(&strict.hits, &lenient.hits, &pron);

        assert!(diff.contains_key("you"));
        assert!(diff.contains_key("templateless"));
        assert!(!diff.contains_key("miasma"));
    }
}
