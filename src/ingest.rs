//! Dump ingestion: stream a MediaWiki XML export and emit one JSON record per
//! main-namespace article that carries an English section.
//!
//! Dumps run to tens of gigabytes, so pages are cut out of a bounded chunk
//! buffer and released one at a time; the whole document is never resident.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// One dictionary entry: article title plus raw wikitext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub word: String,
    pub text: String,
}

lazy_static! {
    static ref TITLE_PATTERN: Regex = Regex::new(r"<title>([^<]+)</title>").unwrap();
    static ref NS_PATTERN: Regex = Regex::new(r"<ns>(\d+)</ns>").unwrap();
    static ref TEXT_PATTERN: Regex = Regex::new(r"(?s)<text[^>]*>(.+?)</text>").unwrap();
    static ref REDIRECT_PATTERN: Regex = Regex::new(r#"<redirect\s+title="[^"]+""#).unwrap();
    static ref ENGLISH_SECTION: Regex = Regex::new(r"(?i)==\s*English\s*==").unwrap();
}

/// Counters for one ingestion run.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub pages_scanned: usize,
    pub words_written: usize,
    pub special: usize,
    pub redirects: usize,
    pub non_english: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Cut complete `<page>...</page>` spans out of a chunked read stream and
/// hand each to `callback`; returning `false` stops the scan. The buffer is
/// drained after every page so memory stays bounded regardless of dump size.
pub fn scan_pages(
    mut reader: impl Read,
    mut callback: impl FnMut(String) -> bool,
) -> std::io::Result<()> {
    let mut buffer = String::new();
    let mut chunk = vec![0u8; 1024 * 1024]; // 1MB chunks

    loop {
        let bytes_read = reader.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        buffer.push_str(&String::from_utf8_lossy(&chunk[..bytes_read]));

        // Extract complete pages
        while let Some(start) = buffer.find("<page>") {
            let Some(end_offset) = buffer[start..].find("</page>") else {
                // Partial page: drop the prefix, wait for the next chunk.
                buffer.drain(..start);
                break;
            };
            let end = start + end_offset + "</page>".len();
            let page_xml = buffer[start..end].to_string();
            buffer.drain(..end);

            if !callback(page_xml) {
                return Ok(());
            }
        }

        // Keep a short tail in case "<page>" is split across chunks.
        if buffer.len() > 10 && !buffer.contains("<page>") {
            buffer.drain(..buffer.len().saturating_sub(10));
        }
    }

    Ok(())
}

/// MediaWiki escapes markup inside `<text>`; undo the entities that occur in
/// practice. `&amp;` last, so double-escaped sequences survive one level.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Stream a dump into JSONL `WordRecord` lines, one per kept article.
///
/// Pages outside namespace 0, redirects, and pages with no English section
/// are counted and skipped. Entry titles are NFC-normalized so downstream
/// dictionary keys are stable across dump encodings.
pub fn run_ingest(
    reader: impl Read,
    writer: &mut impl Write,
    limit: Option<usize>,
    quiet: bool,
) -> std::io::Result<IngestStats> {
    let start_time = Instant::now();
    let mut stats = IngestStats::default();

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap(),
        );
        pb
    };

    let limit_reached = std::cell::Cell::new(false);

    scan_pages(reader, |page_xml| {
        if limit_reached.get() {
            return false;
        }

        stats.pages_scanned += 1;

        if !quiet && stats.pages_scanned % 1000 == 0 {
            let elapsed = start_time.elapsed().as_secs_f64();
            let rate = stats.pages_scanned as f64 / elapsed;
            pb.set_message(format!(
                "Pages: {} | Words: {} | Rate: {:.0} pg/s",
                stats.pages_scanned, stats.words_written, rate
            ));
        }

        // Extract title
        let title = match TITLE_PATTERN.captures(&page_xml) {
            Some(cap) => cap[1].to_string(),
            None => {
                stats.skipped += 1;
                return true;
            }
        };

        // Words are assumed to have ns = 0
        if let Some(cap) = NS_PATTERN.captures(&page_xml) {
            if &cap[1] != "0" {
                stats.special += 1;
                return true;
            }
        }

        // Check for redirects
        if REDIRECT_PATTERN.is_match(&page_xml) {
            stats.redirects += 1;
            return true;
        }

        // Extract text
        let text = match TEXT_PATTERN.captures(&page_xml) {
            Some(cap) => cap[1].to_string(),
            None => {
                stats.skipped += 1;
                return true;
            }
        };

        // Check for English section
        if !ENGLISH_SECTION.is_match(&text) {
            stats.non_english += 1;
            return true;
        }

        let record = WordRecord {
            word: decode_entities(&title).nfc().collect(),
            text: decode_entities(&text),
        };

        match serde_json::to_string(&record) {
            Ok(json) => {
                writeln!(writer, "{}", json).ok();
                stats.words_written += 1;
            }
            Err(err) => {
                warn!("skipping {}: {}", record.word, err);
                stats.skipped += 1;
            }
        }

        if let Some(l) = limit {
            if stats.words_written >= l {
                limit_reached.set(true);
                return false;
            }
        }

        true
    })?;

    writer.flush()?;

    if limit_reached.get() && !quiet {
        pb.finish_with_message(format!("Reached limit of {} entries", limit.unwrap_or(0)));
    } else {
        pb.finish_and_clear();
    }

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

pub fn print_ingest_stats(stats: &IngestStats) {
    println!();
    println!("============================================================");
    println!("Pages scanned: {}", stats.pages_scanned);
    println!("Words written: {}", stats.words_written);
    println!("Special pages: {}", stats.special);
    println!("Redirects: {}", stats.redirects);
    println!("Non-English pages: {}", stats.non_english);
    println!("Skipped: {}", stats.skipped);
    println!(
        "Time: {}m {}s",
        stats.elapsed.as_secs() / 60,
        stats.elapsed.as_secs() % 60
    );
    println!(
        "Rate: {:.0} pages/sec",
        stats.pages_scanned as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("============================================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out a few bytes per call, so page spans land across
    /// chunk boundaries.
    struct DribbleReader {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for DribbleReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let end = (self.pos + self.step).min(self.data.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    fn page(title: &str, ns: &str, text: &str) -> String {
        format!(
            "<page><title>{}</title><ns>{}</ns><revision><text>{}</text></revision></page>",
            title, ns, text
        )
    }

    #[test]
    fn pages_split_across_chunks_are_recovered() {
        let xml = format!("<mediawiki>{}{}</mediawiki>", page("you", "0", "a"), page("me", "0", "b"));
        let reader = DribbleReader { data: xml.into_bytes(), pos: 0, step: 3 };

        let mut seen = Vec::new();
        scan_pages(reader, |page_xml| {
            seen.push(page_xml);
            true
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("<title>you</title>"));
        assert!(seen[1].contains("<title>me</title>"));
    }

    #[test]
    fn ingest_keeps_only_english_articles() {
        let xml = format!(
            "<mediawiki>{}{}{}{}</mediawiki>",
            page("you", "0", "==English==\n* /juː/"),
            page("Wiktionary:Sandbox", "4", "==English==\nmeta page"),
            page("perro", "0", "==Spanish==\nsin seccion inglesa"),
            page("colour", "0", "==English==\ntext &amp; more")
        );
        let reader = DribbleReader { data: xml.into_bytes(), pos: 0, step: 64 };

        let mut out = Vec::new();
        let stats = run_ingest(reader, &mut out, None, true).unwrap();

        assert_eq!(stats.pages_scanned, 4);
        assert_eq!(stats.words_written, 2);
        assert_eq!(stats.special, 1);
        assert_eq!(stats.non_english, 1);

        let records: Vec<WordRecord> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records[0].word, "you");
        assert_eq!(records[1].word, "colour");
        assert_eq!(records[1].text, "==English==\ntext & more");
    }

    #[test]
    fn redirects_are_skipped() {
        let xml = format!(
            "<mediawiki><page><title>Color</title><ns>0</ns><redirect title=\"colour\"/>{}</page></mediawiki>",
            "<revision><text>==English==</text></revision>"
        );
        let reader = DribbleReader { data: xml.into_bytes(), pos: 0, step: 64 };

        let mut out = Vec::new();
        let stats = run_ingest(reader, &mut out, None, true).unwrap();
        assert_eq!(stats.redirects, 1);
        assert_eq!(stats.words_written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn entities_are_decoded_once() {
        assert_eq!(decode_entities("&lt;ref&gt; &quot;a&quot; &#039;b&#039;"), "<ref> \"a\" 'b'");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn ingest_respects_the_entry_limit() {
        let xml = format!(
            "<mediawiki>{}{}{}</mediawiki>",
            page("a", "0", "==English==\n1"),
            page("b", "0", "==English==\n2"),
            page("c", "0", "==English==\n3")
        );
        let reader = DribbleReader { data: xml.into_bytes(), pos: 0, step: 64 };

        let mut out = Vec::new();
        let stats = run_ingest(reader, &mut out, Some(2), true).unwrap();
        assert_eq!(stats.words_written, 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
