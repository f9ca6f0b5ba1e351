//! Pronunciation extraction: interpret the templates of a pronunciation
//! section into IPA transcriptions and audio-file references, qualified by
//! regional accent codes.

use std::collections::HashMap;

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::template::{tokenize, Token};

/// Template names that carry IPA transcriptions in their arguments.
const IPA_TEMPLATES: [&str; 3] = ["IPA", "audio-IPA", "audio-pron"];

lazy_static! {
    /// Maximal `/.../` spans over raw text, for the lenient matcher.
    static ref LENIENT_IPA: Regex = Regex::new(r"/[^/]+/").unwrap();
}

#[derive(Debug, Deserialize)]
struct AccentSchema {
    accent_labels: HashMap<String, String>,
}

/// Accent-label table from the versioned schema file, parsed once.
static ACCENT_LABELS: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let schema: AccentSchema = serde_yaml::from_str(include_str!("../schema/accents.yaml"))
        .expect("schema/accents.yaml is malformed");
    schema.accent_labels
});

/// One IPA transcription with the accent it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpaEntry {
    pub ipa: String,
    pub accent: String,
}

/// One audio-sample file reference with the accent it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEntry {
    pub filename: String,
    pub accent: String,
}

/// Pronunciation data extracted from one entry's pronunciation section.
/// Built fresh per entry; never merged across entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationRecord {
    pub ipa: Vec<IpaEntry>,
    pub audio: Vec<AudioEntry>,
}

impl PronunciationRecord {
    pub fn is_empty(&self) -> bool {
        self.ipa.is_empty() && self.audio.is_empty()
    }
}

/// Map a display label (`"RP"`, `"Audio (US)"`, ...) to its region code.
/// The corpus carries a long tail of inconsistent hand-written labels, so
/// unknown labels map to the empty accent rather than failing.
pub fn normalize_accent(raw: &str) -> String {
    ACCENT_LABELS.get(raw).cloned().unwrap_or_default()
}

/// Normalize an audio filename the way MediaWiki stores media titles: first
/// character uppercased, interior spaces as underscores.
pub fn normalize_filename(raw: &str) -> String {
    let mut chars = raw.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().collect();
    out.extend(chars.map(|c| if c == ' ' { '_' } else { c }));
    out
}

/// Shortest `/.../` span starting at the argument's first `/`, delimiters
/// included. `None` when the argument holds no slash pair, e.g. bracketed
/// phonetic transcriptions like `[ˈdɪdəɫ]`.
fn first_slash_span(arg: &str) -> Option<&str> {
    let open = arg.find('/')?;
    let close = arg[open + 1..].find('/')?;
    Some(&arg[open..open + close + 2])
}

/// Extract IPA and audio records from a pronunciation section.
///
/// Each line is one pronunciation item. An `{{a|...}}` accent tag applies to
/// the templates after it on the same line and accents reset per line.
/// Unknown templates are ignored, never an error. Output order is source
/// line order, then template order within a line, then argument order within
/// a template.
pub fn extract_pronunciation(section: &str) -> PronunciationRecord {
    let mut record = PronunciationRecord::default();

    for line in section.lines() {
        let mut active_accents = vec![String::new()];

        for token in tokenize(line) {
            let Token::Template(template) = token else {
                continue;
            };

            // Accent tags qualify the rest of the line and emit nothing.
            if template.name == "a" {
                active_accents = template.args.iter().map(|arg| normalize_accent(arg)).collect();
                continue;
            }

            if IPA_TEMPLATES.contains(&template.name.as_str()) {
                for arg in &template.args {
                    let Some(ipa) = first_slash_span(arg) else {
                        continue;
                    };
                    for accent in &active_accents {
                        record.ipa.push(IpaEntry {
                            ipa: ipa.to_string(),
                            accent: accent.clone(),
                        });
                    }
                }
            }

            if template.name.contains("audio") {
                let filename =
                    normalize_filename(template.args.first().map(String::as_str).unwrap_or(""));
                // Legacy {{audio}} lines carry a display label in argument 1
                // instead of a preceding accent tag.
                let accent = match active_accents.first() {
                    Some(accent) if !accent.is_empty() => accent.clone(),
                    _ => normalize_accent(template.args.get(1).map(String::as_str).unwrap_or("")),
                };
                record.audio.push(AudioEntry { filename, accent });
            }
        }
    }

    record
}

/// Every maximal `/.../` substring in the raw text, with no template
/// awareness. Diagnostic counterpart to [`extract_pronunciation`]: the two
/// outputs are compared, never merged.
pub fn extract_ipa_lenient(text: &str) -> Vec<String> {
    LENIENT_IPA
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
