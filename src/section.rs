//! Heading-level scanning and section extraction for wikitext documents.
//!
//! Wikitext marks section boundaries with runs of `=` at the start of a line
//! (`==English==`, `===Pronunciation===`). A section runs from its heading
//! line up to the next heading of equal or shallower depth, so subsections
//! travel with their parent.

/// Number of leading `=` characters after leading whitespace.
/// 0 means the line is not a heading.
pub fn heading_level(line: &str) -> usize {
    line.trim_start().chars().take_while(|&c| c == '=').count()
}

/// Heading title with the `=` fencing and surrounding whitespace removed,
/// lowercased for case-insensitive comparison.
fn heading_title(line: &str) -> String {
    line.trim().trim_matches('=').trim().to_lowercase()
}

/// Extract the sub-document matching an ordered, case-insensitive title path.
///
/// Each title filters the output of the previous one, so
/// `["english", "pronunciation"]` returns every Pronunciation subsection of
/// every English section, concatenated in document order. An empty title path
/// returns the input unchanged; no match yields an empty string. Downstream
/// stages treat empty as "no data", not as a failure.
pub fn filter_sections(text: &str, titles: &[&str]) -> String {
    let Some((first, rest)) = titles.split_first() else {
        return text.to_string();
    };
    if text.is_empty() {
        return text.to_string();
    }
    filter_sections(&filter_title(text, first), rest)
}

/// Collect every section headed by `title`, concatenated in document order.
fn filter_title(text: &str, title: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let wanted = title.to_lowercase();
    let mut out = String::new();

    let mut i = 0;
    while i < lines.len() {
        let level = heading_level(lines[i]);
        if level == 0 || heading_title(lines[i]) != wanted {
            i += 1;
            continue;
        }

        // Section ends at the next heading of equal or shallower depth;
        // deeper headings stay inside.
        let mut j = i + 1;
        while j < lines.len() {
            let next = heading_level(lines[j]);
            if next > 0 && next <= level {
                break;
            }
            j += 1;
        }

        for line in &lines[i..j] {
            out.push_str(line);
        }
        i = j;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────
    // Heading scanning
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn heading_level_counts_leading_equals() {
        assert_eq!(heading_level("==English=="), 2);
        assert_eq!(heading_level("===Pronunciation==="), 3);
        assert_eq!(heading_level("  ====Etymology===="), 4);
        assert_eq!(heading_level("plain text"), 0);
        assert_eq!(heading_level(""), 0);
    }

    #[test]
    fn equals_inside_a_line_is_not_a_heading() {
        assert_eq!(heading_level("{{template|p1=1|p2=2}}"), 0);
        assert_eq!(heading_level("a = b"), 0);
    }

    // ─────────────────────────────────────────────────────────────
    // Section filtering
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn missing_title_yields_empty() {
        let doc = "==English==\nbody\n";
        assert_eq!(filter_sections(doc, &["spanish"]), "");
    }

    #[test]
    fn empty_title_path_returns_input() {
        let doc = "==English==\nbody\n";
        assert_eq!(filter_sections(doc, &[]), doc);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(filter_sections("", &["english"]), "");
    }

    #[test]
    fn section_ends_at_next_same_level_heading() {
        let doc = "==Section==\n{{template|p1=1|p2=2|p3=3|p4=4}}\nthen it ends\n==Next Section==\n";
        let expected = "==Section==\n{{template|p1=1|p2=2|p3=3|p4=4}}\nthen it ends\n";
        assert_eq!(filter_sections(doc, &["section"]), expected);
    }

    #[test]
    fn deeper_headings_stay_inside() {
        let doc = "==English==\n===Noun===\nbody\n==Spanish==\notra\n";
        assert_eq!(
            filter_sections(doc, &["english"]),
            "==English==\n===Noun===\nbody\n"
        );
    }

    #[test]
    fn sibling_sections_concatenate_across_depths() {
        let doc = "==English==\n\
                   ====Pronunciation====\n\
                   * /a/\n\
                   ==Spanish==\n\
                   otra\n\
                   ==English==\n\
                   ===Pronunciation===\n\
                   * /b/\n\
                   ==French==\n\
                   fin\n";
        let english = filter_sections(doc, &["english"]);
        assert!(english.contains("/a/"));
        assert!(english.contains("/b/"));
        assert!(!english.contains("otra"));

        let pron = filter_sections(&english, &["pronunciation"]);
        assert_eq!(pron, "====Pronunciation====\n* /a/\n===Pronunciation===\n* /b/\n");
    }

    #[test]
    fn filtering_is_idempotent() {
        let doc = "===Pronunciation===\n* {{IPA|/a/|lang=en}}\n";
        assert_eq!(filter_sections(doc, &["pronunciation"]), doc);
    }

    #[test]
    fn title_match_is_case_insensitive_and_tolerates_spacing() {
        let doc = "== English ==\nbody\n";
        assert_eq!(filter_sections(doc, &["English"]), doc);
        assert_eq!(filter_sections(doc, &["english"]), doc);
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let doc = "==English==\nbody";
        assert_eq!(filter_sections(doc, &["english"]), doc);
    }
}
