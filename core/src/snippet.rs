//! Snippet extraction with highlighted matches.
//!
//! Windows are measured in characters and matched case-insensitively. Fields
//! are visited in priority order (title, abstract, claims) and, inside a field,
//! candidate windows in order of match position, so the first best window wins.

use crate::source::SourceText;
use crate::Field;
use regex::RegexBuilder;
use serde::Serialize;
use std::fmt;

pub const WINDOW_CHARS: usize = 80;
pub const MARK_OPEN: &str = "<<";
pub const MARK_CLOSE: &str = ">>";

/// A labeled text window with highlighted matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub field: Field,
    pub text: String,
}

impl fmt::Display for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.text)
    }
}

/// What to highlight and how windows are chosen.
#[derive(Debug, Clone, Copy)]
pub enum Highlight<'a> {
    /// First occurrence of the literal phrase in the title.
    Phrase(&'a str),
    /// The single window containing the most distinct terms.
    BestWindow(&'a [String]),
    /// Greedy set cover: windows until every term is covered or none can be.
    Cover(&'a [String]),
}

/// Field text prepared for matching: whitespace flattened to spaces, and a lowercase copy with the same char indices.
struct FieldText {
    field: Field,
    chars: Vec<char>,
    folded: Vec<char>,
}

impl FieldText {
    fn new(field: Field, text: &str) -> Self {
        let chars: Vec<char> = text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }).collect();
        let folded = chars.iter().map(|c| fold_char(*c)).collect();
        Self { field, chars, folded }
    }

    fn window(&self, pos: usize) -> (usize, usize) {
        let len = self.chars.len();
        let start = pos.saturating_sub(WINDOW_CHARS / 2);
        let end = (start + WINDOW_CHARS).min(len);
        (end.saturating_sub(WINDOW_CHARS), end)
    }

    fn render(&self, (start, end): (usize, usize), terms: &[&str]) -> Snippet {
        let raw: String = self.chars[start..end].iter().collect();
        Snippet { field: self.field, text: mark(&raw, terms) }
    }
}

struct Term {
    raw: String,
    folded: Vec<char>,
}

/// One-to-one case fold, so folded text keeps the char indices of the original.
fn fold_char(c: char) -> char {
    if c.is_whitespace() {
        return ' ';
    }
    match c.to_lowercase().next().unwrap_or(c) {
        'ς' => 'σ',
        lower => lower,
    }
}

fn fold(s: &str) -> Vec<char> {
    s.chars().map(fold_char).collect()
}

/// Case-insensitive substring test using the same folding as phrase snippets.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    contains(&fold(text), &fold(phrase.trim()))
}

fn find_all(hay: &[char], needle: &[char]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > hay.len() {
        return Vec::new();
    }
    (0..=hay.len() - needle.len()).filter(|i| hay[*i..*i + needle.len()] == *needle).collect()
}

fn contains(hay: &[char], needle: &[char]) -> bool {
    !needle.is_empty() && hay.windows(needle.len()).any(|w| w == needle)
}

/// Wraps every case-insensitive occurrence of `terms` in highlight markers, longest term first.
fn mark(text: &str, terms: &[&str]) -> String {
    let mut alts: Vec<&str> = terms.iter().copied().filter(|t| !t.trim().is_empty()).collect();
    if alts.is_empty() {
        return text.to_string();
    }
    alts.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    let pattern = alts.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.replace_all(text, |caps: &regex::Captures| format!("{MARK_OPEN}{}{MARK_CLOSE}", &caps[0])).into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "highlight pattern rejected");
            text.to_string()
        }
    }
}

fn distinct_terms(terms: &[String]) -> Vec<Term> {
    let mut out: Vec<Term> = Vec::new();
    for raw in terms {
        let folded = fold(raw.trim());
        if folded.is_empty() || out.iter().any(|t| t.folded == folded) {
            continue;
        }
        out.push(Term { raw: raw.trim().to_string(), folded });
    }
    out
}

/// Match positions of `terms` in `field`, ordered by position.
fn occurrences(field: &FieldText, terms: &[Term]) -> Vec<usize> {
    let mut positions: Vec<usize> = terms.iter().flat_map(|t| find_all(&field.folded, &t.folded)).collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

/// Indices of `terms` fully contained in the window.
fn covered(field: &FieldText, bounds: (usize, usize), terms: &[Term]) -> Vec<usize> {
    let slice = &field.folded[bounds.0..bounds.1];
    terms.iter().enumerate().filter(|(_, t)| contains(slice, &t.folded)).map(|(i, _)| i).collect()
}

/// Picks, across fields in priority order, the window covering the most of `terms`. Ties keep the earliest.
fn best_window<'f>(fields: &'f [FieldText], terms: &[Term]) -> Option<(&'f FieldText, (usize, usize), Vec<usize>)> {
    let mut best: Option<(&FieldText, (usize, usize), Vec<usize>)> = None;
    for field in fields {
        for pos in occurrences(field, terms) {
            let bounds = field.window(pos);
            let hits = covered(field, bounds, terms);
            if hits.len() > best.as_ref().map(|b| b.2.len()).unwrap_or(0) {
                best = Some((field, bounds, hits));
            }
        }
    }
    best
}

fn phrase_snippet(doc: &SourceText, phrase: &str) -> Vec<Snippet> {
    let needle = fold(phrase.trim());
    let title = FieldText::new(Field::Title, doc.field(Field::Title));
    let Some(pos) = find_all(&title.folded, &needle).first().copied() else {
        return Vec::new();
    };
    let (start, end) = title.window(pos);
    let match_end = (pos + needle.len()).min(end);
    let chars = &title.chars;
    let text = format!(
        "{}{MARK_OPEN}{}{MARK_CLOSE}{}",
        chars[start..pos].iter().collect::<String>(),
        chars[pos..match_end].iter().collect::<String>(),
        chars[match_end..end].iter().collect::<String>(),
    );
    vec![Snippet { field: Field::Title, text }]
}

fn best_window_snippet(fields: &[FieldText], terms: &[Term]) -> Vec<Snippet> {
    let all: Vec<&str> = terms.iter().map(|t| t.raw.as_str()).collect();
    match best_window(fields, terms) {
        Some((field, bounds, _)) => vec![field.render(bounds, &all)],
        None => Vec::new(),
    }
}

fn cover_snippets(fields: &[FieldText], mut remaining: Vec<Term>) -> Vec<Snippet> {
    let mut out = Vec::new();
    while !remaining.is_empty() {
        let Some((field, bounds, hits)) = best_window(fields, &remaining) else {
            break;
        };
        let marked: Vec<&str> = hits.iter().map(|i| remaining[*i].raw.as_str()).collect();
        out.push(field.render(bounds, &marked));
        let mut idx = 0;
        remaining.retain(|_| {
            let keep = !hits.contains(&idx);
            idx += 1;
            keep
        });
    }
    out
}

/// Produces zero or more highlighted windows for one document.
pub fn highlight(doc: &SourceText, target: Highlight<'_>) -> Vec<Snippet> {
    match target {
        Highlight::Phrase(phrase) => phrase_snippet(doc, phrase),
        Highlight::BestWindow(terms) | Highlight::Cover(terms) => {
            let fields: Vec<FieldText> = Field::ALL.into_iter().map(|f| FieldText::new(f, doc.field(f))).collect();
            let terms = distinct_terms(terms);
            if matches!(target, Highlight::Cover(_)) {
                cover_snippets(&fields, terms)
            } else {
                best_window_snippet(&fields, &terms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, abs: &str, claims: &str) -> SourceText {
        SourceText { title: title.into(), abstract_text: abs.into(), claims: claims.into() }
    }

    fn terms(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn phrase_is_found_in_title_only() {
        let d = doc("A Neural Network for images", "neural network in abstract", "");
        let out = highlight(&d, Highlight::Phrase("neural network"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, Field::Title);
        assert_eq!(out[0].text, "A <<Neural Network>> for images");

        let d = doc("Image classifier", "neural network in abstract", "");
        assert!(highlight(&d, Highlight::Phrase("neural network")).is_empty());
    }

    #[test]
    fn phrase_test_and_phrase_window_agree_on_folding() {
        let d = doc("ΟΔΟΣ map", "", "");
        assert!(contains_phrase(&d.title, "οδος map"));
        let out = highlight(&d, Highlight::Phrase("οδος map"));
        assert_eq!(out, vec![Snippet { field: Field::Title, text: "<<ΟΔΟΣ map>>".into() }]);

        let d = doc("İstanbul Bridge", "", "");
        assert!(contains_phrase(&d.title, "istanbul bridge"));
        let out = highlight(&d, Highlight::Phrase("istanbul bridge"));
        assert_eq!(out[0].text, "<<İstanbul Bridge>>");

        assert!(!contains_phrase("neural", "  "));
    }

    #[test]
    fn window_is_clamped_to_field_bounds() {
        let long = format!("{}battery{}", "x".repeat(100), "y".repeat(100));
        let f = FieldText::new(Field::Abstract, &long);
        assert_eq!(f.window(100), (60, 140));
        assert_eq!(f.window(5), (0, 80));
        assert_eq!(f.window(200), (127, 207));
        let short = FieldText::new(Field::Title, "tiny");
        assert_eq!(short.window(2), (0, 4));
    }

    #[test]
    fn best_window_prefers_more_distinct_terms() {
        let abs = format!("solar {} solar panel", "z".repeat(120));
        let d = doc("solar power", &abs, "");
        let out = highlight(&d, Highlight::BestWindow(&terms(&["solar", "panel"])));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, Field::Abstract);
        assert!(out[0].text.ends_with("<<solar>> <<panel>>"));
    }

    #[test]
    fn best_window_ties_keep_first_field() {
        let d = doc("Solar cell", "solar array", "");
        let out = highlight(&d, Highlight::BestWindow(&terms(&["solar"])));
        assert_eq!(out, vec![Snippet { field: Field::Title, text: "<<Solar>> cell".into() }]);
        assert!(highlight(&d, Highlight::BestWindow(&terms(&["wind"]))).is_empty());
    }

    #[test]
    fn cover_splits_terms_that_never_share_a_window() {
        let abs = format!("lithium {} anode", "q".repeat(150));
        let d = doc("", &abs, "");
        let out = highlight(&d, Highlight::Cover(&terms(&["lithium", "anode"])));
        assert_eq!(out.len(), 2);
        assert!(out[0].text.contains("<<lithium>>") && !out[0].text.contains("<<anode>>"));
        assert!(out[1].text.contains("<<anode>>") && !out[1].text.contains("<<lithium>>"));
    }

    #[test]
    fn cover_uses_one_window_when_possible_and_stops_on_missing_terms() {
        let d = doc("Lithium anode coating", "", "a separate lithium mention");
        let out = highlight(&d, Highlight::Cover(&terms(&["lithium", "anode", "graphene"])));
        assert_eq!(out, vec![Snippet { field: Field::Title, text: "<<Lithium>> <<anode>> coating".into() }]);
    }

    #[test]
    fn display_labels_the_field() {
        let s = Snippet { field: Field::Claims, text: "x".into() };
        assert_eq!(s.to_string(), "[Claims] x");
    }
}
