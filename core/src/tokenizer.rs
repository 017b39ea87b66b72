use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Turns raw text into an ordered sequence of normalized terms.
///
/// The index builder and the query engine only depend on this contract, so any
/// segmenter (morphological analyzer, n-gram splitter, ...) can be plugged in.
/// Both sides of an index must use the same extractor configuration.
pub trait TermExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

impl<F> TermExtractor for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn extract(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Default extractor: NFKC, lowercase, stopword removal and English stemming.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    pub stem: bool,
    pub stopwords: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self { stem: true, stopwords: true }
    }
}

impl Analyzer {
    /// Normalization and word splitting only.
    pub fn plain() -> Self {
        Self { stem: false, stopwords: false }
    }
}

impl TermExtractor for Analyzer {
    fn extract(&self, text: &str) -> Vec<String> {
        tokenize_with(text, *self).into_iter().map(|(t, _)| t).collect()
    }
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into (term, position) using NFKC normalization, lowercase, stopword removal, and stemming.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    tokenize_with(text, Analyzer::default())
}

fn tokenize_with(text: &str, analyzer: Analyzer) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if analyzer.stopwords && is_stopword(token) { continue; }
        let term = if analyzer.stem { STEMMER.stem(token).to_string() } else { token.to_string() };
        tokens.push((term, pos));
    }
    tokens
}
