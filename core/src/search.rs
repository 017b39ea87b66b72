//! Query engine: tag parsing, candidate resolution, phrase verification, BM25F ranking.

use crate::persist::{load_index_header, open_postings, IndexPaths, MetaFile};
use crate::postings::{PostingsReader, RECORD_SIZE};
use crate::query::{ParsedQuery, QueryMode};
use crate::scoring::{effective_tf, idf, pseudo_tf, saturate, Bm25fParams, CorpusStats};
use crate::snippet::{contains_phrase, highlight, Highlight, Snippet};
use crate::source::read_source;
use crate::tokenizer::TermExtractor;
use crate::{DocEntry, DocId, Field, FieldSet, IndexError, Posting, Result, TermDictionary};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const TOP_K: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct TermContribution {
    pub term: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub filename: String,
    /// Rounded to two decimals.
    pub score: f64,
    pub snippets: Vec<Snippet>,
    /// Per query-term contributions; only filled for `[VERBOSE]` queries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub explanation: Vec<TermContribution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query_terms: Vec<String>,
    pub mode: QueryMode,
    pub verbose: bool,
    /// Number of documents that received a score.
    pub total: usize,
    pub hits: Vec<Hit>,
}

impl SearchResults {
    fn empty(query: &ParsedQuery, query_terms: Vec<String>) -> Self {
        Self { query_terms, mode: query.mode(), verbose: query.verbose, total: 0, hits: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// A loaded index ready to serve queries.
///
/// The doc table and dictionary live in memory; postings are read on demand
/// through a single file handle guarded by a mutex.
pub struct Searcher {
    docs: Vec<DocEntry>,
    dictionary: TermDictionary,
    meta: MetaFile,
    stats: CorpusStats,
    params: Bm25fParams,
    postings: Mutex<PostingsReader<BufReader<File>>>,
    extractor: Box<dyn TermExtractor>,
}

impl Searcher {
    /// Loads all index artifacts. Missing or inconsistent artifacts are a startup error.
    pub fn open<P: AsRef<Path>>(index_dir: P, extractor: Box<dyn TermExtractor>) -> Result<Self> {
        let paths = IndexPaths::new(index_dir);
        let (docs, dictionary, meta) = load_index_header(&paths)?;
        let postings = open_postings(&paths)?;
        let stats = CorpusStats::from_docs(&docs);
        tracing::info!(num_docs = meta.num_docs, num_terms = dictionary.len(), created_at = %meta.created_at, "index loaded");
        Ok(Self {
            docs,
            dictionary,
            meta,
            stats,
            params: Bm25fParams::default(),
            postings: Mutex::new(postings),
            extractor,
        })
    }

    pub fn with_params(mut self, params: Bm25fParams) -> Self {
        self.params = params;
        self
    }

    pub fn num_docs(&self) -> u32 {
        self.stats.num_docs
    }

    pub fn meta(&self) -> &MetaFile {
        &self.meta
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocEntry> {
        self.docs.get(doc_id as usize)
    }

    /// Reads one term's posting list, or `None` when the term is not indexed.
    ///
    /// A record pointing past the doc table is reported as corruption at its offset.
    pub fn postings(&self, term: &str) -> Result<Option<Vec<Posting>>> {
        let Some(entry) = self.dictionary.get(term) else {
            return Ok(None);
        };
        let plist = self.postings.lock().read_postings(entry.start, entry.length)?;
        if let Some(i) = plist.iter().position(|p| p.doc_id as usize >= self.docs.len()) {
            return Err(IndexError::Corruption {
                offset: entry.start + i as u64 * RECORD_SIZE,
                reason: format!("doc id {} outside doc table of {}", plist[i].doc_id, self.docs.len()),
            });
        }
        Ok(Some(plist))
    }

    /// Runs a tagged query and returns the top results with snippets.
    pub fn search(&self, input: &str) -> Result<SearchResults> {
        let query = ParsedQuery::parse(input);
        let query_terms = self.extractor.extract(&query.text);
        if query_terms.is_empty() {
            return Ok(SearchResults::empty(&query, query_terms));
        }
        let fields = query.effective_fields();

        let mut cache: HashMap<String, Vec<Posting>> = HashMap::new();
        for term in &query_terms {
            if cache.contains_key(term) {
                continue;
            }
            match self.postings(term)? {
                Some(plist) => {
                    cache.insert(term.clone(), plist);
                }
                None if query.requires_all_terms() => {
                    tracing::debug!(term = %term, "term not indexed, no candidates");
                    return Ok(SearchResults::empty(&query, query_terms.clone()));
                }
                None => {}
            }
        }

        let candidates = if query.requires_all_terms() {
            let mut set = resolve_candidates(&query_terms, &cache, fields);
            if query.phrase && !set.is_empty() {
                set = self.verify_phrase(set, &query.text);
            }
            if set.is_empty() {
                return Ok(SearchResults::empty(&query, query_terms));
            }
            Some(set)
        } else {
            None
        };

        let mut scores: HashMap<DocId, f64> = HashMap::new();
        let mut explain: HashMap<DocId, Vec<TermContribution>> = HashMap::new();
        for term in &query_terms {
            let (Some(entry), Some(plist)) = (self.dictionary.get(term), cache.get(term.as_str())) else {
                continue;
            };
            let term_idf = idf(self.stats.num_docs, entry.df);
            for posting in plist {
                if candidates.as_ref().is_some_and(|c| !c.contains(&posting.doc_id)) {
                    continue;
                }
                let tf = effective_tf(posting, fields, &self.params);
                if tf.iter().all(|c| *c == 0) {
                    continue;
                }
                let doc = &self.docs[posting.doc_id as usize];
                let tau = pseudo_tf(&tf, doc, &self.stats, &self.params);
                let contribution = saturate(term_idf, tau, self.params.k1);
                *scores.entry(posting.doc_id).or_insert(0.0) += contribution;
                if query.verbose {
                    explain.entry(posting.doc_id).or_default().push(TermContribution { term: term.clone(), score: contribution });
                }
            }
        }

        let total = scores.len();
        let ranked = rank(scores);
        let target = match query.mode() {
            QueryMode::Phrase => Highlight::Phrase(&query.text),
            QueryMode::And => Highlight::Cover(&query_terms),
            QueryMode::Or => Highlight::BestWindow(&query_terms),
        };
        let hits = ranked
            .into_iter()
            .take(TOP_K)
            .map(|(doc_id, score)| Hit {
                doc_id,
                filename: self.docs[doc_id as usize].filename.clone(),
                score: round2(score),
                snippets: self.snippets(doc_id, target),
                explanation: explain.remove(&doc_id).unwrap_or_default(),
            })
            .collect();

        tracing::info!(query = %query.text, mode = ?query.mode(), total, "search complete");
        Ok(SearchResults { query_terms, mode: query.mode(), verbose: query.verbose, total, hits })
    }

    /// Keeps candidates whose title contains `phrase`, ignoring case. Unreadable sources are dropped.
    fn verify_phrase(&self, candidates: HashSet<DocId>, phrase: &str) -> HashSet<DocId> {
        candidates
            .into_iter()
            .filter(|id| {
                let Some(doc) = self.docs.get(*id as usize) else {
                    return false;
                };
                match read_source(Path::new(&doc.path)) {
                    Ok(src) => contains_phrase(src.field(Field::Title), phrase),
                    Err(e) => {
                        tracing::warn!(doc_id = *id, path = %doc.path, error = %e, "dropping phrase candidate");
                        false
                    }
                }
            })
            .collect()
    }

    /// Re-reads a document's source and extracts highlighted windows. An unreadable source yields none.
    pub fn snippets(&self, doc_id: DocId, target: Highlight<'_>) -> Vec<Snippet> {
        let Some(doc) = self.docs.get(doc_id as usize) else {
            return Vec::new();
        };
        match read_source(Path::new(&doc.path)) {
            Ok(src) => highlight(&src, target),
            Err(e) => {
                tracing::warn!(doc_id, path = %doc.path, error = %e, "no snippets for unreadable source");
                Vec::new()
            }
        }
    }
}

/// Intersects, across query terms, the documents where each term occurs in the effective fields.
fn resolve_candidates(
    query_terms: &[String],
    cache: &HashMap<String, Vec<Posting>>,
    fields: Option<FieldSet>,
) -> HashSet<DocId> {
    let mut running: Option<HashSet<DocId>> = None;
    for term in query_terms {
        let docs: HashSet<DocId> = cache
            .get(term.as_str())
            .map(|plist| plist.iter().filter(|p| p.occurs_in(fields)).map(|p| p.doc_id).collect())
            .unwrap_or_default();
        let next = match running {
            Some(prev) => prev.intersection(&docs).copied().collect(),
            None => docs,
        };
        if next.is_empty() {
            return HashSet::new();
        }
        running = Some(next);
    }
    running.unwrap_or_default()
}

/// Descending score, ascending doc id on ties.
fn rank(scores: HashMap<DocId, f64>) -> Vec<(DocId, f64)> {
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(doc_id: DocId, tf: [u32; 3]) -> Posting {
        Posting { doc_id, tf }
    }

    #[test]
    fn candidates_are_field_filtered_intersection() {
        let mut cache: HashMap<String, Vec<Posting>> = HashMap::new();
        cache.insert("a".into(), vec![p(0, [1, 0, 0]), p(1, [0, 1, 0]), p(2, [0, 0, 1])]);
        cache.insert("b".into(), vec![p(1, [1, 0, 0]), p(2, [1, 0, 0])]);
        let terms = vec!["a".to_string(), "b".to_string()];

        let any: HashSet<DocId> = resolve_candidates(&terms, &cache, None);
        assert_eq!(any, HashSet::from([1, 2]));

        let abstract_only = resolve_candidates(&terms, &cache, Some(FieldSet::only(Field::Abstract)));
        assert!(abstract_only.is_empty());

        let mut ta = FieldSet::only(Field::Title);
        ta.insert(Field::Abstract);
        assert_eq!(resolve_candidates(&terms, &cache, Some(ta)), HashSet::from([1]));
    }

    #[test]
    fn ties_break_by_doc_id() {
        let scores = HashMap::from([(7, 1.0), (3, 1.0), (5, 2.0)]);
        let order: Vec<DocId> = rank(scores).into_iter().map(|(d, _)| d).collect();
        assert_eq!(order, vec![5, 3, 7]);
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.005001), -0.01);
    }
}
