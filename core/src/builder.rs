//! Full-rebuild index construction.
//!
//! Files are analyzed in parallel, then merged in sorted-path order so doc ids,
//! dictionary order and postings layout are reproducible.

use crate::persist::{save_doc_table, save_meta, save_term_dict, IndexPaths, MetaFile};
use crate::postings::PostingsWriter;
use crate::source::read_source;
use crate::tokenizer::TermExtractor;
use crate::{DocEntry, DocId, Field, Posting, Result, TermDictionary};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SOURCE_EXTENSION: &str = "json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub num_docs: u32,
    pub num_terms: u32,
    pub skipped: usize,
    pub postings_bytes: u64,
}

/// Per-document result of the map phase.
struct AnalyzedDoc {
    path: PathBuf,
    lens: [u32; 3],
    /// Distinct terms in first-seen order (title, then abstract, then claims) with per-field counts.
    terms: Vec<(String, [u32; 3])>,
}

/// Lists candidate source files under `root`, sorted by path.
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(SOURCE_EXTENSION))
        .collect();
    files.sort();
    files
}

fn analyze_file(path: &Path, extractor: &dyn TermExtractor) -> Option<AnalyzedDoc> {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable source");
            return None;
        }
    };

    let mut lens = [0u32; 3];
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut terms: Vec<(String, [u32; 3])> = Vec::new();
    for field in Field::ALL {
        let extracted = extractor.extract(source.field(field));
        lens[field.index()] = extracted.len() as u32;
        for term in extracted {
            let slot = match slots.get(&term) {
                Some(slot) => *slot,
                None => {
                    slots.insert(term.clone(), terms.len());
                    terms.push((term, [0; 3]));
                    terms.len() - 1
                }
            };
            terms[slot].1[field.index()] += 1;
        }
    }
    Some(AnalyzedDoc { path: path.to_path_buf(), lens, terms })
}

/// Builds the doc table, term dictionary and postings store for `corpus_root` into `output`.
///
/// Files that fail to decode are skipped without consuming a doc id.
pub fn build_index(corpus_root: &Path, output: &Path, extractor: &dyn TermExtractor) -> Result<BuildStats> {
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(&out_paths.root)?;

    let root = fs::canonicalize(corpus_root).unwrap_or_else(|_| corpus_root.to_path_buf());
    let files = discover_files(&root);
    tracing::info!(root = %root.display(), files = files.len(), "discovered source files");

    let analyzed: Vec<Option<AnalyzedDoc>> = files.par_iter().map(|p| analyze_file(p, extractor)).collect();

    let mut docs: Vec<DocEntry> = Vec::new();
    let mut dictionary = TermDictionary::new();
    let mut postings: Vec<Vec<Posting>> = Vec::new();
    let mut skipped = 0usize;

    for doc in analyzed {
        let Some(doc) = doc else {
            skipped += 1;
            continue;
        };
        let doc_id = docs.len() as DocId;
        for (term, tf) in doc.terms {
            let tid = dictionary.intern(&term) as usize;
            if postings.len() <= tid {
                postings.resize_with(tid + 1, Vec::new);
            }
            let entry = dictionary.entry_mut(tid as u32);
            entry.df += 1;
            entry.tf += tf.iter().map(|c| *c as u64).sum::<u64>();
            postings[tid].push(Posting { doc_id, tf });
        }
        let filename = doc.path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        docs.push(DocEntry {
            doc_id,
            filename,
            path: doc.path.to_string_lossy().into_owned(),
            len_title: doc.lens[0],
            len_abstract: doc.lens[1],
            len_claims: doc.lens[2],
        });
    }
    tracing::info!(num_docs = docs.len(), num_terms = dictionary.len(), skipped, "ingested documents");

    let mut writer = PostingsWriter::new(BufWriter::new(File::create(out_paths.postings())?));
    for (tid, plist) in postings.iter().enumerate() {
        let (start, length) = writer.write_block(plist)?;
        let entry = dictionary.entry_mut(tid as u32);
        entry.start = start;
        entry.length = length;
    }
    let postings_bytes = writer.bytes_written();
    writer.finish()?;

    save_term_dict(&out_paths, &dictionary)?;
    save_doc_table(&out_paths, &docs)?;
    let meta = MetaFile::new(docs.len() as u32, dictionary.len() as u32, postings_bytes);
    save_meta(&out_paths, &meta)?;

    tracing::info!(output = %out_paths.root.display(), postings_bytes, "index build complete");
    Ok(BuildStats { num_docs: meta.num_docs, num_terms: meta.num_terms, skipped, postings_bytes })
}
