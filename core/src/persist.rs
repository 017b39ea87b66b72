use crate::postings::{PostingsReader, RECORD_SIZE};
use crate::{DocEntry, IndexError, Result, TermDictionary};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub postings_bytes: u64,
    pub record_size: u64,
    pub byte_order: String,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn new(num_docs: u32, num_terms: u32, postings_bytes: u64) -> Self {
        Self {
            num_docs,
            num_terms,
            postings_bytes,
            record_size: RECORD_SIZE,
            byte_order: "little-endian".into(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn doc_table(&self) -> PathBuf { self.root.join("doc_table.json") }
    pub fn term_dict(&self) -> PathBuf { self.root.join("term_dict.json") }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = open_artifact(path)?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

fn open_artifact(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(IndexError::MissingArtifact(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

pub fn save_doc_table(paths: &IndexPaths, docs: &[DocEntry]) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_json(&paths.doc_table(), docs)
}

pub fn load_doc_table(paths: &IndexPaths) -> Result<Vec<DocEntry>> {
    read_json(&paths.doc_table())
}

pub fn save_term_dict(paths: &IndexPaths, dict: &TermDictionary) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_json(&paths.term_dict(), dict)
}

pub fn load_term_dict(paths: &IndexPaths) -> Result<TermDictionary> {
    read_json(&paths.term_dict())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_json(&paths.meta(), meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    read_json(&paths.meta())
}

/// Opens the postings store for random access; the file stays on disk.
pub fn open_postings(paths: &IndexPaths) -> Result<PostingsReader<BufReader<File>>> {
    let f = open_artifact(&paths.postings())?;
    Ok(PostingsReader::new(BufReader::new(f)))
}

/// Load only the header structures required to search: doc table, term dictionary, meta.
///
/// Doc ids must be exactly `0..N` in table order and agree with `meta.json`, and every
/// dictionary block must have `length == df` and lie inside the postings store.
pub fn load_index_header(paths: &IndexPaths) -> Result<(Vec<DocEntry>, TermDictionary, MetaFile)> {
    let docs = load_doc_table(paths)?;
    let dict = load_term_dict(paths)?;
    let meta = load_meta(paths)?;
    if meta.record_size != RECORD_SIZE {
        return Err(IndexError::InvalidIndex(format!("unsupported record size {}", meta.record_size)));
    }
    if meta.num_docs as usize != docs.len() {
        return Err(IndexError::InvalidIndex(format!(
            "meta.json lists {} documents but the doc table has {}",
            meta.num_docs,
            docs.len()
        )));
    }
    if let Some((pos, doc)) = docs.iter().enumerate().find(|(i, d)| d.doc_id as usize != *i) {
        return Err(IndexError::InvalidIndex(format!("doc id {} found at position {}", doc.doc_id, pos)));
    }
    for (term, entry) in dict.iter() {
        if entry.length != entry.df {
            return Err(IndexError::InvalidIndex(format!(
                "term {term:?}: length {} differs from df {}",
                entry.length, entry.df
            )));
        }
        let end = (entry.length as u64)
            .checked_mul(RECORD_SIZE)
            .and_then(|bytes| entry.start.checked_add(bytes));
        if end.map_or(true, |end| end > meta.postings_bytes) {
            return Err(IndexError::InvalidIndex(format!(
                "term {term:?}: block at {} with {} records exceeds {} postings bytes",
                entry.start, entry.length, meta.postings_bytes
            )));
        }
    }
    Ok((docs, dict, meta))
}
