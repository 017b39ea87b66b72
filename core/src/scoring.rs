//! BM25F scoring.
//!
//! Per-field frequencies are length-normalized and weighted into a single
//! pseudo frequency which is then saturated once:
//!
//! ```text
//! tau   = sum_f w_f * tf_f / (1 - b_f + b_f * len_f / avglen_f)
//! score = idf * tau * (k1 + 1) / (k1 + tau)
//! idf   = ln((N - df + 0.5) / (df + 0.5) + 1)
//! ```

use crate::{DocEntry, Field, FieldSet, Posting};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
    pub weight: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25fParams {
    pub k1: f64,
    /// Indexed by [`Field::index`].
    pub fields: [FieldParams; 3],
}

impl Default for Bm25fParams {
    fn default() -> Self {
        Self {
            k1: 1.2,
            fields: [
                FieldParams { weight: 2.5, b: 0.3 },
                FieldParams { weight: 1.5, b: 0.75 },
                FieldParams { weight: 1.1, b: 0.8 },
            ],
        }
    }
}

impl Bm25fParams {
    pub fn field(&self, field: Field) -> FieldParams {
        self.fields[field.index()]
    }
}

/// Corpus-wide statistics needed for length normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusStats {
    pub num_docs: u32,
    pub avg_len: [f64; 3],
}

impl CorpusStats {
    pub fn from_docs(docs: &[DocEntry]) -> Self {
        let mut sums = [0u64; 3];
        for d in docs {
            for f in Field::ALL {
                sums[f.index()] += d.field_len(f) as u64;
            }
        }
        let n = docs.len();
        let avg = |s: u64| if n == 0 { 0.0 } else { s as f64 / n as f64 };
        Self { num_docs: n as u32, avg_len: [avg(sums[0]), avg(sums[1]), avg(sums[2])] }
    }
}

/// Not clamped at zero.
pub fn idf(num_docs: u32, df: u32) -> f64 {
    let n = num_docs as f64;
    let df = df as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Per-field frequencies that count for scoring: fields outside `fields` or with zero weight read as 0.
pub fn effective_tf(posting: &Posting, fields: Option<FieldSet>, params: &Bm25fParams) -> [u32; 3] {
    let mut tf = posting.tf;
    for f in Field::ALL {
        let excluded = fields.map(|set| !set.contains(f)).unwrap_or(false);
        if excluded || params.field(f).weight == 0.0 {
            tf[f.index()] = 0;
        }
    }
    tf
}

/// Weighted, length-normalized pseudo frequency. A field whose corpus average length is 0 contributes nothing.
pub fn pseudo_tf(tf: &[u32; 3], doc: &DocEntry, stats: &CorpusStats, params: &Bm25fParams) -> f64 {
    Field::ALL
        .into_iter()
        .map(|f| {
            let avg = stats.avg_len[f.index()];
            let count = tf[f.index()];
            if avg == 0.0 || count == 0 {
                return 0.0;
            }
            let p = params.field(f);
            let norm = 1.0 - p.b + p.b * doc.field_len(f) as f64 / avg;
            p.weight * count as f64 / norm
        })
        .sum()
}

pub fn saturate(idf: f64, tau: f64, k1: f64) -> f64 {
    idf * tau * (k1 + 1.0) / (k1 + tau)
}
