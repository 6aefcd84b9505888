// ============================================
// TF-IDF Vectorizer
// ============================================
//
// Documents → tokens (stop words removed) → capped vocabulary → TF-IDF rows
//
//   vocabulary: top `max_features` terms by corpus frequency, ties alphabetical
//   idf(t)    = ln((1 + n_docs) / (1 + df(t))) + 1
//   weight    = count(t, doc) * idf(t), rows L2-normalized
//
// Output is deterministic for a fixed corpus and configuration.

use super::stopwords::tokenize;
use super::{ContentIndexError, Result};
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Sparse row: (term index, weight), sorted by term index.
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    pub rows: Vec<SparseVector>,
    pub vocabulary: HashMap<String, usize>,
}

impl TfidfMatrix {
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows.len(), self.n_features()));
        for (row_idx, row) in self.rows.iter().enumerate() {
            for &(col, weight) in row {
                dense[[row_idx, col]] = weight;
            }
        }
        dense
    }
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: max_features.max(1),
        }
    }

    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<TfidfMatrix> {
        if documents.is_empty() {
            return Err(ContentIndexError::EmptyCorpus);
        }

        let tokenized: Vec<Vec<String>> =
            documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokens {
                *term_freq.entry(token.as_str()).or_insert(0) += 1;
                if seen.insert(token.as_str()) {
                    *doc_freq.entry(token.as_str()).or_insert(0) += 1;
                }
            }
        }

        if term_freq.is_empty() {
            return Err(ContentIndexError::EmptyVocabulary);
        }

        let mut ranked: Vec<(&str, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        // Column order is alphabetical so it does not depend on hash order
        let mut kept: Vec<&str> = ranked.into_iter().map(|(term, _)| term).collect();
        kept.sort_unstable();

        let n_docs = documents.len() as f64;
        let idf: Vec<f64> = kept
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vocabulary: HashMap<String, usize> = kept
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for token in tokens {
                    if let Some(&col) = vocabulary.get(token) {
                        *counts.entry(col).or_insert(0.0) += 1.0;
                    }
                }

                let mut row: SparseVector = counts
                    .into_iter()
                    .map(|(col, count)| (col, count * idf[col]))
                    .collect();

                let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|(_, w)| *w /= norm);
                }
                row
            })
            .collect();

        Ok(TfidfMatrix { rows, vocabulary })
    }
}

/// Dot product of two index-sorted sparse vectors.
pub fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
