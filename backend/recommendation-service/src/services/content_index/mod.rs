// ============================================
// Content Similarity Index
// ============================================
//
// Pairwise cosine similarity between catalog items, computed from the
// TF-IDF vectors of their text and labels.
//
// The index is an immutable snapshot swapped in whole on every rebuild.
// Readers clone the `Arc` and never observe a partially built matrix.

pub mod stopwords;
pub mod tfidf;

pub use tfidf::{TfidfMatrix, TfidfVectorizer};

use crate::models::{ItemContent, ItemId};
use ndarray::Array2;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ContentIndexError {
    #[error("Corpus is empty")]
    EmptyCorpus,

    #[error("Corpus produced an empty vocabulary")]
    EmptyVocabulary,
}

pub type Result<T> = std::result::Result<T, ContentIndexError>;

/// One immutable build of the index.
#[derive(Debug, Clone)]
pub struct ContentSnapshot {
    item_ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    similarity: Array2<f64>,
    vocabulary_size: usize,
    fitted: bool,
}

impl ContentSnapshot {
    pub fn empty() -> Self {
        Self {
            item_ids: Vec::new(),
            positions: HashMap::new(),
            similarity: Array2::zeros((0, 0)),
            vocabulary_size: 0,
            fitted: false,
        }
    }

    /// Vectorize `corpus` and compute the full similarity matrix.
    ///
    /// An empty corpus yields an unfitted snapshot. A corpus whose documents
    /// contain no usable terms is an error.
    pub fn build(corpus: &[(ItemId, ItemContent)], max_features: usize) -> Result<Self> {
        let mut item_ids = Vec::with_capacity(corpus.len());
        let mut positions = HashMap::with_capacity(corpus.len());
        let mut documents = Vec::with_capacity(corpus.len());

        for (item_id, content) in corpus {
            if positions.contains_key(item_id) {
                continue;
            }
            positions.insert(*item_id, item_ids.len());
            item_ids.push(*item_id);
            documents.push(content.document());
        }

        if documents.is_empty() {
            return Ok(Self::empty());
        }

        let matrix = TfidfVectorizer::new(max_features).fit_transform(&documents)?;
        let dense = matrix.to_dense();

        // Rows are unit length, so the Gram matrix holds the cosines
        let mut similarity = dense.dot(&dense.t());
        similarity.mapv_inplace(|s| s.clamp(0.0, 1.0));
        let n = similarity.nrows();
        for i in 0..n {
            similarity[[i, i]] = 1.0;
            for j in (i + 1)..n {
                similarity[[j, i]] = similarity[[i, j]];
            }
        }

        Ok(Self {
            item_ids,
            positions,
            similarity,
            vocabulary_size: matrix.n_features(),
            fitted: true,
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.positions.contains_key(&item_id)
    }

    /// Cosine similarity in [0, 1]; 0.0 for items outside the index.
    pub fn similarity(&self, a: ItemId, b: ItemId) -> f64 {
        match (self.positions.get(&a), self.positions.get(&b)) {
            (Some(&i), Some(&j)) if self.fitted => self.similarity[[i, j]],
            _ => 0.0,
        }
    }

    /// The `k` nearest neighbours of `item_id`, most similar first.
    pub fn most_similar(&self, item_id: ItemId, k: usize) -> Vec<(ItemId, f64)> {
        let Some(&row) = self.positions.get(&item_id) else {
            return Vec::new();
        };
        if !self.fitted {
            return Vec::new();
        }

        let mut neighbours: Vec<(ItemId, f64)> = self
            .item_ids
            .iter()
            .enumerate()
            .filter(|(col, _)| *col != row)
            .map(|(col, id)| (*id, self.similarity[[row, col]]))
            .collect();

        neighbours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbours.truncate(k);
        neighbours
    }
}

pub struct ContentSimilarityIndex {
    snapshot: RwLock<Arc<ContentSnapshot>>,
    max_features: usize,
}

impl ContentSimilarityIndex {
    pub fn new(max_features: usize) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(ContentSnapshot::empty())),
            max_features,
        }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    /// Current snapshot; stays valid even if a rebuild swaps in a new one.
    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        self.snapshot.read().clone()
    }

    /// Replace the active snapshot.
    pub fn install(&self, snapshot: ContentSnapshot) {
        info!(
            items = snapshot.len(),
            vocabulary = snapshot.vocabulary_size(),
            fitted = snapshot.is_fitted(),
            "Installed content similarity snapshot"
        );
        *self.snapshot.write() = Arc::new(snapshot);
    }

    /// Build a snapshot from `corpus` and install it.
    ///
    /// On failure the previous snapshot stays active.
    pub fn rebuild(&self, corpus: &[(ItemId, ItemContent)]) -> Result<usize> {
        match ContentSnapshot::build(corpus, self.max_features) {
            Ok(snapshot) => {
                let items = snapshot.len();
                self.install(snapshot);
                Ok(items)
            }
            Err(e) => {
                warn!(error = %e, items = corpus.len(), "Content index rebuild failed");
                Err(e)
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.snapshot.read().is_fitted()
    }

    pub fn similarity(&self, a: ItemId, b: ItemId) -> f64 {
        self.snapshot().similarity(a, b)
    }

    pub fn most_similar(&self, item_id: ItemId, k: usize) -> Vec<(ItemId, f64)> {
        self.snapshot().most_similar(item_id, k)
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vocabulary_size(&self) -> usize {
        self.snapshot.read().vocabulary_size()
    }
}
