use crate::error::{AppError, Result};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Vectorizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Maximum vocabulary size
    pub max_vocab_size: usize,

    /// Minimum document frequency for terms
    pub min_doc_freq: usize,

    /// N-gram range (min, max)
    pub ngram_range: (usize, usize),
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_vocab_size: 5000,
            min_doc_freq: 1,
            ngram_range: (1, 2), // Unigrams and bigrams
        }
    }
}

impl From<&crate::config::IndexingConfig> for VectorizerConfig {
    fn from(cfg: &crate::config::IndexingConfig) -> Self {
        Self {
            max_vocab_size: cfg.max_vocab_size,
            min_doc_freq: cfg.min_doc_freq,
            ngram_range: cfg.ngram_range,
        }
    }
}

/// TF-IDF vectorizer over normalized ticket text.
///
/// Vectors are L2-normalized at transform time so cosine similarity
/// reduces to a dot product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: VectorizerConfig,

    /// Vocabulary mapping (term -> index)
    vocabulary: HashMap<String, usize>,

    /// Inverse document frequency (IDF) values
    idf_values: HashMap<String, f64>,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl TfidfVectorizer {
    /// Create a new unfitted vectorizer
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            vocabulary: HashMap::new(),
            idf_values: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the vocabulary and IDF table on a set of documents
    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let mut term_doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.extract_terms(doc);
            let unique_terms: HashSet<_> = terms.into_iter().collect();

            for term in unique_terms {
                *term_doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        // Filter vocabulary by document frequency
        let min_df = self.config.min_doc_freq;
        let mut vocab_list: Vec<(String, usize)> = term_doc_freq
            .into_iter()
            .filter(|(_, freq)| *freq >= min_df)
            .collect();

        // Sort by frequency, ties by term, so the vocabulary order is
        // deterministic across rebuilds
        vocab_list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        vocab_list.truncate(self.config.max_vocab_size);

        let n_docs = documents.len() as f64;
        self.idf_values = vocab_list
            .iter()
            .map(|(term, doc_freq)| {
                let idf = (n_docs / (1.0 + *doc_freq as f64)).ln() + 1.0;
                (term.clone(), idf)
            })
            .collect();

        self.vocabulary = vocab_list
            .into_iter()
            .enumerate()
            .map(|(idx, (term, _))| (term, idx))
            .collect();

        self.is_fitted = true;

        Ok(())
    }

    /// Transform a document into an L2-normalized TF-IDF vector
    pub fn transform(&self, document: &str) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AppError::Embedding(
                "vectorizer must be fitted before transform".to_string(),
            ));
        }

        let mut features = Array1::zeros(self.vocabulary.len());

        let terms = self.extract_terms(document);
        let term_counts = self.count_terms(&terms);

        for (term, count) in &term_counts {
            if let Some(&idx) = self.vocabulary.get(term) {
                let idf = self.idf_values.get(term).unwrap_or(&1.0);
                features[idx] = *count as f64 * idf;
            }
        }

        // L2-normalize so cosine similarity is a plain dot product
        let norm = features.dot(&features).sqrt();
        if norm > 0.0 {
            features.mapv_inplace(|v| v / norm);
        }

        Ok(features)
    }

    /// Transform a batch of documents in parallel
    pub fn transform_batch(&self, documents: &[String]) -> Result<Vec<Array1<f64>>> {
        documents
            .par_iter()
            .map(|doc| self.transform(doc))
            .collect()
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Vec<Array1<f64>>> {
        self.fit(documents)?;
        self.transform_batch(documents)
    }

    /// Extract n-gram terms from a document
    fn extract_terms(&self, document: &str) -> Vec<String> {
        let text = document.to_lowercase();

        let words: Vec<String> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|w| !w.is_empty() && w.len() > 1)
            .map(|w| w.to_string())
            .collect();

        let mut terms = Vec::new();

        for n in self.config.ngram_range.0..=self.config.ngram_range.1 {
            for window in words.windows(n) {
                terms.push(window.join("_"));
            }
        }

        terms
    }

    /// Count term occurrences
    fn count_terms(&self, terms: &[String]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for term in terms {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Get vocabulary size (vector dimension)
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }
}
