use crate::error::{Error, Result};
use crate::models::{Artifact, CatalogEntry, ContentArtifact, Recommendation};
use crate::utils::{cosine_similarity, normalize_vector, rank_descending};
use chrono::Utc;
use ndarray::{Array2, ArrayView1};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// English function words excluded from the genre vocabulary, matched
/// case-insensitively.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has", "have",
    "if", "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "such", "that", "the",
    "their", "then", "there", "these", "they", "this", "to", "was", "were", "will", "with",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lowercases, normalizes the raw `|` separator to whitespace, and drops
/// stop words. An empty result is valid: the entry participates as a
/// zero vector.
fn tokenize(document: &str) -> Vec<String> {
    document
        .replace('|', " ")
        .to_lowercase()
        .split_whitespace()
        .filter(|t| !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

/// Term-frequency-inverse-document-frequency weighting with smoothed idf
/// and L2-normalized rows, over the corpus of genre documents.
struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
}

impl TfidfVectorizer {
    /// One L2-normalized weight vector per document.
    fn fit_transform(documents: &[Vec<String>]) -> (Self, Vec<Vec<f32>>) {
        let mut vocabulary = BTreeMap::new();
        for tokens in documents {
            for token in tokens {
                let next = vocabulary.len();
                vocabulary.entry(token.clone()).or_insert(next);
            }
        }

        let n_docs = documents.len();
        let n_terms = vocabulary.len();
        let mut rows = vec![vec![0.0f32; n_terms]; n_docs];
        for (row, tokens) in documents.iter().enumerate() {
            for token in tokens {
                rows[row][vocabulary[token]] += 1.0;
            }
        }

        // Smoothed idf: ln((1 + n) / (1 + df)) + 1.
        let mut idf = vec![0.0f32; n_terms];
        for (term_idx, idf_value) in idf.iter_mut().enumerate() {
            let df = rows.iter().filter(|row| row[term_idx] > 0.0).count();
            *idf_value = ((1.0 + n_docs as f32) / (1.0 + df as f32)).ln() + 1.0;
        }

        for row in rows.iter_mut() {
            for (term_idx, weight) in row.iter_mut().enumerate() {
                *weight *= idf[term_idx];
            }
            normalize_vector(row);
        }

        (Self { vocabulary }, rows)
    }
}

/// Pairwise cosine similarity over the catalog, indexed by catalog row
/// position. Symmetric, values in [0, 1], unit diagonal. Built once per
/// training run and immutable afterwards.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    values: Array2<f32>,
}

impl SimilarityMatrix {
    /// Pairwise cosine over the TF-IDF rows, exploiting symmetry. Zero
    /// rows (empty genre documents) score 0 against everything else; the
    /// diagonal is pinned to 1.
    fn from_tfidf(rows: &[Vec<f32>]) -> Self {
        let n = rows.len();
        let mut values = Array2::<f32>::zeros((n, n));
        for i in 0..n {
            values[[i, i]] = 1.0;
            for j in (i + 1)..n {
                let sim = cosine_similarity(&rows[i], &rows[j]).clamp(0.0, 1.0);
                values[[i, j]] = sim;
                values[[j, i]] = sim;
            }
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[[i, j]]
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.values.row(i)
    }
}

/// Trained content model: the similarity matrix plus the catalog snapshot
/// (ids and titles) it was built from.
#[derive(Debug, Clone)]
pub struct ContentModel {
    movie_ids: Vec<u32>,
    titles: Vec<String>,
    similarity: SimilarityMatrix,
}

impl ContentModel {
    /// Builds the TF-IDF matrix and full pairwise similarity for the
    /// catalog. O(N^2) in catalog size; paid once per training run.
    pub fn build(catalog: &[CatalogEntry]) -> Result<Self> {
        if catalog.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        if catalog.iter().all(|e| e.genre_document().trim().is_empty()) {
            return Err(Error::DegenerateCorpus);
        }

        let documents: Vec<Vec<String>> = catalog
            .iter()
            .map(|e| tokenize(&e.genre_document()))
            .collect();

        let (vectorizer, tfidf) = TfidfVectorizer::fit_transform(&documents);
        debug!(
            entries = catalog.len(),
            vocabulary = vectorizer.vocabulary.len(),
            "built tf-idf matrix"
        );

        Ok(Self {
            movie_ids: catalog.iter().map(|e| e.movie_id).collect(),
            titles: catalog.iter().map(|e| e.title.clone()).collect(),
            similarity: SimilarityMatrix::from_tfidf(&tfidf),
        })
    }

    pub fn len(&self) -> usize {
        self.movie_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movie_ids.is_empty()
    }

    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    /// Catalog snapshot pairs `(movie_id, title)` in matrix row order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.movie_ids
            .iter()
            .copied()
            .zip(self.titles.iter().map(String::as_str))
    }

    /// Resolves a title to its unique catalog row. Exact string match;
    /// zero hits and multiple hits are distinct, typed failures.
    fn resolve_title(&self, title: &str) -> Result<usize> {
        let mut matches = self
            .titles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.as_str() == title)
            .map(|(i, _)| i);

        let first = matches.next().ok_or_else(|| Error::NotFound(title.to_string()))?;
        if matches.next().is_some() {
            return Err(Error::AmbiguousMatch(title.to_string()));
        }
        Ok(first)
    }

    /// The `top_n` catalog entries most similar to `title`, excluding the
    /// queried entry itself. Ties keep catalog order, so identical input
    /// yields identical rankings.
    pub fn top_similar(&self, title: &str, top_n: usize) -> Result<Vec<Recommendation>> {
        let query = self.resolve_title(title)?;
        let scores = self.similarity.row(query);
        let scores: Vec<f32> = scores.iter().copied().collect();

        Ok(rank_descending(&scores)
            .into_iter()
            .filter(|&i| i != query)
            .take(top_n)
            .map(|i| Recommendation {
                movie_id: self.movie_ids[i],
                title: self.titles[i].clone(),
                score: scores[i],
            })
            .collect())
    }

    pub fn to_artifact(&self) -> ContentArtifact {
        let dimension = self.similarity.len();
        ContentArtifact {
            schema_version: ContentArtifact::SCHEMA_VERSION,
            artifact_id: Uuid::new_v4(),
            created_at: Utc::now(),
            movie_ids: self.movie_ids.clone(),
            titles: self.titles.clone(),
            similarity: self.similarity.values.iter().copied().collect(),
            dimension,
        }
    }

    pub fn from_artifact(artifact: ContentArtifact) -> Result<Self> {
        let ContentArtifact {
            movie_ids,
            titles,
            similarity,
            dimension,
            ..
        } = artifact;

        if movie_ids.len() != dimension || titles.len() != dimension {
            return Err(Error::Decode(Box::new(bincode::ErrorKind::Custom(
                "catalog snapshot length does not match matrix dimension".to_string(),
            ))));
        }
        let values = Array2::from_shape_vec((dimension, dimension), similarity)
            .map_err(|e| Error::Decode(Box::new(bincode::ErrorKind::Custom(e.to_string()))))?;

        Ok(Self {
            movie_ids,
            titles,
            similarity: SimilarityMatrix { values },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new(1, "Toy Story")
                .with_tags(vec!["Animation".to_string(), "Comedy".to_string()]),
            CatalogEntry::new(2, "Jumanji")
                .with_tags(vec!["Action".to_string(), "Adventure".to_string()]),
            CatalogEntry::new(3, "Grumpier Old Men")
                .with_tags(vec!["Comedy".to_string(), "Romance".to_string()]),
        ]
    }

    #[test]
    fn test_top_similar_ranks_shared_genre_first() {
        let model = ContentModel::build(&sample_catalog()).unwrap();
        let recs = model.top_similar("Toy Story", 2).unwrap();

        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.movie_id != 1));
        // Grumpier Old Men shares "Comedy" with the query; Jumanji shares nothing.
        assert_eq!(recs[0].movie_id, 3);
        assert_eq!(recs[1].movie_id, 2);
        assert!(recs[0].score > recs[1].score);
    }

    #[test]
    fn test_top_similar_is_deterministic() {
        let model = ContentModel::build(&sample_catalog()).unwrap();
        let first = model.top_similar("Jumanji", 2).unwrap();
        let second = model.top_similar("Jumanji", 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_title() {
        let model = ContentModel::build(&sample_catalog()).unwrap();
        assert!(matches!(
            model.top_similar("Nonexistent Movie", 5),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_title_is_ambiguous() {
        let mut catalog = sample_catalog();
        catalog.push(CatalogEntry::new(4, "Toy Story").with_tags(vec!["Comedy".to_string()]));
        let model = ContentModel::build(&catalog).unwrap();
        assert!(matches!(
            model.top_similar("Toy Story", 2),
            Err(Error::AmbiguousMatch(_))
        ));
    }

    #[test]
    fn test_empty_catalog() {
        assert!(matches!(ContentModel::build(&[]), Err(Error::EmptyCatalog)));
    }

    #[test]
    fn test_all_blank_genres_fail_fast() {
        let catalog = vec![CatalogEntry::new(1, "A"), CatalogEntry::new(2, "B")];
        assert!(matches!(
            ContentModel::build(&catalog),
            Err(Error::DegenerateCorpus)
        ));
    }

    #[test]
    fn test_untagged_entry_scores_zero() {
        let mut catalog = sample_catalog();
        catalog.push(CatalogEntry::new(4, "Mystery Reel"));
        let model = ContentModel::build(&catalog).unwrap();

        let recs = model.top_similar("Toy Story", 3).unwrap();
        let untagged = recs.iter().find(|r| r.movie_id == 4).unwrap();
        assert_eq!(untagged.score, 0.0);
        // Zero-vector entries still have unit self-similarity.
        assert_eq!(model.similarity().get(3, 3), 1.0);
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let model = ContentModel::build(&sample_catalog()).unwrap();
        let sim = model.similarity();
        for i in 0..sim.len() {
            assert_eq!(sim.get(i, i), 1.0);
            for j in 0..sim.len() {
                assert!((sim.get(i, j) - sim.get(j, i)).abs() < 1e-6);
                assert!(sim.get(i, j) >= 0.0 && sim.get(i, j) <= 1.0);
            }
        }
    }

    #[test]
    fn test_stop_words_are_excluded() {
        let tokens = tokenize("The Action|and Adventure");
        assert_eq!(tokens, vec!["action".to_string(), "adventure".to_string()]);
    }

    #[test]
    fn test_artifact_round_trip_preserves_scores() {
        let model = ContentModel::build(&sample_catalog()).unwrap();
        let before = model.top_similar("Toy Story", 2).unwrap();

        let restored = ContentModel::from_artifact(model.to_artifact()).unwrap();
        let after = restored.top_similar("Toy Story", 2).unwrap();
        assert_eq!(before, after);
    }
}
