// Binary bag-of-words features for linear baselines. The vocabulary is every word seen
// in the (fully preprocessed) training texts, indexed in sorted order; a document's row
// marks each vocabulary word it contains with 1, no idf weighting, no normalisation.

use std::collections::{BTreeMap, BTreeSet};

use super::preprocess::{text_preprocessing, word_tokenize};

/// Sparse binary document-term matrix. Each row holds the sorted feature indices
/// whose value is 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BowMatrix {
    rows: Vec<Vec<usize>>,
    n_features: usize,
}

impl BowMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, index: usize) -> &[usize] {
        &self.rows[index]
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn to_dense(&self) -> Vec<Vec<f32>> {
        self.rows
            .iter()
            .map(|row| {
                let mut dense = vec![0.0; self.n_features];
                row.iter().for_each(|&feature| dense[feature] = 1.0);
                dense
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct BowVectorizer {
    vocabulary: BTreeMap<String, usize>,
}

impl BowVectorizer {
    /// Learns the vocabulary from already preprocessed texts.
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Self {
        let words: BTreeSet<String> = texts
            .iter()
            .flat_map(|text| word_tokenize(text.as_ref()))
            .collect();
        let vocabulary = words
            .into_iter()
            .enumerate()
            .map(|(index, word)| (word, index))
            .collect();

        Self { vocabulary }
    }

    /// Encodes already preprocessed texts; words outside the vocabulary are ignored.
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> BowMatrix {
        let rows = texts
            .iter()
            .map(|text| {
                let features: BTreeSet<usize> = word_tokenize(text.as_ref())
                    .iter()
                    .filter_map(|word| self.vocabulary.get(word).copied())
                    .collect();
                features.into_iter().collect()
            })
            .collect();

        BowMatrix {
            rows,
            n_features: self.vocabulary.len(),
        }
    }

    pub fn fit_transform<S: AsRef<str>>(texts: &[S]) -> (Self, BowMatrix) {
        let vectorizer = Self::fit(texts);
        let matrix = vectorizer.transform(texts);
        (vectorizer, matrix)
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }
}

/// Preprocesses raw training sentences, fits a vectorizer on them and returns it
/// together with the training features.
pub fn train_bow_features<S: AsRef<str>>(sentences: &[S]) -> (BowVectorizer, BowMatrix) {
    let preprocessed = preprocess_all(sentences);
    BowVectorizer::fit_transform(&preprocessed)
}

/// Preprocesses raw validation sentences and encodes them with a fitted vectorizer.
pub fn val_bow_features<S: AsRef<str>>(sentences: &[S], vectorizer: &BowVectorizer) -> BowMatrix {
    vectorizer.transform(&preprocess_all(sentences))
}

fn preprocess_all<S: AsRef<str>>(sentences: &[S]) -> Vec<String> {
    sentences
        .iter()
        .map(|sentence| text_preprocessing(sentence.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_sorted_and_binary() {
        let (vectorizer, matrix) = BowVectorizer::fit_transform(&["good good film", "bad film"]);

        let vocabulary: Vec<(&str, usize)> = vectorizer
            .vocabulary()
            .iter()
            .map(|(word, &index)| (word.as_str(), index))
            .collect();
        assert_eq!(vocabulary, vec![("bad", 0), ("film", 1), ("good", 2)]);

        assert_eq!(matrix.to_dense(), vec![vec![0.0, 1.0, 1.0], vec![1.0, 1.0, 0.0]]);
        assert_eq!(matrix.nnz(), 4);
    }

    #[test]
    fn transform_ignores_unknown_words() {
        let vectorizer = BowVectorizer::fit(&["great acting"]);
        let matrix = vectorizer.transform(&["great soundtrack", "nothing known"]);

        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.n_features(), 2);
        assert_eq!(matrix.row(0), &[1]);
        assert!(matrix.row(1).is_empty());
    }

    #[test]
    fn raw_sentences_are_preprocessed_before_fitting() {
        let (vectorizer, train) =
            train_bow_features(&["The movie wasn't GOOD!", "@someone loved the movie"]);
        assert_eq!(
            vectorizer.vocabulary().keys().collect::<Vec<_>>(),
            vec!["good", "loved", "movie", "not"]
        );
        assert_eq!(train.n_rows(), 2);

        let val = val_bow_features(&["Good, good movie."], &vectorizer);
        assert_eq!(val.row(0), &[0, 2]);
    }
}
