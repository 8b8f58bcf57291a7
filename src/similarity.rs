
use std::collections::HashMap;
use std::fmt::Display;

use ndarray::prelude::*;

use crate::train::TrainedModel;

// query side of a trained model: vector arithmetic over the embedding space.
// Out-of-vocabulary lookups are routine here (validation sets always contain
// words a small corpus never saw), so they surface as a typed `Err(OovWord)`
// for the caller to count, never as a panic.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OovWord(pub String);

impl Display for OovWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token '{}' is not in the model vocabulary", self.0)
    }
}

impl std::error::Error for OovWord {}

pub struct Similarity {
    w: Array2<f32>,
    t2i: HashMap<String, usize>,
    i2t: HashMap<usize, String>,
}

impl Similarity {

    pub fn new(model: TrainedModel) -> Similarity {

        let TrainedModel { t2i, mut w } = model;

        // normalize each row to unit l2 norm, dot products become cosine similarities
        for mut row in w.axis_iter_mut(Axis(0)) {
            let norm = row.mapv(|a| a.powi(2)).sum().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        let mut i2t: HashMap<usize, String> = HashMap::new();
        for (t, i) in &t2i {
            i2t.entry(*i).or_insert(t.to_owned());
        }

        Self { w, t2i, i2t }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.t2i.contains_key(token)
    }

    fn row_of(&self, token: &str) -> Result<usize, OovWord> {
        match self.t2i.get(token) {
            Some(i) => Ok(*i),
            None => Err(OovWord(token.to_owned())),
        }
    }

    // the k tokens whose vectors are most similar to sum(positive) - sum(negative).
    // The query tokens themselves are excluded from the candidates. Fails on the
    // first out-of-vocabulary query token.
    pub fn most_similar(&self, positive: &[&str], negative: &[&str], k: usize) -> Result<Vec<(String, f32)>, OovWord> {

        let mut query = Array1::<f32>::zeros(self.w.dim().1);
        let mut exclude: Vec<usize> = Vec::new();

        for token in positive {
            let i = self.row_of(token)?;
            query += &self.w.row(i);
            exclude.push(i);
        }
        for token in negative {
            let i = self.row_of(token)?;
            query -= &self.w.row(i);
            exclude.push(i);
        }

        let norm = query.mapv(|a| a.powi(2)).sum().sqrt();
        if norm > 0.0 {
            query /= norm;
        }

        // score all candidates at once and sort in descending order
        let scores = self.w.dot(&query);
        let mut indexed: Vec<(usize, f32)> = scores
            .iter()
            .cloned()
            .enumerate()
            .filter(|(i, _)| !exclude.contains(i))
            .collect();
        indexed.sort_by(|(_, s), (_, t)| t.total_cmp(s));
        indexed.truncate(k);

        let hits = indexed
            .into_iter()
            .map(|(i, score)| (self.i2t.get(&i).unwrap().to_owned(), score)) // safe to unwrap
            .collect();
        Ok(hits)
    }

    // cosine distance between two vocabulary tokens
    pub fn distance(&self, token_a: &str, token_b: &str) -> Result<f32, OovWord> {
        let a = self.row_of(token_a)?;
        let b = self.row_of(token_b)?;
        Ok(1.0 - self.w.row(a).dot(&self.w.row(b)))
    }
}
