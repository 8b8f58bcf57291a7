
use std::collections::HashMap;
use std::error::Error;
use std::ops::AddAssign;
use std::sync::Mutex;
use std::time::Instant;

use ndarray::prelude::*;
use ndarray::Array;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::info;

use crate::config::TrainParams;
use crate::key::Algorithm;

// word2vec with negative sampling, CBOW and skip-gram variants. The weight
// matrices live behind a mutex during an epoch, worker chunks compute their
// updates against a snapshot and apply them in one batch.

pub struct TrainedModel {
    pub t2i: HashMap<String, usize>,
    pub w: Array2<f32>,
}

// a training window: the center token and its in-window context tokens, all as
// vocabulary row indices.
type Window = (usize, Vec<usize>);

// a single row delta, aimed at either the token (input) or context (output) matrix.
enum Slot {
    Tokens,
    Context,
}
type Update = (Slot, usize, Array1<f32>);

pub struct Train {
    w_tokens: Array2<f32>,
    w_context: Array2<f32>,
}

impl Train {

    fn new(vocab_size: usize, embedding_dim: usize) -> Train {
        Self {
            w_tokens: Array::random((vocab_size, embedding_dim), Uniform::new(-0.5, 0.5)) / embedding_dim as f32,
            w_context: Array::random((vocab_size, embedding_dim), Uniform::new(-0.5, 0.5)) / embedding_dim as f32,
        }
    }

    pub fn run(
        sentences: &[Vec<String>],
        algorithm: Algorithm,
        window_size: usize,
        params: &TrainParams,
    ) -> Result<TrainedModel, Box<dyn Error>> {

        let t2i = build_vocab(sentences, params.min_count);
        if t2i.is_empty() {
            return Err("cannot train on an empty corpus partition".into());
        }

        let windows = collect_windows(sentences, &t2i, window_size);
        info!("vocabulary of {} tokens, {} training windows", t2i.len(), windows.len());

        let mut trainer = Train::new(t2i.len(), params.embedding_dim);
        trainer.train(&windows, algorithm, params)?;

        // the final embedding space is the sum of the two matrices
        let w = trainer.w_tokens + trainer.w_context;
        Ok(TrainedModel { t2i, w })
    }

    fn train(&mut self, windows: &[Window], algorithm: Algorithm, params: &TrainParams) -> Result<(), Box<dyn Error>> {

        let pool = ThreadPoolBuilder::new().num_threads(params.workers).build()?;
        let vocab_size = self.w_tokens.dim().0;

        // move the matrices behind a lock for the duration of training
        let w_tokens = std::mem::replace(&mut self.w_tokens, Array2::zeros((0, 0)));
        let w_context = std::mem::replace(&mut self.w_context, Array2::zeros((0, 0)));
        let shared = Mutex::new((w_tokens, w_context));

        for epoch in 0..params.epochs {

            let timer = Instant::now();
            let mut order: Vec<usize> = (0..windows.len()).collect();
            order.shuffle(&mut thread_rng());
            let chunk_size = (order.len() / params.workers).max(1);

            let (loss, terms) = pool.install(|| {
                order
                    .par_chunks(chunk_size)
                    .map(|chunk| {
                        // stale reads within a chunk are acceptable, updates are
                        // batched and applied under the lock once per chunk
                        let (snap_tokens, snap_context) = {
                            let guard = shared.lock().unwrap();
                            (guard.0.clone(), guard.1.clone())
                        };

                        let mut rng = thread_rng();
                        let mut updates: Vec<Update> = Vec::new();
                        let mut loss = 0.0f32;
                        let mut terms = 0usize;

                        for &wi in chunk {
                            let (center, context) = &windows[wi];
                            let window_loss = match algorithm {
                                Algorithm::Cbow => cbow_window(
                                    &snap_tokens, &snap_context, *center, context,
                                    params, vocab_size, &mut rng, &mut updates,
                                ),
                                Algorithm::Sg => sg_window(
                                    &snap_tokens, &snap_context, *center, context,
                                    params, vocab_size, &mut rng, &mut updates,
                                ),
                            };
                            loss += window_loss;
                            terms += 1;
                        }

                        let mut guard = shared.lock().unwrap();
                        for (slot, row, delta) in updates {
                            match slot {
                                Slot::Tokens => guard.0.row_mut(row).add_assign(&delta),
                                Slot::Context => guard.1.row_mut(row).add_assign(&delta),
                            }
                        }

                        (loss, terms)
                    })
                    .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
            });

            info!(
                "finished epoch {}, loss is {}, took {} seconds...",
                epoch,
                loss / terms.max(1) as f32,
                timer.elapsed().as_secs()
            );
        }

        let (w_tokens, w_context) = shared.into_inner().unwrap();
        self.w_tokens = w_tokens;
        self.w_context = w_context;
        Ok(())
    }
}

// vocabulary of tokens with at least `min_count` occurrences, rows ordered most
// frequent first (ties broken by token so the mapping is deterministic).
pub fn build_vocab(sentences: &[Vec<String>], min_count: usize) -> HashMap<String, usize> {

    let mut token2count: HashMap<String, usize> = HashMap::new();
    for sentence in sentences {
        for tok in sentence {
            let val = token2count.entry(tok.to_owned()).or_insert(0);
            *val += 1;
        }
    }

    let mut tup: Vec<(String, usize)> = token2count
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .collect();
    tup.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    tup.into_iter().enumerate().map(|(i, (tok, _))| (tok, i)).collect()
}

fn collect_windows(sentences: &[Vec<String>], t2i: &HashMap<String, usize>, window_size: usize) -> Vec<Window> {

    let mut windows: Vec<Window> = Vec::new();
    for sentence in sentences {

        // out-of-vocabulary tokens are removed before windows are formed
        let ids: Vec<usize> = sentence.iter().filter_map(|tok| t2i.get(tok).copied()).collect();

        for i in 0..ids.len() {
            let lo = i.saturating_sub(window_size);
            let hi = (i + window_size + 1).min(ids.len());
            let context: Vec<usize> = (lo..hi).filter(|&j| j != i).map(|j| ids[j]).collect();
            if !context.is_empty() {
                windows.push((ids[i], context));
            }
        }
    }
    windows
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn log_loss(score: f32, label: f32) -> f32 {
    let score = score.clamp(1e-7, 1.0 - 1e-7);
    -(label * score.ln() + (1.0 - label) * (1.0 - score).ln())
}

// the positive target plus `negative_samples` tokens drawn uniformly from the
// vocabulary, skipping collisions with the positive.
fn sample_targets<R: Rng>(positive: usize, vocab_size: usize, negatives: usize, rng: &mut R) -> Vec<(usize, f32)> {
    let mut targets = vec![(positive, 1.0f32)];
    for _ in 0..negatives {
        let sampled = rng.gen_range(0..vocab_size);
        if sampled != positive {
            targets.push((sampled, 0.0));
        }
    }
    targets
}

// continuous bag of words: the averaged context predicts the center token.
#[allow(clippy::too_many_arguments)]
fn cbow_window<R: Rng>(
    w_tokens: &Array2<f32>,
    w_context: &Array2<f32>,
    center: usize,
    context: &[usize],
    params: &TrainParams,
    vocab_size: usize,
    rng: &mut R,
    updates: &mut Vec<Update>,
) -> f32 {

    let dim = w_tokens.dim().1;
    let lr = params.learning_rate;

    let mut h = Array1::<f32>::zeros(dim);
    for &c in context {
        h += &w_tokens.row(c);
    }
    h /= context.len() as f32;

    let mut h_err = Array1::<f32>::zeros(dim);
    let mut loss = 0.0f32;
    for (target, label) in sample_targets(center, vocab_size, params.negative_samples, rng) {
        let out = w_context.row(target);
        let score = sigmoid(h.dot(&out));
        loss += log_loss(score, label);

        let g = (label - score) * lr;
        h_err += &(out.to_owned() * g);
        updates.push((Slot::Context, target, &h * g));
    }

    // the error is shared back across the averaged context tokens
    let spread = h_err / context.len() as f32;
    for &c in context {
        updates.push((Slot::Tokens, c, spread.clone()));
    }
    loss
}

// skip-gram: the center token predicts each context token in turn.
#[allow(clippy::too_many_arguments)]
fn sg_window<R: Rng>(
    w_tokens: &Array2<f32>,
    w_context: &Array2<f32>,
    center: usize,
    context: &[usize],
    params: &TrainParams,
    vocab_size: usize,
    rng: &mut R,
    updates: &mut Vec<Update>,
) -> f32 {

    let v = w_tokens.row(center).to_owned();
    let mut loss = 0.0f32;

    for &c in context {
        let mut v_err = Array1::<f32>::zeros(v.len());
        for (target, label) in sample_targets(c, vocab_size, params.negative_samples, rng) {
            let out = w_context.row(target);
            let score = sigmoid(v.dot(&out));
            loss += log_loss(score, label);

            let g = (label - score) * params.learning_rate;
            v_err += &(out.to_owned() * g);
            updates.push((Slot::Context, target, &v * g));
        }
        updates.push((Slot::Tokens, center, v_err));
    }
    loss
}

#[cfg(test)]
mod tests {

    use std::collections::HashMap;

    use super::{build_vocab, collect_windows, Train};
    use crate::config::TrainParams;
    use crate::key::Algorithm;

    fn sentences() -> Vec<Vec<String>> {
        [
            "the king rules the land",
            "the queen rules the land",
            "a dog runs in the land",
        ]
        .iter()
        .map(|s| s.split_whitespace().map(|t| t.to_string()).collect())
        .collect()
    }

    fn small_params() -> TrainParams {
        TrainParams {
            embedding_dim: 16,
            epochs: 2,
            learning_rate: 0.05,
            negative_samples: 3,
            min_count: 1,
            workers: 2,
        }
    }

    #[test]
    fn vocab_orders_by_frequency() {
        let vocab = build_vocab(&sentences(), 1);
        // "the" appears 5 times and must take row 0
        assert_eq!(vocab["the"], 0);
        assert_eq!(vocab.len(), 9);
    }

    #[test]
    fn vocab_min_count_filters() {
        let vocab = build_vocab(&sentences(), 2);
        assert!(vocab.contains_key("the"));
        assert!(vocab.contains_key("land"));
        assert!(vocab.contains_key("rules"));
        assert!(!vocab.contains_key("dog"));
    }

    #[test]
    fn windows_respect_sentence_bounds() {
        let sentences: Vec<Vec<String>> =
            vec![vec!["a".into(), "b".into()], vec!["c".into()]];
        let t2i: HashMap<String, usize> =
            [("a", 0usize), ("b", 1), ("c", 2)].map(|(t, i)| (t.to_string(), i)).into();

        let windows = collect_windows(&sentences, &t2i, 5);
        // "c" has no context at all, "a" and "b" only see each other
        assert_eq!(windows, vec![(0, vec![1]), (1, vec![0])]);
    }

    #[test]
    fn training_produces_finite_model() {
        for algorithm in [Algorithm::Cbow, Algorithm::Sg] {
            let model = Train::run(&sentences(), algorithm, 2, &small_params()).unwrap();
            assert_eq!(model.w.dim(), (model.t2i.len(), 16));
            assert!(model.w.iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn training_rejects_empty_partition() {
        let empty: Vec<Vec<String>> = Vec::new();
        assert!(Train::run(&empty, Algorithm::Cbow, 5, &small_params()).is_err());
    }
}
