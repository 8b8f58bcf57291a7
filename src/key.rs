
use std::fmt::Display;

// a trained model is keyed by the corpus proportion it was trained on, the context
// window size and the training algorithm. The key triple is also the storage address
// of the model and of its result record, so both sides of the experiment (training
// and evaluation) must go through the same encoding.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Cbow,
    Sg,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Cbow => "cbow",
            Algorithm::Sg => "sg",
        }
    }

    pub fn from_name(name: &str) -> Option<Algorithm> {
        match name {
            "cbow" => Some(Algorithm::Cbow),
            "sg" => Some(Algorithm::Sg),
            _ => None,
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelKey {
    pub proportion: f64,
    pub window: usize,
    pub algorithm: Algorithm,
}

impl ModelKey {
    pub fn new(proportion: f64, window: usize, algorithm: Algorithm) -> ModelKey {
        ModelKey { proportion, window, algorithm }
    }

    // "0.25-5-cbow", "1-100-sg" and so on. The float Display form is part of the
    // on-disk protocol, a proportion of 1 must render as "1" and not "1.0".
    pub fn encode(&self) -> String {
        format!("{}-{}-{}", self.proportion, self.window, self.algorithm.name())
    }

    // inverse of `encode`. The proportion may itself contain a '.', but never a '-',
    // so splitting from the right is unambiguous.
    pub fn parse(encoded: &str) -> Option<ModelKey> {
        let mut parts = encoded.rsplitn(3, '-');
        let algorithm = Algorithm::from_name(parts.next()?)?;
        let window = parts.next()?.parse::<usize>().ok()?;
        let proportion = parts.next()?.parse::<f64>().ok()?;
        Some(ModelKey { proportion, window, algorithm })
    }

    pub fn model_path(&self, models_path: &str) -> String {
        format!("{}{}.model", models_path, self.encode())
    }

    pub fn result_path(&self, results_path: &str) -> String {
        format!("{}{}.txt", results_path, self.encode())
    }
}

impl Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}
