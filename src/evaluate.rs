
use tracing::warn;

use crate::similarity::Similarity;

// analogy evaluation over a prepared validation file. Each line is a quartet
// "a b c d" read as: a is to b as c is to d. Two scores are produced per model,
// the standard top-1 accuracy and a mean cosine distance between the predicted
// token and the expected answer.

pub struct Evaluation {
    pub mean_distance: Option<f64>,
    pub oov_questions: usize,
    pub oov_answers: usize,
}

fn quartet(line: &str) -> Option<[&str; 4]> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words[..] {
        [a, b, c, d] => Some([a, b, c, d]),
        _ => {
            warn!("skipping malformed validation line: {:?}", line);
            None
        }
    }
}

// the proposed distance metric. Out-of-vocabulary failures fall into two separate
// buckets: question words (a, b, c) make the analogy query itself impossible,
// while a missing answer word (d) only loses the distance sample. A skipped line
// contributes to exactly one bucket and never to the distances.
pub fn mean_analogy_distance(model: &Similarity, lines: &[String]) -> Evaluation {

    let mut distances: Vec<f64> = Vec::new();
    let mut oov_questions = 0usize;
    let mut oov_answers = 0usize;

    for line in lines {
        let [a, b, c, d] = match quartet(line) {
            Some(words) => words,
            None => continue,
        };

        let predicted = match model.most_similar(&[b, c], &[a], 1) {
            Ok(hits) => match hits.into_iter().next() {
                Some((token, _)) => token,
                // the whole vocabulary was excluded by the query, nothing to score
                None => continue,
            },
            Err(_) => {
                oov_questions += 1;
                continue;
            }
        };

        match model.distance(&predicted, d) {
            Ok(distance) => distances.push(distance as f64),
            Err(_) => oov_answers += 1,
        }
    }

    let mean_distance = if distances.is_empty() {
        warn!("no distance samples were collected, the mean is undefined");
        None
    } else {
        Some(distances.iter().sum::<f64>() / distances.len() as f64)
    };

    Evaluation { mean_distance, oov_questions, oov_answers }
}

// top-1 analogy accuracy, the counterpart of the embedding library's built-in
// scoring: only questions with all four words in vocabulary are answerable, and
// an answer counts when the predicted token equals the expected one.
pub fn analogy_accuracy(model: &Similarity, lines: &[String]) -> Option<f64> {

    let mut answered = 0usize;
    let mut correct = 0usize;

    for line in lines {
        let [a, b, c, d] = match quartet(line) {
            Some(words) => words,
            None => continue,
        };
        if !(model.contains(a) && model.contains(b) && model.contains(c) && model.contains(d)) {
            continue;
        }

        let hits = match model.most_similar(&[b, c], &[a], 1) {
            Ok(hits) => hits,
            Err(_) => continue, // unreachable after the contains checks
        };
        if let Some((predicted, _)) = hits.first() {
            answered += 1;
            if predicted == d {
                correct += 1;
            }
        }
    }

    if answered == 0 {
        warn!("no answerable analogy questions, the accuracy is undefined");
        None
    } else {
        Some(correct as f64 / answered as f64)
    }
}

// the per-model result file contents
pub struct ResultRecord {
    pub accuracy: Option<f64>,
    pub distance: Option<f64>,
    pub oov_questions: usize,
    pub oov_answers: usize,
}

impl ResultRecord {

    pub fn new(accuracy: Option<f64>, evaluation: &Evaluation) -> ResultRecord {
        ResultRecord {
            accuracy,
            distance: evaluation.mean_distance,
            oov_questions: evaluation.oov_questions,
            oov_answers: evaluation.oov_answers,
        }
    }

    // the two scalar lines, 5 significant digits each. An undefined score is
    // written out as NaN rather than masked with a number.
    pub fn scalar_lines(accuracy: Option<f64>, distance: Option<f64>) -> String {
        format!(
            "accuracy={}\ndistance={}",
            format_sig(accuracy.unwrap_or(f64::NAN), 5),
            format_sig(distance.unwrap_or(f64::NAN), 5)
        )
    }

    pub fn render(&self) -> String {
        format!(
            "{}\noov_questions={}\noov_answers={}\n",
            ResultRecord::scalar_lines(self.accuracy, self.distance),
            self.oov_questions,
            self.oov_answers
        )
    }
}

// %g-style formatting: `sig` significant digits, trailing zeros trimmed,
// scientific notation outside the fixed-point range.
pub fn format_sig(value: f64, sig: i32) -> String {

    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_owned();
    }

    let exp = value.abs().log10().floor() as i32;
    if exp >= sig || exp < -4 {
        let formatted = format!("{:.*e}", (sig - 1) as usize, value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => format!("{}e{}", trim_zeros(mantissa), exponent),
            None => formatted,
        };
    }

    let decimals = (sig - 1 - exp).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, value))
}

fn trim_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s.to_owned()
    }
}
