
use std::error::Error;
use std::fs;

use tracing::info;

use crate::config::files_handling;

// corpus and validation file preparation. Both stages only talk to the rest of the
// harness through the filesystem, the training and evaluation sides rebuild the
// same paths from the same inputs.

// cuts prefix subsets of the corpus token sequence, one per proportion. A proportion
// of 1 reproduces the corpus (modulo whitespace normalization to single spaces) and a
// proportion beyond 1 is clamped by the slice bound rather than rejected.
pub fn partition(corpus: &str, proportions: &[f64]) -> Vec<(f64, String)> {
    let tokens: Vec<&str> = corpus.split_whitespace().collect();
    let n = tokens.len();

    proportions
        .iter()
        .map(|&proportion| {
            let splitting_point = ((n as f64 * proportion).round() as usize).min(n);
            (proportion, tokens[..splitting_point].join(" "))
        })
        .collect()
}

// writes one partition file per proportion next to the corpus, named by prepending
// the proportion to the corpus file name.
pub fn split_corpus_file(dir_prefix: &str, filename: &str, proportions: &[f64]) -> Result<(), Box<dyn Error>> {
    let corpus = fs::read_to_string(format!("{}{}", dir_prefix, filename))?;

    for (proportion, text) in partition(&corpus, proportions) {
        let out_path = format!("{}{}{}", dir_prefix, proportion, filename);
        files_handling::write_atomic(&out_path, text.as_bytes())?;
    }
    info!("split corpus into {} partitions", proportions.len());
    Ok(())
}

// drops header lines first, then lowercases the survivors. With neither option set
// this is the identity.
pub fn preprocess<'a, I>(lines: I, prefix_filter: Option<&str>, lowercase: bool) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| match prefix_filter {
            Some(prefix) => !line.starts_with(prefix),
            None => true,
        })
        .map(|line| if lowercase { line.to_lowercase() } else { line.to_owned() })
        .collect()
}

// produces `prep_<filename>` in the same directory. The output file is written even
// when no transformation applies (a verbatim copy), the evaluation side always
// expects it to exist.
pub fn prepare_validation_file(
    dir_prefix: &str,
    filename: &str,
    prefix_filter: Option<&str>,
    lowercase: bool,
) -> Result<String, Box<dyn Error>> {
    let input = fs::read_to_string(format!("{}{}", dir_prefix, filename))?;
    let kept = preprocess(input.lines(), prefix_filter, lowercase);

    let mut body = kept.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }

    let out_path = format!("{}prep_{}", dir_prefix, filename);
    files_handling::write_atomic(&out_path, body.as_bytes())?;
    info!("prepared validation file {} ({} lines kept)", out_path, kept.len());
    Ok(out_path)
}

// one sentence per non-empty line, tokens split on whitespace. A single-line corpus
// partition is one long sentence.
pub fn read_sentences(path: &str) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let sentences = text
        .lines()
        .map(|line| line.split_whitespace().map(|tok| tok.to_owned()).collect::<Vec<String>>())
        .filter(|sentence| !sentence.is_empty())
        .collect();
    Ok(sentences)
}

pub fn read_lines(path: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    Ok(text.lines().map(|line| line.to_owned()).collect())
}

#[cfg(test)]
mod tests {

    use std::fs;

    use super::{partition, prepare_validation_file, preprocess, read_sentences, split_corpus_file};

    fn scratch_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!("w2v_corpus_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        format!("{}/", dir.display())
    }

    #[test]
    fn partition_sizes_round() {
        // 8 tokens at (0.25, 0.5, 1) -> 2, 4, 8 tokens
        let parts = partition("a b c d e f g h", &[0.25, 0.5, 1.0]);
        let sizes: Vec<usize> = parts.iter().map(|(_, t)| t.split_whitespace().count()).collect();
        assert_eq!(sizes, vec![2, 4, 8]);
    }

    #[test]
    fn partitions_are_nested_prefixes() {
        let corpus = "the quick brown fox jumps over the lazy dog again and again";
        let parts = partition(corpus, &[0.25, 0.5, 0.75, 1.0]);
        for pair in parts.windows(2) {
            assert!(pair[1].1.starts_with(&pair[0].1));
        }
    }

    #[test]
    fn full_proportion_reproduces_corpus() {
        let corpus = "a b   c\nd e";
        let parts = partition(corpus, &[1.0]);
        // whitespace is normalized to single spaces
        assert_eq!(parts[0].1, "a b c d e");
    }

    #[test]
    fn over_one_proportion_is_clamped() {
        let parts = partition("a b c", &[2.0]);
        assert_eq!(parts[0].1, "a b c");
    }

    #[test]
    fn preprocess_filters_headers() {
        let lines = [":a b", "c d", ":e f"];
        assert_eq!(preprocess(lines, Some(":"), false), vec!["c d"]);
    }

    #[test]
    fn preprocess_lowercase_is_idempotent() {
        let lines = ["Athens Greece BAGHDAD Iraq"];
        let once = preprocess(lines, None, true);
        let twice = preprocess(once.iter().map(|s| s.as_str()), None, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn preprocess_without_options_is_identity() {
        let lines = [":Header", "Athens Greece"];
        assert_eq!(preprocess(lines, None, false), vec![":Header", "Athens Greece"]);
    }

    #[test]
    fn split_corpus_file_writes_each_partition() {
        let dir = scratch_dir("split");
        fs::write(format!("{}corpus.txt", dir), "a b c d e f g h").unwrap();

        split_corpus_file(&dir, "corpus.txt", &[0.25, 0.5, 1.0]).unwrap();

        assert_eq!(fs::read_to_string(format!("{}0.25corpus.txt", dir)).unwrap(), "a b");
        assert_eq!(fs::read_to_string(format!("{}0.5corpus.txt", dir)).unwrap(), "a b c d");
        assert_eq!(fs::read_to_string(format!("{}1corpus.txt", dir)).unwrap(), "a b c d e f g h");
    }

    #[test]
    fn prepare_validation_file_filters_and_lowercases() {
        let dir = scratch_dir("prep");
        fs::write(format!("{}validation.txt", dir), ": capital-common-countries\nAthens Greece Baghdad Iraq\n").unwrap();

        let out = prepare_validation_file(&dir, "validation.txt", Some(":"), true).unwrap();
        assert_eq!(out, format!("{}prep_validation.txt", dir));
        assert_eq!(fs::read_to_string(out).unwrap(), "athens greece baghdad iraq\n");
    }

    #[test]
    fn prepare_validation_file_copies_when_no_transform() {
        // the output must exist even when nothing is filtered or lowercased
        let dir = scratch_dir("copy");
        fs::write(format!("{}validation.txt", dir), "Athens Greece Baghdad Iraq\n").unwrap();

        let out = prepare_validation_file(&dir, "validation.txt", None, false).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "Athens Greece Baghdad Iraq\n");
    }

    #[test]
    fn sentences_come_from_lines() {
        let dir = scratch_dir("sentences");
        let path = format!("{}part.txt", dir);
        fs::write(&path, "a b c\n\nd e").unwrap();

        let sentences = read_sentences(&path).unwrap();
        assert_eq!(sentences, vec![vec!["a", "b", "c"], vec!["d", "e"]]);
    }
}
