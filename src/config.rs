
use std::error::Error;
use std::fmt::Display;

use crate::key::{Algorithm, ModelKey};

// execution parameters of the experiment sweep. These are fixed on purpose,
// the two binaries take only positional paths.
pub const CORPUS_PROPORTIONS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];
pub const CONTEXT_SIZES: [usize; 4] = [5, 10, 20, 100];
pub const TRAINING_ALGORITHMS: [Algorithm; 2] = [Algorithm::Cbow, Algorithm::Sg];

// the cartesian product proportions x window sizes x algorithms. Order does not
// affect correctness since every artifact is addressed by its key.
pub fn experiment_grid() -> Vec<ModelKey> {
    let mut grid = Vec::new();
    for proportion in CORPUS_PROPORTIONS {
        for window in CONTEXT_SIZES {
            for algorithm in TRAINING_ALGORITHMS {
                grid.push(ModelKey::new(proportion, window, algorithm));
            }
        }
    }
    grid
}

#[derive(Clone, Debug)]
pub struct TrainParams {
    pub embedding_dim: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub negative_samples: usize,
    pub min_count: usize,
    pub workers: usize,
}

impl Default for TrainParams {
    fn default() -> TrainParams {
        TrainParams {
            embedding_dim: 100,
            epochs: 5,
            learning_rate: 0.025,
            negative_samples: 5,
            min_count: 1, // no rare-word filtering
            workers: 4,
        }
    }
}

impl Display for TrainParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        embedding_dim: {},
        epochs: {},
        learning_rate: {},
        negative_samples: {},
        min_count: {},
        workers: {}",
        self.embedding_dim, self.epochs, self.learning_rate, self.negative_samples, self.min_count, self.workers
        )
    }
}

// arguments of the `train` binary: train <corpus_path> <models_path>
pub struct TrainConfig {
    pub corpus_dir: String,
    pub corpus_filename: String,
    pub models_path: String,
}

impl TrainConfig {
    pub fn new(args: &[String]) -> Result<TrainConfig, Box<dyn Error>> {
        if args.len() != 3 {
            return Err("usage: train <corpus_path> <models_path>".into());
        }
        let (corpus_dir, corpus_filename) = split_path(&args[1]);
        Ok(TrainConfig {
            corpus_dir,
            corpus_filename,
            models_path: args[2].to_owned(),
        })
    }
}

// arguments of the `test` binary: test <validation_path> <models_path> <results_path>
pub struct TestConfig {
    pub validation_dir: String,
    pub validation_filename: String,
    pub models_path: String,
    pub results_path: String,
}

impl TestConfig {
    pub fn new(args: &[String]) -> Result<TestConfig, Box<dyn Error>> {
        if args.len() != 4 {
            return Err("usage: test <validation_path> <models_path> <results_path>".into());
        }
        let (validation_dir, validation_filename) = split_path(&args[1]);
        Ok(TestConfig {
            validation_dir,
            validation_filename,
            models_path: args[2].to_owned(),
            results_path: args[3].to_owned(),
        })
    }
}

// splits a path into a directory prefix (trailing separator kept) and a file name.
// Derived artifacts are named by prepending to the file name inside the same prefix.
pub fn split_path(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (format!("{}/", dir), name.to_owned()),
        None => (String::new(), path.to_owned()),
    }
}

// logging is configured exactly once, at binary entry. Library code only emits events.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

pub mod files_handling {

    use std::collections::HashMap;
    use std::error::Error;
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Read, Write};
    use std::path::Path;

    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use ndarray::Array2;
    use ndarray_npy::{ReadNpyExt, WriteNpyExt};

    use crate::evaluate::ResultRecord;
    use crate::train::TrainedModel;

    const VECS_ENTRY: &str = "vecs.npy";
    const VOCAB_ENTRY: &str = "vocab.json";

    pub fn read_input<R: ReadFile>(file_path: &str) -> Result<R, Box<dyn Error>> {
        let input = <R as ReadFile>::read_file(file_path)?;
        Ok(input)
    }

    pub fn save_output<S: SaveFile>(file_path: &str, item: &S) -> Result<(), Box<dyn Error>> {
        item.save_file(file_path)?;
        Ok(())
    }

    // every output goes to a `.tmp` sibling first and is renamed into place, so a
    // crash mid-write never leaves a file that looks complete.
    pub fn write_atomic(path: &str, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = format!("{}.tmp", path);
        {
            let mut f = BufWriter::new(File::create(&tmp)?);
            f.write_all(bytes)?;
            f.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &str) -> Result<Self, Box<dyn Error>>;
    }

    pub trait SaveFile {
        fn save_file(&self, file_path: &str) -> Result<(), Box<dyn Error>>;
    }

    // a `.model` file is a gzipped tar with two entries, the embedding matrix as
    // npy and the token-to-row map as json.
    impl SaveFile for TrainedModel {
        fn save_file(&self, file_path: &str) -> Result<(), Box<dyn Error>> {
            let mut vec_bytes: Vec<u8> = Vec::new();
            self.w.write_npy(&mut vec_bytes)?;
            let vocab_bytes = serde_json::to_vec(&self.t2i)?;

            let mut archive_bytes: Vec<u8> = Vec::new();
            {
                let enc = GzEncoder::new(&mut archive_bytes, Compression::default());
                let mut builder = tar::Builder::new(enc);
                append_entry(&mut builder, VECS_ENTRY, &vec_bytes)?;
                append_entry(&mut builder, VOCAB_ENTRY, &vocab_bytes)?;
                let enc = builder.into_inner()?;
                enc.finish()?;
            }
            write_atomic(file_path, &archive_bytes)?;
            Ok(())
        }
    }

    impl ReadFile for TrainedModel {
        fn read_file(file_path: &str) -> Result<Self, Box<dyn Error>> {
            let f = BufReader::new(File::open(file_path)?);
            let mut archive = tar::Archive::new(GzDecoder::new(f));

            let mut w: Option<Array2<f32>> = None;
            let mut t2i: Option<HashMap<String, usize>> = None;
            for entry in archive.entries()? {
                let mut entry = entry?;
                let name = entry.path()?.to_string_lossy().into_owned();
                let mut buf: Vec<u8> = Vec::new();
                entry.read_to_end(&mut buf)?;
                match name.as_str() {
                    VECS_ENTRY => w = Some(Array2::<f32>::read_npy(&buf[..])?),
                    VOCAB_ENTRY => t2i = Some(serde_json::from_slice(&buf)?),
                    _ => {}
                }
            }

            let w = w.ok_or_else(|| format!("{} has no {} entry", file_path, VECS_ENTRY))?;
            let t2i = t2i.ok_or_else(|| format!("{} has no {} entry", file_path, VOCAB_ENTRY))?;
            if w.dim().0 != t2i.len() {
                return Err(format!(
                    "{} is inconsistent: {} embedding rows for {} vocabulary entries",
                    file_path, w.dim().0, t2i.len()
                ).into());
            }
            Ok(TrainedModel { t2i, w })
        }
    }

    impl SaveFile for ResultRecord {
        fn save_file(&self, file_path: &str) -> Result<(), Box<dyn Error>> {
            write_atomic(file_path, self.render().as_bytes())
        }
    }

    fn append_entry<W: Write>(builder: &mut tar::Builder<W>, name: &str, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use std::collections::HashMap;
    use std::fs;

    use ndarray::array;

    use super::files_handling;
    use super::{experiment_grid, split_path, TestConfig, TrainConfig};
    use crate::train::TrainedModel;

    #[test]
    fn grid_covers_all_triples() {
        let grid = experiment_grid();
        assert_eq!(grid.len(), 4 * 4 * 2);

        // every key must encode to a distinct file stem
        let mut stems: Vec<String> = grid.iter().map(|k| k.encode()).collect();
        stems.sort();
        stems.dedup();
        assert_eq!(stems.len(), 32);
    }

    #[test]
    fn split_path_keeps_separator() {
        assert_eq!(split_path("data/corpus.txt"), ("data/".to_owned(), "corpus.txt".to_owned()));
        assert_eq!(split_path("corpus.txt"), ("".to_owned(), "corpus.txt".to_owned()));
        assert_eq!(split_path("a/b/corpus.txt"), ("a/b/".to_owned(), "corpus.txt".to_owned()));
    }

    #[test]
    fn configs_validate_arity() {
        let args: Vec<String> = ["train", "data/corpus.txt"].iter().map(|s| s.to_string()).collect();
        assert!(TrainConfig::new(&args).is_err());

        let args: Vec<String> = ["train", "data/corpus.txt", "models/"].iter().map(|s| s.to_string()).collect();
        let config = TrainConfig::new(&args).unwrap();
        assert_eq!(config.corpus_dir, "data/");
        assert_eq!(config.corpus_filename, "corpus.txt");
        assert_eq!(config.models_path, "models/");

        let args: Vec<String> = ["test", "data/validation.txt", "models/", "results/"].iter().map(|s| s.to_string()).collect();
        let config = TestConfig::new(&args).unwrap();
        assert_eq!(config.validation_filename, "validation.txt");
        assert_eq!(config.results_path, "results/");
    }

    #[test]
    fn model_file_roundtrips() {
        let dir = std::env::temp_dir().join(format!("w2v_store_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = format!("{}/0.5-10-sg.model", dir.display());

        let t2i: HashMap<String, usize> =
            [("king", 0usize), ("queen", 1)].map(|(t, i)| (t.to_string(), i)).into();
        let w = array![[0.25f32, -1.5, 3.0], [0.0, 2.0, -0.125]];
        let model = TrainedModel { t2i: t2i.clone(), w: w.clone() };

        files_handling::save_output(&path, &model).unwrap();
        // no .tmp sibling may survive a successful save
        assert!(!std::path::Path::new(&format!("{}.tmp", path)).exists());

        let loaded: TrainedModel = files_handling::read_input(&path).unwrap();
        assert_eq!(loaded.t2i, t2i);
        assert_eq!(loaded.w, w);
    }
}
