
use std::env;
use std::time::Instant;

use tracing::info;

use crate::config::{self, files_handling, TrainConfig, TrainParams};
use crate::corpus;
use crate::train::Train;

pub struct Run {}

impl Run {

    // runs the training side of the experiment -
    // -> split the corpus into graduated partitions
    // -> train one model per (proportion, window, algorithm) triple
    // -> persist each model under its key

    pub fn run() {

        info!("entering program...");
        let args: Vec<String> = env::args().collect();

        let train_config = match TrainConfig::new(&args) {
            Ok(train_config) => train_config,
            Err(e) => panic!("{}", e),
        };

        info!("splitting corpus into proportions {:?}...", config::CORPUS_PROPORTIONS);
        if let Err(e) = corpus::split_corpus_file(
            &train_config.corpus_dir,
            &train_config.corpus_filename,
            &config::CORPUS_PROPORTIONS,
        ) {
            panic!("{}", e)
        }

        let params = TrainParams::default();
        info!("{}", params);

        for key in config::experiment_grid() {

            let timer = Instant::now();
            let partition_path = format!(
                "{}{}{}",
                train_config.corpus_dir, key.proportion, train_config.corpus_filename
            );

            let sentences = match corpus::read_sentences(&partition_path) {
                Ok(sentences) => sentences,
                Err(e) => panic!("{}", e),
            };

            info!("training model {}...", key);
            let model = match Train::run(&sentences, key.algorithm, key.window, &params) {
                Ok(model) => model,
                Err(e) => panic!("{}", e),
            };

            let model_path = key.model_path(&train_config.models_path);
            if let Err(e) = files_handling::save_output(&model_path, &model) {
                panic!("{}", e)
            }

            info!("trained and saved model {}, took {} seconds...", key, timer.elapsed().as_secs());
        }
    }
}
