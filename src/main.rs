use word2vec_trainer::config;
use word2vec_trainer::Run;

fn main() {
    config::init_logging();
    Run::run();
}
