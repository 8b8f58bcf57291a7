
pub mod config;
pub mod corpus;
pub mod evaluate;
pub mod key;
pub mod run;
pub mod similarity;
pub mod train;

pub use config::files_handling;
pub use run::Run;
pub use similarity::Similarity;
