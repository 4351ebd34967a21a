pub mod experiment;
pub mod plot;
pub mod scenario;

pub use experiment::Experiment;
