pub mod runner;

pub use runner::TestRunner;
