//! Repeated execution of simulator test cases.
//!
//! Each test case is a spec file handed to the simulator executable. A case passes if every
//! repetition exits successfully; the first failing repetition ends the case. Cases are split
//! into contiguous buckets, one per worker, and buckets run concurrently. Workers only share
//! the filesystem, where the simulator writes its own logs.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, warn};
use rayon::prelude::*;

/// Directory, next to the executable, where the simulator writes its logs.
pub const LOG_DIR: &str = "cclog";

/// Runs test cases against a simulator executable.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct TestRunner {
    /// The simulator executable.
    #[builder(setter(into))]
    pub exe: PathBuf,
    /// The directory holding the test spec files.
    #[builder(setter(into))]
    pub spec_dir: PathBuf,
    /// How many times each case is run.
    #[builder(default = 100)]
    pub repetitions: usize,
    /// Number of buckets run concurrently.
    #[builder(default = default_workers())]
    pub workers: usize,
}

impl TestRunner {
    /// The simulator's log directory, which must exist before running.
    pub fn log_dir(&self) -> Result<PathBuf, Error> {
        let dir = self
            .exe
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(LOG_DIR);
        if !dir.is_dir() {
            return Err(Error::NoLogDir(dir));
        }
        Ok(dir)
    }

    /// Resolves a test name into the list of cases to run. A name ending in `*` selects every
    /// spec file starting with the given prefix.
    pub fn select(&self, test_name: &str) -> Result<Vec<String>, Error> {
        let cases = match test_name.strip_suffix('*') {
            Some(prefix) => {
                let mut cases = Vec::new();
                for entry in fs::read_dir(&self.spec_dir)? {
                    let entry = entry?;
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with(prefix) && entry.path().is_file() {
                        cases.push(name);
                    }
                }
                cases.sort();
                cases
            }
            None => vec![test_name.to_string()],
        };
        for case in &cases {
            let path = self.spec_path(case);
            if !path.is_file() {
                return Err(Error::NotAFile(path));
            }
        }
        Ok(cases)
    }

    /// Runs every case, spreading contiguous buckets of cases over the workers. Each bucket
    /// gets its own thread.
    pub fn run(&self, cases: &[String]) -> Result<RunSummary, Error> {
        let buckets = partition(cases, self.workers);
        debug!(
            "Running {} cases in {} buckets",
            cases.len(),
            buckets.len()
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(buckets.len().max(1))
            .build()?;
        let outcomes = pool.install(|| {
            buckets
                .par_iter()
                .map(|bucket| bucket.iter().map(|case| self.run_case(case)).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        });
        Ok(RunSummary {
            outcomes: outcomes.into_iter().flatten().collect(),
        })
    }

    fn run_case(&self, name: &str) -> CaseOutcome {
        let path = self.spec_path(name);
        for trial in 0..self.repetitions {
            let status = match Command::new(&self.exe).arg(&path).status() {
                Ok(status) => status,
                Err(e) => {
                    warn!("Cannot run {}: {e}", self.exe.display());
                    return CaseOutcome::failed(name, trial, None);
                }
            };
            if !status.success() {
                return CaseOutcome::failed(name, trial, status.code());
            }
        }
        CaseOutcome {
            name: name.to_string(),
            trials: self.repetitions,
            result: CaseResult::Passed,
        }
    }

    fn spec_path(&self, name: &str) -> PathBuf {
        [self.spec_dir.as_path(), name.as_ref()].into_iter().collect()
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Splits `items` into at most `nr_buckets` contiguous, non-empty buckets whose sizes differ
/// by at most one.
pub fn partition<T>(items: &[T], nr_buckets: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }
    let nr_buckets = nr_buckets.clamp(1, items.len());
    let (base, extra) = (items.len() / nr_buckets, items.len() % nr_buckets);
    let mut start = 0;
    (0..nr_buckets)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let bucket = &items[start..start + size];
            start += size;
            bucket
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub name: String,
    /// Number of successful trials.
    pub trials: usize,
    pub result: CaseResult,
}

impl CaseOutcome {
    fn failed(name: &str, trials: usize, code: Option<i32>) -> Self {
        Self {
            name: name.to_string(),
            trials,
            result: CaseResult::Failed { code },
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self.result, CaseResult::Passed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseResult {
    Passed,
    /// The executable exited with `code`, or could not be run or was killed (`None`).
    Failed { code: Option<i32> },
}

/// Outcomes of a run, in case order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<CaseOutcome>,
}

impl RunSummary {
    pub fn nr_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed()).count()
    }

    pub fn failed(&self) -> bool {
        self.nr_failed() > 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NoLogDir(PathBuf),

    #[error("failed to start the workers")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
