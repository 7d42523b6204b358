use anyhow::{Context, Result};
use log::info;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// What one finished session boils down to for the results ledger.
pub struct SessionOutcome {
    pub score: usize,
    pub total: usize,
    /// 1-based question indices answered wrong, in presentation order.
    pub missed: Vec<usize>,
}

impl SessionOutcome {
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.score as f32 / self.total as f32 * 100.0
        }
    }
}

/// Append-only results CSV: `attempt,accuracy,score,total,missed`, where
/// `missed` is a `;`-separated list of 1-based question indices (empty for a
/// perfect run). Attempt numbers come from scanning the existing file, so
/// the ledger survives across program runs with no extra state file.
pub struct ResultsFile {
    path: PathBuf,
}

const HEADER: &str = "attempt,accuracy,score,total,missed";

impl ResultsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1 + the highest attempt number recorded so far (1 for a fresh file).
    /// Unparseable lines (including the header) are skipped, not errors.
    pub fn next_attempt(&self) -> u32 {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return 1,
        };
        let mut last = 0u32;
        for line in BufReader::new(file).lines().map_while(|l| l.ok()) {
            if let Some(first) = line.split(',').next() {
                if let Ok(attempt) = first.trim().parse::<u32>() {
                    last = last.max(attempt);
                }
            }
        }
        last + 1
    }

    /// Append one session's outcome. Returns the attempt number recorded.
    pub fn append(&self, outcome: &SessionOutcome) -> Result<u32> {
        let attempt = self.next_attempt();
        let fresh = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open results file {:?}", self.path))?;
        let mut w = BufWriter::new(file);

        if fresh {
            writeln!(w, "{HEADER}")?;
        }
        let missed = outcome
            .missed
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(";");
        writeln!(
            w,
            "{},{:.1},{},{},{}",
            attempt,
            outcome.accuracy(),
            outcome.score,
            outcome.total,
            missed,
        )?;
        w.flush()?;

        info!(
            "Recorded attempt {}: {}/{} ({:.1}%) → {:?}",
            attempt,
            outcome.score,
            outcome.total,
            outcome.accuracy(),
            self.path
        );
        Ok(attempt)
    }

    /// Per-question failure counts aggregated over every recorded attempt.
    /// Index i holds how often question i+1 appears in a `missed` list.
    pub fn error_stats(&self, total_questions: usize) -> Vec<u32> {
        let mut counts = vec![0u32; total_questions];
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return counts,
        };
        for line in BufReader::new(file).lines().map_while(|l| l.ok()) {
            // Rows with a non-numeric attempt field (the header) don't count.
            let mut fields = line.split(',');
            if fields.next().and_then(|f| f.trim().parse::<u32>().ok()).is_none() {
                continue;
            }
            let Some(missed) = line.rsplit(',').next() else {
                continue;
            };
            for seg in missed.split(';') {
                if let Ok(idx) = seg.trim().parse::<usize>() {
                    if idx >= 1 && idx <= total_questions {
                        counts[idx - 1] += 1;
                    }
                }
            }
        }
        counts
    }
}
