//! Experiment directory layout, per-episode logs and checkpoint paths.
//!
//! ```text
//! <output_dir>/exp_<n>/models/model_<episode>.pt
//! <output_dir>/exp_<n>/images/<round>/<timestep>.ppm
//! <output_dir>/exp_<n>/logs/<round>/episode_<episode>.txt
//! <output_dir>/exp_<n>/<test_id>/test_images/<timestep>.ppm
//! <output_dir>/exp_<n>/<test_id>/test_logs/log.txt
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::DdqnError;

/// Removes `path` if it exists and creates it again, empty.
pub fn ensure_clean_dir(path: &Path) -> Result<(), DdqnError> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| DdqnError::io(path, e))?;
    }
    fs::create_dir_all(path).map_err(|e| DdqnError::io(path, e))
}

/// Paths of one experiment.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(output_dir: &Path, experiment_num: u32) -> Self {
        Self {
            root: output_dir.join(format!("exp_{experiment_num}")),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn checkpoint_path(&self, episode: usize) -> PathBuf {
        self.models_dir().join(format!("model_{episode}.pt"))
    }

    pub fn image_dir(&self, round: usize) -> PathBuf {
        self.root.join("images").join(round.to_string())
    }

    pub fn log_dir(&self, round: usize) -> PathBuf {
        self.root.join("logs").join(round.to_string())
    }

    pub fn episode_log_path(&self, round: usize, episode: usize) -> PathBuf {
        self.log_dir(round).join(format!("episode_{episode}.txt"))
    }

    pub fn test_image_dir(&self, test_id: &str) -> PathBuf {
        self.root.join(test_id).join("test_images")
    }

    pub fn test_log_dir(&self, test_id: &str) -> PathBuf {
        self.root.join(test_id).join("test_logs")
    }

    /// Image file for timestep `t` (1-based) inside `dir`.
    pub fn frame_path(dir: &Path, t: usize) -> PathBuf {
        dir.join(format!("{t}.ppm"))
    }
}

/// One population snapshot written after every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLine {
    /// `None` for tester logs.
    pub episode: Option<usize>,
    pub step: usize,
    /// Cumulative reward so far in the episode.
    pub reward: f64,
    pub num_agents: usize,
    pub num_preys: usize,
    pub num_predators: usize,
}

impl LogLine {
    /// Tab-separated rendering, e.g.
    /// `Episode\t000\tStep\t004\tReward\t1.250\tnum_agents\t6\tnum_preys\t3\tnum_predators\t3`.
    pub fn render(&self) -> String {
        let body = format!(
            "Step\t{:03}\tReward\t{:5.3}\tnum_agents\t{}\tnum_preys\t{}\tnum_predators\t{}",
            self.step, self.reward, self.num_agents, self.num_preys, self.num_predators
        );
        match self.episode {
            Some(episode) => format!("Episode\t{episode:03}\t{body}"),
            None => body,
        }
    }

    /// Parses a line written by [`LogLine::render`].
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (episode, rest) = match fields.len() {
            12 if fields[0] == "Episode" => (Some(fields[1].parse().ok()?), &fields[2..]),
            10 => (None, &fields[..]),
            _ => return None,
        };
        if rest[0] != "Step" || rest[2] != "Reward" {
            return None;
        }
        Some(Self {
            episode,
            step: rest[1].parse().ok()?,
            reward: rest[3].parse().ok()?,
            num_agents: rest[5].parse().ok()?,
            num_preys: rest[7].parse().ok()?,
            num_predators: rest[9].parse().ok()?,
        })
    }
}

/// Append-only log file, flushed after every line.
pub struct EpisodeLog {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl EpisodeLog {
    /// Creates (truncating) the log file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, DdqnError> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| DdqnError::io(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn record(&mut self, line: &LogLine) -> Result<(), DdqnError> {
        writeln!(self.writer, "{}", line.render())
            .and_then(|_| self.writer.flush())
            .map_err(|e| DdqnError::io(&self.path, e))?;
        self.lines += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flushes and closes the file.
    pub fn close(mut self) -> Result<(), DdqnError> {
        self.writer
            .flush()
            .map_err(|e| DdqnError::io(&self.path, e))
    }
}

/// Reads `(num_preys, num_predators)` per line from a training or tester log.
///
/// Lines that do not parse are skipped.
pub fn read_population_history(path: &Path) -> Result<Vec<(usize, usize)>, DdqnError> {
    let file = File::open(path).map_err(|e| DdqnError::io(path, e))?;
    let mut history = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| DdqnError::io(path, e))?;
        if let Some(parsed) = LogLine::parse(&line) {
            history.push((parsed.num_preys, parsed.num_predators));
        }
    }
    Ok(history)
}
