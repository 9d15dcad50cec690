//! CSV log of episode iterations.
//!
//! One row per iteration: `state_*`, `action_*` and `config_*` columns
//! followed by `episode` and `iteration`. The header is written when the file
//! is created and fixes the column set; later rows leave missing columns
//! empty and drop unknown ones.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fb_sim::{Observation, Values};
use tracing::{debug, info};

use crate::error::AppResult;

/// Directory the default log file is placed in.
pub const LOG_DIR: &str = "logs";

/// One iteration's data.
pub struct IterationRecord<'a> {
    pub state: &'a Observation,
    pub action: &'a Values,
    pub config: &'a Values,
    pub episode: usize,
    pub iteration: usize,
}

impl IterationRecord<'_> {
    fn cells(&self) -> Vec<(String, String)> {
        let mut cells = Vec::new();
        cells.extend(self.state.iter().map(|(k, v)| (format!("state_{k}"), v.to_string())));
        cells.extend(self.action.iter().map(|(k, v)| (format!("action_{k}"), v.to_string())));
        cells.extend(self.config.iter().map(|(k, v)| (format!("config_{k}"), v.to_string())));
        cells.push(("episode".to_string(), self.episode.to_string()));
        cells.push(("iteration".to_string(), self.iteration.to_string()));
        cells
    }
}

pub struct IterationLog {
    path: PathBuf,
    columns: Option<Vec<String>>,
}

impl IterationLog {
    /// `logs/<timestamp>_<env name>_log.csv`.
    pub fn default_path(env_name: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
        Path::new(LOG_DIR).join(format!("{stamp}_{env_name}_log.csv"))
    }

    /// Open a log at `path`, creating its directory. An existing file is
    /// appended to under its own header.
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                info!(dir = %dir.display(), "creating log directory");
                fs::create_dir_all(dir)?;
            }
        }
        let columns = if path.exists() {
            let content = fs::read_to_string(&path)?;
            content.lines().next().map(parse_header)
        } else {
            None
        };
        Ok(Self { path, columns })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &IterationRecord) -> AppResult<()> {
        let cells = record.cells();
        let mut out = String::new();

        if self.columns.is_none() {
            let columns: Vec<String> = cells.iter().map(|(k, _)| k.clone()).collect();
            out.push_str(&join_row(columns.iter().map(String::as_str)));
            out.push('\n');
            debug!(path = %self.path.display(), columns = columns.len(), "writing log header");
            self.columns = Some(columns);
        }
        let columns = self.columns.as_deref().unwrap_or(&[]);

        let row = columns.iter().map(|col| {
            cells
                .iter()
                .find(|(k, _)| k == col)
                .map(|(_, v)| v.as_str())
                .unwrap_or("")
        });
        out.push_str(&join_row(row));
        out.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn join_row<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(escape).collect::<Vec<_>>().join(",")
}

fn parse_header(line: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => columns.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    columns.push(current);
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn temp_log(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fb_iteration_log_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.join("nested").join("run_log.csv")
    }

    fn record<'a>(
        state: &'a Observation,
        action: &'a Values,
        config: &'a Values,
        iteration: usize,
    ) -> IterationRecord<'a> {
        IterationRecord {
            state,
            action,
            config,
            episode: 0,
            iteration,
        }
    }

    #[test]
    fn header_written_once() {
        let path = temp_log("header");
        let mut log = IterationLog::open(&path).unwrap();

        let mut state = Observation::new();
        state.insert("x0", 1.5);
        let action: Values = [("u".to_string(), 0.5)].into_iter().collect();
        let config: Values = [("mu".to_string(), 2.0)].into_iter().collect();

        log.append(&record(&state, &action, &config, 0)).unwrap();
        log.append(&record(&state, &action, &config, 1)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "state_x0,action_u,config_mu,episode,iteration");
        assert_eq!(lines[2], "1.5,0.5,2,0,1");
    }

    #[test]
    fn reopened_log_keeps_its_columns() {
        let path = temp_log("reopen");
        let mut state = Observation::new();
        state.insert("x0", 1.0);
        let action: Values = [("u".to_string(), 0.5)].into_iter().collect();
        let empty = Values::new();

        IterationLog::open(&path)
            .unwrap()
            .append(&record(&state, &action, &empty, 0))
            .unwrap();

        let mut log = IterationLog::open(&path).unwrap();
        state.insert("x1", 9.0);
        log.append(&record(&state, &empty, &empty, 1)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "1,,0,1");
    }

    proptest! {
        #[test]
        fn header_escaping_round_trips(names in proptest::collection::vec("[a-z,\" ]{1,8}", 1..6)) {
            let line = join_row(names.iter().map(String::as_str));
            prop_assert_eq!(parse_header(&line), names);
        }
    }
}
