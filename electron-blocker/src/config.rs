use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// How detections are rendered in the logs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Report {
    #[default]
    Text,
    Json,
}

/// Electron blocker configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub report: Report,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(&fs::read_to_string(p)?)?)
    }

    pub fn report(mut self, report: Report) -> Self {
        self.report = report;
        self
    }
}
