//! Extracting node counts and nodes-per-second from engine bench output.
//!
//! Engines don't agree on a bench output format, so parsing is best effort:
//! lines are scanned from the end (summaries are printed last), each line is
//! reduced to ASCII letters, digits and spaces, uppercased, and then matched
//! against the configured patterns. The match closest to the end of the
//! stream wins for each field.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{
    config::ParserConfig,
    error::{BenchmarkError, BenchmarkErrorKind, Result},
};

/// The parsed counters of one bench run. `None` means the output had no
/// matching line, which is not an error at this level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub bench: Option<u64>,
    pub nps: Option<u64>,
}

impl Sample {
    pub fn new(bench: u64, nps: u64) -> Self {
        Self {
            bench: Some(bench),
            nps: Some(nps),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bench.is_some() && self.nps.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct OutputParser {
    nps: Vec<Regex>,
    nodes: Vec<Regex>,
}

impl OutputParser {
    pub fn new<S: AsRef<str>>(nps_patterns: &[S], nodes_patterns: &[S]) -> Result<Self> {
        Ok(Self {
            nps: compile_patterns(nps_patterns)?,
            nodes: compile_patterns(nodes_patterns)?,
        })
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        Self::new(config.nps_patterns.as_slice(), config.nodes_patterns.as_slice())
    }

    /// Parse one output stream into a sample.
    pub fn parse(&self, output: &str) -> Sample {
        let mut sample = Sample::default();
        let mut nps_seen = false;
        let mut bench_seen = false;

        for line in output.trim().lines().rev() {
            if nps_seen && bench_seen {
                break;
            }

            let line = normalize_line(line);

            // A matched line settles its field, even when the number is unusable
            if !nps_seen {
                if let Some(fragment) = first_match(&self.nps, &line) {
                    sample.nps = leading_integer(fragment);
                    nps_seen = true;
                }
            }
            if !bench_seen {
                if let Some(fragment) = first_match(&self.nodes, &line) {
                    sample.bench = leading_integer(fragment);
                    bench_seen = true;
                }
            }
        }

        sample
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(pattern).map_err(|source| {
                BenchmarkError::from(BenchmarkErrorKind::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
        })
        .collect()
}

/// Collapse every run of characters other than ASCII letters, digits and
/// spaces into one space, then uppercase.
fn normalize_line(line: &str) -> String {
    let mut normalized = String::with_capacity(line.len());
    let mut in_junk = false;

    for c in line.chars() {
        if c.is_ascii_alphanumeric() || c == ' ' {
            normalized.push(c.to_ascii_uppercase());
            in_junk = false;
        } else if !in_junk {
            normalized.push(' ');
            in_junk = true;
        }
    }

    normalized
}

/// The fragment matched by the first pattern that matches this line.
fn first_match<'a>(patterns: &[Regex], line: &'a str) -> Option<&'a str> {
    patterns
        .iter()
        .find_map(|pattern| pattern.find(line))
        .map(|fragment| fragment.as_str())
}

fn leading_integer(fragment: &str) -> Option<u64> {
    fragment
        .split(|c: char| !c.is_ascii_digit())
        .find(|digits| !digits.is_empty())
        .and_then(|digits| digits.parse().ok())
}
