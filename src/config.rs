use std::path::PathBuf;

use anyhow::{bail, Result};

pub const TALLY_ENV: &str = "FLOWQUIZ_TALLY";
pub const STATE_ENV: &str = "FLOWQUIZ_STATE";

pub const USAGE: &str = "\
Usage: flowquiz [--results] [tree-file] [tally-file] [state-file]

  --results   list every tallied path and the recommendation it reaches,
              then exit

  tree-file   .json, outline (.md/.txt) or flowchart (.mmd) decision tree.
              Without it the built-in \"Should you use Vercel?\" quiz runs.
  tally-file  JSON file with outcome counts (env FLOWQUIZ_TALLY)
  state-file  JSON file with saved progress (env FLOWQUIZ_STATE)

Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizConfig {
    /// Tree to load; `None` runs the built-in quiz.
    pub tree_path: Option<PathBuf>,
    pub tally_path: PathBuf,
    pub state_path: PathBuf,
    /// Print the tally instead of running the quiz.
    pub results: bool,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            tree_path: None,
            tally_path: PathBuf::from("flowquiz-tally.json"),
            state_path: PathBuf::from("flowquiz-state.json"),
            results: false,
        }
    }
}

impl QuizConfig {
    /// Positional arguments win over environment variables, which win over
    /// the defaults. `args` excludes the program name.
    pub fn from_args<I>(args: I, env: impl Fn(&str) -> Option<String>) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        if let Some(path) = env(TALLY_ENV) {
            config.tally_path = path.into();
        }
        if let Some(path) = env(STATE_ENV) {
            config.state_path = path.into();
        }

        let (flags, args): (Vec<String>, Vec<String>) =
            args.into_iter().partition(|a| a.starts_with('-'));
        for flag in &flags {
            match flag.as_str() {
                "--results" => config.results = true,
                _ => bail!("unknown option {flag}\n\n{USAGE}"),
            }
        }
        if args.len() > 3 {
            bail!("unexpected arguments\n\n{USAGE}");
        }

        let mut args = args.into_iter();
        config.tree_path = args.next().map(PathBuf::from);
        if let Some(path) = args.next() {
            config.tally_path = path.into();
        }
        if let Some(path) = args.next() {
            config.state_path = path.into();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = QuizConfig::from_args(args(&[]), |_| None).unwrap();
        assert_eq!(config, QuizConfig::default());
    }

    #[test]
    fn test_env_then_args() {
        let env = |key: &str| (key == TALLY_ENV).then(|| "env-tally.json".to_string());
        let config = QuizConfig::from_args(args(&["tree.mmd"]), env).unwrap();
        assert_eq!(config.tree_path, Some(PathBuf::from("tree.mmd")));
        assert_eq!(config.tally_path, PathBuf::from("env-tally.json"));

        let config =
            QuizConfig::from_args(args(&["tree.mmd", "t.json", "s.json"]), env).unwrap();
        assert_eq!(config.tally_path, PathBuf::from("t.json"));
        assert_eq!(config.state_path, PathBuf::from("s.json"));
    }

    #[test]
    fn test_results_flag() {
        let config =
            QuizConfig::from_args(args(&["--results", "tree.mmd", "t.json"]), |_| None).unwrap();
        assert!(config.results);
        assert_eq!(config.tree_path, Some(PathBuf::from("tree.mmd")));
        assert_eq!(config.tally_path, PathBuf::from("t.json"));
        assert!(!QuizConfig::from_args(args(&["tree.mmd"]), |_| None).unwrap().results);
    }

    #[test]
    fn test_help_and_extra_args() {
        assert!(QuizConfig::from_args(args(&["--help"]), |_| None).is_err());
        assert!(QuizConfig::from_args(args(&["-h"]), |_| None).is_err());
        assert!(QuizConfig::from_args(args(&["a", "b", "c", "d"]), |_| None).is_err());
    }
}
