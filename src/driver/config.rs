use crate::ir::phases::{GuardLoweringConfig, TargetDescription};
use clap::{ArgAction, ArgGroup, Parser};
use std::io::{self, Write};
use tracing::Level;

use super::PipelineOptions;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
#[clap(group(ArgGroup::new("input").required(true).args(&["file", "inline"])))]
pub struct Config {
    /// Graph script to compile
    pub file: Option<String>,

    /// Optionally read the script as an arg
    #[clap(short, long, conflicts_with = "file")]
    pub inline: Option<String>,

    /// Leave every read fixed in control flow
    #[clap(long)]
    pub no_floating_reads: bool,

    /// Keep guards in the printed graph
    #[clap(long)]
    pub no_guard_lowering: bool,

    /// Lower every null guard explicitly
    #[clap(long)]
    pub no_implicit_null_checks: bool,

    /// Accesses below this displacement fault on a null base
    #[clap(long, default_value_t = 4096, value_name = "N")]
    pub implicit_null_check_limit: i64,

    /// Write the graph to a file instead of stdout
    #[clap(short, long, value_name = "OUT")]
    pub output: Option<String>,

    /// Also render the graph as svg
    #[clap(long, value_name = "PATH")]
    pub svg: Option<String>,

    /// Log more, repeat for even more
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    pub fn get_source_path(&self) -> Option<String> {
        self.file.clone()
    }

    pub fn get_script(&self) -> io::Result<String> {
        if let Some(ref inline) = self.inline {
            return Ok(inline.clone());
        }

        match self.file {
            Some(ref path) => std::fs::read_to_string(path),
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "no script provided")),
        }
    }

    pub fn get_output(&self) -> io::Result<Box<dyn Write>> {
        match self.output {
            Some(ref path) => Ok(Box::new(std::fs::File::create(path)?)),
            None => Ok(Box::new(io::stdout())),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            floating_reads: !self.no_floating_reads,
            guard_lowering: !self.no_guard_lowering,
            guards: GuardLoweringConfig {
                use_implicit_null_checks: !self.no_implicit_null_checks,
            },
            target: TargetDescription {
                implicit_null_check_limit: self.implicit_null_check_limit,
            },
        }
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

impl TryFrom<Vec<&str>> for Config {
    type Error = String;
    fn try_from(args: Vec<&str>) -> Result<Self, Self::Error> {
        match Config::try_parse_from(args) {
            Ok(config) => Ok(config),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_from(vec!["seanode", "graph.sea"]).unwrap();
        let options = config.pipeline_options();

        assert_eq!(config.get_source_path(), Some("graph.sea".to_string()));
        assert!(options.floating_reads);
        assert!(options.guard_lowering);
        assert!(options.guards.use_implicit_null_checks);
        assert_eq!(options.target.implicit_null_check_limit, 4096);
        assert_eq!(config.log_level(), Level::WARN);
    }

    #[test]
    fn phase_flags() {
        let config = Config::try_from(vec![
            "seanode",
            "-i",
            "return",
            "--no-floating-reads",
            "--no-implicit-null-checks",
            "--implicit-null-check-limit",
            "64",
            "-vv",
        ])
        .unwrap();
        let options = config.pipeline_options();

        assert_eq!(config.get_script().unwrap(), "return");
        assert!(!options.floating_reads);
        assert!(options.guard_lowering);
        assert!(!options.guards.use_implicit_null_checks);
        assert_eq!(options.target.implicit_null_check_limit, 64);
        assert_eq!(config.log_level(), Level::DEBUG);
    }

    #[test]
    fn requires_exactly_one_input() {
        assert!(Config::try_from(vec!["seanode"]).is_err());
        assert!(Config::try_from(vec!["seanode", "a.sea", "-i", "return"]).is_err());
    }
}
