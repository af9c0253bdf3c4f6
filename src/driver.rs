mod config;
mod error;

use crate::ir::analysis::BlockSchedule;
use crate::ir::phases::{
    lower_guards, schedule_floating_reads, GuardLoweringConfig, GuardLoweringStats, TargetDescription,
};
use crate::ir::{build_graph, graph_to_string, graph_to_svg, verify, verify_with, Graph, VerifyOptions};
use crate::location_map::LocationMap;
use std::io::Write;
use tracing::info;

pub use config::Config;
pub use error::DriverError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub floating_reads: bool,
    pub guard_lowering: bool,
    pub guards: GuardLoweringConfig,
    pub target: TargetDescription,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            floating_reads: true,
            guard_lowering: true,
            guards: GuardLoweringConfig::default(),
            target: TargetDescription::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub floated_reads: usize,
    pub guards: Option<GuardLoweringStats>,
}

pub struct Compilation {
    pub graph: Graph,
    pub locations: LocationMap,
    pub report: PipelineReport,
}

/// Lowers a graph script and runs the enabled phases over it, checking the
/// graph after each step.
pub fn compile_script(
    input: &str,
    path: Option<String>,
    options: PipelineOptions,
) -> Result<Compilation, DriverError> {
    let (mut graph, locations) = build_graph(input, path)?;
    let mut report = PipelineReport::default();

    verify(&graph).map_err(DriverError::verify("after lowering"))?;

    if options.floating_reads {
        report.floated_reads = schedule_floating_reads(&mut graph);
        verify(&graph).map_err(DriverError::verify("after floating reads"))?;
    }

    if options.guard_lowering {
        let schedule = BlockSchedule::compute(&mut graph);
        let stats = lower_guards(&mut graph, &schedule, options.guards, options.target);
        let lowered = VerifyOptions {
            allow_guards: false,
            ..VerifyOptions::default()
        };

        verify_with(&graph, lowered).map_err(DriverError::verify("after guard lowering"))?;
        report.guards = Some(stats);
    }

    Ok(Compilation {
        graph,
        locations,
        report,
    })
}

pub fn execute(config: Config) -> Result<PipelineReport, DriverError> {
    let input = config.get_script()?;
    let compilation = compile_script(&input, config.get_source_path(), config.pipeline_options())?;
    let mut output = config.get_output()?;

    output.write_all(graph_to_string(&compilation.graph, &compilation.locations).as_bytes())?;
    output.flush()?;

    if let Some(ref path) = config.svg {
        graph_to_svg(&compilation.graph, &compilation.locations, path)?;
    }

    info!(
        "{} nodes, {} floated reads",
        compilation.graph.node_count(),
        compilation.report.floated_reads
    );

    Ok(compilation.report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "param p
guard nonnull p
x = read p.f+8
return x
";

    #[test]
    fn runs_every_phase() {
        let compilation = compile_script(SCRIPT, None, PipelineOptions::default()).unwrap();

        assert_eq!(compilation.report.floated_reads, 1);
        assert_eq!(
            compilation.report.guards.map(|stats| stats.implicit_null_checks),
            Some(1)
        );
        assert_eq!(compilation.graph.count(|kind| kind.is_guard()), 0);
    }

    #[test]
    fn phases_can_be_skipped() {
        let options = PipelineOptions {
            floating_reads: false,
            guard_lowering: false,
            ..PipelineOptions::default()
        };
        let compilation = compile_script(SCRIPT, None, options).unwrap();

        assert_eq!(compilation.report, PipelineReport::default());
        assert_eq!(compilation.graph.count(|kind| kind.is_guard()), 1);
    }

    #[test]
    fn fixed_reads_fold_guards_too() {
        let options = PipelineOptions {
            floating_reads: false,
            ..PipelineOptions::default()
        };
        let compilation = compile_script(SCRIPT, None, options).unwrap();

        assert_eq!(compilation.report.floated_reads, 0);
        assert_eq!(
            compilation.report.guards.map(|stats| stats.implicit_null_checks),
            Some(1)
        );
    }

    #[test]
    fn parse_errors_stop_the_pipeline() {
        let err = compile_script("x = read p.f\n", None, PipelineOptions::default())
            .err()
            .unwrap();

        assert!(matches!(err, DriverError::Parse(_)));
    }
}
