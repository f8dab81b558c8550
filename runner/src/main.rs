use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use flow_clustering::{input, report, ClusteringConfig, MergeLimits, Weights};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Groups network flows into a fixed number of clusters by single-linkage merging.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Flow file: a `count=<N>` line followed by N flow lines.
    file: PathBuf,

    /// Number of clusters to stop at.
    target: usize,

    /// Weight of the total bytes feature.
    w_bytes: f64,

    /// Weight of the flow duration feature.
    w_duration: f64,

    /// Weight of the average inter-arrival time feature.
    w_inter_time: f64,

    /// Weight of the average packet length feature.
    w_inter_length: f64,

    /// Abort if more than this many merges would be needed.
    #[arg(long)]
    max_merges: Option<usize>,

    /// Abort if clustering takes longer than this many seconds.
    #[arg(long)]
    time_budget_secs: Option<f64>,

    /// Print the merge history after the cluster listing.
    #[arg(long)]
    history: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::debug!("{error:?}");
            eprintln!("ERROR: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &Opts) -> anyhow::Result<()> {
    let config = config_from_opts(opts)?;

    let flows = input::read_flows_from_path(&opts.file)
        .with_context(|| format!("failed to read flows from {}", opts.file.display()))?;
    let outcome = flow_clustering::cluster_flows(flows, &config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::write_clusters(&mut out, &outcome.clusters)?;
    if opts.history {
        report::write_merge_history(&mut out, &outcome.merges)?;
    }
    out.flush()?;
    Ok(())
}

fn config_from_opts(opts: &Opts) -> anyhow::Result<ClusteringConfig> {
    let weights = Weights::new(
        opts.w_bytes,
        opts.w_duration,
        opts.w_inter_time,
        opts.w_inter_length,
    )?;

    let time_budget = match opts.time_budget_secs {
        Some(secs) => Some(
            Duration::try_from_secs_f64(secs)
                .with_context(|| format!("invalid time budget {secs}"))?,
        ),
        None => None,
    };
    let limits = MergeLimits {
        max_merges: opts.max_merges,
        time_budget,
    };

    Ok(ClusteringConfig::new(opts.target, weights)?.with_limits(limits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Opts, clap::Error> {
        Opts::try_parse_from(std::iter::once("flow-cluster").chain(args.iter().copied()))
    }

    #[test]
    fn opts_should_require_six_positionals() {
        assert!(parse(&["flows.txt", "2", "1", "1", "1"]).is_err());
        assert!(parse(&["flows.txt", "2", "1", "1", "1", "1", "1"]).is_err());

        let opts = parse(&["flows.txt", "2", "1", "0.5", "0", "2"]).unwrap();
        assert_eq!(opts.target, 2);
        assert_eq!(opts.w_duration, 0.5);
        assert!(!opts.history);
    }

    #[test]
    fn opts_should_reject_non_numeric_weight() {
        assert!(parse(&["flows.txt", "2", "1", "heavy", "1", "1"]).is_err());
    }

    #[test]
    fn config_should_reject_negative_weight_and_zero_target() {
        let opts = parse(&["flows.txt", "2", "1", "1", "1", "--", "-1"]).unwrap();
        assert!(config_from_opts(&opts).is_err());

        let opts = parse(&["flows.txt", "0", "1", "1", "1", "1"]).unwrap();
        assert!(config_from_opts(&opts).is_err());
    }

    #[test]
    fn config_should_carry_limits() {
        let opts = parse(&[
            "flows.txt",
            "3",
            "1",
            "1",
            "1",
            "1",
            "--max-merges",
            "10",
            "--time-budget-secs",
            "1.5",
        ])
        .unwrap();
        let config = config_from_opts(&opts).unwrap();
        assert_eq!(config.limits().max_merges, Some(10));
        assert_eq!(config.limits().time_budget, Some(Duration::from_millis(1500)));
    }
}
