use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

/// Data-center demand-response flexibility analysis.
///
/// Decomposes a 15-minute facility load series into IT, cooling and other
/// load, simulates seasonal shed/up windows, standardizes hourly events and
/// evaluates the reliability of committed capacity.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Analysis configuration in TOML.
    #[clap(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in configuration preset (baseline, no_ess, aggressive).
    #[clap(long)]
    pub preset: Option<String>,

    /// Load series CSV: timestamp,measured_kwh,temperature,humidity.
    #[clap(long)]
    pub load: PathBuf,

    /// Price series CSV: timestamp,price.
    #[clap(long)]
    pub prices: Option<PathBuf>,

    /// Directory receiving the output tables.
    #[clap(long = "out-dir")]
    pub out_dir: Option<PathBuf>,

    /// Extend the load series synthetically through the end of this date (YYYY-MM-DD).
    #[clap(long = "extend-to")]
    pub extend_to: Option<NaiveDate>,

    /// Only log warnings and errors.
    #[clap(long, short)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_full_invocation() {
        let args = Args::try_parse_from([
            "dc-flex",
            "--preset",
            "no_ess",
            "--load",
            "load.csv",
            "--prices",
            "smp.csv",
            "--out-dir",
            "out",
            "--extend-to",
            "2025-05-31",
            "--quiet",
        ])
        .unwrap();
        assert_eq!(args.preset.as_deref(), Some("no_ess"));
        assert_eq!(args.extend_to, NaiveDate::from_ymd_opt(2025, 5, 31));
        assert!(args.quiet);
    }

    #[test]
    fn config_and_preset_conflict() {
        let result = Args::try_parse_from([
            "dc-flex",
            "--config",
            "a.toml",
            "--preset",
            "baseline",
            "--load",
            "load.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn load_is_required() {
        assert!(Args::try_parse_from(["dc-flex"]).is_err());
    }
}
