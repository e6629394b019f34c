use clap::{Args, Parser, Subcommand, ValueEnum};
use pricewatch_core::event::StreamKind;
use pricewatch_core::policy::PricingPolicy;
use pricewatch_core::reducer::Revalidation;
use std::path::PathBuf;
use std::process::ExitCode;

/// Pricewatch: replay pricing change streams and flag wrong displayed prices.
#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Emit machine-readable JSON output.
    #[arg(long, global = true, conflicts_with = "human")]
    pub(crate) json: bool,

    /// Force human-readable output (overrides auto JSON in piped mode).
    #[arg(long, global = true)]
    pub(crate) human: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum StreamArg {
    Deal,
    Option,
    Consumer,
    Adjustment,
}

impl From<StreamArg> for StreamKind {
    fn from(arg: StreamArg) -> Self {
        match arg {
            StreamArg::Deal => StreamKind::Deal,
            StreamArg::Option => StreamKind::Option,
            StreamArg::Consumer => StreamKind::Consumer,
            StreamArg::Adjustment => StreamKind::Adjustment,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum PolicyArg {
    Candidates,
    DiscountWindow,
}

impl From<PolicyArg> for PricingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Candidates => PricingPolicy::Candidates,
            PolicyArg::DiscountWindow => PricingPolicy::DiscountWindow,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum RevalidationArg {
    AnyStream,
    OriginatingStream,
    Permanent,
}

impl From<RevalidationArg> for Revalidation {
    fn from(arg: RevalidationArg) -> Self {
        match arg {
            RevalidationArg::AnyStream => Revalidation::AnyStream,
            RevalidationArg::OriginatingStream => Revalidation::OriginatingStream,
            RevalidationArg::Permanent => Revalidation::Permanent,
        }
    }
}

/// Stream inputs and run options shared by `audit` and `compare`.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct DatasetArgs {
    /// Deal export (CSV) or cache (.bin). Required here or in --config.
    #[arg(long)]
    pub(crate) deals: Option<PathBuf>,

    /// Option export or cache.
    #[arg(long)]
    pub(crate) options: Option<PathBuf>,

    /// Platform consumer price export or cache.
    #[arg(long)]
    pub(crate) consumers: Option<PathBuf>,

    /// Discount adjustment export or cache.
    #[arg(long)]
    pub(crate) adjustments: Option<PathBuf>,

    /// TOML config file; flags given here override its values.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Output directory for report artifacts (default: audit-output).
    #[arg(long)]
    pub(crate) output_dir: Option<PathBuf>,

    /// How an entity becomes valid again after a delete.
    #[arg(long, value_enum)]
    pub(crate) revalidation: Option<RevalidationArg>,

    /// Audit only these goods (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub(crate) entities: Vec<i64>,

    /// Read at most N data rows per input file.
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Parse one export and save it as a binary cache.
    #[command(alias = "cache")]
    Ingest {
        /// Which stream the export holds.
        #[arg(value_enum)]
        kind: StreamArg,

        /// Path to the CSV export.
        input: PathBuf,

        /// Output cache path (.bin).
        #[arg(short, long)]
        output: PathBuf,

        /// Read at most N data rows.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Replay the streams and write revisions for wrong displayed prices.
    #[command(alias = "replay")]
    Audit {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Correctness policy.
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Exit non-zero when any revision is emitted.
        #[arg(long)]
        fail_on_revisions: bool,
    },

    /// Replay under two policies and report points flagged by only one.
    #[command(alias = "diff")]
    Compare {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Left policy.
        #[arg(long, value_enum, default_value = "candidates")]
        left: PolicyArg,

        /// Right policy.
        #[arg(long, value_enum, default_value = "discount-window")]
        right: PolicyArg,
    },

    /// Check order items against the price logged before checkout.
    #[command(alias = "order")]
    Orders {
        /// Price log export (repeatable).
        #[arg(long = "logs", required = true, num_args = 1..)]
        logs: Vec<PathBuf>,

        /// Order item export (repeatable).
        #[arg(long = "items", required = true, num_args = 1..)]
        items: Vec<PathBuf>,

        /// Output directory for the report (default: audit-output).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Read at most N data rows per input file.
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Commands {
    /// Canonical subcommand name, as used in robot envelopes.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Commands::Ingest { .. } => "ingest",
            Commands::Audit { .. } => "audit",
            Commands::Compare { .. } => "compare",
            Commands::Orders { .. } => "orders",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OutputMode {
    Human,
    Json,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AppExit {
    Success = 0,
    NotFound = 1,
    InvalidArgs = 2,
    RuntimeError = 4,
    RevisionsFound = 5,
}

impl AppExit {
    pub(crate) fn code(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

pub(crate) const QUICK_HELP: &str = "\
pricewatch: temporal pricing replay audit
Usage: pricewatch [--json|--human] <command> [args]
Commands:
  ingest <deal|option|consumer|adjustment> <export.csv> --output <cache.bin> [--limit <n>]
  audit --deals <path> [--options|--consumers|--adjustments <path>] [--config <toml>] [--policy <p>] [--fail-on-revisions]
  compare --deals <path> [...] [--left <p>] [--right <p>]
  orders --logs <logs.csv>... --items <items.csv>... [--output-dir <dir>]
Tips:
  pricewatch --help
  pricewatch <command> --help";

pub(crate) const ROBOT_SCHEMA_VERSION: &str = "pricewatch-cli-robot-v1";
