//! Pricewatch CLI entry point.
//!
//! Provides the `pricewatch` binary with subcommands for caching exports,
//! auditing displayed prices, comparing policies, and reconciling orders.

mod cli_contract;
mod cli_handlers;
mod cli_normalize;
mod logging;

use clap::error::ErrorKind;
use clap::Parser;
use cli_contract::{AppExit, Cli, OutputMode, QUICK_HELP};
use cli_handlers::{emit_json_error, emit_json_success, handle_command};
use cli_normalize::{
    looks_like_human_requested, looks_like_json_requested, normalize_args, select_output_mode,
};
use serde_json::json;
use std::env;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

#[cfg(test)]
use cli_normalize::format_cli_failure;

fn main() -> ExitCode {
    logging::init();

    let raw_args: Vec<String> = env::args().collect();
    let mode = select_output_mode(
        looks_like_json_requested(&raw_args),
        looks_like_human_requested(&raw_args),
        io::stdout().is_terminal(),
    );
    if raw_args.len() == 1 {
        if mode == OutputMode::Json {
            emit_json_success(
                "OK",
                "Quick help emitted.",
                Some("help"),
                AppExit::Success as u8,
                &[],
                json!({
                    "quick_help": QUICK_HELP,
                }),
            );
        } else {
            println!("{QUICK_HELP}");
        }
        return AppExit::Success.code();
    }

    let (args, repair_notes) = normalize_args(raw_args);

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                let _ = err.print();
                return AppExit::Success.code();
            }
            let (message, suggestions) = parse_error_guidance(err.kind());
            if mode == OutputMode::Json {
                emit_json_error(
                    "INVALID_ARGS",
                    message,
                    &suggestions,
                    &repair_notes,
                    AppExit::InvalidArgs as u8,
                );
            } else {
                for note in &repair_notes {
                    eprintln!("Note: {note}");
                }
                eprintln!("{err}");
                for (idx, suggestion) in suggestions.iter().enumerate() {
                    eprintln!("Hint {}: {}", idx + 1, suggestion);
                }
            }
            return AppExit::InvalidArgs.code();
        }
    };

    let mode = select_output_mode(cli.json, cli.human, io::stdout().is_terminal());
    handle_command(cli, mode, &repair_notes).code()
}

fn parse_error_guidance(kind: ErrorKind) -> (&'static str, Vec<String>) {
    match kind {
        ErrorKind::InvalidSubcommand => (
            "Unknown subcommand.",
            vec![
                "Use one of: `pricewatch ingest`, `pricewatch audit`, `pricewatch compare`, or `pricewatch orders`."
                    .to_string(),
                "Run `pricewatch --help` for full command syntax.".to_string(),
            ],
        ),
        ErrorKind::UnknownArgument => (
            "Unknown flag or option.",
            vec![
                "Run `pricewatch --help` for global flags.".to_string(),
                "Run `pricewatch <command> --help` to inspect command-specific flags."
                    .to_string(),
            ],
        ),
        ErrorKind::MissingRequiredArgument => (
            "Missing required argument.",
            vec![
                "Example: `pricewatch ingest deal <deal.csv> --output <deal.bin>`.".to_string(),
                "Example: `pricewatch orders --logs <logs.csv> --items <items.csv>`.".to_string(),
            ],
        ),
        ErrorKind::InvalidValue => (
            "Invalid value for a flag.",
            vec![
                "Policies: `candidates`, `discount-window`.".to_string(),
                "Revalidation: `any-stream`, `originating-stream`, `permanent`.".to_string(),
            ],
        ),
        ErrorKind::ArgumentConflict => (
            "Conflicting flags or arguments.",
            vec![
                "Use either `--json` or `--human`, but not both.".to_string(),
                "Run `pricewatch --help` to review valid flag combinations.".to_string(),
            ],
        ),
        _ => (
            "Invalid command syntax.",
            vec![
                "Run `pricewatch --help` for command syntax.".to_string(),
                "Run `pricewatch <command> --help` for command-specific args.".to_string(),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        format_cli_failure, normalize_args, parse_error_guidance, select_output_mode, ErrorKind,
        OutputMode, QUICK_HELP,
    };

    #[test]
    fn cli_failure_template_has_required_sections() {
        let msg = format_cli_failure(
            "audit failed: deal.csv: No such file or directory",
            "Input path does not exist.",
            &[String::from("pricewatch audit --deals deal.csv")],
            &[String::from("deal.csv")],
        );

        assert!(msg.starts_with("Error: audit failed"));
        assert!(msg.contains("Cause: Input path does not exist."));
        assert!(msg.contains("Try:\n  1. pricewatch audit --deals deal.csv"));
        assert!(msg.ends_with("Inputs:\n  - deal.csv"));
    }

    #[test]
    fn cli_failure_template_omits_empty_sections() {
        let msg = format_cli_failure("orders failed", "No price log given.", &[], &[]);
        assert_eq!(msg, "Error: orders failed\nCause: No price log given.");
    }

    #[test]
    fn quick_help_is_compact() {
        let tokens = QUICK_HELP.split_whitespace().count();
        assert!(
            tokens <= 100,
            "quick help should stay compact, got {tokens}"
        );
    }

    #[test]
    fn output_mode_auto_json_when_not_tty() {
        assert_eq!(select_output_mode(false, false, false), OutputMode::Json);
        assert_eq!(select_output_mode(false, true, false), OutputMode::Human);
        assert_eq!(select_output_mode(false, false, true), OutputMode::Human);
    }

    #[test]
    fn normalize_args_repairs_common_variants() {
        let (repaired, notes) = normalize_args(vec![
            "pricewatch".to_string(),
            "audit".to_string(),
            "--output_dir".to_string(),
            "out".to_string(),
        ]);
        assert_eq!(repaired[2], "--output-dir");
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn parse_error_guidance_invalid_subcommand_is_specific() {
        let (message, suggestions) = parse_error_guidance(ErrorKind::InvalidSubcommand);
        assert_eq!(message, "Unknown subcommand.");
        assert!(suggestions[0].contains("pricewatch audit"));
    }

    #[test]
    fn parse_error_guidance_invalid_value_lists_policies() {
        let (_, suggestions) = parse_error_guidance(ErrorKind::InvalidValue);
        assert!(suggestions[0].contains("discount-window"));
    }
}
