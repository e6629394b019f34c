use crate::cli_contract::OutputMode;
use std::fmt::Write as _;

/// Human failure report: what failed, why, what to run next, and which
/// input files were involved.
pub(crate) fn format_cli_failure(
    what_failed: &str,
    cause: &str,
    next_commands: &[String],
    input_paths: &[String],
) -> String {
    let mut out = format!("Error: {what_failed}\nCause: {cause}\n");

    if !next_commands.is_empty() {
        out.push_str("Try:\n");
        for (i, cmd) in next_commands.iter().enumerate() {
            let _ = writeln!(out, "  {}. {cmd}", i + 1);
        }
    }

    if !input_paths.is_empty() {
        out.push_str("Inputs:\n");
        for path in input_paths {
            let _ = writeln!(out, "  - {path}");
        }
    }

    out.trim_end().to_string()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter()
        .skip(1)
        .take_while(|a| a.as_str() != "--")
        .any(|a| a == flag)
}

/// Pre-parse check so argument errors are reported in the requested mode.
pub(crate) fn looks_like_json_requested(args: &[String]) -> bool {
    has_flag(args, "--json")
}

pub(crate) fn looks_like_human_requested(args: &[String]) -> bool {
    has_flag(args, "--human")
}

/// Explicit flags win; otherwise a terminal gets text and a pipe gets JSON.
pub(crate) fn select_output_mode(
    explicit_json: bool,
    explicit_human: bool,
    stdout_is_tty: bool,
) -> OutputMode {
    match (explicit_json, explicit_human) {
        (true, _) => OutputMode::Json,
        (false, true) => OutputMode::Human,
        (false, false) if stdout_is_tty => OutputMode::Human,
        (false, false) => OutputMode::Json,
    }
}

const FLAG_REPAIRS: [(&str, &str); 3] = [
    ("--output_dir", "--output-dir"),
    ("--fail_on_revisions", "--fail-on-revisions"),
    ("--goods", "--entities"),
];

pub(crate) fn normalize_args(args: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut repaired = args;
    let mut notes = Vec::new();

    // Stop after `--` so forced positional values are preserved.
    let mut passthrough_positionals = false;
    for arg in repaired.iter_mut().skip(1) {
        if arg == "--" {
            passthrough_positionals = true;
            continue;
        }
        if passthrough_positionals {
            continue;
        }
        let replacement = FLAG_REPAIRS
            .iter()
            .find(|(from, _)| *from == arg.as_str())
            .map(|(_, to)| *to);

        if let Some(new) = replacement {
            notes.push(format!("normalized `{}` -> `{}`", arg, new));
            *arg = new.to_string();
        }
    }

    (repaired, notes)
}

#[cfg(test)]
mod tests {
    use super::normalize_args;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mode_flags_after_double_dash_are_ignored() {
        let raw = args(&["pricewatch", "audit", "--", "--json"]);
        assert!(!super::looks_like_json_requested(&raw));
        assert!(super::looks_like_human_requested(&args(&["pricewatch", "--human"])));
    }

    #[test]
    fn normalize_does_not_rewrite_subcommand_aliases() {
        let (repaired, notes) = normalize_args(args(&["pricewatch", "replay"]));
        assert_eq!(repaired[1], "replay");
        assert!(notes.is_empty());
    }

    #[test]
    fn normalize_does_not_mutate_positionals_after_double_dash() {
        let (repaired, notes) =
            normalize_args(args(&["pricewatch", "ingest", "--", "--output_dir"]));
        assert_eq!(repaired[3], "--output_dir");
        assert!(notes.is_empty());
    }

    #[test]
    fn normalize_repairs_underscores_and_goods_alias() {
        let (repaired, notes) = normalize_args(args(&[
            "pricewatch",
            "audit",
            "--goods",
            "1001",
            "--fail_on_revisions",
            "--output_dir",
            "out",
        ]));
        assert_eq!(repaired[2], "--entities");
        assert!(repaired.contains(&"--fail-on-revisions".to_string()));
        assert!(repaired.contains(&"--output-dir".to_string()));
        assert_eq!(notes.len(), 3);

        let (again, notes_2) = normalize_args(repaired.clone());
        assert_eq!(again, repaired);
        assert!(notes_2.is_empty());
    }
}
