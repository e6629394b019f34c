use crate::cli_contract::{
    AppExit, Cli, Commands, DatasetArgs, OutputMode, PolicyArg, ROBOT_SCHEMA_VERSION,
};
use crate::cli_normalize::format_cli_failure;
use pricewatch_audit::{
    run_audit, run_comparison, run_ingest, run_order_audit, AuditConfig, AuditConfigFile,
    AuditError, InputPaths, OrderAuditConfig,
};
use pricewatch_core::delta::ChangeClass;
use pricewatch_core::event::StreamKind;
use pricewatch_core::policy::PricingPolicy;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

fn emit_json(value: Value) {
    match serde_json::to_string(&value) {
        Ok(line) => println!("{line}"),
        Err(err) => {
            // Last-resort envelope to avoid panicking in robot mode.
            let fallback = json!({
                "schema_version": ROBOT_SCHEMA_VERSION,
                "ok": false,
                "code": "RUNTIME_ERROR",
                "message": format!("failed to serialize JSON response: {err}"),
                "suggestions": [],
                "exit_code": AppExit::RuntimeError as u8,
            });
            println!("{fallback}");
        }
    }
}

pub(crate) fn emit_json_success(
    code: &str,
    message: &str,
    command: Option<&str>,
    exit_code: u8,
    notes: &[String],
    mut data: Value,
) {
    if data.is_null() {
        data = json!({});
    }
    let mut obj = json!({
        "schema_version": ROBOT_SCHEMA_VERSION,
        "ok": true,
        "code": code,
        "message": message,
        "suggestions": [],
        "exit_code": exit_code,
        "data": data,
    });
    if let Some(command) = command {
        obj["command"] = json!(command);
    }
    if !notes.is_empty() {
        obj["notes"] = json!(notes);
    }
    emit_json(obj);
}

pub(crate) fn emit_json_error(
    code: &str,
    message: &str,
    suggestions: &[String],
    notes: &[String],
    exit_code: u8,
) {
    let mut obj = json!({
        "schema_version": ROBOT_SCHEMA_VERSION,
        "ok": false,
        "code": code,
        "message": message,
        "suggestions": suggestions,
        "exit_code": exit_code,
    });
    if !notes.is_empty() {
        obj["notes"] = json!(notes);
    }
    emit_json(obj);
}

// ---------------------------------------------------------------------------
// Failure reporting
// ---------------------------------------------------------------------------

/// A failed command, ready to print in either output mode.
struct Failure {
    exit: AppExit,
    message: String,
    likely_cause: &'static str,
    suggestions: Vec<String>,
    evidence: Vec<String>,
}

impl Failure {
    fn from_audit(command: &str, err: &AuditError, suggestions: Vec<String>) -> Failure {
        let (exit, likely_cause) = match err {
            _ if err.is_not_found() => (AppExit::NotFound, "Input path does not exist."),
            AuditError::MissingInput(_) => (
                AppExit::InvalidArgs,
                "A required input was given neither as a flag nor in --config.",
            ),
            AuditError::Config { .. } => (
                AppExit::InvalidArgs,
                "Config file is not valid TOML or has unknown keys.",
            ),
            AuditError::Import(_) => (
                AppExit::RuntimeError,
                "Input is not a well-formed export or cache for this stream.",
            ),
            AuditError::Io { .. } | AuditError::Serialize { .. } => (
                AppExit::RuntimeError,
                "Output directory is not writable.",
            ),
        };
        Failure {
            exit,
            message: format!("{command} failed: {err}"),
            likely_cause,
            suggestions,
            evidence: Vec::new(),
        }
    }

    fn with_evidence(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Failure {
        self.evidence = paths
            .into_iter()
            .map(|p| p.display().to_string())
            .collect();
        self
    }

    fn code(&self) -> &'static str {
        match self.exit {
            AppExit::NotFound => "NOT_FOUND",
            AppExit::InvalidArgs => "INVALID_ARGS",
            _ => "RUNTIME_ERROR",
        }
    }

    fn report(self, mode: OutputMode, repair_notes: &[String]) -> AppExit {
        warn!(exit = self.exit as u8, "{}", self.message);
        if mode == OutputMode::Json {
            emit_json_error(
                self.code(),
                &self.message,
                &self.suggestions,
                repair_notes,
                self.exit as u8,
            );
        } else {
            eprintln!(
                "{}",
                format_cli_failure(
                    &self.message,
                    self.likely_cause,
                    &self.suggestions,
                    &self.evidence,
                )
            );
        }
        self.exit
    }
}

// ---------------------------------------------------------------------------
// Config assembly
// ---------------------------------------------------------------------------

fn dataset_inputs(args: &DatasetArgs) -> InputPaths {
    InputPaths {
        deals: args.deals.clone(),
        options: args.options.clone(),
        consumers: args.consumers.clone(),
        adjustments: args.adjustments.clone(),
    }
}

/// Defaults, then the TOML file, then flags.
fn build_audit_config(
    args: &DatasetArgs,
    policy: Option<PolicyArg>,
) -> Result<AuditConfig, AuditError> {
    let mut config = AuditConfig::new(dataset_inputs(args));
    if let Some(path) = &args.config {
        config = AuditConfigFile::load(path)?.apply(config);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(policy) = policy {
        config = config.with_policy(policy.into());
    }
    if let Some(revalidation) = args.revalidation {
        config = config.with_revalidation(revalidation.into());
    }
    if !args.entities.is_empty() {
        config = config.with_entities(args.entities.iter().copied());
    }
    if let Some(limit) = args.limit {
        config = config.with_limit(limit);
    }
    Ok(config)
}

fn input_evidence(args: &DatasetArgs) -> Vec<PathBuf> {
    [
        &args.deals,
        &args.options,
        &args.consumers,
        &args.adjustments,
        &args.config,
    ]
    .into_iter()
    .flatten()
    .cloned()
    .collect()
}

fn audit_suggestions(args: &DatasetArgs) -> Vec<String> {
    let deals = args
        .deals
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<deal.csv>".to_string());
    vec![
        format!("pricewatch audit --deals {deals} --options <option.csv>"),
        "pricewatch audit --help".to_string(),
    ]
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub(crate) fn handle_command(cli: Cli, mode: OutputMode, repair_notes: &[String]) -> AppExit {
    info!(
        command = cli.command.name(),
        json = mode == OutputMode::Json,
        repairs = repair_notes.len(),
        "dispatching command"
    );
    match cli.command {
        Commands::Ingest {
            kind,
            input,
            output,
            limit,
        } => {
            let kind = StreamKind::from(kind);
            match run_ingest(kind, &input, &output, limit) {
                Ok(report) => {
                    if mode == OutputMode::Json {
                        emit_json_success(
                            "OK",
                            "Cache written.",
                            Some("ingest"),
                            AppExit::Success as u8,
                            repair_notes,
                            json!({
                                "kind": report.kind,
                                "records": report.records,
                                "entities": report.entities,
                                "output": report.output,
                            }),
                        );
                    } else {
                        println!(
                            "Cached {} {} records for {} goods",
                            report.records, report.kind, report.entities
                        );
                        println!("  Output: {}", report.output.display());
                    }
                    AppExit::Success
                }
                Err(e) => {
                    let suggestions = vec![
                        format!(
                            "Check that `{}` is a {} export with a header row.",
                            input.display(),
                            kind
                        ),
                        format!(
                            "pricewatch ingest {kind} {} --output {}",
                            input.display(),
                            output.display()
                        ),
                    ];
                    Failure::from_audit("ingest", &e, suggestions)
                        .with_evidence([input, output])
                        .report(mode, repair_notes)
                }
            }
        }
        Commands::Audit {
            dataset,
            policy,
            fail_on_revisions,
        } => {
            let result = build_audit_config(&dataset, policy).and_then(|c| run_audit(&c));
            match result {
                Ok(result) => {
                    let summary = &result.summary;
                    let exit = if fail_on_revisions && summary.revisions > 0 {
                        AppExit::RevisionsFound
                    } else {
                        AppExit::Success
                    };
                    if mode == OutputMode::Json {
                        let (code, message) = if exit == AppExit::RevisionsFound {
                            ("REVISIONS_FOUND", "Audit found wrong displayed prices.")
                        } else {
                            ("OK", "Audit completed.")
                        };
                        emit_json_success(
                            code,
                            message,
                            Some("audit"),
                            exit as u8,
                            repair_notes,
                            json!({
                                "output_dir": result.output_dir,
                                "summary": summary,
                                "artifacts": result.artifacts,
                            }),
                        );
                    } else {
                        println!("Audit completed ({} policy)", summary.policy);
                        println!("  Goods:        {}", summary.entities);
                        println!("  Observations: {}", summary.observations);
                        println!("  Suppressed:   {}", summary.suppressed);
                        println!(
                            "  Revisions:    {} ({} wrong price)",
                            summary.revisions, summary.wrong_price_revisions
                        );
                        if !summary.skipped_entities.is_empty() {
                            println!("  Skipped goods: {:?}", summary.skipped_entities);
                        }
                        println!("  Hash:         {}", summary.revision_hash);
                        println!("  Output:       {}", result.output_dir.display());
                    }
                    exit
                }
                Err(e) => Failure::from_audit("audit", &e, audit_suggestions(&dataset))
                    .with_evidence(input_evidence(&dataset))
                    .report(mode, repair_notes),
            }
        }
        Commands::Compare {
            dataset,
            left,
            right,
        } => {
            let (left, right) = (PricingPolicy::from(left), PricingPolicy::from(right));
            let result = build_audit_config(&dataset, None)
                .and_then(|c| run_comparison(&c, left, right));
            match result {
                Ok(result) => {
                    let delta = &result.delta;
                    if mode == OutputMode::Json {
                        emit_json_success(
                            "OK",
                            "Policy comparison completed.",
                            Some("compare"),
                            AppExit::Success as u8,
                            repair_notes,
                            json!({
                                "output_dir": result.output_dir,
                                "artifact": result.artifact,
                                "left_policy": delta.left_policy,
                                "right_policy": delta.right_policy,
                                "left_revisions": delta.left_revision_count,
                                "right_revisions": delta.right_revision_count,
                                "shared": delta.shared_count,
                                "only_left": delta.count(ChangeClass::OnlyLeft),
                                "only_right": delta.count(ChangeClass::OnlyRight),
                            }),
                        );
                    } else {
                        println!("Compared {left} against {right}");
                        println!("  Flagged by both: {}", delta.shared_count);
                        println!(
                            "  Only {left}: {}",
                            delta.count(ChangeClass::OnlyLeft)
                        );
                        println!(
                            "  Only {right}: {}",
                            delta.count(ChangeClass::OnlyRight)
                        );
                        println!("  Output: {}", result.artifact.display());
                    }
                    AppExit::Success
                }
                Err(e) => Failure::from_audit("compare", &e, audit_suggestions(&dataset))
                    .with_evidence(input_evidence(&dataset))
                    .report(mode, repair_notes),
            }
        }
        Commands::Orders {
            logs,
            items,
            output_dir,
            limit,
        } => {
            let evidence: Vec<PathBuf> = logs.iter().chain(&items).cloned().collect();
            let mut config = OrderAuditConfig::new(logs, items);
            if let Some(dir) = output_dir {
                config = config.with_output_dir(dir);
            }
            if let Some(limit) = limit {
                config = config.with_limit(limit);
            }
            match run_order_audit(&config) {
                Ok(result) => {
                    let stats = &result.stats;
                    if mode == OutputMode::Json {
                        emit_json_success(
                            "OK",
                            "Order audit completed.",
                            Some("orders"),
                            AppExit::Success as u8,
                            repair_notes,
                            json!({
                                "output_dir": result.output_dir,
                                "stats": stats,
                                "artifacts": result.artifacts,
                            }),
                        );
                    } else {
                        println!("Order audit completed");
                        println!("  Items:      {}", stats.items);
                        println!("  Price logs: {}", stats.logs);
                        println!("  Unobserved: {}", stats.unobserved_items);
                        println!("  Flagged:    {}", stats.flagged);
                        println!("  Output:     {}", result.output_dir.display());
                    }
                    AppExit::Success
                }
                Err(e) => {
                    let suggestions = vec![
                        "pricewatch orders --logs <logs.csv> --items <items.csv>".to_string(),
                        "pricewatch orders --help".to_string(),
                    ];
                    Failure::from_audit("orders", &e, suggestions)
                        .with_evidence(evidence)
                        .report(mode, repair_notes)
                }
            }
        }
    }
}
