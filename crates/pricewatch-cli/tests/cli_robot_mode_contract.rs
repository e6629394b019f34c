use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

const TS: &str = "Asia/Seoul";

fn run_pricewatch(args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_pricewatch");
    let output = Command::new(bin)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run pricewatch binary");
    let code = output.status.code().unwrap_or(255);
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let stderr = String::from_utf8(output.stderr).expect("stderr utf8");
    (code, stdout, stderr)
}

fn parse_json(stdout: &str) -> Value {
    serde_json::from_str(stdout.trim()).expect("stdout must be valid JSON")
}

fn assert_robot_envelope_shape(value: &Value) {
    let obj = value.as_object().expect("root object");
    for key in [
        "schema_version",
        "ok",
        "code",
        "message",
        "suggestions",
        "exit_code",
    ] {
        assert!(obj.contains_key(key), "envelope missing {key}");
    }
    assert_eq!(value["schema_version"], "pricewatch-cli-robot-v1");
}

fn write_csv(dir: &Path, name: &str, header: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut text = format!("{header}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(&path, text).expect("write fixture");
    path
}

struct Fixture {
    deals: PathBuf,
    options: PathBuf,
    adjustments: PathBuf,
}

fn write_fixture(dir: &Path) -> Fixture {
    let deal = |sno: i64, goods: i64, price: i64, time: &str| {
        format!(
            "{sno},{goods},5,{price}.0,true,1,0,2025-01-01 00:00:00.000 {TS},9999-12-31 23:59:59.000 {TS},c,false,2025-01-07 {time}.000 {TS},2025-01-07"
        )
    };
    let deals = write_csv(
        dir,
        "deal.csv",
        "sno,goods_sno,goods_discount_policy_sno,thumbnail_price,is_enabled,priority,app_type,started_at,ended_at,operation_type,deleted,transaction_time,dt",
        &[
            deal(1, 1001, 14900, "10:00:00"),
            deal(2, 1001, 14910, "11:00:00"),
            deal(3, 1002, 900, "10:00:00"),
        ],
    );
    let options = write_csv(
        dir,
        "option.csv",
        "market_sno,goods_sno,option_sno,consumer_origin,price_origin,total_additional_price,operation_type,deleted,transaction_time,dt",
        &[format!(
            "1,1001,7,43000,14900,0,c,false,2025-01-07 09:00:00.000 {TS},2025-01-07"
        )],
    );
    let adjustments = write_csv(
        dir,
        "adjustment.csv",
        "market_sno,goods_sno,discount_type,discount_rate,discount_price,started_at,ended_at,operation_type,deleted,transaction_time,dt",
        &[format!(
            "1,1001,1,,28100,2025-01-07 00:00:00.000 {TS},2025-01-07 23:00:00.000 {TS},c,false,2025-01-07 09:30:00.000 {TS},2025-01-07"
        )],
    );
    Fixture {
        deals,
        options,
        adjustments,
    }
}

fn s(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn no_args_emits_quick_help_envelope_when_piped() {
    let (code, stdout, _) = run_pricewatch(&[]);
    assert_eq!(code, 0);
    let json = parse_json(&stdout);
    assert_robot_envelope_shape(&json);
    assert_eq!(json["command"], "help");
    assert!(json["data"]["quick_help"]
        .as_str()
        .expect("quick help")
        .contains("pricewatch"));
}

#[test]
fn audit_json_reports_summary_and_artifacts() {
    let dir = tempdir().expect("tempdir");
    let fx = write_fixture(dir.path());
    let out = dir.path().join("out");
    let (code, stdout, _) = run_pricewatch(&[
        "--json",
        "audit",
        "--deals",
        s(&fx.deals),
        "--options",
        s(&fx.options),
        "--adjustments",
        s(&fx.adjustments),
        "--output-dir",
        s(&out),
    ]);
    assert_eq!(code, 0, "stdout: {stdout}");
    let json = parse_json(&stdout);
    assert_robot_envelope_shape(&json);
    assert_eq!(json["ok"], true);
    assert_eq!(json["command"], "audit");
    assert_eq!(json["data"]["summary"]["revisions"], 2);
    assert_eq!(json["data"]["summary"]["policy"], "candidates");
    assert!(out.join("revisions.csv").exists());
    assert!(out.join("revisions.hash").exists());
}

#[test]
fn fail_on_revisions_sets_exit_code() {
    let dir = tempdir().expect("tempdir");
    let fx = write_fixture(dir.path());
    let out = dir.path().join("out");
    let (code, stdout, _) = run_pricewatch(&[
        "--json",
        "audit",
        "--deals",
        s(&fx.deals),
        "--options",
        s(&fx.options),
        "--adjustments",
        s(&fx.adjustments),
        "--output_dir",
        s(&out),
        "--fail_on_revisions",
    ]);
    assert_eq!(code, 5);
    let json = parse_json(&stdout);
    assert_eq!(json["code"], "REVISIONS_FOUND");
    assert_eq!(json["exit_code"], 5);
    assert_eq!(json["notes"].as_array().expect("notes").len(), 2);
}

#[test]
fn missing_input_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let absent = dir.path().join("absent.csv");
    let (code, stdout, _) = run_pricewatch(&["--json", "audit", "--deals", s(&absent)]);
    assert_eq!(code, 1);
    let json = parse_json(&stdout);
    assert_robot_envelope_shape(&json);
    assert_eq!(json["ok"], false);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[test]
fn audit_without_deals_is_invalid_args() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let (code, stdout, _) = run_pricewatch(&["--json", "audit", "--output-dir", s(&out)]);
    assert_eq!(code, 2);
    assert_eq!(parse_json(&stdout)["code"], "INVALID_ARGS");
}

#[test]
fn unknown_subcommand_is_invalid_args() {
    let (code, stdout, _) = run_pricewatch(&["--json", "reprice"]);
    assert_eq!(code, 2);
    let json = parse_json(&stdout);
    assert_robot_envelope_shape(&json);
    assert_eq!(json["message"], "Unknown subcommand.");
}

#[test]
fn ingested_cache_audits_like_csv() {
    let dir = tempdir().expect("tempdir");
    let fx = write_fixture(dir.path());
    let cache = dir.path().join("cache").join("deal.bin");

    let (code, stdout, _) = run_pricewatch(&[
        "--json",
        "ingest",
        "deal",
        s(&fx.deals),
        "--output",
        s(&cache),
    ]);
    assert_eq!(code, 0, "stdout: {stdout}");
    let json = parse_json(&stdout);
    assert_eq!(json["data"]["records"], 3);
    assert_eq!(json["data"]["entities"], 2);

    let hash_of = |deals: &Path, out: &str| {
        let out = dir.path().join(out);
        let (code, stdout, _) = run_pricewatch(&[
            "--json",
            "audit",
            "--deals",
            s(deals),
            "--options",
            s(&fx.options),
            "--adjustments",
            s(&fx.adjustments),
            "--output-dir",
            s(&out),
        ]);
        assert_eq!(code, 0);
        parse_json(&stdout)["data"]["summary"]["revision_hash"].clone()
    };
    assert_eq!(hash_of(&fx.deals, "csv"), hash_of(&cache, "bin"));
}

#[test]
fn compare_json_counts_sides() {
    let dir = tempdir().expect("tempdir");
    let fx = write_fixture(dir.path());
    let out = dir.path().join("out");
    let (code, stdout, _) = run_pricewatch(&[
        "--json",
        "compare",
        "--deals",
        s(&fx.deals),
        "--options",
        s(&fx.options),
        "--adjustments",
        s(&fx.adjustments),
        "--output-dir",
        s(&out),
    ]);
    assert_eq!(code, 0, "stdout: {stdout}");
    let json = parse_json(&stdout);
    assert_eq!(json["data"]["left_policy"], "candidates");
    assert_eq!(json["data"]["right_policy"], "discount-window");
    assert!(out.join("delta.json").exists());
}

#[test]
fn human_mode_prints_text_summary() {
    let dir = tempdir().expect("tempdir");
    let fx = write_fixture(dir.path());
    let out = dir.path().join("out");
    let (code, stdout, _) = run_pricewatch(&[
        "--human",
        "audit",
        "--deals",
        s(&fx.deals),
        "--output-dir",
        s(&out),
    ]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("Audit completed (candidates policy)"));
    assert!(stdout.contains("Hash:"));
}
