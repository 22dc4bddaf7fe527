use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Output};

use anyhow::{anyhow, Result};
use tempfile::NamedTempFile;

const INPUT_HEADER: &str = "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud";

fn create_temporary_csv(rows: &[&str]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "{INPUT_HEADER}")?;

    for row in rows {
        writeln!(file, "{row}")?;
    }

    Ok(file)
}

fn run_cli(file: &NamedTempFile, environment: &[(&str, &str)]) -> Result<Output> {
    let binary_path = env!("CARGO_BIN_EXE_fraud-pipeline");

    Ok(Command::new(binary_path)
        .arg(file.path())
        .envs(environment.iter().copied())
        .output()?)
}

fn parse_output(output: &Output) -> Result<HashMap<String, Vec<String>>> {
    let stdout = String::from_utf8(output.stdout.clone())?;
    let mut lines = stdout.lines();

    assert_eq!(lines.next(), Some("step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,detected_fraud"));

    Ok(lines.map(|line| {
        let fields: Vec<String> = line.split(',').map(str::to_string).collect();
        (fields[0].clone(), fields)
    })
    .collect())
}

#[test]
fn test_cli_scores_and_outputs_every_transaction() -> Result<()> {
    let file = create_temporary_csv(&[
        "1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,M1979787155,0.0,0.0,0,0",
        "2,TRANSFER,181.0,C1305486145,181.0,0.0,C553264065,0.0,0.0,1,0",
        "3,TRANSFER,250000.00,C840083671,300000.00,50000.00,C38997010,21182.0,0.0,0,0",
        "4,CASH_IN,500.0,C1666544295,1000.0,1500.0,C2083562754,0.0,0.0,0,0"
    ])?;

    let output = run_cli(&file, &[])?;

    assert!(output.status.success());

    let rows = parse_output(&output)?;

    assert_eq!(rows.len(), 4);

    let flag = |step: &str| -> Result<String> {
        rows.get(step).map(|fields| fields[9].clone()).ok_or_else(|| anyhow!("step {step} missing from output"))
    };

    assert_eq!(flag("1")?, "false");
    assert_eq!(flag("2")?, "true");
    assert_eq!(flag("3")?, "true");
    assert_eq!(flag("4")?, "true");

    Ok(())
}

#[test]
fn test_cli_excludes_malformed_rows() -> Result<()> {
    let file = create_temporary_csv(&[
        "1,PAYMENT,10.0,C1,100.0,90.0,M1,0.0,0.0,0,0",
        "2,TRANSFER,not_a_number,C2,100.0,90.0,C3,0.0,0.0,0,0",
        "3,PAYMENT,10.0,C4,100.0,90.0,M2,0.0,0.0,0,0"
    ])?;

    let output = run_cli(&file, &[])?;

    assert!(output.status.success());

    let rows = parse_output(&output)?;

    assert_eq!(rows.len(), 2);
    assert!(rows.contains_key("1"));
    assert!(rows.contains_key("3"));
    assert!(!rows.contains_key("2"));

    Ok(())
}

#[test]
fn test_cli_drains_queue_across_several_cycles() -> Result<()> {
    let rows: Vec<String> = (1..=7)
        .map(|step| format!("{step},PAYMENT,10.0,C{step},100.0,90.0,M{step},0.0,0.0,0,0"))
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    let file = create_temporary_csv(&rows)?;

    let output = run_cli(&file, &[("MAX_BATCH", "2")])?;

    assert!(output.status.success());
    assert_eq!(parse_output(&output)?.len(), 7);

    Ok(())
}

#[test]
fn test_cli_keeps_rows_sharing_a_step_larger_than_the_batch() -> Result<()> {
    let file = create_temporary_csv(&[
        "1,PAYMENT,10.0,C1,100.0,90.0,M1,0.0,0.0,0,0",
        "1,PAYMENT,10.0,C2,100.0,90.0,M2,0.0,0.0,0,0",
        "1,PAYMENT,10.0,C3,100.0,90.0,M3,0.0,0.0,0,0",
        "2,PAYMENT,10.0,C4,100.0,90.0,M4,0.0,0.0,0,0"
    ])?;

    let output = run_cli(&file, &[("MAX_BATCH", "2")])?;

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let origins: Vec<&str> = stdout.lines()
        .skip(1)
        .filter_map(|line| line.split(',').nth(3))
        .collect();

    assert_eq!(origins.len(), 4);

    for origin in ["C1", "C2", "C3", "C4"] {
        assert!(origins.contains(&origin), "{origin} missing from output");
    }

    Ok(())
}

#[test]
fn test_cli_processes_out_of_order_steps() -> Result<()> {
    let file = create_temporary_csv(&[
        "3,PAYMENT,10.0,C3,100.0,90.0,M3,0.0,0.0,0,0",
        "1,PAYMENT,10.0,C1,100.0,90.0,M1,0.0,0.0,0,0",
        "2,PAYMENT,10.0,C2,100.0,90.0,M2,0.0,0.0,0,0"
    ])?;

    let output = run_cli(&file, &[("MAX_BATCH", "1")])?;

    assert!(output.status.success());
    assert_eq!(parse_output(&output)?.len(), 3);

    Ok(())
}

#[test]
fn test_cli_fails_for_missing_input() -> Result<()> {
    let binary_path = env!("CARGO_BIN_EXE_fraud-pipeline");

    let output = Command::new(binary_path)
        .arg("missing.csv")
        .output()?;

    assert!(!output.status.success());

    Ok(())
}

#[test]
fn test_cli_rejects_invalid_configuration() -> Result<()> {
    let file = create_temporary_csv(&["1,PAYMENT,10.0,C1,100.0,90.0,M1,0.0,0.0,0,0"])?;

    let output = run_cli(&file, &[("MAX_BATCH", "0")])?;

    assert!(!output.status.success());

    Ok(())
}
