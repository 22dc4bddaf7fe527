use std::collections::{BTreeMap, HashSet};
use std::io::{stderr, stdout, BufWriter};
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, Writer};
use envconfig::Envconfig;
use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use fraud_pipeline::collaborators::{InMemoryQueue, InMemoryWarehouse, TableRef};
use fraud_pipeline::config::PipelineConfig;
use fraud_pipeline::models::{RawTransaction, ScoredTransaction};
use fraud_pipeline::pipeline::{BatchProcessor, PipelineCoordinator, SinkWriter};
use fraud_pipeline::rules::RuleEngine;
use fraud_pipeline::scheduler::Scheduler;
use fraud_pipeline::storage::WarehouseWatermarkStore;
use fraud_pipeline::types::Step;

const OUTPUT_HEADER: [&str; 10] = [
    "step", "type", "amount", "nameOrig", "oldbalanceOrg", "newbalanceOrig",
    "nameDest", "oldbalanceDest", "newbalanceDest", "detected_fraud"
];

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: fraud-pipeline [input].csv [log_level:optional] > [output].csv");
        eprintln!("Available log levels: error, warn, info, debug, trace (default: error)");
        eprintln!("Rows are processed in ascending step order, MAX_BATCH grows to fit the largest step");
        exit(1);
    }

    let path = &args[1];
    let log_level = args.get(2)
        .map(|s| parse_log_level(s)).unwrap_or(LevelFilter::ERROR);

    setup_logging(log_level);

    let mut config = PipelineConfig::init_from_env()?;
    config.validate()?;

    let rounds = read_csv_rounds(path, config.max_batch)?;
    let largest_round = rounds.iter().map(Vec::len).max().unwrap_or(0);

    //NOTE: A step must never span two pulls, otherwise its later rows are acknowledged as already committed
    if largest_round > config.max_batch {
        warn!("A single step holds [{largest_round}] rows, widening the batch from [{}] to keep it in one pull", config.max_batch);
        config.max_batch = largest_round;
    }

    //NOTE: The queue and warehouse are in-memory stand-ins, the CSV rows play the role of the upstream publisher
    let queue = Arc::new(InMemoryQueue::new(&config.subscription));
    let warehouse = Arc::new(InMemoryWarehouse::new());

    let mut scheduler = create_scheduler(&config, queue.clone(), warehouse.clone());

    let timer = Instant::now();
    let mut published = 0;
    let mut duplicates = 0;

    for round in rounds {
        published += round.len();

        for payload in round {
            queue.publish(payload);
        }

        loop {
            let report = scheduler.run_once().await?;
            duplicates += report.duplicates;

            if report.pulled == 0 {
                break;
            }
        }
    }

    let duration = timer.elapsed();
    info!("Processed [{published}] transactions from [{path}] in: {duration:?}");

    if duplicates > 0 {
        warn!("Acknowledged [{duplicates}] transactions at or below the committed watermark without scoring them");
    }

    write_results_to_stdout(&warehouse, &config.target_table())?;

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}

fn setup_logging(level: LevelFilter) {
    //NOTE: Because we are doing stdout redirection, we will need to utilize stderr to display logging
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn create_scheduler(config: &PipelineConfig, queue: Arc<InMemoryQueue>, warehouse: Arc<InMemoryWarehouse>) -> Scheduler {
    let store = Arc::new(WarehouseWatermarkStore::new(warehouse.clone(), config.watermark_table()));
    let processor = BatchProcessor::new(queue, RuleEngine::new(), config.max_batch);
    let sink = SinkWriter::new(warehouse, config.target_table())
        .with_dead_letter_table(config.dead_letter_table());
    let coordinator = PipelineCoordinator::new(store, processor, sink, config.cycle_deadline());

    Scheduler::new(coordinator, config)
}

/// Reads every CSV row as one JSON message, keeping all values as strings.
///
/// Messages are grouped by step in ascending order and packed into publish rounds
/// of at most `max_batch` messages. A step is never split across rounds, so a round
/// only exceeds `max_batch` when a single step does. Rows without a readable step
/// go in the first round, where they are dead-lettered.
fn read_csv_rounds(path: &str, max_batch: usize) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Error opening CSV at path: {path}"))?;

    let headers = reader.headers()?.clone();
    let mut unreadable = Vec::new();
    let mut steps: BTreeMap<Step, Vec<String>> = BTreeMap::new();

    for result in reader.records() {
        match result {
            Ok(record) => {
                let payload: Map<String, Value> = headers.iter()
                    .zip(record.iter())
                    .map(|(header, field)| (header.to_string(), Value::String(field.to_string())))
                    .collect();
                let payload = Value::Object(payload).to_string();

                match RawTransaction::decode(payload.as_bytes()) {
                    Ok(raw) => steps.entry(raw.step).or_default().push(payload),
                    Err(_) => unreadable.push(payload)
                }
            }
            Err(error) => {
                error!("CSV deserialization error: {error}");
            }
        }
    }

    let mut rounds = Vec::new();
    let mut round = unreadable;

    for (_, group) in steps {
        if !round.is_empty() && round.len() + group.len() > max_batch {
            rounds.push(std::mem::take(&mut round));
        }

        round.extend(group);
    }

    if !round.is_empty() {
        rounds.push(round);
    }

    Ok(rounds)
}

/// Writes committed rows, collapsing re-committed duplicates by their dedup key.
fn write_results_to_stdout(warehouse: &InMemoryWarehouse, table: &TableRef) -> Result<()> {
    let mut output = Writer::from_writer(BufWriter::new(stdout().lock()));
    let mut seen = HashSet::new();

    output.write_record(OUTPUT_HEADER)?;

    for row in warehouse.rows(table) {
        let scored: ScoredTransaction = serde_json::from_value(row)?;
        let transaction = &scored.transaction;

        if !seen.insert(transaction.dedup_key()) {
            continue;
        }

        output.write_record([
            transaction.step.to_string(),
            transaction.transaction_type.as_str().to_string(),
            transaction.amount.to_string(),
            transaction.origin_account.clone().unwrap_or_default(),
            transaction.old_balance_origin.to_string(),
            transaction.new_balance_origin.to_string(),
            transaction.destination_account.clone().unwrap_or_default(),
            transaction.old_balance_destination.to_string(),
            transaction.new_balance_destination.to_string(),
            scored.detected_fraud.to_string()
        ])?;
    }

    output.flush()?;

    Ok(())
}
