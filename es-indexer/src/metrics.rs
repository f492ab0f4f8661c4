//! Status metrics of the requests sent to the search cluster
//!
//! Every request is recorded under a topic (usually the target index). The
//! counters live in a private Prometheus registry so that the status endpoint
//! can render them either as a map or in the Prometheus text format.

use std::collections::BTreeMap;
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::core::error::IndexerResult;

const TOPIC_LABEL: &str = "topic";
const STATUS_LABEL: &str = "status";

const OPERATIONS_COUNT: &str = "operations_count";
const ERRORS_COUNT: &str = "errors_count";
const TOTAL_DATA: &str = "total_data";
const TOTAL_TIME: &str = "total_time";
const STATUS_CODES: &str = "requests_by_status";

/// One recorded request
#[derive(Debug, Clone, Default)]
pub struct ArgsAddIndexingData {
    pub status_code: u16,
    pub got_error: bool,
    pub message_len: u64,
    pub topic: String,
    pub duration: Duration,
}

/// Aggregated values of one topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicMetrics {
    pub operations_count: u64,
    pub errors_count: u64,
    pub total_data: u64,
    pub total_time_ms: u64,
    pub status_codes: BTreeMap<String, u64>,
}

/// Request counters keyed by topic
pub struct StatusMetrics {
    registry: Registry,
    operations: IntCounterVec,
    errors: IntCounterVec,
    total_data: IntCounterVec,
    total_time: IntCounterVec,
    status_codes: IntCounterVec,
}

impl StatusMetrics {
    pub fn new() -> IndexerResult<Self> {
        let registry = Registry::new();

        let operations = counter_vec(&registry, OPERATIONS_COUNT, "Number of requests", &[TOPIC_LABEL])?;
        let errors = counter_vec(&registry, ERRORS_COUNT, "Number of failed requests", &[TOPIC_LABEL])?;
        let total_data = counter_vec(&registry, TOTAL_DATA, "Bytes sent", &[TOPIC_LABEL])?;
        let total_time = counter_vec(
            &registry,
            TOTAL_TIME,
            "Time spent in requests, in milliseconds",
            &[TOPIC_LABEL],
        )?;
        let status_codes = counter_vec(
            &registry,
            STATUS_CODES,
            "Requests by response status",
            &[TOPIC_LABEL, STATUS_LABEL],
        )?;

        Ok(Self {
            registry,
            operations,
            errors,
            total_data,
            total_time,
            status_codes,
        })
    }

    /// Record one request
    pub fn add_indexing_data(&self, args: ArgsAddIndexingData) {
        let topic = camel_to_snake_case(&args.topic);
        let labels = [topic.as_str()];

        self.operations.with_label_values(&labels).inc();
        self.total_data.with_label_values(&labels).inc_by(args.message_len);
        self.total_time
            .with_label_values(&labels)
            .inc_by(u64::try_from(args.duration.as_millis()).unwrap_or(u64::MAX));

        if args.got_error || args.status_code >= 400 {
            self.errors.with_label_values(&labels).inc();
        }
        if args.status_code != 0 {
            let status = args.status_code.to_string();
            self.status_codes
                .with_label_values(&[topic.as_str(), status.as_str()])
                .inc();
        }
    }

    /// Snapshot of every topic recorded so far
    pub fn get_metrics(&self) -> BTreeMap<String, TopicMetrics> {
        let mut metrics: BTreeMap<String, TopicMetrics> = BTreeMap::new();

        for family in self.registry.gather() {
            for metric in family.get_metric() {
                let mut topic = None;
                let mut status = None;
                for label in metric.get_label() {
                    match label.get_name() {
                        TOPIC_LABEL => topic = Some(label.get_value().to_string()),
                        STATUS_LABEL => status = Some(label.get_value().to_string()),
                        _ => {}
                    }
                }
                let Some(topic) = topic else {
                    continue;
                };

                let value = metric.get_counter().get_value() as u64;
                let entry = metrics.entry(topic).or_default();
                match family.get_name() {
                    OPERATIONS_COUNT => entry.operations_count = value,
                    ERRORS_COUNT => entry.errors_count = value,
                    TOTAL_DATA => entry.total_data = value,
                    TOTAL_TIME => entry.total_time_ms = value,
                    STATUS_CODES => {
                        if let Some(status) = status {
                            entry.status_codes.insert(status, value);
                        }
                    }
                    _ => {}
                }
            }
        }

        metrics
    }

    /// Metrics rendered in the Prometheus text exposition format
    pub fn get_metrics_prometheus(&self) -> IndexerResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer).map_err(|err| crate::core::IndexerError::Metrics(err.to_string()))
    }
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> IndexerResult<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// `accountsESDT` becomes `accounts_esdt`
pub fn camel_to_snake_case(topic: &str) -> String {
    let chars: Vec<char> = topic.chars().collect();
    let mut snake = String::with_capacity(topic.len() + 4);

    for (index, ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let previous_lower = index > 0 && chars[index - 1].is_lowercase();
            let next_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            let previous_upper = index > 0 && chars[index - 1].is_uppercase();
            if index > 0 && (previous_lower || (previous_upper && next_lower)) {
                snake.push('_');
            }
            snake.extend(ch.to_lowercase());
        } else {
            snake.push(*ch);
        }
    }

    snake
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_to_snake_case() {
        assert_eq!(camel_to_snake_case("accountsESDT"), "accounts_esdt");
        assert_eq!(camel_to_snake_case("accountsESDTHistory"), "accounts_esdt_history");
        assert_eq!(camel_to_snake_case("transactions"), "transactions");
        assert_eq!(camel_to_snake_case("scResults"), "sc_results");
    }

    #[test]
    fn test_add_and_get_metrics() {
        let metrics = StatusMetrics::new().unwrap();
        metrics.add_indexing_data(ArgsAddIndexingData {
            status_code: 200,
            message_len: 100,
            topic: "transactions".to_string(),
            duration: Duration::from_millis(5),
            ..Default::default()
        });
        metrics.add_indexing_data(ArgsAddIndexingData {
            status_code: 429,
            message_len: 50,
            topic: "transactions".to_string(),
            duration: Duration::from_millis(1),
            ..Default::default()
        });
        metrics.add_indexing_data(ArgsAddIndexingData {
            got_error: true,
            topic: "accountsESDT".to_string(),
            ..Default::default()
        });

        let snapshot = metrics.get_metrics();
        let txs = &snapshot["transactions"];
        assert_eq!(txs.operations_count, 2);
        assert_eq!(txs.errors_count, 1);
        assert_eq!(txs.total_data, 150);
        assert_eq!(txs.total_time_ms, 6);
        assert_eq!(txs.status_codes["200"], 1);
        assert_eq!(txs.status_codes["429"], 1);

        let esdt = &snapshot["accounts_esdt"];
        assert_eq!(esdt.operations_count, 1);
        assert_eq!(esdt.errors_count, 1);
        assert!(esdt.status_codes.is_empty());
    }

    #[test]
    fn test_prometheus_rendering() {
        let metrics = StatusMetrics::new().unwrap();
        metrics.add_indexing_data(ArgsAddIndexingData {
            status_code: 200,
            message_len: 10,
            topic: "blocks".to_string(),
            ..Default::default()
        });

        let rendered = metrics.get_metrics_prometheus().unwrap();
        assert!(rendered.contains("operations_count{topic=\"blocks\"} 1"));
        assert!(rendered.contains("total_data{topic=\"blocks\"} 10"));
    }
}
