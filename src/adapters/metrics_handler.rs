use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::adapters::synthesis_cache::CacheStats;
use crate::adapters::synthesizer::Synthesizer;

pub struct MetricsCollector {
    registry: Registry,

    // Request metrics
    pub requests_total: CounterVec,
    pub request_duration: HistogramVec,
    pub requests_in_flight: Gauge,

    // Scenario metrics
    pub injected_errors: CounterVec,

    // Synthesis metrics
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub cache_evictions: Counter,
    pub generated_values: Counter,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Request metrics
        let requests_total = CounterVec::new(
            Opts::new("schemock_requests_total", "Total number of requests"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("schemock_request_duration_seconds", "Request duration in seconds"),
            &["method", "route"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let requests_in_flight = Gauge::new(
            "schemock_requests_in_flight",
            "Number of requests currently being processed",
        )?;
        registry.register(Box::new(requests_in_flight.clone()))?;

        let injected_errors = CounterVec::new(
            Opts::new("schemock_injected_errors_total", "Failures injected by the scenario policy"),
            &["status"],
        )?;
        registry.register(Box::new(injected_errors.clone()))?;

        // Synthesis metrics
        let cache_hits = Counter::new("schemock_cache_hits_total", "Total synthesis cache hits")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = Counter::new("schemock_cache_misses_total", "Total synthesis cache misses")?;
        registry.register(Box::new(cache_misses.clone()))?;

        let cache_evictions = Counter::new(
            "schemock_cache_evictions_total",
            "Synthesis cache entries dropped for capacity or age",
        )?;
        registry.register(Box::new(cache_evictions.clone()))?;

        let generated_values = Counter::new(
            "schemock_generated_values_total",
            "Values produced by raw synthesis",
        )?;
        registry.register(Box::new(generated_values.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            requests_in_flight,
            injected_errors,
            cache_hits,
            cache_misses,
            cache_evictions,
            generated_values,
        })
    }

    /// Bring the synthesis counters up to the engine's running totals
    pub fn sync_synthesis(&self, cache: Option<&CacheStats>, generated: u64) {
        if let Some(stats) = cache {
            catch_up(&self.cache_hits, stats.hits);
            catch_up(&self.cache_misses, stats.misses);
            catch_up(&self.cache_evictions, stats.evictions);
        }
        catch_up(&self.generated_values, generated);
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn catch_up(counter: &Counter, total: u64) {
    let delta = total as f64 - counter.get();
    if delta > 0.0 {
        counter.inc_by(delta);
    }
}

pub struct MetricsHandler {
    collector: Arc<MetricsCollector>,
    synthesizer: Arc<Synthesizer>,
}

impl MetricsHandler {
    pub fn new(collector: Arc<MetricsCollector>, synthesizer: Arc<Synthesizer>) -> Self {
        Self {
            collector,
            synthesizer,
        }
    }

    pub async fn metrics(&self) -> String {
        let stats = self.synthesizer.cache().map(|cache| cache.stats());
        self.collector
            .sync_synthesis(stats.as_ref(), self.synthesizer.generated_count());
        self.collector.encode().unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::from("# Error encoding metrics\n")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        assert!(collector.is_ok());
    }

    #[test]
    fn test_metrics_encoding() {
        let collector = MetricsCollector::new().unwrap();

        collector.requests_total.with_label_values(&["GET", "/api/items", "200"]).inc();
        collector.injected_errors.with_label_values(&["503"]).inc();

        let metrics_text = collector.encode().unwrap();
        assert!(metrics_text.contains("schemock_requests_total"));
        assert!(metrics_text.contains("schemock_injected_errors_total"));
    }

    #[test]
    fn test_sync_synthesis_is_monotonic() {
        let collector = MetricsCollector::new().unwrap();
        let stats = CacheStats {
            hits: 4,
            misses: 2,
            ..CacheStats::default()
        };
        collector.sync_synthesis(Some(&stats), 6);
        collector.sync_synthesis(Some(&stats), 6);
        assert_eq!(collector.cache_hits.get(), 4.0);
        assert_eq!(collector.cache_misses.get(), 2.0);
        assert_eq!(collector.generated_values.get(), 6.0);
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        let synthesizer = Arc::new(Synthesizer::seeded(1));
        synthesizer
            .generate(&serde_json::json!({"type": "string"}), &Default::default())
            .unwrap();
        let handler = MetricsHandler::new(collector.clone(), synthesizer);

        let metrics = handler.metrics().await;
        assert!(metrics.contains("schemock_generated_values_total 1"));
    }
}
