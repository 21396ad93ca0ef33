use chrono::Local;

use crate::models::Request;

pub(crate) const CHART_WINDOW: usize = 20;

/// Parallel per-metric series over the most recent requests, oldest first.
/// Every array has the same length; failed probes are `None` in all metrics.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ChartWindow {
    pub(crate) labels: Vec<String>,
    pub(crate) total: Vec<Option<u64>>,
    pub(crate) dns: Vec<Option<u64>>,
    pub(crate) tcp: Vec<Option<u64>>,
    pub(crate) tls: Vec<Option<u64>>,
}

impl ChartWindow {
    pub(crate) fn build(requests: &[Request], window: usize) -> Self {
        let mut ordered: Vec<&Request> = requests.iter().collect();
        ordered.sort_by_key(|r| r.start_time);
        let tail = &ordered[ordered.len().saturating_sub(window)..];

        let mut chart = ChartWindow::default();
        for r in tail {
            chart.labels.push(
                r.start_time
                    .with_timezone(&Local)
                    .format("%H:%M:%S")
                    .to_string(),
            );
            let metric = |value: u64| r.is_success().then_some(value);
            chart.total.push(metric(r.total_time));
            chart.dns.push(metric(r.dns_time));
            chart.tcp.push(metric(r.tcp_time));
            chart.tls.push(metric(r.tls_time));
        }
        chart
    }

    pub(crate) fn len(&self) -> usize {
        self.labels.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
