use statistical::mean;

use crate::models::Request;

/// Rollup over one request set. Averages are in milliseconds and only
/// consider successful requests; with none they are 0.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stats {
    pub(crate) total: usize,
    pub(crate) success_count: usize,
    pub(crate) error_count: usize,
    pub(crate) avg_total_time: f64,
    pub(crate) avg_dns_time: f64,
    pub(crate) avg_tcp_time: f64,
    pub(crate) avg_tls_time: f64,
}

impl Stats {
    pub(crate) fn from_requests(requests: &[Request]) -> Self {
        let successful: Vec<&Request> = requests.iter().filter(|r| r.is_success()).collect();
        let average = |metric: fn(&Request) -> u64| -> f64 {
            if successful.is_empty() {
                return 0.0;
            }
            let samples: Vec<f64> = successful.iter().map(|r| metric(r) as f64).collect();
            mean(&samples)
        };

        Stats {
            total: requests.len(),
            success_count: successful.len(),
            error_count: requests.len() - successful.len(),
            avg_total_time: average(|r| r.total_time),
            avg_dns_time: average(|r| r.dns_time),
            avg_tcp_time: average(|r| r.tcp_time),
            avg_tls_time: average(|r| r.tls_time),
        }
    }

    /// Percentage of successful requests; an empty set reads as fully healthy.
    pub(crate) fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.success_count as f64 / self.total as f64 * 100.0
    }

    pub(crate) fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.total as f64 * 100.0
    }
}
