use crate::args::Args;
use num_format::{Locale, ToFormattedString};
use std::{fmt::Display, time::Duration};

#[derive(Debug)]
pub struct BenchmarkResults {
    duration: Duration,
    args: Args,
    published: u64,
    requests: u64,
    total_mb_published: f64,
    avg_throughput: f64,
    avg_batch_size: f64,
}

impl BenchmarkResults {
    pub fn calculate(duration: Duration, published: u64, requests: u64, args: Args) -> Self {
        let total_bytes_published = published * args.message_size;
        let total_mb_published = total_bytes_published as f64 / 1024.0 / 1024.0;
        let avg_throughput = published as f64 / duration.as_secs_f64();
        let avg_batch_size = published as f64 / requests.max(1) as f64;

        Self {
            duration,
            args,
            published,
            requests,
            total_mb_published,
            avg_throughput,
            avg_batch_size,
        }
    }
}

impl Display for BenchmarkResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let duration = format!("{:.4} Secs", self.duration.as_secs_f64());
        let total_published = format!("{:.2} MB", self.total_mb_published);
        let avg_throughput = format!("{:.0} msg/s", self.avg_throughput);
        let avg_batch_size = format!("{:.2} msgs", self.avg_batch_size);

        let summary = format!(
            "
Benchmark Results
---------------------
Number of Messages: {}
Number of Tasks: {}
Number of Requests: {}
Ordering Enabled: {}",
            self.published.to_formatted_string(&Locale::en),
            self.args.num_of_tasks.to_formatted_string(&Locale::en),
            self.requests.to_formatted_string(&Locale::en),
            self.args.enable_ordering,
        );

        let header = format!(
            "| {: <20} | {: <20} | {: <20} | {: <20} |",
            "Duration", "Total Published", "Avg. Throughput", "Avg. Batch Size"
        );

        let body = format!(
            "| {: <20} | {: <20} | {: <20} | {: <20} |",
            duration, total_published, avg_throughput, avg_batch_size
        );

        write!(f, "{summary}\n\n{header}\n{body}\n")
    }
}
