use clap::Parser;

#[derive(Debug, Clone, Parser)]
pub struct Args {
    /// The number of messages to publish
    #[arg(long, default_value_t = 1_000_000)]
    pub num_of_messages: u64,

    /// The number of tasks publishing concurrently
    #[arg(long, default_value_t = 10)]
    pub num_of_tasks: u64,

    /// Size (in bytes) of the message payload
    #[arg(long, default_value_t = 32)]
    pub message_size: u64,

    /// The maximum number of messages in a batch
    #[arg(long, default_value_t = 1_000)]
    pub max_messages: usize,

    /// The maximum latency (in milliseconds) before an open batch is committed
    #[arg(long, default_value_t = 10)]
    pub max_latency_ms: u64,

    /// Simulated round trip time (in milliseconds) of a single publish request
    #[arg(long, default_value_t = 1)]
    pub transport_latency_ms: u64,

    /// Gives each publishing task its own ordering key
    #[arg(long)]
    pub enable_ordering: bool,
}
