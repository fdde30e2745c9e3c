pub fn ordering_key_paused(topic: &str, ordering_key: &str) {
    tracing::warn!(
        topic,
        ordering_key,
        "Publish failed for ordering key, pausing until resumed."
    );
}

pub fn ordering_key_resumed(topic: &str, ordering_key: &str) {
    tracing::info!(topic, ordering_key, "Resumed publishing for ordering key.");
}

pub fn commit_timer_fired(sequencers: usize) {
    tracing::trace!(sequencers, "Commit timer elapsed, committing open batches.");
}

pub fn stopping(sequencers: usize) {
    tracing::info!(sequencers, "Stopping publisher, committing remaining batches.");
}
