use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use balagh_conversation::store::ConversationStore;

/// Background task that drops conversations nobody has touched for `max_idle`.
pub async fn run_eviction_loop(
    store: Arc<dyn ConversationStore>,
    max_idle: Duration,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let evicted = store.evict_idle(max_idle).await;
        if evicted > 0 {
            info!("Cleanup: evicted {} idle conversations", evicted);
        }
    }
}
