use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Timelike, Utc};
use tracing::{info, warn};

use gravitalia_db::GraphRepo;

const HOUR: u64 = 3600;

/// Recomputes PageRank and communities at the top of every hour.
pub async fn run_ranking_loop(graph: Arc<dyn GraphRepo>) {
    loop {
        tokio::time::sleep(until_next_hour(Utc::now())).await;

        match refresh(graph.as_ref()).await {
            Ok(()) => info!("Ranking refreshed"),
            Err(e) => warn!("Ranking refresh failed: {:#}", e),
        }
    }
}

async fn refresh(graph: &dyn GraphRepo) -> anyhow::Result<()> {
    graph.refresh_page_rank().await.context("page rank")?;
    graph.refresh_communities().await.context("communities")?;
    Ok(())
}

fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(HOUR - into_hour)
}
