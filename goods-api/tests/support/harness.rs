//! In-process service harness shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use goods_api::{App, Backends, FlushPolicy, ServiceConfig};
use goods_test_utils::fixtures::sequential_goods;
use goods_test_utils::{
    FanoutBus, GoodsResult, InMemoryAnalyticsStore, InMemoryGoodsStore, InMemorySnapshotCache,
};

/// A started [`App`] plus typed handles on its in-memory backends.
pub struct Harness {
    pub app: App,
    pub store: Arc<InMemoryGoodsStore>,
    pub cache: Arc<InMemorySnapshotCache>,
    pub bus: Arc<FanoutBus>,
    pub analytics: Arc<InMemoryAnalyticsStore>,
}

pub fn config(batch_size: usize, flush_policy: FlushPolicy) -> ServiceConfig {
    ServiceConfig {
        log_batch_size: batch_size,
        flush_policy,
        ..ServiceConfig::in_memory()
    }
}

/// Start an app over `seed` goods in project 1. Needs a Tokio runtime.
pub fn start(seed: i64, config: &ServiceConfig) -> GoodsResult<Harness> {
    let store = Arc::new(InMemoryGoodsStore::new());
    store.seed(sequential_goods(seed, 1))?;
    let cache = Arc::new(InMemorySnapshotCache::new(config.cache_ttl));
    let bus = Arc::new(FanoutBus::new(config.bus_capacity));
    let analytics = Arc::new(InMemoryAnalyticsStore::new());

    let backends = Backends {
        relational: store.clone(),
        cache: cache.clone(),
        bus: bus.clone(),
        analytics: analytics.clone(),
    };
    let app = App::start(backends, config).expect("app should start");

    Ok(Harness {
        app,
        store,
        cache,
        bus,
        analytics,
    })
}

/// Poll `condition` for up to two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
