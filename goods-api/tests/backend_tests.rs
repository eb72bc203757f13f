//! Backend selection from configuration.

use goods_api::{App, Backends, CacheBackend, ServiceConfig, StoreBackend};
use goods_storage::CacheStore;
use goods_test_utils::{GoodsResult, Pagination};

#[tokio::test]
async fn lmdb_cache_serves_second_read() -> GoodsResult<()> {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config = ServiceConfig {
        cache_backend: CacheBackend::Lmdb,
        cache_path: temp_dir.path().join("snapshot"),
        cache_max_mb: 8,
        store_backend: StoreBackend::Memory,
        ..ServiceConfig::default()
    };

    let backends = Backends::from_config(&config).expect("backends should open");
    let cache = backends.cache.clone();
    let app = App::start(backends, &config).expect("app should start");
    let service = app.service();

    let good = service.create_good(1, "cached").await?;
    service.goods(Pagination::default()).await?;

    let mut hit = None;
    for _ in 0..400 {
        if let Ok(page) = cache.get(Pagination::default()).await {
            hit = Some(page);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let page = hit.expect("snapshot should be refilled into LMDB");
    assert_eq!(page.goods, vec![good]);

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn memory_backends_start_empty() -> GoodsResult<()> {
    let config = ServiceConfig::in_memory();
    let app = App::start(Backends::from_config(&config).expect("backends"), &config)
        .expect("app should start");

    let page = app.service().goods(Pagination::default()).await?;
    assert_eq!(page.meta.total, 0);
    assert!(page.goods.is_empty());

    app.shutdown().await;
    Ok(())
}
