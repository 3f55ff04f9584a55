// Integration tests for the daily statistics windows and the retry gate

mod common;

use chrono::{Duration, Offset};
use rust_decimal::Decimal;
use std::sync::Arc;

use common::*;
use ibc_relayer_stats::statistics::{RelayerRegistrar, StatisticsWindowRunner};
use ibc_relayer_stats::types::{BaseDenomInfo, Segment, TxStatus};
use ibc_relayer_stats::{EngineConfig, EngineMetrics, MemoryStore};

async fn seeded_store() -> Arc<MemoryStore> {
    let store = store_with_chains(&["chainA", "chainB"]).await;
    let now = test_now().timestamp();
    store.add_transfer(transfer("addrX", TxStatus::Success, "100", now - 60)).await;
    store.add_transfer(transfer("addrX", TxStatus::Failed, "50", now - 30)).await;
    store
        .add_price(
            BaseDenomInfo {
                denom: "uatom".to_string(),
                chain_id: "chainA".to_string(),
                coin_id: "cosmos".to_string(),
                scale: 6,
            },
            Decimal::ONE,
        )
        .await;
    store
}

fn window_runner(store: &Arc<MemoryStore>) -> StatisticsWindowRunner {
    let metrics = Arc::new(EngineMetrics::new().unwrap());
    StatisticsWindowRunner::new(
        store.clone(),
        store.clone(),
        RelayerRegistrar::new(store.clone(), metrics.clone()),
        metrics,
    )
}

#[tokio::test]
async fn test_end_to_end_single_path() {
    let store = seeded_store().await;
    let engine = orchestrator(EngineConfig::default(), store.clone(), Arc::new(ScriptedRemote::new()));

    let report = engine.run_at(test_now()).await.unwrap();
    assert_eq!(report.windows_run.len(), 2);
    assert_eq!(report.relayers_registered, 1);

    let records = store.statistics();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.address, "addrX");
    assert_eq!(record.statistic_key, "chainA|ch-1|chainB|ch-2");
    assert_eq!(record.total_txs, 2);
    assert_eq!(record.success_total_txs, 1);

    let json = serde_json::to_value(record).unwrap();
    assert_eq!(json["transfer_amount"], "150");

    let relayers = store.relayers().await;
    assert_eq!(relayers.len(), 1);
    assert_eq!(relayers[0].totals.total_txs, 2);
    assert_eq!(relayers[0].totals.transfer_value, Decimal::new(15, 5));
}

#[tokio::test]
async fn test_window_rerun_is_idempotent() {
    let store = seeded_store().await;
    let runner = window_runner(&store);
    let today = Segment::today(test_now(), chrono::Utc.fix());

    let first = runner.run(today, 1_000).await.unwrap();
    let snapshot: Vec<_> = store
        .statistics()
        .into_iter()
        .map(|r| (r.key(), r.total_txs, r.success_total_txs, r.transfer_amount, r.create_at))
        .collect();

    let second = runner.run(today, 2_000).await.unwrap();
    let again: Vec<_> = store
        .statistics()
        .into_iter()
        .map(|r| (r.key(), r.total_txs, r.success_total_txs, r.transfer_amount, r.create_at))
        .collect();

    assert_eq!(first.inserted, 1);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 1);
    assert_eq!(snapshot, again);
    assert!(store.statistics().iter().all(|r| r.update_at == 2_000));
    assert_eq!(store.relayers().await.len(), 1);
}

#[tokio::test]
async fn test_new_transactions_replace_rather_than_add() {
    let store = seeded_store().await;
    let runner = window_runner(&store);
    let today = Segment::today(test_now(), chrono::Utc.fix());

    runner.run(today, 0).await.unwrap();
    store
        .add_transfer(transfer("addrX", TxStatus::Success, "25", test_now().timestamp() - 10))
        .await;
    runner.run(today, 0).await.unwrap();

    let record = &store.statistics()[0];
    assert_eq!(record.total_txs, 3);
    assert_eq!(record.success_total_txs, 2);
    assert_eq!(record.transfer_amount, 175);
}

#[tokio::test]
async fn test_yesterday_recomputed_at_most_threshold_plus_one_times() {
    let store = seeded_store().await;
    let mut config = EngineConfig::default();
    config.stats.yesterday_retry_threshold = 2;
    let engine = orchestrator(config, store.clone(), Arc::new(ScriptedRemote::new()));

    let mut yesterday_runs = 0;
    for minute in 0..6 {
        let now = test_now() + Duration::minutes(minute * 3);
        let report = engine.run_at(now).await.unwrap();
        if !report.yesterday_skipped {
            yesterday_runs += 1;
            assert_eq!(report.windows_run.len(), 2);
        } else {
            assert_eq!(report.windows_run.len(), 1);
        }
    }
    assert_eq!(yesterday_runs, 3);
    assert_eq!(store.retry_counter("ibc_relayer_task", "2024-03-10"), 3);

    // the counter is scoped by day
    let tomorrow = engine.run_at(test_now() + Duration::days(1)).await.unwrap();
    assert!(!tomorrow.yesterday_skipped);
    assert_eq!(tomorrow.yesterday_confirmations, Some(1));
}

#[tokio::test]
async fn test_yesterday_transfers_land_in_yesterday_segment() {
    let store = store_with_chains(&["chainA", "chainB"]).await;
    let now = test_now();
    store
        .add_transfer(transfer("addrX", TxStatus::Success, "7", (now - Duration::days(1)).timestamp()))
        .await;

    let engine = orchestrator(EngineConfig::default(), store.clone(), Arc::new(ScriptedRemote::new()));
    engine.run_at(now).await.unwrap();

    let records = store.statistics();
    assert_eq!(records.len(), 1);
    let yesterday = Segment::yesterday(now, chrono::Utc.fix());
    assert_eq!(records[0].segment_start_time, yesterday.start);
    assert_eq!(records[0].segment_end_time, yesterday.end);
}
