//! Block execution and state sync through the connection set.

use abci_kvstore::{KvStore, KvStoreConfig, SNAPSHOT_FORMAT};
use abci_proxy::{AppConns, LocalClientCreator, Metrics};
use abci_types::*;
use bytes::Bytes;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::sync::Arc;

fn snapshotting() -> KvStoreConfig {
    KvStoreConfig {
        snapshot_interval: 3,
        snapshot_chunk_size: 16,
        snapshot_keep_recent: 2,
        ..Default::default()
    }
}

async fn start(app: Arc<KvStore>) -> AppConns {
    AppConns::start(&LocalClientCreator::new(app), Metrics::nop())
        .await
        .unwrap()
}

async fn run_blocks(conns: &AppConns, heights: std::ops::RangeInclusive<u64>) -> Bytes {
    let consensus = conns.consensus();
    let mut app_hash = Bytes::new();
    for height in heights {
        consensus
            .begin_block(RequestBeginBlock {
                header: Header {
                    height,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();
        for index in 0..4 {
            let tx = format!("key{}=value{}", index, height * 10 + index);
            let response = consensus
                .deliver_tx(RequestDeliverTx { tx: tx.into() })
                .await
                .unwrap();
            assert!(response.is_ok());
        }
        consensus
            .end_block(RequestEndBlock { height })
            .await
            .unwrap();
        app_hash = consensus.commit().await.unwrap().data;
    }
    app_hash
}

#[tokio::test]
async fn test_replicas_agree_on_app_hash() {
    let first = start(Arc::new(KvStore::new(KvStoreConfig::without_snapshots()))).await;
    let second = start(Arc::new(KvStore::new(snapshotting()))).await;

    let a = run_blocks(&first, 1..=5).await;
    let b = run_blocks(&second, 1..=5).await;

    assert_eq!(a, b);
    assert_eq!(a.len(), 32);
}

#[tokio::test]
async fn test_restore_from_shuffled_chunks() {
    let source = Arc::new(KvStore::new(snapshotting()));
    let source_conns = start(source.clone()).await;
    run_blocks(&source_conns, 1..=7).await;

    let snapshots = source_conns
        .snapshot()
        .list_snapshots(RequestListSnapshots {})
        .await
        .unwrap()
        .snapshots;
    let snapshot = snapshots.last().cloned().unwrap();
    assert_eq!(snapshot.height, 6);
    assert_eq!(snapshot.format, SNAPSHOT_FORMAT);
    assert!(snapshot.chunks > 2);

    let mut chunks = Vec::new();
    for chunk in 0..snapshot.chunks {
        let response = source_conns
            .snapshot()
            .load_snapshot_chunk(RequestLoadSnapshotChunk {
                height: snapshot.height,
                format: snapshot.format,
                chunk,
            })
            .await
            .unwrap();
        chunks.push(response.chunk);
    }

    let target = Arc::new(KvStore::default());
    let target_conns = start(target.clone()).await;
    let offer = target_conns
        .snapshot()
        .offer_snapshot(RequestOfferSnapshot {
            snapshot: snapshot.clone(),
            app_hash: snapshot.metadata.clone(),
        })
        .await
        .unwrap();
    assert_eq!(offer.result, OfferSnapshotResult::Accept);

    // An empty chunk from a bad peer is refetched.
    let retry = target_conns
        .snapshot()
        .apply_snapshot_chunk(RequestApplySnapshotChunk {
            index: 0,
            chunk: Bytes::new(),
            sender: "peer-bad".into(),
        })
        .await
        .unwrap();
    assert_eq!(retry.result, ApplySnapshotChunkResult::Retry);
    assert_eq!(retry.refetch_chunks, vec![0]);
    assert_eq!(retry.reject_senders, vec!["peer-bad".to_string()]);

    let mut order: Vec<u32> = (0..snapshot.chunks).collect();
    order.shuffle(&mut StdRng::seed_from_u64(7));
    let last = order.len() - 1;
    for (position, index) in order.into_iter().enumerate() {
        let response = target_conns
            .snapshot()
            .apply_snapshot_chunk(RequestApplySnapshotChunk {
                index,
                chunk: chunks[index as usize].clone(),
                sender: "peer-good".into(),
            })
            .await
            .unwrap();
        let expected = if position == last {
            ApplySnapshotChunkResult::Complete
        } else {
            ApplySnapshotChunkResult::Accept
        };
        assert_eq!(response.result, expected);
    }

    assert_eq!(target_conns.finish_state_sync(), Some(6));
    assert_eq!(target.height(), 6);
    assert_eq!(target.app_hash(), snapshot.metadata);

    let info = target_conns
        .query()
        .info(RequestInfo::default())
        .await
        .unwrap();
    assert_eq!(info.last_block_height, 6);

    // The restored replica executes the next block like the source did.
    run_blocks(&target_conns, 7..=7).await;
    assert_eq!(target.app_hash(), source.app_hash());
    assert_eq!(target.get(b"key3"), Some(Bytes::from_static(b"value73")));
}

#[tokio::test]
async fn test_restore_rejects_untrusted_hash() {
    let source = Arc::new(KvStore::new(snapshotting()));
    let source_conns = start(source).await;
    run_blocks(&source_conns, 1..=3).await;
    let snapshot = source_conns
        .snapshot()
        .list_snapshots(RequestListSnapshots {})
        .await
        .unwrap()
        .snapshots
        .remove(0);

    let target = Arc::new(KvStore::default());
    let target_conns = start(target.clone()).await;
    target_conns
        .snapshot()
        .offer_snapshot(RequestOfferSnapshot {
            snapshot: snapshot.clone(),
            app_hash: Bytes::from_static(b"not the app hash"),
        })
        .await
        .unwrap();

    let mut result = ApplySnapshotChunkResult::Unknown;
    for index in 0..snapshot.chunks {
        let chunk = source_conns
            .snapshot()
            .load_snapshot_chunk(RequestLoadSnapshotChunk {
                height: snapshot.height,
                format: snapshot.format,
                chunk: index,
            })
            .await
            .unwrap()
            .chunk;
        result = target_conns
            .snapshot()
            .apply_snapshot_chunk(RequestApplySnapshotChunk {
                index,
                chunk,
                sender: String::new(),
            })
            .await
            .unwrap()
            .result;
    }

    assert_eq!(result, ApplySnapshotChunkResult::RejectSnapshot);
    assert_eq!(target_conns.finish_state_sync(), None);
    assert_eq!(target.height(), 0);
}
