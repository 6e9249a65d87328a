//! Fuzz target for snapshot restore.
//!
//! Arbitrary chunks offered for an accepted snapshot must never install
//! state whose hash does not match the snapshot.

#![no_main]

use abci_kvstore::{store, KvStore, SNAPSHOT_FORMAT};
use abci_types::*;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use sha2::{Digest, Sha256};

fuzz_target!(|data: &[u8]| {
    let _ = store::decode(data);

    let app = KvStore::default();
    let snapshot = Snapshot {
        height: 1,
        format: SNAPSHOT_FORMAT,
        chunks: 2,
        hash: Bytes::from(Sha256::digest(data).to_vec()),
        metadata: Bytes::new(),
    };
    app.offer_snapshot(RequestOfferSnapshot {
        snapshot,
        app_hash: Bytes::new(),
    });

    let (first, second) = data.split_at(data.len() / 2);
    for (index, chunk) in [(1, second), (0, first)] {
        let response = app.apply_snapshot_chunk(RequestApplySnapshotChunk {
            index,
            chunk: Bytes::copy_from_slice(chunk),
            sender: String::new(),
        });
        if response.result == ApplySnapshotChunkResult::Complete {
            let (height, contents) = store::decode(data).expect("restored payload decodes");
            assert_eq!(height, 1);
            assert_eq!(app.app_hash(), store::app_hash(height, &contents));
        }
    }
});
