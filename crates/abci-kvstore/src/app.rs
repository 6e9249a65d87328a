//! The key/value application.

use crate::config::KvStoreConfig;
use crate::store::{self, parse_tx, Store, CODE_INVALID_TX, CODE_UNKNOWN_PATH};
use abci_types::*;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Snapshot format produced and accepted by the store.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Application version reported by Info.
pub const APP_VERSION: u64 = 1;

/// Bytes of the app hash included in a vote extension.
const EXTENSION_HASH_PREFIX: usize = 8;

/// A deterministic key/value store.
///
/// Transactions are `key=value` pairs. Writes are staged during a block
/// and become visible to CheckTx and Query only after Commit.
pub struct KvStore {
    config: KvStoreConfig,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    height: u64,
    app_hash: Bytes,
    store: Store,
    /// Writes of the open block.
    staged: Store,
    /// Height of the open block.
    block: Option<u64>,
    snapshots: BTreeMap<u64, LocalSnapshot>,
    restore: Option<Restore>,
}

struct LocalSnapshot {
    snapshot: Snapshot,
    chunks: Vec<Bytes>,
}

struct Restore {
    snapshot: Snapshot,
    trusted_app_hash: Bytes,
    chunks: BTreeMap<u32, Bytes>,
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new(KvStoreConfig::default())
    }
}

impl KvStore {
    /// Creates an empty store.
    pub fn new(config: KvStoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// Height of the last commit.
    pub fn height(&self) -> u64 {
        self.state.lock().height
    }

    /// App hash of the last commit.
    pub fn app_hash(&self) -> Bytes {
        self.state.lock().app_hash.clone()
    }

    /// Committed value of `key`.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.state.lock().store.get(key).cloned()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Returns true if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn vote_extension(height: u64, app_hash: &[u8]) -> Bytes {
        let prefix = &app_hash[..app_hash.len().min(EXTENSION_HASH_PREFIX)];
        let mut extension = Vec::with_capacity(8 + prefix.len());
        extension.extend_from_slice(&height.to_be_bytes());
        extension.extend_from_slice(prefix);
        Bytes::from(extension)
    }

    fn take_snapshot(&self, state: &mut State) {
        let payload = Bytes::from(store::encode(state.height, &state.store));
        let chunk_size = self.config.snapshot_chunk_size.max(1);
        let chunks: Vec<Bytes> = (0..payload.len())
            .step_by(chunk_size)
            .map(|start| payload.slice(start..payload.len().min(start + chunk_size)))
            .collect();

        let snapshot = Snapshot {
            height: state.height,
            format: SNAPSHOT_FORMAT,
            chunks: chunks.len() as u32,
            hash: Bytes::from(Sha256::digest(&payload).to_vec()),
            metadata: state.app_hash.clone(),
        };
        info!(%snapshot, "snapshot taken");
        state
            .snapshots
            .insert(state.height, LocalSnapshot { snapshot, chunks });

        while state.snapshots.len() > self.config.snapshot_keep_recent.max(1) {
            state.snapshots.pop_first();
        }
    }

    fn finish_restore(restore: Restore, state: &mut State) -> ApplySnapshotChunkResult {
        let payload: Vec<u8> = restore.chunks.into_values().flatten().collect();
        let snapshot = restore.snapshot;

        if Sha256::digest(&payload).as_slice() != snapshot.hash.as_ref() {
            warn!(%snapshot, "snapshot hash mismatch");
            return ApplySnapshotChunkResult::RejectSnapshot;
        }
        let (height, contents) = match store::decode(&payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(%snapshot, error = %err, "snapshot rejected");
                return ApplySnapshotChunkResult::RejectSnapshot;
            }
        };
        if height != snapshot.height {
            warn!(%snapshot, height, "snapshot height mismatch");
            return ApplySnapshotChunkResult::RejectSnapshot;
        }
        let app_hash = store::app_hash(height, &contents);
        if !restore.trusted_app_hash.is_empty() && restore.trusted_app_hash != app_hash {
            warn!(%snapshot, "restored app hash does not match trusted hash");
            return ApplySnapshotChunkResult::RejectSnapshot;
        }

        info!(height, app_hash = %hex::encode(&app_hash), "snapshot restored");
        state.height = height;
        state.app_hash = app_hash;
        state.store = contents;
        state.staged.clear();
        state.block = None;
        ApplySnapshotChunkResult::Complete
    }
}

impl Application for KvStore {
    fn info(&self, _request: RequestInfo) -> ResponseInfo {
        let state = self.state.lock();
        ResponseInfo {
            data: format!("{{\"size\":{}}}", state.store.len()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            app_version: APP_VERSION,
            last_block_height: state.height,
            last_block_app_hash: state.app_hash.clone(),
        }
    }

    fn query(&self, request: RequestQuery) -> ResponseQuery {
        if !request.path.is_empty() && request.path != "/store" {
            return ResponseQuery {
                code: CODE_UNKNOWN_PATH,
                log: format!("unknown path {}", request.path),
                ..Default::default()
            };
        }

        let state = self.state.lock();
        let value = state.store.get(&request.data).cloned();
        ResponseQuery {
            code: CODE_TYPE_OK,
            log: String::from(if value.is_some() {
                "exists"
            } else {
                "does not exist"
            }),
            key: request.data,
            value: value.unwrap_or_default(),
            height: state.height,
            ..Default::default()
        }
    }

    fn check_tx(&self, request: RequestCheckTx) -> ResponseCheckTx {
        match parse_tx(&request.tx) {
            Some(_) => ResponseCheckTx {
                code: CODE_TYPE_OK,
                gas_wanted: 1,
                ..Default::default()
            },
            None => ResponseCheckTx {
                code: CODE_INVALID_TX,
                log: "transaction must be key=value".into(),
                ..Default::default()
            },
        }
    }

    fn init_chain(&self, request: RequestInitChain) -> ResponseInitChain {
        let mut state = self.state.lock();
        for line in request.app_state_bytes.split(|byte| *byte == b'\n') {
            if let Some((key, value)) = parse_tx(line) {
                state.store.insert(key, value);
            }
        }
        if !state.store.is_empty() {
            state.app_hash = store::app_hash(state.height, &state.store);
        }
        debug!(
            chain_id = %request.chain_id,
            keys = state.store.len(),
            "chain initialized"
        );
        ResponseInitChain {
            app_hash: state.app_hash.clone(),
            ..Default::default()
        }
    }

    fn prepare_proposal(&self, request: RequestPrepareProposal) -> ResponsePrepareProposal {
        let limit = usize::try_from(request.max_tx_bytes)
            .ok()
            .filter(|limit| *limit > 0);
        let mut total = 0usize;
        let txs = request
            .txs
            .into_iter()
            .filter(|tx| parse_tx(tx).is_some())
            .take_while(|tx| {
                total += tx.len();
                limit.map_or(true, |limit| total <= limit)
            })
            .collect();
        ResponsePrepareProposal { txs }
    }

    fn begin_block(&self, request: RequestBeginBlock) -> ResponseBeginBlock {
        let mut state = self.state.lock();
        state.staged.clear();
        state.block = Some(request.header.height);
        ResponseBeginBlock::default()
    }

    fn deliver_tx(&self, request: RequestDeliverTx) -> ResponseDeliverTx {
        let Some((key, value)) = parse_tx(&request.tx) else {
            return ResponseDeliverTx {
                code: CODE_INVALID_TX,
                log: "transaction must be key=value".into(),
                ..Default::default()
            };
        };

        let event = Event::new("app")
            .with_attribute("key", String::from_utf8_lossy(&key))
            .with_attribute("creator", "abci-kvstore");
        self.state.lock().staged.insert(key, value);
        ResponseDeliverTx {
            code: CODE_TYPE_OK,
            gas_used: 1,
            events: vec![event],
            ..Default::default()
        }
    }

    fn end_block(&self, request: RequestEndBlock) -> ResponseEndBlock {
        ResponseEndBlock {
            events: vec![Event::new("block").with_attribute("height", request.height.to_string())],
            ..Default::default()
        }
    }

    fn commit(&self) -> ResponseCommit {
        let mut state = self.state.lock();
        let staged = std::mem::take(&mut state.staged);
        state.store.extend(staged);
        let next = state.height.saturating_add(1);
        state.height = state.block.take().filter(|height| *height > 0).unwrap_or(next);
        state.app_hash = store::app_hash(state.height, &state.store);
        debug!(
            height = state.height,
            app_hash = %hex::encode(&state.app_hash),
            "committed"
        );

        let interval = self.config.snapshot_interval;
        if interval > 0 && state.height % interval == 0 {
            self.take_snapshot(&mut state);
        }

        ResponseCommit {
            data: state.app_hash.clone(),
            retain_height: 0,
        }
    }

    fn extend_vote(&self, request: RequestExtendVote) -> ResponseExtendVote {
        let state = self.state.lock();
        ResponseExtendVote {
            vote_extension: Self::vote_extension(request.height, &state.app_hash),
        }
    }

    fn verify_vote_extension(
        &self,
        request: RequestVerifyVoteExtension,
    ) -> ResponseVerifyVoteExtension {
        let state = self.state.lock();
        let expected = Self::vote_extension(request.height, &state.app_hash);
        let status = if request.vote_extension == expected {
            VerifyStatus::Accept
        } else {
            VerifyStatus::Reject
        };
        ResponseVerifyVoteExtension { status }
    }

    fn list_snapshots(&self, _request: RequestListSnapshots) -> ResponseListSnapshots {
        let state = self.state.lock();
        ResponseListSnapshots {
            snapshots: state
                .snapshots
                .values()
                .map(|local| local.snapshot.clone())
                .collect(),
        }
    }

    fn offer_snapshot(&self, request: RequestOfferSnapshot) -> ResponseOfferSnapshot {
        let snapshot = request.snapshot;
        let mut state = self.state.lock();
        let result = if snapshot.format != SNAPSHOT_FORMAT {
            OfferSnapshotResult::RejectFormat
        } else if snapshot.chunks == 0
            || snapshot.chunks > self.config.max_snapshot_chunks
            || snapshot.height <= state.height
        {
            OfferSnapshotResult::Reject
        } else {
            OfferSnapshotResult::Accept
        };

        state.restore = (result == OfferSnapshotResult::Accept).then(|| Restore {
            chunks: BTreeMap::new(),
            trusted_app_hash: request.app_hash,
            snapshot: snapshot.clone(),
        });
        debug!(%snapshot, ?result, "snapshot offered");
        ResponseOfferSnapshot { result }
    }

    fn load_snapshot_chunk(&self, request: RequestLoadSnapshotChunk) -> ResponseLoadSnapshotChunk {
        let state = self.state.lock();
        let chunk = state
            .snapshots
            .get(&request.height)
            .filter(|local| local.snapshot.format == request.format)
            .and_then(|local| local.chunks.get(request.chunk as usize))
            .cloned()
            .unwrap_or_default();
        ResponseLoadSnapshotChunk { chunk }
    }

    fn apply_snapshot_chunk(
        &self,
        request: RequestApplySnapshotChunk,
    ) -> ResponseApplySnapshotChunk {
        let mut state = self.state.lock();
        let Some(restore) = state.restore.as_mut() else {
            return ResponseApplySnapshotChunk {
                result: ApplySnapshotChunkResult::Abort,
                ..Default::default()
            };
        };

        if request.index >= restore.snapshot.chunks {
            state.restore = None;
            return ResponseApplySnapshotChunk {
                result: ApplySnapshotChunkResult::RejectSnapshot,
                ..Default::default()
            };
        }
        if request.chunk.is_empty() {
            return ResponseApplySnapshotChunk {
                result: ApplySnapshotChunkResult::Retry,
                refetch_chunks: vec![request.index],
                reject_senders: if request.sender.is_empty() {
                    Vec::new()
                } else {
                    vec![request.sender]
                },
            };
        }

        restore.chunks.insert(request.index, request.chunk);
        if restore.chunks.len() < restore.snapshot.chunks as usize {
            return ResponseApplySnapshotChunk {
                result: ApplySnapshotChunkResult::Accept,
                ..Default::default()
            };
        }

        let result = match state.restore.take() {
            Some(restore) => Self::finish_restore(restore, &mut state),
            None => ApplySnapshotChunkResult::Abort,
        };
        ResponseApplySnapshotChunk {
            result,
            ..Default::default()
        }
    }
}
