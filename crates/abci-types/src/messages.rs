//! Request and response messages.
//!
//! Every method of the protocol has a `RequestXxx`/`ResponseXxx` pair. The
//! [`Request`] and [`Response`] enums carry them over a connection, tagged by
//! method name, so a response can always be matched against the method of
//! the request it answers.

use crate::types::{
    ApplySnapshotChunkResult, CheckTxKind, CommitInfo, ConsensusParams, Event, Header,
    Misbehavior, OfferSnapshotResult, Snapshot, ValidatorUpdate, VerifyStatus, CODE_TYPE_OK,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Liveness probe; the server echoes the message back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestEcho {
    /// Message to echo.
    pub message: String,
}

/// Echo reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseEcho {
    /// The echoed message.
    pub message: String,
}

/// Barrier request. Its response is released only after every earlier
/// request on the same connection has completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFlush {}

/// Flush reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFlush {}

/// Handshake information request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestInfo {
    /// Software version of the driving engine.
    pub version: String,
    /// Block protocol version.
    pub block_version: u64,
    /// P2P protocol version.
    pub p2p_version: u64,
    /// Boundary protocol version.
    pub abci_version: String,
}

/// Application information used for the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseInfo {
    /// Free-form application data.
    pub data: String,
    /// Application software version.
    pub version: String,
    /// Application protocol version.
    pub app_version: u64,
    /// Height of the last committed block.
    pub last_block_height: u64,
    /// App hash returned by the last Commit.
    pub last_block_app_hash: Bytes,
}

/// Point lookup against the last committed state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestQuery {
    /// Query payload, usually a key.
    pub data: Bytes,
    /// Query path.
    pub path: String,
    /// Height to query; zero means latest.
    pub height: u64,
    /// Whether a proof is requested.
    pub prove: bool,
}

/// Query result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseQuery {
    /// Result code; non-zero is an application-level rejection.
    pub code: u32,
    /// Human-readable log.
    pub log: String,
    /// Additional information.
    pub info: String,
    /// Index of the key in the tree, if any.
    pub index: i64,
    /// Queried key.
    pub key: Bytes,
    /// Value found, empty if none.
    pub value: Bytes,
    /// Height the answer was computed at.
    pub height: u64,
    /// Namespace for `code`.
    pub codespace: String,
}

/// Mempool validation of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCheckTx {
    /// Raw transaction bytes.
    pub tx: Bytes,
    /// New transaction or recheck.
    pub kind: CheckTxKind,
}

/// Mempool validation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCheckTx {
    /// Result code; non-zero rejects the transaction.
    pub code: u32,
    /// Result data.
    pub data: Bytes,
    /// Human-readable log.
    pub log: String,
    /// Additional information.
    pub info: String,
    /// Gas requested by the transaction.
    pub gas_wanted: i64,
    /// Gas consumed by validation.
    pub gas_used: i64,
    /// Emitted events.
    pub events: Vec<Event>,
    /// Namespace for `code`.
    pub codespace: String,
    /// Transaction sender, for mempool bookkeeping.
    pub sender: String,
    /// Mempool priority.
    pub priority: i64,
}

/// One-time genesis bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestInitChain {
    /// Genesis time (unix milliseconds).
    pub time_ms: u64,
    /// Chain identifier.
    pub chain_id: String,
    /// Initial consensus parameters.
    pub consensus_params: Option<ConsensusParams>,
    /// Genesis validator set.
    pub validators: Vec<ValidatorUpdate>,
    /// Application genesis state.
    pub app_state_bytes: Bytes,
    /// Height of the first block.
    pub initial_height: u64,
}

/// Genesis bootstrap result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseInitChain {
    /// Consensus parameters overriding genesis, if any.
    pub consensus_params: Option<ConsensusParams>,
    /// Validator set overriding genesis, if non-empty.
    pub validators: Vec<ValidatorUpdate>,
    /// Initial app hash.
    pub app_hash: Bytes,
}

/// Candidate transactions for the next proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPrepareProposal {
    /// Height of the block being proposed.
    pub height: u64,
    /// Candidate transactions, in mempool order.
    pub txs: Vec<Bytes>,
    /// Maximum total size of the returned transactions.
    pub max_tx_bytes: i64,
}

/// Transactions to propose, possibly reordered or filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePrepareProposal {
    /// Transactions to include in the proposal.
    pub txs: Vec<Bytes>,
}

/// Proposal validation. Part of the wire protocol but not of the
/// [`Application`](crate::Application) surface; servers answer it with an
/// exception.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestProcessProposal {
    /// Proposed block hash.
    pub hash: Bytes,
    /// Proposed block height.
    pub height: u64,
    /// Proposed transactions.
    pub txs: Vec<Bytes>,
}

/// Proposal validation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseProcessProposal {
    /// Verdict.
    pub status: VerifyStatus,
}

/// Opens a block execution context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestBeginBlock {
    /// Block hash.
    pub hash: Bytes,
    /// Block header.
    pub header: Header,
    /// Votes of the previous commit.
    pub last_commit_info: CommitInfo,
    /// Misbehavior evidence included in this block.
    pub byzantine_validators: Vec<Misbehavior>,
}

/// BeginBlock result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseBeginBlock {
    /// Emitted events.
    pub events: Vec<Event>,
}

/// Applies one transaction inside the open block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDeliverTx {
    /// Raw transaction bytes.
    pub tx: Bytes,
}

/// Transaction execution result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseDeliverTx {
    /// Result code; non-zero marks the transaction as failed.
    pub code: u32,
    /// Result data.
    pub data: Bytes,
    /// Human-readable log.
    pub log: String,
    /// Additional information.
    pub info: String,
    /// Gas requested.
    pub gas_wanted: i64,
    /// Gas consumed.
    pub gas_used: i64,
    /// Emitted events.
    pub events: Vec<Event>,
    /// Namespace for `code`.
    pub codespace: String,
}

/// Closes the block execution context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestEndBlock {
    /// Height of the block being closed.
    pub height: u64,
}

/// EndBlock result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseEndBlock {
    /// Validator set changes.
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Consensus parameter changes.
    pub consensus_param_updates: Option<ConsensusParams>,
    /// Emitted events.
    pub events: Vec<Event>,
}

/// Persists the effects of the closed block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCommit {}

/// Commit result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCommit {
    /// Commitment (app hash) included in the next block header.
    pub data: Bytes,
    /// Blocks below this height may be pruned; zero retains everything.
    pub retain_height: u64,
}

/// Asks the application for a vote extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestExtendVote {
    /// Hash of the block being voted on.
    pub hash: Bytes,
    /// Height of the block being voted on.
    pub height: u64,
}

/// Vote extension produced by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseExtendVote {
    /// Opaque extension bytes.
    pub vote_extension: Bytes,
}

/// Asks the application to verify another validator's vote extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestVerifyVoteExtension {
    /// Hash of the block voted on.
    pub hash: Bytes,
    /// Address of the validator that produced the extension.
    pub validator_address: Bytes,
    /// Height of the block voted on.
    pub height: u64,
    /// Extension bytes to verify.
    pub vote_extension: Bytes,
}

/// Vote extension verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseVerifyVoteExtension {
    /// Verdict.
    pub status: VerifyStatus,
}

/// Lists locally available snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestListSnapshots {}

/// Available snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseListSnapshots {
    /// Snapshots, in no particular order.
    pub snapshots: Vec<Snapshot>,
}

/// Offers a snapshot to a restoring application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOfferSnapshot {
    /// The offered snapshot.
    pub snapshot: Snapshot,
    /// Trusted app hash at the snapshot height.
    pub app_hash: Bytes,
}

/// Offer verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseOfferSnapshot {
    /// Verdict.
    pub result: OfferSnapshotResult,
}

/// Loads one chunk of a local snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLoadSnapshotChunk {
    /// Snapshot height.
    pub height: u64,
    /// Snapshot format.
    pub format: u32,
    /// Chunk index.
    pub chunk: u32,
}

/// Chunk contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseLoadSnapshotChunk {
    /// Chunk bytes; empty if the chunk does not exist.
    pub chunk: Bytes,
}

/// Applies one chunk of the accepted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestApplySnapshotChunk {
    /// Chunk index.
    pub index: u32,
    /// Chunk bytes.
    pub chunk: Bytes,
    /// Peer that served the chunk.
    pub sender: String,
}

/// Chunk verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseApplySnapshotChunk {
    /// Verdict.
    pub result: ApplySnapshotChunkResult,
    /// Chunks to refetch and reapply, regardless of `result`.
    pub refetch_chunks: Vec<u32>,
    /// Senders whose chunks should be rejected.
    pub reject_senders: Vec<String>,
}

/// Reply sent instead of the expected response when the server cannot
/// answer a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseException {
    /// Error description.
    pub error: String,
}

macro_rules! impl_is_ok {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Returns true if the application accepted the call.
                pub fn is_ok(&self) -> bool {
                    self.code == CODE_TYPE_OK
                }

                /// Returns true if the application rejected the call.
                pub fn is_err(&self) -> bool {
                    !self.is_ok()
                }
            }
        )*
    };
}

impl_is_ok!(ResponseQuery, ResponseCheckTx, ResponseDeliverTx);

macro_rules! methods {
    ($($variant:ident($req:ident, $res:ident) => $name:literal,)*) => {
        /// Identity of a protocol method.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Method {
            $(
                #[doc = $name]
                $variant,
            )*
        }

        impl Method {
            /// Every method, in protocol order.
            pub const ALL: &'static [Method] = &[$(Method::$variant,)*];

            /// Snake-case method name, as used on the wire and in metrics.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Method::$variant => $name,)*
                }
            }
        }

        /// A request for any method.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Request {
            $(
                #[doc = $name]
                $variant($req),
            )*
        }

        impl Request {
            /// The method this request invokes.
            pub fn method(&self) -> Method {
                match self {
                    $(Request::$variant(_) => Method::$variant,)*
                }
            }
        }

        /// A response for any method, or an exception.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Response {
            /// The server could not answer the request.
            Exception(ResponseException),
            $(
                #[doc = $name]
                $variant($res),
            )*
        }

        impl Response {
            /// The method this response answers; `None` for exceptions.
            pub fn method(&self) -> Option<Method> {
                match self {
                    Response::Exception(_) => None,
                    $(Response::$variant(_) => Some(Method::$variant),)*
                }
            }
        }

        $(
            impl From<$req> for Request {
                fn from(request: $req) -> Self {
                    Request::$variant(request)
                }
            }

            impl From<$res> for Response {
                fn from(response: $res) -> Self {
                    Response::$variant(response)
                }
            }

            impl TryFrom<Response> for $res {
                type Error = Response;

                fn try_from(response: Response) -> Result<Self, Response> {
                    match response {
                        Response::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

methods! {
    Echo(RequestEcho, ResponseEcho) => "echo",
    Flush(RequestFlush, ResponseFlush) => "flush",
    Info(RequestInfo, ResponseInfo) => "info",
    Query(RequestQuery, ResponseQuery) => "query",
    CheckTx(RequestCheckTx, ResponseCheckTx) => "check_tx",
    InitChain(RequestInitChain, ResponseInitChain) => "init_chain",
    PrepareProposal(RequestPrepareProposal, ResponsePrepareProposal) => "prepare_proposal",
    ProcessProposal(RequestProcessProposal, ResponseProcessProposal) => "process_proposal",
    BeginBlock(RequestBeginBlock, ResponseBeginBlock) => "begin_block",
    DeliverTx(RequestDeliverTx, ResponseDeliverTx) => "deliver_tx",
    EndBlock(RequestEndBlock, ResponseEndBlock) => "end_block",
    Commit(RequestCommit, ResponseCommit) => "commit",
    ExtendVote(RequestExtendVote, ResponseExtendVote) => "extend_vote",
    VerifyVoteExtension(RequestVerifyVoteExtension, ResponseVerifyVoteExtension) => "verify_vote_extension",
    ListSnapshots(RequestListSnapshots, ResponseListSnapshots) => "list_snapshots",
    OfferSnapshot(RequestOfferSnapshot, ResponseOfferSnapshot) => "offer_snapshot",
    LoadSnapshotChunk(RequestLoadSnapshotChunk, ResponseLoadSnapshotChunk) => "load_snapshot_chunk",
    ApplySnapshotChunk(RequestApplySnapshotChunk, ResponseApplySnapshotChunk) => "apply_snapshot_chunk",
}

impl Method {
    /// Housekeeping methods are answered by the transport endpoint rather
    /// than the application.
    pub fn is_housekeeping(&self) -> bool {
        matches!(self, Method::Echo | Method::Flush)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Request {
    /// Creates an echo request.
    pub fn echo(message: impl Into<String>) -> Self {
        Request::Echo(RequestEcho {
            message: message.into(),
        })
    }

    /// Creates a flush request.
    pub fn flush() -> Self {
        Request::Flush(RequestFlush {})
    }

    /// Creates a commit request.
    pub fn commit() -> Self {
        Request::Commit(RequestCommit {})
    }
}

impl Response {
    /// Creates an exception response.
    pub fn exception(error: impl Into<String>) -> Self {
        Response::Exception(ResponseException {
            error: error.into(),
        })
    }

    /// Returns true if this response is a valid answer to `request`.
    pub fn answers(&self, request: &Request) -> bool {
        self.method() == Some(request.method())
    }
}
