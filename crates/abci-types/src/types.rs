//! Domain values shared by several requests and responses.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Response code signalling success. Any other value is an
/// application-level rejection.
pub const CODE_TYPE_OK: u32 = 0;

/// A block header as seen by the application at BeginBlock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    /// Chain identifier.
    pub chain_id: String,
    /// Block height.
    pub height: u64,
    /// Block time (unix milliseconds).
    pub time_ms: u64,
    /// Hash of the previous block.
    pub last_block_hash: Bytes,
    /// App hash returned by the previous Commit.
    pub app_hash: Bytes,
    /// Address of the block proposer.
    pub proposer_address: Bytes,
}

/// A validator identified by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validator {
    /// Validator address.
    pub address: Bytes,
    /// Voting power.
    pub power: i64,
}

/// A change to the validator set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorUpdate {
    /// Validator public key.
    pub pub_key: Bytes,
    /// New voting power; zero removes the validator.
    pub power: i64,
}

/// Whether a validator signed the previous block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteInfo {
    /// The voting validator.
    pub validator: Validator,
    /// True if the validator's precommit made it into the last commit.
    pub signed_last_block: bool,
}

/// Votes included in the previous block's commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitInfo {
    /// Round in which the previous block was committed.
    pub round: i32,
    /// Per-validator vote information.
    pub votes: Vec<VoteInfo>,
}

/// Kind of misbehavior reported at BeginBlock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisbehaviorKind {
    /// Unclassified.
    #[default]
    Unknown,
    /// Two conflicting votes in the same round.
    DuplicateVote,
    /// Attack against light clients.
    LightClientAttack,
}

/// Evidence of validator misbehavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Misbehavior {
    /// Kind of misbehavior.
    pub kind: MisbehaviorKind,
    /// The offending validator.
    pub validator: Validator,
    /// Height at which the offense happened.
    pub height: u64,
    /// Time of the offense (unix milliseconds).
    pub time_ms: u64,
    /// Total voting power at that height.
    pub total_voting_power: i64,
}

/// Block size limits the application may set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockParams {
    /// Maximum block size in bytes.
    pub max_bytes: i64,
    /// Maximum gas per block; -1 for unlimited.
    pub max_gas: i64,
}

/// Consensus parameters the application may set or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Block limits.
    pub block: Option<BlockParams>,
}

/// A key/value attribute attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventAttribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: String,
    /// Whether the attribute should be indexed.
    pub index: bool,
}

/// An event emitted while executing a block or a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Event type.
    pub kind: String,
    /// Event attributes.
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    /// Creates an event with no attributes.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    /// Adds an indexed attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute {
            key: key.into(),
            value: value.into(),
            index: true,
        });
        self
    }
}

/// Metadata describing one application state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Height at which the snapshot was taken.
    pub height: u64,
    /// Application-specific snapshot format.
    pub format: u32,
    /// Number of chunks in the snapshot.
    pub chunks: u32,
    /// Hash over the snapshot contents.
    pub hash: Bytes,
    /// Arbitrary application metadata.
    pub metadata: Bytes,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "snapshot(height={}, format={}, chunks={}, hash={})",
            self.height,
            self.format,
            self.chunks,
            hex::encode(&self.hash)
        )
    }
}

/// Whether a CheckTx call validates a new transaction or re-validates one
/// already in the mempool after a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTxKind {
    /// First time the transaction is seen.
    #[default]
    New,
    /// Re-validation after a block was committed.
    Recheck,
}

/// Application verdict on an offered snapshot.
///
/// `Unknown` means the application did not classify the offer; drivers
/// treat it like `Abort`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSnapshotResult {
    /// Unclassified.
    #[default]
    Unknown,
    /// Snapshot accepted, chunks may now be applied.
    Accept,
    /// Abort state sync altogether.
    Abort,
    /// Reject this snapshot and try a different one.
    Reject,
    /// Reject every snapshot with this format.
    RejectFormat,
    /// Reject every snapshot offered by this sender.
    RejectSender,
}

/// Application verdict on one applied snapshot chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplySnapshotChunkResult {
    /// Unclassified; treated like `Abort`.
    #[default]
    Unknown,
    /// Chunk applied, more chunks are needed.
    Accept,
    /// Chunk applied and the snapshot is fully restored.
    Complete,
    /// Abort state sync altogether.
    Abort,
    /// Refetch and reapply this chunk.
    Retry,
    /// Restart this snapshot from the first chunk.
    RetrySnapshot,
    /// Give up on this snapshot and try a different one.
    RejectSnapshot,
}

impl ApplySnapshotChunkResult {
    /// Returns true if the chunk was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Accept | Self::Complete)
    }
}

/// Verdict on a vote extension or proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    /// Unclassified; treated like `Reject`.
    #[default]
    Unknown,
    /// The data is valid.
    Accept,
    /// The data is invalid.
    Reject,
}

impl VerifyStatus {
    /// Returns true only for an explicit `Accept`.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}
