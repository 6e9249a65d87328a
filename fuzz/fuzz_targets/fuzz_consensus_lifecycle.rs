//! Fuzz target for the consensus lifecycle state machine.
//!
//! Any call sequence is accepted or rejected without panicking, and the
//! committed height never decreases.

#![no_main]

use abci_types::{ConsensusLifecycle, Phase};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Call {
    InitChain(u8),
    PrepareProposal,
    BeginBlock(u8),
    DeliverTx,
    EndBlock(u8),
    Commit,
}

fuzz_target!(|calls: Vec<Call>| {
    let mut lifecycle = ConsensusLifecycle::new();
    let mut committed = 0u64;

    for call in calls {
        let _ = match call {
            Call::InitChain(height) => lifecycle.init_chain(u64::from(height)),
            Call::PrepareProposal => lifecycle.prepare_proposal(),
            Call::BeginBlock(height) => lifecycle.begin_block(u64::from(height)),
            Call::DeliverTx => lifecycle.deliver_tx(),
            Call::EndBlock(height) => lifecycle.end_block(u64::from(height)),
            Call::Commit => lifecycle.commit().map(|height| {
                assert!(height > committed || committed == 0);
                committed = height;
            }),
        };
        if let Phase::Committed { height } = lifecycle.phase() {
            assert_eq!(height, committed);
        }
    }
});
