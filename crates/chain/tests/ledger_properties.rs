use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simchain_chain::{
    BlockError, Blockchain, ChainConfig, Mempool, MempoolConfig, MempoolError, SubmitError,
};
use simchain_consensus::ValidationError;
use simchain_core::{Address, Block, ErrorKind, Fingerprint, Transaction};
use std::collections::HashMap;

fn genesis_chain() -> Blockchain {
    let mut chain = Blockchain::new(ChainConfig::default());
    chain.generate_genesis().unwrap();
    chain
}

fn assert_mempool_bound(chain: &Blockchain) {
    let mempool = chain.mempool();
    assert!(mempool.len() <= mempool.max_size());
    for tx in mempool.iter() {
        assert!(tx.fee() >= mempool.min_fee());
        assert!(tx.is_well_formed());
    }
}

fn assert_fingerprints_reproduce(chain: &Blockchain) {
    for block in chain.blocks() {
        assert_eq!(block.recompute_fingerprint(), block.fingerprint());
        for tx in block.transactions() {
            assert_eq!(tx.recompute_fingerprint(), tx.fingerprint());
        }
    }
    for tx in chain.mempool().iter() {
        assert_eq!(tx.recompute_fingerprint(), tx.fingerprint());
    }
}

/// Every back-reference resolves to a transaction with the same fingerprint.
fn assert_references_resolve(chain: &Blockchain) {
    for account in chain.accounts().values() {
        for tx_ref in account.tx_refs() {
            let tx = chain
                .resolve(tx_ref)
                .unwrap_or_else(|| panic!("dangling reference {:?}", tx_ref));
            assert_eq!(tx.fingerprint(), tx_ref.fingerprint);
        }
    }
}

#[test]
fn test_scenario_genesis() {
    let chain = genesis_chain();

    assert_eq!(chain.height(), 0);
    assert_eq!(chain.account(&Address::ROOT).unwrap().balance(), 100_000);
    assert_eq!(chain.current_fingerprint(), chain.blocks()[0].fingerprint());
    assert_eq!(chain.blocks()[0].recompute_fingerprint(), chain.current_fingerprint());
}

#[test]
fn test_scenario_submit_and_mine() {
    let mut chain = genesis_chain();
    let receiver = Address::random();
    let genesis_fingerprint = chain.current_fingerprint();

    let tx = Transaction::new(Address::ROOT, receiver, 500, 100, 1);
    chain.submit_transaction(tx.clone()).unwrap();

    assert_eq!(chain.mempool().len(), 1);
    let root_refs = chain.account(&Address::ROOT).unwrap().tx_refs();
    assert!(root_refs.iter().any(|r| r.fingerprint == tx.fingerprint()));

    let block = chain.propose_block();
    assert_eq!(block.height(), 1);
    assert_eq!(block.parent_fingerprint(), genesis_fingerprint);
    assert_eq!(block.transactions(), &[tx]);

    chain.process_block(block).unwrap();

    let root = chain.account(&Address::ROOT).unwrap();
    assert_eq!(root.balance(), 100_000 - 500 - 100);
    assert_eq!(root.nonce(), 1);
    assert_eq!(chain.account(&receiver).unwrap().balance(), 500);
    assert_eq!(chain.mempool().len(), 0);
    assert_eq!(chain.height(), 1);
    assert_references_resolve(&chain);
}

#[test]
fn test_scenario_nonce_gap_rejected() {
    let mut chain = genesis_chain();
    let tx = Transaction::new(Address::ROOT, Address::random(), 500, 100, 5);

    let err = chain.submit_transaction(tx).unwrap_err();

    assert_eq!(
        err,
        SubmitError::Invalid(ValidationError::InvalidNonce {
            expected: 1,
            got: 5
        })
    );
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(chain.mempool().is_empty());
}

#[test]
fn test_scenario_incompatible_mempools() {
    let mut a = Mempool::with_config(MempoolConfig {
        max_size: 1024,
        min_fee: 25,
    });
    let mut b = Mempool::with_config(MempoolConfig {
        max_size: 1024,
        min_fee: 50,
    });
    a.add(Transaction::new(Address::ROOT, Address::random(), 1, 100, 1))
        .unwrap();
    b.add(Transaction::new(Address::ROOT, Address::random(), 2, 100, 1))
        .unwrap();
    let (a_before, b_before) = (a.clone(), b.clone());

    let err = a.merge(&b).unwrap_err();

    assert!(matches!(err, MempoolError::IncompatiblePools { .. }));
    assert_eq!(err.kind(), ErrorKind::PoolIncompatibility);
    assert_eq!(a, a_before);
    assert_eq!(b, b_before);
}

#[test]
fn test_scenario_wrong_parent_rejected() {
    let mut chain = genesis_chain();
    chain
        .transfer(Address::ROOT, Address::random(), 10, 100, 0)
        .unwrap();
    let before = chain.stats();
    let proposed = chain.propose_block();
    let forged = Block::propose(
        Fingerprint(0x1234),
        proposed.height(),
        proposed.transactions().to_vec(),
    );

    let err = chain.process_block(forged).unwrap_err();

    assert!(matches!(
        err,
        BlockError::Linkage(ValidationError::InvalidParent { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(chain.stats(), before);
    assert_eq!(chain.account(&Address::ROOT).unwrap().balance(), 100_000);
}

#[test]
fn test_rejected_block_can_be_reproposed() {
    let mut chain = genesis_chain();
    chain
        .transfer(Address::ROOT, Address::random(), 10, 100, 0)
        .unwrap();

    let mut tampered = chain.propose_block();
    tampered.pop_tx();
    tampered.add_tx(Transaction::new(Address::ROOT, Address::random(), 99_999, 100, 1))
        .unwrap();
    assert!(chain.process_block(tampered).is_err());

    let block = chain.propose_block();
    assert!(chain.process_block(block).is_ok());
    assert_eq!(chain.height(), 1);
}

#[test]
fn test_random_workload_invariants() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut chain = genesis_chain();
    let mut population: Vec<Address> = vec![Address::ROOT];
    population.extend((0..6).map(|_| Address::random()));
    let mut nonces: HashMap<Address, u64> = HashMap::new();

    for round in 0..40 {
        for _ in 0..rng.gen_range(1..6) {
            let from = population[rng.gen_range(0..population.len())];
            let to = population[rng.gen_range(0..population.len())];
            let balance = chain.account(&from).map_or(0, |a| a.balance());
            let amount = rng.gen_range(0..=balance / 2 + 1);
            let fee = rng.gen_range(1..200);
            // Mostly auto-assigned nonces, sometimes an arbitrary one.
            let nonce = if rng.gen_bool(0.8) {
                0
            } else {
                rng.gen_range(1..5)
            };
            let _ = chain.transfer(from, to, amount, fee, nonce);
        }

        if round % 7 == 3 {
            if let Some(tx) = chain.mempool().transactions().first().cloned() {
                assert!(chain.drop_pending(&tx.fingerprint()).is_some());
            }
        }
        assert_mempool_bound(&chain);

        let supply_before = chain.total_supply();
        let block = chain.propose_block();
        let fees = block.total_fees();
        chain.process_block(block.clone()).unwrap();

        // Fees are burned.
        assert_eq!(chain.total_supply(), supply_before - fees);

        for tx in block.transactions() {
            *nonces.entry(*tx.from()).or_default() += 1;
        }
        for (address, account) in chain.accounts() {
            let applied = nonces.get(address).copied().unwrap_or(0);
            assert_eq!(account.nonce(), applied);
        }
        for tx in chain.mempool().iter() {
            let sender = chain.account(tx.from()).unwrap();
            assert!(tx.nonce() > sender.nonce());
        }
        assert!(chain.account(&Address::ROOT).is_some());
        assert_eq!(
            chain.stats_base() + chain.block_averages().len() as u64,
            chain.height()
        );
        assert_references_resolve(&chain);
    }

    assert_eq!(chain.height(), 40);
    assert_eq!(
        chain.total_supply(),
        100_000 - chain.blocks().iter().map(Block::total_fees).sum::<u128>()
    );
    assert_fingerprints_reproduce(&chain);
}

#[test]
fn test_nonce_is_monotonic_across_failures() {
    let mut chain = genesis_chain();
    let receiver = Address::random();
    let mut last = 0;

    for amount in [100, 200, 1_000_000, 300] {
        let _ = chain.transfer(Address::ROOT, receiver, amount, 50, 0);
        let block = chain.propose_block();
        chain.process_block(block).unwrap();

        let nonce = chain.account(&Address::ROOT).unwrap().nonce();
        assert!(nonce >= last);
        last = nonce;
    }
    // The oversized transfer was never admitted.
    assert_eq!(last, 3);
}
