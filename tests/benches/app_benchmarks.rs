//! # Lockstep Application Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | block | begin, N sends, end and commit |
//! | block/empty_commit | a block with no transactions |
//! | check | simulation and mempool admission of a signed send |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use ls_tests::fixtures::*;
use shared_types::Coins;

const SENDERS: u8 = 64;

/// Chain with `SENDERS` funded accounts, one block in.
fn funded_chain() -> TestChain {
    let mut builder = genesis().module_state(shared_types::names::MINT, no_inflation());
    for seed in 1..=SENDERS {
        builder = builder.fund(key(seed).address(), Coins::single(DENOM, 1_000_000_000));
    }
    let doc = builder.build().expect("genesis");
    let mut chain = TestChain::start(&doc, config()).expect("init chain");
    chain.empty_block().expect("block 1");
    chain
}

/// One send per sender, signed at each sender's committed sequence.
fn sends(chain: &TestChain, count: u8) -> Vec<Vec<u8>> {
    let recipient = key(200).address();
    (1..=count)
        .map(|seed| {
            let sender = key(seed);
            let (account_number, sequence) = chain.account(&sender.address());
            signed_tx(&sender, send(&sender, recipient, 1), 10, account_number, sequence)
        })
        .collect()
}

fn bench_block_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("block");
    group.measurement_time(Duration::from_secs(10));

    for size in [1u8, 16, SENDERS] {
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::new("sends_per_block", size), &size, |b, &size| {
            let mut chain = funded_chain();
            b.iter(|| {
                let txs = sends(&chain, size);
                let result = chain.block(&txs, Vec::new()).expect("block");
                black_box(result.app_hash)
            })
        });
    }
    group.finish();
}

fn bench_empty_commit(c: &mut Criterion) {
    let mut chain = funded_chain();
    c.bench_function("block/empty_commit", |b| {
        b.iter(|| black_box(chain.empty_block().expect("block").app_hash))
    });
}

fn bench_check_tx(c: &mut Criterion) {
    let chain = funded_chain();
    let tx = sends(&chain, 1).remove(0);
    // Simulation runs on a throwaway branch, so the same tx stays valid.
    c.bench_function("check/simulate_send", |b| {
        b.iter(|| black_box(chain.app.simulate(&tx).expect("simulate").gas_used))
    });
    c.bench_function("check/admit_send", |b| {
        b.iter_batched(
            funded_chain,
            |mut fresh| {
                let tx = sends(&fresh, 1).remove(0);
                black_box(fresh.app.check_tx(&tx).expect("check").code)
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_block_execution, bench_empty_commit, bench_check_tx);
criterion_main!(benches);
