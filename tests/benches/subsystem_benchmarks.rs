//! Throughput benchmarks for the subsystems the node's hot paths lean on
//! hardest: chain append (block validation + signing), CAS put/get, WAL
//! transaction commit, context graph search, and secure-channel seal/open.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tempfile::TempDir;

use lbm_cas::CasStore;
use lbm_chain::Chain;
use lbm_crypto::agreement::X25519KeyPair;
use lbm_crypto::signatures::Ed25519KeyPair;
use lbm_graph::ContextGraph;
use lbm_types::cas::Visibility;
use lbm_types::{Block, Transaction};
use lbm_wal::Wal;

fn now_ms() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

fn signed_mint_block(chain: &Chain, key: &Ed25519KeyPair, to: &str, amount: u64) -> Block {
    let head = chain.head().expect("chain has genesis");
    let mut block = Block {
        group_id: chain.group_id().unwrap().to_string(),
        height: head.height + 1,
        prev: head.block_id().unwrap(),
        ts_ms: now_ms(),
        author: key.public_key().to_base64(),
        txs: vec![Transaction::Mint { to: to.to_string(), amount }],
        sig: None,
    };
    let bytes = block.signing_bytes().unwrap();
    block.sig = Some(key.sign(&bytes).to_base64());
    block
}

fn bench_chain_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("lbm-chain-append");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("append_single_mint_block", |b| {
        let key = Ed25519KeyPair::generate();
        let genesis = Chain::make_genesis("bench-group", "CREDIT", &key).unwrap();
        b.iter_batched(
            || {
                let mut chain = Chain::new_empty();
                chain.append(genesis.clone()).unwrap();
                chain
            },
            |mut chain| {
                let block = signed_mint_block(&chain, &key, &key.public_key().to_base64(), 1);
                black_box(chain.append(block).unwrap());
            },
            criterion::BatchSize::SmallInput,
        )
    });

    for chain_len in [10usize, 100, 500] {
        let key = Ed25519KeyPair::generate();
        let genesis = Chain::make_genesis("bench-group", "CREDIT", &key).unwrap();
        let mut chain = Chain::new_empty();
        chain.append(genesis).unwrap();
        for _ in 0..chain_len {
            let block = signed_mint_block(&chain, &key, &key.public_key().to_base64(), 1);
            chain.append(block).unwrap();
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("append_onto_existing_chain", chain_len), &chain, |b, chain| {
            let next_block = signed_mint_block(chain, &key, &key.public_key().to_base64(), 1);
            b.iter_batched(
                || chain.clone(),
                |mut c| black_box(c.append(next_block.clone()).unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_cas_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("lbm-cas");
    group.measurement_time(Duration::from_secs(10));

    for size in [256usize, 4096, 65536] {
        let dir = TempDir::new().unwrap();
        let cas = CasStore::open(dir.path()).unwrap();
        let data = vec![0x5au8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("put", size), &data, |b, data| {
            b.iter(|| {
                black_box(cas.put(data, Visibility::Public, "bench", None).unwrap());
            })
        });

        let hash = cas.put(&data, Visibility::Public, "bench", None).unwrap();
        group.bench_with_input(BenchmarkId::new("get", size), &hash, |b, hash| {
            b.iter(|| black_box(cas.get(hash).unwrap()))
        });
    }

    group.finish();
}

fn bench_wal_transaction_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("lbm-wal");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("commit_single_json_write", |b| {
        let dir = TempDir::new().unwrap();
        let wal = Wal::open(dir.path()).unwrap();
        let target = dir.path().join("state.json");
        let mut counter = 0u64;

        b.iter(|| {
            counter += 1;
            let tx = wal.begin();
            tx.write_json(&target, &serde_json::json!({"counter": counter})).unwrap();
            black_box(tx.commit().unwrap());
        })
    });

    group.finish();
}

fn bench_context_graph_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("lbm-graph-search");
    group.measurement_time(Duration::from_secs(10));

    for corpus_size in [100usize, 1000, 5000] {
        let mut graph = ContextGraph::new();
        for i in 0..corpus_size {
            let text = format!("topic {i} covers rust ownership borrowing and async runtimes in varying depth");
            graph.index_claim(&format!("hash-{i}"), &text, vec!["rust".into()], i as i64);
        }

        group.throughput(Throughput::Elements(corpus_size as u64));
        group.bench_with_input(BenchmarkId::new("search_top_10", corpus_size), &graph, |b, graph| {
            b.iter(|| black_box(graph.search("rust async ownership", 10, false)))
        });
    }

    group.finish();
}

fn bench_secure_channel_seal_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("lbm-channel");
    group.measurement_time(Duration::from_secs(10));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let (mut client_session, mut server_session) = rt.block_on(async {
        let client_sign = Ed25519KeyPair::generate();
        let client_enc = X25519KeyPair::generate();
        let server_sign = Ed25519KeyPair::generate();
        let server_enc = X25519KeyPair::generate();

        let (mut client_stream, mut server_stream) = tokio::io::duplex(64 * 1024);
        let client_fut = lbm_channel::client_handshake(&mut client_stream, &client_sign, &client_enc);
        let server_fut = lbm_channel::server_handshake(&mut server_stream, &server_sign, &server_enc);
        let (client_session, server_session) = tokio::join!(client_fut, server_fut);
        (client_session.unwrap(), server_session.unwrap())
    });

    for size in [64usize, 1024, 16384] {
        let payload = serde_json::json!({"data": "x".repeat(size)});

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("seal", size), &payload, |b, payload| {
            b.iter(|| black_box(client_session.seal(payload).unwrap()))
        });

        // `open` advances the per-direction counter, so each iteration needs
        // a fresh envelope with the next expected counter value.
        group.bench_function(BenchmarkId::new("open", size), |b| {
            b.iter_batched(
                || client_session.seal(&payload).unwrap(),
                |envelope| black_box(server_session.open::<serde_json::Value>(&envelope).unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_chain_append,
    bench_cas_put_get,
    bench_wal_transaction_commit,
    bench_context_graph_search,
    bench_secure_channel_seal_open,
);
criterion_main!(benches);
