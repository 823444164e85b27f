//! Multithreaded stress test: many concurrent logical connections issuing
//! overlapping write / block-write / block-read traffic and validating every
//! reply.
//!
//! Workers are joined through a channel with a hard timeout; a worker that
//! fails validation or never finishes is a reported test failure, not a
//! crash.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use ipbus_dummy::{
    ControlClient, DummyConfig, DummyServer, ServerHandle, TransactionReply, Version,
};

const N_THREADS: usize = 10;
const BLOCK_SIZE: usize = 100;
const JOIN_TIMEOUT: Duration = Duration::from_secs(50);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

// Shrink the register file so ten servers do not allocate 40 MiB.
const TEST_MASK: u32 = 0xFFFF;

/// Small deterministic generator so workers produce distinct data without a
/// seed-sensitive dependency.
struct Lcg(u32);

impl Lcg {
    fn new(seed: u32) -> Self {
        Lcg(seed.wrapping_mul(2654435761).wrapping_add(1))
    }

    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1664525).wrapping_add(1013904223);
        self.0
    }
}

fn start_server(version: Version) -> ServerHandle {
    DummyServer::new(DummyConfig::new(version).with_address_mask(TEST_MASK))
        .expect("server should bind an ephemeral port")
        .spawn()
}

/// One worker's traffic: a single-register write + readback, then a block
/// write + block read, all validated.
fn job(
    handle_addr: std::net::SocketAddr,
    version: Version,
    seed: u32,
    reg_addr: u32,
    mem_addr: u32,
) -> ipbus_dummy::Result<()> {
    let mut client = ControlClient::connect(handle_addr, version, CLIENT_TIMEOUT)?;
    let mut rng = Lcg::new(seed);

    let x = rng.next();
    client.queue_write(reg_addr, &[x]);
    client.queue_read(reg_addr, 1);
    let replies = client.dispatch()?;
    assert_eq!(replies[1], TransactionReply::Read(vec![x]));

    let block: Vec<u32> = (0..BLOCK_SIZE).map(|_| rng.next()).collect();
    client.queue_write(mem_addr, &block);
    client.dispatch()?;

    client.queue_read(mem_addr, BLOCK_SIZE as u32);
    let replies = client.dispatch()?;
    assert_eq!(replies[0], TransactionReply::Read(block));

    Ok(())
}

/// Spawn `jobs` workers and join them all under one hard deadline.
fn launch_threads<F>(jobs: Vec<F>)
where
    F: FnOnce() -> ipbus_dummy::Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let n_jobs = jobs.len();

    for (index, job) in jobs.into_iter().enumerate() {
        let tx = tx.clone();
        thread::spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
                .map_err(|_| "worker panicked (see stderr)".to_string())
                .and_then(|result| result.map_err(|e| e.to_string()));
            // receiver hanging up just means the test already failed
            let _ = tx.send((index, outcome));
        });
    }
    drop(tx);

    let deadline = Instant::now() + JOIN_TIMEOUT;
    for _ in 0..n_jobs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((_, Ok(()))) => {}
            Ok((index, Err(e))) => panic!("worker {} failed: {}", index, e),
            Err(_) => panic!("workers did not finish within {:?}", JOIN_TIMEOUT),
        }
    }
}

#[test]
fn concurrent_clients_against_isolated_devices_v2() {
    let jobs: Vec<_> = (0..N_THREADS)
        .map(|i| {
            move || {
                let handle = start_server(Version::V2);
                job(handle.addr, Version::V2, i as u32, 0x1, 0x100)
            }
        })
        .collect();
    launch_threads(jobs);
}

#[test]
fn concurrent_clients_against_isolated_devices_v1() {
    let jobs: Vec<_> = (0..N_THREADS)
        .map(|i| {
            move || {
                let handle = start_server(Version::V1);
                job(handle.addr, Version::V1, i as u32, 0x1, 0x100)
            }
        })
        .collect();
    launch_threads(jobs);
}

#[test]
fn concurrent_clients_share_one_device() {
    let handle = start_server(Version::V2);
    let addr = handle.addr;

    // each worker owns a disjoint address range on the shared device
    let jobs: Vec<_> = (0..N_THREADS)
        .map(|i| {
            let base = 0x1000 + (i as u32) * 0x200;
            move || job(addr, Version::V2, 0xC0FFEE + i as u32, base, base + 0x10)
        })
        .collect();
    launch_threads(jobs);

    // keep the server alive until all workers are done
    drop(handle);
}

#[test]
fn replies_preserve_declaration_order_under_load() {
    let handle = start_server(Version::V2);
    let mut client = ControlClient::connect(handle.addr, Version::V2, CLIENT_TIMEOUT)
        .expect("client should connect");

    // many small transactions in one packet; validation in dispatch()
    // checks that every reply header arrives in declared order
    for round in 0..50u32 {
        for slot in 0..8u32 {
            client.queue_write(0x800 + slot, &[round * 8 + slot]);
            client.queue_read(0x800 + slot, 1);
        }
        let replies = client.dispatch().expect("dispatch should succeed");
        for slot in 0..8usize {
            assert_eq!(
                replies[slot * 2 + 1],
                TransactionReply::Read(vec![round * 8 + slot as u32])
            );
        }
    }
}
