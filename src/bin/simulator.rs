//! Meridian Cluster Simulator
//!
//! A standalone binary that spins up an in-process cluster of consensus
//! nodes over the loopback transport, drives several random-beacon rounds
//! through real gossip (share inventories, get-data fetches, signature
//! recovery), and checks that every node rotates committees in lockstep.
//!
//! Usage: cargo run --bin simulator

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use parking_lot::Mutex;

use meridian::config::ConsensusConfig;
use meridian::consensus::beacon::RandomBeacon;
use meridian::consensus::chain::Chain;
use meridian::consensus::group::Group;
use meridian::consensus::rand::Rand;
use meridian::consensus::threshold::{GroupPublicKey, InsecureThreshold, ThresholdScheme};
use meridian::consensus::types::{Block, BlockProposal, NtShare, RandBeaconSig, RandBeaconSigShare};
use meridian::consensus::validator::ArtifactValidator;
use meridian::network::gossip::Gossip;
use meridian::network::mem::MemNetwork;
use meridian::network::{Network, Peer};
use meridian::{Addr, Hash};

// ── Configuration ──

const NUM_NODES: usize = 4;
const GROUP_COUNT: usize = 3;
const GROUP_SIZE: usize = 3;
const THRESHOLD: usize = 2;
const ROUNDS: u64 = 5;
const CLUSTER_SEED: &[u8] = b"meridian simulator seed";

/// Result of a single test scenario.
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn pass(name: &str, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.to_string(),
        }
    }
    fn fail(name: &str, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.to_string(),
        }
    }
}

// ── Cluster scaffolding ──

/// Chain stub: the simulator exercises the beacon and gossip layers, so the
/// chain only needs to answer round queries (mirroring the beacon) and hold
/// whatever blocks gossip hands it.
struct SimChain {
    beacon: Arc<RandomBeacon>,
    blocks: Mutex<HashMap<Hash, Block>>,
    finalized: Mutex<Vec<Block>>,
}

impl SimChain {
    fn new(beacon: Arc<RandomBeacon>) -> Self {
        SimChain {
            beacon,
            blocks: Mutex::new(HashMap::new()),
            finalized: Mutex::new(Vec::new()),
        }
    }
}

impl Chain for SimChain {
    fn round(&self) -> u64 {
        self.beacon.round()
    }
    fn block(&self, hash: &Hash) -> Option<Block> {
        self.blocks.lock().get(hash).cloned()
    }
    fn block_proposal(&self, _hash: &Hash) -> Option<BlockProposal> {
        None
    }
    fn nt_share(&self, _hash: &Hash) -> Option<NtShare> {
        None
    }
    fn need_notarize(&self, _prev_block: &Hash) -> bool {
        true
    }
    fn finalized(&self) -> Vec<Block> {
        self.finalized.lock().clone()
    }
    fn add_block(&self, block: Block, _weight: f64) -> Result<()> {
        self.blocks.lock().insert(block.hash(), block.clone());
        self.finalized.lock().push(block);
        Ok(())
    }
    fn add_block_proposal(&self, _bp: BlockProposal, _weight: f64) -> Result<()> {
        Ok(())
    }
    fn add_nt_share(&self, _share: NtShare, _group_id: usize) -> Result<Option<Block>> {
        Ok(None)
    }
}

/// Validator stub: every artifact passes, attributed to the currently
/// active committee for its role.
struct SimValidator {
    beacon: Arc<RandomBeacon>,
}

impl ArtifactValidator for SimValidator {
    fn validate_rand_beacon_sig_share(&self, _share: &RandBeaconSigShare) -> Option<usize> {
        Some(self.beacon.committees().0)
    }
    fn validate_rand_beacon_sig(&self, _sig: &RandBeaconSig) -> bool {
        true
    }
    fn validate_block(&self, _block: &Block) -> Option<f64> {
        Some(1.0)
    }
    fn validate_block_proposal(&self, _bp: &BlockProposal) -> Option<f64> {
        Some(1.0)
    }
    fn validate_nt_share(&self, _share: &NtShare) -> Option<usize> {
        Some(self.beacon.committees().2)
    }
}

struct SimNode {
    addr: String,
    gossip: Arc<Gossip>,
    beacon: Arc<RandomBeacon>,
}

fn member_addr(group: u8, member: u8) -> Addr {
    let mut addr = [member; 20];
    addr[0] = group;
    addr
}

fn make_groups() -> Vec<Arc<Group>> {
    (0..GROUP_COUNT as u8)
        .map(|g| {
            let members = (0..GROUP_SIZE as u8).map(|m| member_addr(g, m)).collect();
            Arc::new(Group::new(members, GroupPublicKey([g + 1; 32])))
        })
        .collect()
}

fn make_node(net: &MemNetwork, addr: &str) -> SimNode {
    let beacon = Arc::new(RandomBeacon::new(
        Rand::new(CLUSTER_SEED),
        make_groups(),
        Arc::new(InsecureThreshold),
        ConsensusConfig {
            group_size: GROUP_SIZE,
            group_threshold: THRESHOLD,
            block_time_ms: 1_000,
        },
    ));
    let chain = Arc::new(SimChain::new(Arc::clone(&beacon)));
    let validator = Arc::new(SimValidator {
        beacon: Arc::clone(&beacon),
    });
    let gossip = Arc::new(Gossip::new(
        Arc::new(net.clone()),
        validator,
        addr.to_string(),
        chain,
        Arc::clone(&beacon),
    ));
    SimNode {
        addr: addr.to_string(),
        gossip,
        beacon,
    }
}

/// Build a valid share for the cluster's current round, as signed by the
/// given member of the active random-beacon committee.
fn make_share(beacon: &RandomBeacon, member: usize) -> RandBeaconSigShare {
    let scheme = InsecureThreshold;
    let round = beacon.round();
    let last_sig_hash = beacon.history().last().unwrap().rand_val();
    let (rb, _, _) = beacon.committees();
    let groups = make_groups();
    let group = &groups[rb];
    let msg = RandBeaconSig {
        round,
        last_rand_val: last_sig_hash,
        sig: Vec::new(),
    }
    .sign_bytes();
    let key_share = scheme.derive_share(&group.pk, member);
    RandBeaconSigShare {
        owner: group.members[member],
        round,
        last_sig_hash,
        sig: scheme.sign(&key_share, &msg),
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..1_000 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    eprintln!("  {} timed out waiting for {}", "!!".red().bold(), what);
    false
}

// ── Scenarios ──

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("\n{}", "========================================".bright_cyan());
    println!("{}", "     MERIDIAN CLUSTER SIMULATOR".bright_cyan().bold());
    println!("{}\n", "========================================".bright_cyan());

    let mut results: Vec<TestResult> = Vec::new();

    // ── Phase 1: Bootstrap ──
    println!("{}", "[Phase 1] Bootstrapping cluster...".yellow());
    let net = MemNetwork::new();
    let seed_addr = "node-0";
    let mut nodes = Vec::new();
    for i in 0..NUM_NODES {
        let node = make_node(&net, &format!("node-{i}"));
        if let Err(err) = Arc::clone(&node.gossip).start(seed_addr).await {
            println!("  {} node {} failed to start: {err}", "FAIL".red().bold(), i);
            results.push(TestResult::fail("Bootstrap", &format!("node {i}: {err}")));
            summarize(&results);
            return;
        }
        nodes.push(node);
    }
    // Announce every node to every other: an empty inventory makes the
    // receiver dial the sender back, giving gossip a full mesh to fan out
    // over instead of the star the seed bootstrap leaves behind.
    for node in &nodes {
        for other in &nodes {
            if node.addr == other.addr {
                continue;
            }
            if let Ok(proxy) = net.connect(&other.addr).await {
                let _ = proxy.inventory(&node.addr, vec![]).await;
            }
        }
    }
    println!(
        "  {} {} nodes online and meshed, all at round 1",
        "OK".green().bold(),
        NUM_NODES
    );
    results.push(TestResult::pass(
        "Bootstrap",
        &format!("{NUM_NODES} nodes online"),
    ));

    // ── Phase 2: Beacon rounds through gossip ──
    println!("{}", "[Phase 2] Driving beacon rounds through gossip...".yellow());
    let mut rounds_ok = true;
    for target in 2..=(ROUNDS + 1) {
        // Hand each committee member's share to a different node; gossip
        // has to bring them together before anyone can recover.
        for member in 0..THRESHOLD {
            let share = make_share(&nodes[0].beacon, member);
            let node = &nodes[(member + target as usize) % NUM_NODES];
            let Ok(proxy) = net.connect(&node.addr).await else {
                rounds_ok = false;
                break;
            };
            if proxy.rand_beacon_sig_share(share).await.is_err() {
                rounds_ok = false;
            }
        }

        let all_advanced = wait_until(&format!("round {target}"), || {
            nodes.iter().all(|n| n.beacon.round() == target)
        })
        .await;
        if !all_advanced {
            rounds_ok = false;
            break;
        }
        println!("  {} all nodes at round {}", "OK".green().bold(), target);
    }
    results.push(if rounds_ok {
        TestResult::pass("Beacon rounds", &format!("{ROUNDS} rounds via gossip"))
    } else {
        TestResult::fail("Beacon rounds", "nodes failed to advance in lockstep")
    });

    // ── Phase 3: Cross-node agreement ──
    println!("{}", "[Phase 3] Checking cross-node agreement...".yellow());
    let histories_match = nodes
        .iter()
        .all(|n| n.beacon.history() == nodes[0].beacon.history());
    let committees_match = nodes
        .iter()
        .all(|n| n.beacon.committees() == nodes[0].beacon.committees());
    let (_, bp, _) = nodes[0].beacon.committees();
    let ranks_match = make_groups()[bp].members.iter().all(|member| {
        let reference = nodes[0].beacon.rank(member).ok();
        nodes.iter().all(|n| n.beacon.rank(member).ok() == reference)
    });
    if histories_match && committees_match && ranks_match {
        println!("  {} histories, committees, and ranks agree", "OK".green().bold());
        results.push(TestResult::pass(
            "Agreement",
            "identical history, committees, ranks",
        ));
    } else {
        results.push(TestResult::fail(
            "Agreement",
            &format!("histories={histories_match} committees={committees_match} ranks={ranks_match}"),
        ));
    }

    // ── Phase 4: Stale shares from a laggard ──
    println!("{}", "[Phase 4] Replaying a stale share...".yellow());
    let before: Vec<u64> = nodes.iter().map(|n| n.beacon.round()).collect();
    let mut stale = make_share(&nodes[0].beacon, 0);
    stale.round = 1;
    stale.last_sig_hash = nodes[0].beacon.history()[0].rand_val();
    if let Ok(proxy) = net.connect(&nodes[1].addr).await {
        let _ = proxy.rand_beacon_sig_share(stale).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after: Vec<u64> = nodes.iter().map(|n| n.beacon.round()).collect();
    if before == after {
        println!("  {} stale share rejected, no round movement", "OK".green().bold());
        results.push(TestResult::pass("Stale share", "rejected without effect"));
    } else {
        results.push(TestResult::fail("Stale share", "round state changed"));
    }

    // ── Phase 5: Late joiner sync ──
    println!("{}", "[Phase 5] Syncing a late joiner...".yellow());
    let joiner = make_node(&net, "node-late");
    match Arc::clone(&joiner.gossip).start(seed_addr).await {
        Ok(()) if joiner.beacon.round() == nodes[0].beacon.round() => {
            println!(
                "  {} joiner caught up to round {}",
                "OK".green().bold(),
                joiner.beacon.round()
            );
            results.push(TestResult::pass(
                "Late joiner",
                &format!("synced to round {}", joiner.beacon.round()),
            ));
        }
        Ok(()) => results.push(TestResult::fail(
            "Late joiner",
            &format!(
                "stuck at round {} vs cluster {}",
                joiner.beacon.round(),
                nodes[0].beacon.round()
            ),
        )),
        Err(err) => results.push(TestResult::fail("Late joiner", &err.to_string())),
    }

    summarize(&results);
}

fn summarize(results: &[TestResult]) {
    println!("\n{}", "========== RESULTS ==========".bright_cyan().bold());
    let mut failed = 0;
    for r in results {
        let tag = if r.passed {
            "PASS".green().bold()
        } else {
            failed += 1;
            "FAIL".red().bold()
        };
        println!("  [{}] {} — {}", tag, r.name, r.detail);
    }
    println!();
    if failed > 0 {
        println!("{}", format!("{failed} scenario(s) failed").red().bold());
        std::process::exit(1);
    }
    println!("{}", "all scenarios passed".green().bold());
}
