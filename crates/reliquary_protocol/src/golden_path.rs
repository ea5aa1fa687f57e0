//! # Golden Path
//!
//! End-to-end runs of the three operations in both channel strategies, with
//! timing. Driven by the `inventory_golden_path` binary.

use std::fmt::Write as _;
use std::time::Instant;

use reliquary_inventory::{
    ActorId, CategoryQuery, ContentTable, ItemCategory, ItemRecord, PendingLockGuard, Transform, WorldSpawner,
};

use crate::authority::{InventoryAuthority, SharedAuthority};
use crate::channel::{channel_pair, LocalChannel, PredictorEndpoint};
use crate::component::InventoryComponent;
use crate::config::NodeConfig;
use crate::error::FailureReason;
use crate::events::InventoryEvent;
use crate::mock::MockSpawner;
use crate::role::Role;
use crate::server::AuthorityServer;

/// Latency target per scenario (microseconds).
const TARGET_US: u64 = 50_000;

const PLAYER: ActorId = ActorId(1);
const CHEST: ActorId = ActorId(2);

/// Result of one scenario.
#[derive(Clone, Debug)]
pub struct GoldenPathResult {
    /// Scenario name.
    pub name: String,
    /// Whether it passed.
    pub passed: bool,
    /// Latency in microseconds.
    pub latency_us: u64,
    /// Target latency in microseconds.
    pub target_us: u64,
    /// Details.
    pub details: String,
}

/// Golden path runner.
#[derive(Default)]
pub struct GoldenPathTest {
    results: Vec<GoldenPathResult>,
}

fn content() -> ContentTable {
    let mut table = ContentTable::new();
    table.register(ItemRecord::new("sword_01", ItemCategory::Weapon).with_display_name("Iron Sword"));
    table.register(ItemRecord::new("apple", ItemCategory::Item).with_display_name("Apple"));
    table
}

fn authority(config: &NodeConfig, world: &MockSpawner) -> SharedAuthority<MockSpawner> {
    let mut authority = InventoryAuthority::new(config, content(), world.clone());
    authority.register(PLAYER, Transform::at(0.0, 0.0, 0.0));
    authority.register(CHEST, Transform::at(4.0, 0.0, 0.0));
    authority.into_shared()
}

type Networked = (
    AuthorityServer<MockSpawner>,
    InventoryComponent<PredictorEndpoint, MockSpawner>,
    MockSpawner,
);

fn networked() -> Option<Networked> {
    let world = MockSpawner::new();
    let mut server =
        AuthorityServer::new(&NodeConfig::for_role(Role::Authority), authority(&NodeConfig::default(), &world)).ok()?;
    let (endpoint, link) = channel_pair();
    server.connect(PLAYER, link);
    let component =
        InventoryComponent::new(&NodeConfig::for_role(Role::Predictor), PLAYER, endpoint, world.clone()).ok()?;
    Some((server, component, world))
}

impl GoldenPathTest {
    /// Creates a new runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every scenario.
    pub fn run_all(&mut self) {
        self.test_collapsed_add();
        self.test_networked_pickup();
        self.test_transfer();
        self.test_remove_with_drop();
        self.test_lock_contention();
    }

    fn record(&mut self, name: &str, start: Instant, passed: bool, details: String) {
        let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        let mut details = details;
        if latency_us > TARGET_US {
            let _ = write!(details, " (latency {latency_us}μs > {TARGET_US}μs)");
        }
        self.results.push(GoldenPathResult {
            name: name.to_string(),
            passed: passed && latency_us <= TARGET_US,
            latency_us,
            target_us: TARGET_US,
            details,
        });
    }

    /// Add from content, authority and predictor collapsed in one process.
    fn test_collapsed_add(&mut self) {
        let config = NodeConfig::default();
        let world = MockSpawner::new();
        let channel = LocalChannel::new(authority(&config, &world));
        let Ok(mut component) = InventoryComponent::new(&config, PLAYER, channel, world) else {
            self.record("Collapsed Add", Instant::now(), false, "component setup failed".into());
            return;
        };
        let events = component.subscribe();

        let start = Instant::now();
        let accepted = component.try_add("sword_01", None, ItemCategory::Weapon);
        let event = events.try_recv();

        let (passed, details) = match (accepted, event) {
            (Ok(_), Ok(InventoryEvent::AddSucceeded { record, .. })) => (
                component.store().get(record.id, ItemCategory::Weapon) == Some(&record),
                format!("{} added as {}", record.database_id, record.id),
            ),
            (accepted, event) => (false, format!("accepted {accepted:?}, event {event:?}")),
        };
        self.record("Collapsed Add", start, passed, details);
    }

    /// World item pickup over the JSON transport.
    fn test_networked_pickup(&mut self) {
        let Some((mut server, mut component, world)) = networked() else {
            self.record("Networked Pickup", Instant::now(), false, "setup failed".into());
            return;
        };
        let handle = world.place(ItemRecord::new("apple", ItemCategory::Item), Transform::at(1.0, 0.0, 0.0));

        let start = Instant::now();
        let accepted = component.try_add("", Some(handle), ItemCategory::Item);
        let hidden = world.is_visible(handle) == Some(false);
        let handled = server.process_requests();
        let published = component.pump();

        let passed = accepted.is_ok()
            && hidden
            && handled == 1
            && matches!(published, Ok(1))
            && !world.contains(handle);
        let details = format!(
            "accepted={accepted:?} hidden={hidden} handled={handled} published={published:?} items={}",
            component.store().len()
        );
        self.record("Networked Pickup", start, passed, details);
    }

    /// Transfer from the player to a chest.
    fn test_transfer(&mut self) {
        let Some((mut server, mut component, _world)) = networked() else {
            self.record("Transfer", Instant::now(), false, "setup failed".into());
            return;
        };
        let start = Instant::now();

        let added = component.try_add("sword_01", None, ItemCategory::Weapon);
        server.process_requests();
        let pumped = component.pump();
        let Some(id) = component.store().iter().next().map(|r| r.id) else {
            self.record(
                "Transfer",
                start,
                false,
                format!("add did not land: accepted {added:?}, pump {pumped:?}"),
            );
            return;
        };

        let accepted = component.try_transfer(id, Some(CHEST), ItemCategory::Weapon);
        server.process_requests();
        let pumped = component.pump();

        let authority = server.authority().lock();
        let in_chest = authority.store(CHEST).is_some_and(|s| s.contains(id, ItemCategory::Weapon));
        let in_player = authority.store(PLAYER).is_some_and(|s| s.contains(id, CategoryQuery::Any));
        let mirrored = component.store().contains(id, CategoryQuery::Any);
        drop(authority);

        let passed = accepted.is_ok() && pumped.is_ok() && in_chest && !in_player && !mirrored;
        self.record(
            "Transfer",
            start,
            passed,
            format!("accepted={accepted:?} pump={pumped:?} chest={in_chest} player={in_player} mirror={mirrored}"),
        );
    }

    /// Remove with drop spawns exactly once above the owner.
    fn test_remove_with_drop(&mut self) {
        let Some((mut server, mut component, world)) = networked() else {
            self.record("Remove + Drop", Instant::now(), false, "setup failed".into());
            return;
        };
        let start = Instant::now();

        let added = component.try_add("sword_01", None, ItemCategory::Weapon);
        server.process_requests();
        let pumped = component.pump();
        let Some(id) = component.store().iter().next().map(|r| r.id) else {
            self.record(
                "Remove + Drop",
                start,
                false,
                format!("add did not land: accepted {added:?}, pump {pumped:?}"),
            );
            return;
        };

        let accepted = component.try_remove(id, ItemCategory::Weapon, true);
        server.process_requests();
        let pumped = component.pump();

        let spawns = world.spawn_calls().len();
        let passed = accepted.is_ok() && pumped.is_ok() && spawns == 1 && component.store().is_empty();
        self.record(
            "Remove + Drop",
            start,
            passed,
            format!("accepted={accepted:?} pump={pumped:?} spawn calls={spawns}"),
        );
    }

    /// A held pending lock makes a second pickup fail and unhide.
    fn test_lock_contention(&mut self) {
        let Some((mut server, mut component, world)) = networked() else {
            self.record("Lock Contention", Instant::now(), false, "setup failed".into());
            return;
        };
        let handle = world.place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());
        let Some(item) = world.world_item(handle) else {
            self.record("Lock Contention", Instant::now(), false, "item missing".into());
            return;
        };
        let start = Instant::now();

        let guard = PendingLockGuard::acquire(item.as_ref(), CHEST);
        let accepted = component.try_add("", Some(handle), ItemCategory::Item);
        server.process_requests();
        let events = component.subscribe();
        let pumped = component.pump();
        drop(guard);

        let locked = matches!(
            events.try_recv(),
            Ok(InventoryEvent::AddFailed { reason: Some(FailureReason::Locked { holder }), .. }) if holder == CHEST
        );
        let visible = world.is_visible(handle) == Some(true);
        let free = item.is_lock_free();

        self.record(
            "Lock Contention",
            start,
            accepted.is_ok() && pumped.is_ok() && locked && visible && free,
            format!("accepted={accepted:?} pump={pumped:?} locked={locked} visible={visible} free={free}"),
        );
    }

    /// Prints results.
    pub fn print_results(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║              INVENTORY GOLDEN PATH                               ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();

        for result in &self.results {
            let status = if result.passed { "✓ PASS" } else { "✗ FAIL" };
            println!("┌─ {} ", result.name);
            println!("│ Status:  {status}");
            println!("│ Latency: {}μs (target {}μs)", result.latency_us, result.target_us);
            println!("│ Details: {}", result.details);
            println!("└──────────────────────────────────────────────────────────────────");
            println!();
        }

        println!("╔══════════════════════════════════════════════════════════════════╗");
        if self.all_passed() {
            println!("║  ✓ ALL SCENARIOS PASSED                                          ║");
        } else {
            println!("║  ✗ SOME SCENARIOS FAILED                                         ║");
        }
        println!("╚══════════════════════════════════════════════════════════════════╝");
    }

    /// Every scenario's result.
    #[must_use]
    pub fn results(&self) -> &[GoldenPathResult] {
        &self.results
    }

    /// True if every scenario passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}
