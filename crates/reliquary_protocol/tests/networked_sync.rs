//! Predictor/authority convergence over the channel transport and in
//! collapsed mode.

use reliquary_inventory::{ActorId, CategoryQuery, ContentTable, ItemCategory, ItemRecord, Transform};
use reliquary_protocol::{
    channel_pair, AuthorityServer, FailureReason, InventoryAuthority, InventoryComponent, InventoryEvent,
    LocalChannel, MockSpawner, NodeConfig, Origin, PendingOperation, PredictorEndpoint, PredictorLink, Rejection,
    Role, SharedAuthority,
};

const PLAYER: ActorId = ActorId(1);
const RIVAL: ActorId = ActorId(2);
const CHEST: ActorId = ActorId(3);

fn shared_authority(world: &MockSpawner) -> SharedAuthority<MockSpawner> {
    let mut content = ContentTable::new();
    content.register(ItemRecord::new("sword_01", ItemCategory::Weapon));
    content.register(ItemRecord::new("apple", ItemCategory::Item));

    let mut authority = InventoryAuthority::new(&NodeConfig::default(), content, world.clone());
    for actor in [PLAYER, RIVAL, CHEST] {
        authority.register(actor, Transform::default());
    }
    authority.into_shared()
}

struct Session {
    world: MockSpawner,
    server: AuthorityServer<MockSpawner>,
}

impl Session {
    fn new() -> Self {
        let world = MockSpawner::new();
        let server = AuthorityServer::new(&NodeConfig::for_role(Role::Authority), shared_authority(&world)).unwrap();
        Self { world, server }
    }

    fn join(&mut self, actor: ActorId) -> InventoryComponent<PredictorEndpoint, MockSpawner> {
        let (endpoint, link) = channel_pair();
        self.server.connect(actor, link);
        InventoryComponent::new(&NodeConfig::for_role(Role::Predictor), actor, endpoint, self.world.clone()).unwrap()
    }
}

#[test]
fn pickup_stays_pending_until_authority_answers() {
    let mut session = Session::new();
    let mut player = session.join(PLAYER);
    let events = player.subscribe();
    let handle = session
        .world
        .place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());

    let accepted = player.try_add("", Some(handle), ItemCategory::Item).unwrap();
    assert_eq!(session.world.is_visible(handle), Some(false));
    assert!(player.store().is_empty());
    assert!(matches!(
        player.pending().next(),
        Some((seq, PendingOperation::Add { .. })) if seq == accepted.sequence
    ));

    assert_eq!(session.server.process_requests(), 1);
    assert_eq!(player.pump().unwrap(), 1);

    let Ok(InventoryEvent::AddSucceeded { record, origin, .. }) = events.try_recv() else {
        panic!("expected AddSucceeded");
    };
    assert_eq!(origin, Origin::Predicted(accepted.sequence));
    assert_eq!(player.store().get(record.id, ItemCategory::Item), Some(&record));
    assert!(!session.world.contains(handle));
    assert_eq!(player.pending().count(), 0);

    let canonical = session.server.authority().lock().store(PLAYER).cloned().unwrap();
    assert_eq!(&canonical, player.store());
}

#[test]
fn racing_pickups_resolve_to_one_owner() {
    let mut session = Session::new();
    let mut player = session.join(PLAYER);
    let mut rival = session.join(RIVAL);
    let player_events = player.subscribe();
    let rival_events = rival.subscribe();
    let handle = session
        .world
        .place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());

    // Rival asks first, but the server drains links in actor order.
    rival.try_add("", Some(handle), ItemCategory::Item).unwrap();
    player.try_add("", Some(handle), ItemCategory::Item).unwrap();
    assert_eq!(session.server.process_requests(), 2);
    player.pump().unwrap();
    rival.pump().unwrap();

    let authority = session.server.authority().lock();
    assert_eq!(authority.store(PLAYER).unwrap().len(), 1);
    assert!(authority.store(RIVAL).unwrap().is_empty());
    drop(authority);

    assert!(matches!(player_events.try_recv(), Ok(InventoryEvent::AddSucceeded { .. })));
    assert!(matches!(
        rival_events.try_recv(),
        Ok(InventoryEvent::AddFailed { reason: Some(FailureReason::WorldItemMissing { handle: missing }), .. })
            if missing == handle
    ));
    assert_eq!(player.store().len(), 1);
    assert!(rival.store().is_empty());
    assert_eq!(rival.pending().count(), 0);
}

#[test]
fn transfer_and_drop_converge() {
    let mut session = Session::new();
    let mut player = session.join(PLAYER);

    player.try_add("sword_01", None, ItemCategory::Weapon).unwrap();
    player.try_add("apple", None, ItemCategory::Item).unwrap();
    session.server.process_requests();
    player.pump().unwrap();
    assert_eq!(player.store().len(), 2);

    let sword = player.store().section(ItemCategory::Weapon).next().unwrap().id;
    let apple = player.store().section(ItemCategory::Item).next().unwrap().id;

    player.try_transfer(sword, Some(CHEST), CategoryQuery::Any).unwrap();
    player.try_remove(apple, ItemCategory::Item, true).unwrap();
    session.server.process_requests();
    player.pump().unwrap();

    assert!(player.store().is_empty());
    let authority = session.server.authority().lock();
    assert!(authority.store(PLAYER).unwrap().is_empty());
    assert!(authority.store(CHEST).unwrap().contains(sword, ItemCategory::Weapon));
    assert_eq!(session.world.spawn_calls().len(), 1);
}

#[test]
fn authority_initiated_transfer_replays_on_predictor() {
    let mut session = Session::new();
    let mut player = session.join(PLAYER);
    let events = player.subscribe();

    let given = session.server.try_add(CHEST, "sword_01", None, ItemCategory::Weapon).unwrap();
    assert!(given.success());
    let reliquary_protocol::InventoryResponse::Add(add) = given else {
        panic!("wrong response kind");
    };
    let id = add.record.unwrap().id;

    // Authority pulls the sword out of the chest into the player's store.
    let moved = session.server.try_transfer(PLAYER, id, Some(CHEST), ItemCategory::Weapon).unwrap();
    assert!(moved.success());

    player.pump().unwrap();
    assert!(player.store().contains(id, ItemCategory::Weapon));
    assert!(matches!(
        events.try_recv(),
        Ok(InventoryEvent::TransferSucceeded { from_this_inventory: false, origin: Origin::Authority(_), .. })
    ));
}

#[test]
fn lost_authority_rejects_new_requests() {
    let world = MockSpawner::new();
    let (endpoint, link) = channel_pair();
    drop(link);
    let mut player =
        InventoryComponent::new(&NodeConfig::for_role(Role::Predictor), PLAYER, endpoint, world).unwrap();

    assert_eq!(
        player.try_add("apple", None, ItemCategory::Item),
        Err(Rejection::ChannelUnavailable)
    );
    assert_eq!(player.pending().count(), 0);
}

#[test]
fn collapsed_mode_matches_networked_outcome() {
    let world = MockSpawner::new();
    let authority = shared_authority(&world);
    let channel = LocalChannel::new(authority.clone());
    let mut player = InventoryComponent::new(&NodeConfig::default(), PLAYER, channel, world.clone()).unwrap();
    let handle = world.place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());

    player.try_add("", Some(handle), ItemCategory::Item).unwrap();

    assert_eq!(player.pending().count(), 0);
    assert_eq!(player.store().len(), 1);
    assert!(!world.contains(handle));
    assert_eq!(authority.lock().store(PLAYER), Some(player.store()));
}

#[test]
fn collapsed_authority_operations_reach_local_predictor_once() {
    let world = MockSpawner::new();
    let config = NodeConfig::default();
    let authority = shared_authority(&world);
    let channel = LocalChannel::new(authority.clone());
    let mut link = channel.link();

    let mut server = AuthorityServer::new(&config, authority).unwrap();
    server.connect(PLAYER, link.clone());
    let mut player = InventoryComponent::new(&config, PLAYER, channel, world).unwrap();
    let events = player.subscribe();

    let given = server.try_add(PLAYER, "apple", None, ItemCategory::Item).unwrap();
    assert!(matches!(given.origin(), Origin::Authority(_)));

    // Same response delivered a second time.
    link.send_to_predictor(&given).unwrap();
    assert_eq!(player.pump().unwrap(), 1);
    assert!(matches!(events.try_recv(), Ok(InventoryEvent::AddSucceeded { .. })));
    assert!(events.try_recv().is_err());
    assert_eq!(player.store().len(), 1);

    let id = player.store().iter().next().map(|record| record.id).unwrap();
    let taken = server.try_remove(PLAYER, id, ItemCategory::Item, false).unwrap();
    assert!(taken.success());
    assert_eq!(player.pump().unwrap(), 1);
    assert!(player.store().is_empty());
    assert_eq!(server.authority().lock().store(PLAYER), Some(player.store()));
}
