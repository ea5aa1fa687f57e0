//! Store-level properties: lookup, idempotent insert, removal and save round trips.

use reliquary_inventory::{
    ActorId, CategoryQuery, ContentTable, InventoryStore, ItemCategory, ItemId, ItemRecord, SaveRecord,
};

fn record(database_id: &str, category: ItemCategory) -> ItemRecord {
    ItemRecord::new(database_id, category).with_id(ItemId::new())
}

#[test]
fn insert_then_get_returns_equal_record_in_every_category() {
    let mut store = InventoryStore::new(ActorId(1));

    for (i, category) in ItemCategory::ALL.into_iter().enumerate() {
        let r = record(&format!("entry_{i}"), category).with_sort_order(i as i32);
        store.insert(r.clone()).unwrap();
        assert_eq!(store.get(r.id, category), Some(&r));
        assert_eq!(store.get(r.id, CategoryQuery::Any), Some(&r));
    }

    assert_eq!(store.len(), ItemCategory::COUNT);
}

#[test]
fn unknown_id_is_absent_everywhere() {
    let mut store = InventoryStore::new(ActorId(1));
    store.insert(record("apple", ItemCategory::Item)).unwrap();

    let stranger = ItemId::new();
    assert!(store.get(stranger, CategoryQuery::Any).is_none());
    for category in ItemCategory::ALL {
        assert!(store.get(stranger, category).is_none());
    }
}

#[test]
fn inserting_same_id_twice_keeps_one_entry() {
    let mut store = InventoryStore::new(ActorId(1));
    let r = record("sword_01", ItemCategory::Weapon);

    store.insert(r.clone()).unwrap();
    store.insert(r.clone()).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.section(ItemCategory::Weapon).count(), 1);
}

#[test]
fn remove_twice_is_a_noop_the_second_time() {
    let mut store = InventoryStore::new(ActorId(1));
    let r = record("sword_01", ItemCategory::Weapon);
    store.insert(r.clone()).unwrap();

    assert!(store.remove(r.id, ItemCategory::Weapon).is_some());
    assert!(store.remove(r.id, ItemCategory::Weapon).is_none());
    assert!(store.is_empty());
}

#[test]
fn save_and_restore_preserves_items() {
    let mut content = ContentTable::new();
    content.register(ItemRecord::new("sword_01", ItemCategory::Weapon).with_display_name("Iron Sword"));
    content.register(ItemRecord::new("helm", ItemCategory::Armor));

    let mut store = InventoryStore::new(ActorId(12));
    let sword = InventoryStore::resolve_from_content(&content, "sword_01").unwrap().with_sort_order(0);
    let helm = InventoryStore::resolve_from_content(&content, "helm").unwrap().with_sort_order(1);
    store.insert(sword.clone()).unwrap();
    store.insert(helm.clone()).unwrap();

    let text = SaveRecord::capture(&store, "local:12").to_toml_string().unwrap();
    let restored = SaveRecord::from_toml_str(&text).unwrap().restore(&content);

    assert_eq!(restored, store);
}
