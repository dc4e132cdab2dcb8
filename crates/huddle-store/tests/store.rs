//! `SqliteStore` against an on-disk database.

use std::sync::Arc;

use assert_matches::assert_matches;
use huddle_core::{GroupId, MembershipStore, StoreError, UserDirectory, UserId};
use huddle_settings::DatabaseSettings;
use huddle_store::{DbError, SqliteStore};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> SqliteStore {
    let settings = DatabaseSettings {
        path: dir.path().join("nested/huddle.db").display().to_string(),
        pool_size: 4,
        busy_timeout_ms: 5000,
    };
    SqliteStore::open(&settings).unwrap()
}

#[tokio::test]
async fn scenario_message_row_for_member() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = store.create_user("A").await.unwrap();
    let b = store.create_user("B").await.unwrap();
    let group = store.create_group("Algorithms", "", a.id).await.unwrap();
    store.join_group(group.id, b.id).await.unwrap();

    let msg = store.create_message(group.id, a.id, "hi").await.unwrap();
    assert_eq!(msg.group_id, group.id);
    assert_eq!(msg.user_id, a.id);
    assert_eq!(msg.body, "hi");

    let history = store.message_history(group.id, 50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "hi");
    assert_eq!(history[0].username, "A");
    assert_eq!(
        history[0].timestamp,
        huddle_core::format_timestamp(msg.created_at)
    );
}

#[tokio::test]
async fn directory_and_existence_lookups() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = store.create_user("A").await.unwrap();
    assert_eq!(store.find_user(a.id).await.unwrap(), Some(a.clone()));
    assert_eq!(store.find_user(UserId(999)).await.unwrap(), None);

    let group = store.create_group("g", "desc", a.id).await.unwrap();
    assert!(store.group_exists(group.id).await.unwrap());
    assert!(!store.group_exists(GroupId(999)).await.unwrap());
    assert_eq!(store.user_by_username("A").await.unwrap(), Some(a));
}

#[tokio::test]
async fn deleted_group_rejects_new_messages() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = store.create_user("A").await.unwrap();
    let group = store.create_group("g", "", a.id).await.unwrap();
    let _ = store.create_message(group.id, a.id, "before").await.unwrap();

    assert!(store.delete_group(group.id).await.unwrap());
    assert_matches!(
        store.create_message(group.id, a.id, "after").await,
        Err(StoreError::GroupNotFound(id)) if id == group.id
    );
    assert_eq!(store.message_count(group.id).await.unwrap(), 0);
}

#[tokio::test]
async fn membership_admin_operations() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = store.create_user("A").await.unwrap();
    let b = store.create_user("B").await.unwrap();
    let group = store.create_group("g", "", a.id).await.unwrap();

    store.join_group(group.id, b.id).await.unwrap();
    assert_matches!(
        store.join_group(group.id, b.id).await,
        Err(DbError::Domain(StoreError::Conflict(_)))
    );
    let fetched = store.group(group.id).await.unwrap().unwrap();
    assert_eq!(fetched.member_ids, vec![a.id, b.id]);

    store.leave_group(group.id, b.id).await.unwrap();
    let listed = store.list_groups().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].member_ids, vec![a.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_keep_per_author_order() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));
    let a = store.create_user("A").await.unwrap();
    let b = store.create_user("B").await.unwrap();
    let group = store.create_group("g", "", a.id).await.unwrap();

    let mut tasks = Vec::new();
    for author in [a.id, b.id] {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for i in 0..20 {
                let _ = store
                    .create_message(group.id, author, &format!("{author}-{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let history = store.message_history(group.id, 100).await.unwrap();
    assert_eq!(history.len(), 40);
    for author in [a.id, b.id] {
        let prefix = format!("{author}-");
        let seq: Vec<usize> = history
            .iter()
            .filter_map(|e| e.message.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..20).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn reopening_keeps_data() {
    let dir = TempDir::new().unwrap();
    let user_id = {
        let store = open_store(&dir);
        store.create_user("persisted").await.unwrap().id
    };
    let store = open_store(&dir);
    let user = store.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.username, "persisted");
}
