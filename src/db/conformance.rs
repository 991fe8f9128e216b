//! Behavior every `Storage` backend must share. Each backend's tests call
//! [`run_all`] against a fresh instance.

use crate::auth::password::is_bcrypt_hash;
use crate::db::models::{
    AdminConfig, AdminUser, Favorite, FavoriteOrigin, PlayRecord, SkipConfig, UserRole,
    SEARCH_HISTORY_LIMIT,
};
use crate::db::storage::Storage;

pub fn play_record(title: &str) -> PlayRecord {
    PlayRecord {
        title: title.to_string(),
        source_name: "Bilibili".to_string(),
        year: "2024".to_string(),
        cover: "https://img.example/cover.jpg".to_string(),
        index: 3,
        total_episodes: 12,
        play_time: 615.0,
        total_time: 1420.0,
        save_time: 1_700_000_000_000,
        search_title: Some(title.to_lowercase()),
    }
}

pub fn favorite(title: &str) -> Favorite {
    Favorite {
        title: title.to_string(),
        source_name: "Bilibili".to_string(),
        year: "2023".to_string(),
        cover: String::new(),
        total_episodes: 24,
        save_time: 1_700_000_000_001,
        search_title: None,
        origin: Some(FavoriteOrigin::Vod),
    }
}

pub async fn run_all(storage: &dyn Storage) {
    play_record_round_trip(storage).await;
    favorites_round_trip(storage).await;
    skip_configs_round_trip(storage).await;
    user_namespaces_are_isolated(storage).await;
    search_history_move_to_front(storage).await;
    search_history_cap(storage).await;
    register_and_verify(storage).await;
    legacy_password_migrates(storage).await;
    change_password(storage).await;
    delete_user_removes_data(storage).await;
    admin_config_round_trip(storage).await;
    clear_all_data(storage).await;
}

async fn play_record_round_trip(storage: &dyn Storage) {
    let user = "pr_user";
    let record = play_record("Spirited Away");

    storage.set_play_record(user, "bilibili+12345", &record).await.unwrap();
    assert_eq!(
        storage.get_play_record(user, "bilibili+12345").await.unwrap(),
        Some(record.clone())
    );

    let all = storage.get_all_play_records(user).await.unwrap();
    assert_eq!(all.get("bilibili+12345"), Some(&record));

    let mut updated = record.clone();
    updated.index = 4;
    storage.set_play_record(user, "bilibili+12345", &updated).await.unwrap();
    assert_eq!(
        storage.get_play_record(user, "bilibili+12345").await.unwrap().map(|r| r.index),
        Some(4)
    );

    storage.delete_play_record(user, "bilibili+12345").await.unwrap();
    let all = storage.get_all_play_records(user).await.unwrap();
    assert!(!all.contains_key("bilibili+12345"));

    storage.set_play_record(user, "a+1", &record).await.unwrap();
    storage.set_play_record(user, "b+2", &record).await.unwrap();
    storage.clear_play_records(user).await.unwrap();
    assert!(storage.get_all_play_records(user).await.unwrap().is_empty());
}

async fn favorites_round_trip(storage: &dyn Storage) {
    let user = "fav_user";
    let fav = favorite("Frieren");

    storage.set_favorite(user, "douban+42", &fav).await.unwrap();
    storage.set_favorite(user, "douban+43", &favorite("Dungeon Meshi")).await.unwrap();
    assert_eq!(storage.get_favorite(user, "douban+42").await.unwrap(), Some(fav));
    assert_eq!(storage.get_all_favorites(user).await.unwrap().len(), 2);

    storage.delete_favorite(user, "douban+42").await.unwrap();
    assert!(storage.get_favorite(user, "douban+42").await.unwrap().is_none());

    storage.clear_favorites(user).await.unwrap();
    assert!(storage.get_all_favorites(user).await.unwrap().is_empty());
}

async fn skip_configs_round_trip(storage: &dyn Storage) {
    let user = "skip_user";
    let config = SkipConfig {
        enable: true,
        intro_time: 90,
        outro_time: 120,
    };

    storage.set_skip_config(user, "bilibili", "7", &config).await.unwrap();
    assert_eq!(
        storage.get_skip_config(user, "bilibili", "7").await.unwrap(),
        Some(config.clone())
    );
    let all = storage.get_all_skip_configs(user).await.unwrap();
    assert_eq!(all.get("bilibili+7"), Some(&config));

    storage.delete_skip_config(user, "bilibili", "7").await.unwrap();
    assert!(storage.get_skip_config(user, "bilibili", "7").await.unwrap().is_none());
    assert!(storage.get_all_skip_configs(user).await.unwrap().is_empty());
}

async fn user_namespaces_are_isolated(storage: &dyn Storage) {
    let (a, b) = ("iso_a", "iso_b");
    storage.set_play_record(a, "x+1", &play_record("A")).await.unwrap();
    storage.set_favorite(a, "x+1", &favorite("A")).await.unwrap();
    storage
        .set_skip_config(a, "x", "1", &SkipConfig { enable: true, intro_time: 1, outro_time: 2 })
        .await
        .unwrap();
    storage.add_search_history(a, "secret").await.unwrap();

    assert!(storage.get_play_record(b, "x+1").await.unwrap().is_none());
    assert!(storage.get_all_play_records(b).await.unwrap().is_empty());
    assert!(storage.get_all_favorites(b).await.unwrap().is_empty());
    assert!(storage.get_all_skip_configs(b).await.unwrap().is_empty());
    assert!(storage.get_search_history(b).await.unwrap().is_empty());
}

async fn search_history_move_to_front(storage: &dyn Storage) {
    let user = "sh_user";
    storage.add_search_history(user, "foo").await.unwrap();
    storage.add_search_history(user, "bar").await.unwrap();
    storage.add_search_history(user, "foo").await.unwrap();

    let history = storage.get_search_history(user).await.unwrap();
    assert_eq!(history, vec!["foo".to_string(), "bar".to_string()]);

    storage.delete_search_history(user, Some("foo")).await.unwrap();
    assert_eq!(storage.get_search_history(user).await.unwrap(), vec!["bar".to_string()]);

    storage.delete_search_history(user, None).await.unwrap();
    assert!(storage.get_search_history(user).await.unwrap().is_empty());
}

async fn search_history_cap(storage: &dyn Storage) {
    let user = "sh_cap_user";
    for i in 0..(SEARCH_HISTORY_LIMIT + 5) {
        storage.add_search_history(user, &format!("kw{}", i)).await.unwrap();
    }

    let history = storage.get_search_history(user).await.unwrap();
    assert_eq!(history.len(), SEARCH_HISTORY_LIMIT);
    assert_eq!(history[0], format!("kw{}", SEARCH_HISTORY_LIMIT + 4));
    assert!(!history.contains(&"kw4".to_string()));
    assert!(history.contains(&"kw5".to_string()));
}

async fn register_and_verify(storage: &dyn Storage) {
    storage.register_user("alice", "pw1").await.unwrap();

    assert!(storage.check_user_exist("alice").await.unwrap());
    assert!(!storage.check_user_exist("nobody").await.unwrap());
    assert!(storage.verify_user("alice", "pw1").await.unwrap());
    assert!(!storage.verify_user("alice", "wrong").await.unwrap());
    assert!(!storage.verify_user("nobody", "pw1").await.unwrap());

    let stored = storage.get_user_password_hash("alice").await.unwrap().unwrap();
    assert!(is_bcrypt_hash(&stored));
    assert!(storage.get_all_users().await.unwrap().contains(&"alice".to_string()));
}

async fn legacy_password_migrates(storage: &dyn Storage) {
    storage.set_user_password_hash("legacy", "pw1").await.unwrap();

    assert!(storage.verify_user("legacy", "pw1").await.unwrap());
    let stored = storage.get_user_password_hash("legacy").await.unwrap().unwrap();
    assert!(is_bcrypt_hash(&stored));
    assert!(storage.verify_user("legacy", "pw1").await.unwrap());
}

async fn change_password(storage: &dyn Storage) {
    storage.register_user("bob", "old").await.unwrap();
    storage.change_password("bob", "new").await.unwrap();

    assert!(!storage.verify_user("bob", "old").await.unwrap());
    assert!(storage.verify_user("bob", "new").await.unwrap());
}

async fn delete_user_removes_data(storage: &dyn Storage) {
    let user = "carol";
    storage.set_user_password_hash(user, "$2b$10$placeholder").await.unwrap();
    storage.set_play_record(user, "s+1", &play_record("C")).await.unwrap();
    storage.set_favorite(user, "s+1", &favorite("C")).await.unwrap();
    storage.add_search_history(user, "kw").await.unwrap();

    storage.delete_user(user).await.unwrap();

    assert!(!storage.check_user_exist(user).await.unwrap());
    assert!(!storage.get_all_users().await.unwrap().contains(&user.to_string()));
    assert!(storage.get_all_play_records(user).await.unwrap().is_empty());
    assert!(storage.get_all_favorites(user).await.unwrap().is_empty());
    assert!(storage.get_search_history(user).await.unwrap().is_empty());
}

async fn admin_config_round_trip(storage: &dyn Storage) {
    let mut config = AdminConfig::default();
    config.site_config.site_name = "Conformance".to_string();
    config.user_config.users.push(AdminUser {
        username: "alice".to_string(),
        role: UserRole::Admin,
        banned: false,
    });

    storage.set_admin_config(&config).await.unwrap();
    assert_eq!(storage.get_admin_config().await.unwrap(), Some(config));
}

async fn clear_all_data(storage: &dyn Storage) {
    storage.register_user("dave", "pw").await.unwrap();
    storage.set_favorite("dave", "s+1", &favorite("D")).await.unwrap();

    storage.clear_all_data().await.unwrap();

    assert!(storage.get_all_users().await.unwrap().is_empty());
    assert!(storage.get_all_favorites("dave").await.unwrap().is_empty());
    assert!(storage.get_admin_config().await.unwrap().is_none());
}
