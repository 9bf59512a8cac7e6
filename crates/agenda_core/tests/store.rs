use agenda_core::{
    AgendaListQuery, AgendaStore, AgendaUpdate, DatabaseLocation, NewAgenda, NewUser, RepoError,
    StoreConfig, Weekday, ROLE_ADMIN, ROLE_USER,
};
use std::sync::{Arc, Barrier};
use std::thread;

fn file_store(dir: &tempfile::TempDir) -> AgendaStore {
    AgendaStore::open(&StoreConfig::file(dir.path().join("agenda.db"))).unwrap()
}

#[test]
fn example_scenario_through_store() {
    let store = AgendaStore::open(&StoreConfig::in_memory()).unwrap();

    let alice = store
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    assert_eq!(alice.id, 1);
    assert!(matches!(
        store.create_user(&NewUser::new("b@x.com", "alice", "hash2")),
        Err(RepoError::Duplicate { field: "username", .. })
    ));

    let standup = store
        .create_agenda(&NewAgenda::new(1, Weekday::Monday, "09:30", true, "standup"))
        .unwrap();
    assert_eq!(
        store
            .list_agendas_for_user(1, &AgendaListQuery::default())
            .unwrap(),
        vec![standup]
    );
}

#[test]
fn store_config_deserializes_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("from-json.db");
    let json = serde_json::json!({
        "database": { "file": path },
        "max_connections": 4
    });

    let config: StoreConfig = serde_json::from_value(json).unwrap();
    assert_eq!(config.database, DatabaseLocation::File(path.clone()));
    assert_eq!(config.max_connections, 4);

    let store = AgendaStore::open(&config).unwrap();
    store
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    assert!(path.exists());
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = file_store(&dir);
        let alice = store
            .register(&NewUser::new("a@x.com", "alice", "hash1"), ROLE_USER)
            .unwrap();
        store
            .create_agenda(&NewAgenda::new(
                alice.user.id,
                Weekday::Tuesday,
                "07:45",
                false,
                "run",
            ))
            .unwrap();
    }

    let store = file_store(&dir);
    let details = store.details("alice").unwrap().unwrap();
    assert_eq!(
        store.find_user_details_by_username("alice").unwrap(),
        Some(details.clone())
    );
    assert!(details.has_role(ROLE_USER));
    assert_eq!(details.agendas.len(), 1);
    assert_eq!(details.agendas[0].note, "run");
}

#[test]
fn concurrent_creates_with_same_username_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(file_store(&dir));
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|index| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.create_user(&NewUser::new(
                    format!("racer{index}@x.com"),
                    "racer",
                    "hash",
                ))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(
        |err| matches!(err, RepoError::Duplicate { field: "username", .. })
    ));
    assert_eq!(store.list_users().unwrap().len(), 1);
}

#[test]
fn concurrent_registrations_share_one_default_role() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(file_store(&dir));

    let handles: Vec<_> = (0..6)
        .map(|index| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.register(
                    &NewUser::new(format!("u{index}@x.com"), format!("user{index}"), "hash"),
                    ROLE_USER,
                )
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let roles = store.list_roles().unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(store.users_with_role(roles[0].id).unwrap().len(), 6);
}

#[test]
fn failed_registration_leaves_nothing_behind() {
    let store = AgendaStore::open(&StoreConfig::in_memory()).unwrap();
    store
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();

    let err = store
        .register(&NewUser::new("b@x.com", "alice", "hash2"), ROLE_ADMIN)
        .unwrap_err();

    assert!(matches!(err, RepoError::Duplicate { .. }));
    assert!(store.find_role_by_name(ROLE_ADMIN).unwrap().is_none());
    assert_eq!(store.list_users().unwrap().len(), 1);
}

#[test]
fn ban_and_unban_through_store() {
    let store = AgendaStore::open(&StoreConfig::in_memory()).unwrap();
    store
        .register(&NewUser::new("a@x.com", "alice", "hash1"), ROLE_USER)
        .unwrap();

    store.ban("alice").unwrap();
    assert!(!store.find_user_by_username("alice").unwrap().unwrap().enabled);
    store.unban("alice").unwrap();
    assert!(store.find_user_by_username("alice").unwrap().unwrap().enabled);

    let granted = store.grant_role("alice", ROLE_ADMIN).unwrap();
    let alice = store.find_user_by_username("alice").unwrap().unwrap();
    assert!(store.roles_for_user(alice.id).unwrap().contains(&granted));
    store.revoke_role(alice.id, granted.id).unwrap();
    assert!(!store.details("alice").unwrap().unwrap().has_role(ROLE_ADMIN));

    assert!(matches!(
        store.set_user_enabled("nobody", false),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn schedules_through_store() {
    let store = AgendaStore::open(&StoreConfig::in_memory()).unwrap();
    let alice = store
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let bob = store
        .create_user(&NewUser::new("b@x.com", "bob", "hash2"))
        .unwrap();
    let shared = store
        .create_agenda(&NewAgenda::new(bob.id, Weekday::Saturday, "10:00", true, "hike"))
        .unwrap();
    store
        .create_agenda(&NewAgenda::new(bob.id, Weekday::Saturday, "20:00", false, "dinner"))
        .unwrap();

    let week = store.weekly_schedule(bob.id).unwrap();
    assert_eq!(week.day(Weekday::Saturday).entries.len(), 2);
    assert_eq!(week.total_entries(), 2);

    let view = store.shared_schedule(alice.id).unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].owner_username, "bob");
    assert_eq!(view[0].agendas, vec![shared.clone()]);
    assert_eq!(store.list_accessible_agendas(alice.id).unwrap(), vec![shared]);
    assert!(store.shared_schedule(bob.id).unwrap().is_empty());
}

#[test]
fn agenda_ownership_through_store() {
    let store = AgendaStore::open(&StoreConfig::in_memory()).unwrap();
    let alice = store
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let bob = store
        .create_user(&NewUser::new("b@x.com", "bob", "hash2"))
        .unwrap();
    let agenda = store
        .create_agenda(&NewAgenda::new(alice.id, Weekday::Monday, "09:30", true, "standup"))
        .unwrap();

    let changes = AgendaUpdate {
        day: Some(Weekday::Tuesday),
        ..AgendaUpdate::default()
    };
    assert!(matches!(
        store.update_agenda(agenda.id, bob.id, &changes),
        Err(RepoError::Forbidden { .. })
    ));
    assert_eq!(
        store.update_agenda(agenda.id, alice.id, &changes).unwrap().day,
        Weekday::Tuesday
    );
    assert!(matches!(
        store.delete_agenda(agenda.id, bob.id),
        Err(RepoError::Forbidden { .. })
    ));

    store.delete_agenda(agenda.id, alice.id).unwrap();
    assert!(store.get_agenda(agenda.id).unwrap().is_none());
    assert!(matches!(
        store.delete_agenda(agenda.id, alice.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn deleting_user_through_store_cascades() {
    let store = AgendaStore::open(&StoreConfig::in_memory()).unwrap();
    let alice = store
        .register(&NewUser::new("a@x.com", "alice", "hash1"), ROLE_USER)
        .unwrap()
        .user;
    store
        .create_agenda(&NewAgenda::new(alice.id, Weekday::Monday, "09:30", true, "standup"))
        .unwrap();
    store.update_password(alice.id, "hash2").unwrap();
    assert_eq!(
        store.find_user_by_email("a@x.com").unwrap().unwrap().password,
        "hash2"
    );

    store.delete_user(alice.id).unwrap();

    assert!(store.get_user(alice.id).unwrap().is_none());
    assert!(store.load_user_details(alice.id).unwrap().is_none());
    assert!(store
        .list_agendas_for_user(alice.id, &AgendaListQuery::default())
        .unwrap()
        .is_empty());
    let role = store.find_role_by_name(ROLE_USER).unwrap().unwrap();
    assert!(store.users_with_role(role.id).unwrap().is_empty());
    assert_eq!(store.get_role(role.id).unwrap(), Some(role.clone()));
    store.delete_role(role.id).unwrap();
    assert!(store.list_roles().unwrap().is_empty());
}

#[test]
fn shared_schedule_stays_consistent_while_owners_are_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(file_store(&dir));
    let viewer = store
        .create_user(&NewUser::new("v@x.com", "viewer", "hash"))
        .unwrap();
    let mut owners = Vec::new();
    for index in 0..20 {
        let owner = store
            .create_user(&NewUser::new(
                format!("owner{index}@x.com"),
                format!("owner{index}"),
                "hash",
            ))
            .unwrap();
        for day in [Weekday::Monday, Weekday::Thursday] {
            store
                .create_agenda(&NewAgenda::new(owner.id, day, "08:00", true, "shared"))
                .unwrap();
        }
        owners.push(owner.id);
    }

    let deleter = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for id in owners {
                store.delete_user(id).unwrap();
            }
        })
    };
    for _ in 0..50 {
        let view = store.shared_schedule(viewer.id).unwrap();
        assert!(view.iter().all(|group| group.agendas.len() == 2));
    }
    deleter.join().unwrap();

    assert!(store.shared_schedule(viewer.id).unwrap().is_empty());
}
