use agenda_core::db::open_db_in_memory;
use agenda_core::{
    AccountService, AgendaRepository, NewAgenda, NewUser, RepoError, RoleRepository,
    SqliteAgendaRepository, SqliteRoleRepository, SqliteUserRepository, UserRepository,
    ValidationError, Weekday, ROLE_ADMIN, ROLE_USER,
};
use rusqlite::Connection;

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn create_user_assigns_ids_and_round_trips_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();

    let alice = repo
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let bob = repo
        .create_user(&NewUser::new("b@x.com", "bob", "hash2").with_enabled(false))
        .unwrap();

    assert_eq!(alice.id, 1);
    assert_eq!(bob.id, 2);
    assert!(alice.enabled);

    let loaded = repo.get_user(bob.id).unwrap().unwrap();
    assert_eq!(loaded, bob);
    assert!(!loaded.enabled);
    assert_eq!(loaded.password, "hash2");
    assert_eq!(repo.find_user_by_email("a@x.com").unwrap(), Some(alice));
    assert!(repo.find_user_by_username("carol").unwrap().is_none());
}

#[test]
fn duplicate_username_fails_without_inserting() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    repo.create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();

    let err = repo
        .create_user(&NewUser::new("b@x.com", "alice", "hash2"))
        .unwrap_err();

    match err {
        RepoError::Duplicate {
            entity,
            field,
            value,
        } => {
            assert_eq!(entity, "user");
            assert_eq!(field, "username");
            assert_eq!(value, "alice");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users;"), 1);
    assert!(repo.find_user_by_email("b@x.com").unwrap().is_none());
}

#[test]
fn duplicate_email_reports_email_field() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    repo.create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();

    let err = repo
        .create_user(&NewUser::new("a@x.com", "alice2", "hash2"))
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Duplicate {
            field: "email",
            ..
        }
    ));
    assert_eq!(err.code(), "duplicate_key");
}

#[test]
fn usernames_are_case_sensitive() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    repo.create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();

    assert!(repo
        .create_user(&NewUser::new("A@x.com", "Alice", "hash2"))
        .is_ok());
}

#[test]
fn blank_user_fields_are_rejected_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();

    let err = repo
        .create_user(&NewUser::new("a@x.com", "   ", "hash1"))
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::BlankField("username"))
    ));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users;"), 0);
}

#[test]
fn set_user_enabled_toggles_flag_and_reports_unknown_user() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    repo.create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();

    repo.set_user_enabled("alice", false).unwrap();
    assert!(!repo.find_user_by_username("alice").unwrap().unwrap().enabled);
    repo.set_user_enabled("alice", true).unwrap();
    assert!(repo.find_user_by_username("alice").unwrap().unwrap().enabled);

    let err = repo.set_user_enabled("nobody", false).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "user", .. }));
}

#[test]
fn update_password_replaces_hash() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    let alice = repo
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();

    repo.update_password(alice.id, "hash9").unwrap();
    assert_eq!(repo.get_user(alice.id).unwrap().unwrap().password, "hash9");

    assert!(matches!(
        repo.update_password(alice.id, ""),
        Err(RepoError::Validation(ValidationError::BlankField("password")))
    ));
    assert!(matches!(
        repo.update_password(99, "hash"),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn list_users_is_ordered_by_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    for (email, username) in [("c@x.com", "carol"), ("a@x.com", "alice"), ("b@x.com", "bob")] {
        repo.create_user(&NewUser::new(email, username, "hash"))
            .unwrap();
    }

    let names: Vec<String> = repo
        .list_users()
        .unwrap()
        .into_iter()
        .map(|user| user.username)
        .collect();
    assert_eq!(names, vec!["carol", "alice", "bob"]);
}

#[test]
fn create_role_rejects_duplicates_and_blank_names() {
    let conn = open_db_in_memory().unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();

    let user_role = roles.create_role(ROLE_USER).unwrap();
    assert_eq!(roles.find_role_by_name(ROLE_USER).unwrap(), Some(user_role.clone()));
    assert_eq!(roles.get_role(user_role.id).unwrap(), Some(user_role));

    assert!(matches!(
        roles.create_role(ROLE_USER),
        Err(RepoError::Duplicate {
            entity: "role",
            field: "role",
            ..
        })
    ));
    assert!(matches!(
        roles.create_role(" "),
        Err(RepoError::Validation(ValidationError::BlankField("role")))
    ));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM roles;"), 1);
}

#[test]
fn list_roles_is_ordered_by_name() {
    let conn = open_db_in_memory().unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    roles.create_role(ROLE_USER).unwrap();
    roles.create_role(ROLE_ADMIN).unwrap();

    let names: Vec<String> = roles
        .list_roles()
        .unwrap()
        .into_iter()
        .map(|role| role.name)
        .collect();
    assert_eq!(names, vec![ROLE_ADMIN, ROLE_USER]);
}

#[test]
fn assign_role_twice_keeps_single_association() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    let alice = users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let role = roles.create_role(ROLE_USER).unwrap();

    roles.assign_role(alice.id, role.id).unwrap();
    roles.assign_role(alice.id, role.id).unwrap();

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users_to_roles;"), 1);
    assert_eq!(roles.roles_for_user(alice.id).unwrap(), vec![role.clone()]);
    assert_eq!(roles.users_with_role(role.id).unwrap(), vec![alice]);
}

#[test]
fn assign_role_reports_missing_side() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    let alice = users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let role = roles.create_role(ROLE_USER).unwrap();

    assert!(matches!(
        roles.assign_role(99, role.id),
        Err(RepoError::NotFound { entity: "user", .. })
    ));
    assert!(matches!(
        roles.assign_role(alice.id, 99),
        Err(RepoError::NotFound { entity: "role", .. })
    ));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users_to_roles;"), 0);
}

#[test]
fn revoke_role_is_idempotent_for_known_ids() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    let alice = users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let role = roles.create_role(ROLE_ADMIN).unwrap();
    roles.assign_role(alice.id, role.id).unwrap();

    roles.revoke_role(alice.id, role.id).unwrap();
    roles.revoke_role(alice.id, role.id).unwrap();

    assert!(roles.roles_for_user(alice.id).unwrap().is_empty());
    assert!(matches!(
        roles.revoke_role(alice.id, 99),
        Err(RepoError::NotFound { entity: "role", .. })
    ));
    assert!(matches!(
        roles.roles_for_user(99),
        Err(RepoError::NotFound { entity: "user", .. })
    ));
}

#[test]
fn deleting_user_cascades_to_agendas_and_role_links() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    let agendas = SqliteAgendaRepository::try_new(&conn).unwrap();
    let alice = users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let bob = users
        .create_user(&NewUser::new("b@x.com", "bob", "hash2"))
        .unwrap();
    let role = roles.create_role(ROLE_USER).unwrap();
    roles.assign_role(alice.id, role.id).unwrap();
    roles.assign_role(bob.id, role.id).unwrap();
    for user_id in [alice.id, alice.id, bob.id] {
        agendas
            .create_agenda(&NewAgenda::new(user_id, Weekday::Friday, "17:00", true, "retro"))
            .unwrap();
    }

    users.delete_user(alice.id).unwrap();

    assert!(users.get_user(alice.id).unwrap().is_none());
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM agenda WHERE usersid = 1;"),
        0
    );
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM agenda;"), 1);
    assert_eq!(roles.users_with_role(role.id).unwrap(), vec![bob]);
    assert!(matches!(
        users.delete_user(alice.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn deleting_role_keeps_its_users() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    let alice = users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    let role = roles.create_role(ROLE_ADMIN).unwrap();
    roles.assign_role(alice.id, role.id).unwrap();

    roles.delete_role(role.id).unwrap();

    assert!(users.get_user(alice.id).unwrap().is_some());
    assert!(roles.roles_for_user(alice.id).unwrap().is_empty());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users_to_roles;"), 0);
    assert!(matches!(
        roles.delete_role(role.id),
        Err(RepoError::NotFound { entity: "role", .. })
    ));
}

#[test]
fn user_details_join_roles_and_agendas_explicitly() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();
    let agendas = SqliteAgendaRepository::try_new(&conn).unwrap();
    let alice = users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .unwrap();
    for name in [ROLE_USER, ROLE_ADMIN] {
        let role = roles.create_role(name).unwrap();
        roles.assign_role(alice.id, role.id).unwrap();
    }
    agendas
        .create_agenda(&NewAgenda::new(alice.id, Weekday::Tuesday, "10:00", false, "gym"))
        .unwrap();
    agendas
        .create_agenda(&NewAgenda::new(alice.id, Weekday::Monday, "09:30", true, "standup"))
        .unwrap();

    let details = users.find_user_details_by_username("alice").unwrap().unwrap();

    assert_eq!(details.user, alice);
    assert!(details.has_role(ROLE_ADMIN));
    assert!(details.has_role(ROLE_USER));
    let notes: Vec<&str> = details.agendas.iter().map(|a| a.note.as_str()).collect();
    assert_eq!(notes, vec!["standup", "gym"]);
    assert_eq!(users.load_user_details(alice.id).unwrap(), Some(details));
    assert!(users.load_user_details(99).unwrap().is_none());
}

#[test]
fn account_service_register_creates_default_role_once() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(
        SqliteUserRepository::try_new(&conn).unwrap(),
        SqliteRoleRepository::try_new(&conn).unwrap(),
    );

    let alice = service
        .register(&NewUser::new("a@x.com", "alice", "hash1"), ROLE_USER)
        .unwrap();
    let bob = service
        .register(&NewUser::new("b@x.com", "bob", "hash2"), ROLE_USER)
        .unwrap();

    assert!(alice.has_role(ROLE_USER));
    assert!(alice.agendas.is_empty());
    assert_eq!(alice.roles, bob.roles);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM roles;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users_to_roles;"), 2);
}

#[test]
fn account_service_ban_unban_and_grant() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(
        SqliteUserRepository::try_new(&conn).unwrap(),
        SqliteRoleRepository::try_new(&conn).unwrap(),
    );
    service
        .register(&NewUser::new("a@x.com", "alice", "hash1"), ROLE_USER)
        .unwrap();

    service.ban("alice").unwrap();
    assert!(!service.details("alice").unwrap().unwrap().user.enabled);
    service.unban("alice").unwrap();
    assert!(service.details("alice").unwrap().unwrap().user.enabled);

    service.grant_role("alice", ROLE_ADMIN).unwrap();
    assert!(service.details("alice").unwrap().unwrap().has_role(ROLE_ADMIN));

    assert!(matches!(
        service.ban("nobody"),
        Err(RepoError::NotFound { .. })
    ));
    assert!(service.details("nobody").unwrap().is_none());
}

#[test]
fn exhausted_id_range_rejects_create_without_leaving_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO users (id, enabled, email, username, password)
         VALUES (2147483647, 1, 'last@x.com', 'last', 'hash');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO roles (id, role) VALUES (2147483647, 'ROLE_LAST');",
        [],
    )
    .unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let roles = SqliteRoleRepository::try_new(&conn).unwrap();

    assert!(users
        .create_user(&NewUser::new("a@x.com", "alice", "hash1"))
        .is_err());
    assert!(roles.create_role(ROLE_USER).is_err());

    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM users WHERE username = 'alice';"),
        0
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM roles WHERE role = 'ROLE_USER';"),
        0
    );
    assert_eq!(users.list_users().unwrap().len(), 1);
    assert_eq!(roles.list_roles().unwrap().len(), 1);
}
