//! Agenda repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over the `agenda` table with owner-only mutation.
//! - Shared-calendar listing of accessible entries.
//!
//! # Invariants
//! - Writes validate `HH:MM` time and non-blank note before SQL.
//! - Only the owning user may update or delete an agenda; other callers get
//!   `Forbidden`, unknown ids get `NotFound`.
//! - Accessible listings never contain an agenda with `accessible = 0`.
//! - Lists are ordered by weekday (Monday first), time, then id.

use super::schema::{ensure_connection_ready, AGENDA_COLUMNS, USERS_COLUMNS};
use super::{bool_to_int, int_to_bool, is_foreign_key_violation, RepoError, RepoResult};
use crate::model::agenda::{validate_time, Agenda, AgendaId, AgendaUpdate, NewAgenda, Weekday};
use crate::model::user::UserId;
use log::{info, warn};
use rusqlite::{params, Connection, Row};

const AGENDA_SELECT_SQL: &str = "SELECT
    id,
    usersid,
    day,
    time,
    accessible,
    note
FROM agenda";

/// Filter options for a user's own agenda list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgendaListQuery {
    /// Return only entries other users may see.
    pub accessible_only: bool,
    pub day: Option<Weekday>,
}

/// Repository interface for agenda records.
pub trait AgendaRepository {
    /// Inserts an agenda owned by `new_agenda.user_id`.
    fn create_agenda(&self, new_agenda: &NewAgenda) -> RepoResult<Agenda>;
    fn get_agenda(&self, id: AgendaId) -> RepoResult<Option<Agenda>>;
    /// Agendas owned by one user. Unknown users have no agendas.
    fn list_agendas_for_user(
        &self,
        user_id: UserId,
        query: &AgendaListQuery,
    ) -> RepoResult<Vec<Agenda>>;
    /// Accessible agendas of every user except `excluding_user_id`.
    fn list_accessible_agendas(&self, excluding_user_id: UserId) -> RepoResult<Vec<Agenda>>;
    /// Applies `changes` when `requesting_user_id` owns the agenda.
    fn update_agenda(
        &self,
        id: AgendaId,
        requesting_user_id: UserId,
        changes: &AgendaUpdate,
    ) -> RepoResult<Agenda>;
    /// Deletes the agenda when `requesting_user_id` owns it.
    fn delete_agenda(&self, id: AgendaId, requesting_user_id: UserId) -> RepoResult<()>;
}

/// SQLite-backed agenda repository.
pub struct SqliteAgendaRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAgendaRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[("users", USERS_COLUMNS), ("agenda", AGENDA_COLUMNS)],
        )?;
        Ok(Self { conn })
    }

    /// Explains a zero-row owner-scoped write: missing row or foreign owner.
    fn ownership_error(&self, id: AgendaId, requesting_user_id: UserId) -> RepoResult<RepoError> {
        match self.get_agenda(id)? {
            None => Ok(RepoError::not_found("agenda", id)),
            Some(_) => Ok(RepoError::Forbidden {
                agenda_id: id,
                requesting_user_id,
            }),
        }
    }
}

impl AgendaRepository for SqliteAgendaRepository<'_> {
    fn create_agenda(&self, new_agenda: &NewAgenda) -> RepoResult<Agenda> {
        new_agenda.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO agenda (usersid, day, time, accessible, note)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                new_agenda.user_id,
                new_agenda.day.as_str(),
                new_agenda.time.as_str(),
                bool_to_int(new_agenda.accessible),
                new_agenda.note.as_str(),
            ],
        );

        match inserted {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                info!(
                    "event=agenda_create module=repo status=ok agenda_id={id} user_id={}",
                    new_agenda.user_id
                );
                Ok(Agenda {
                    id,
                    user_id: new_agenda.user_id,
                    day: new_agenda.day,
                    time: new_agenda.time.clone(),
                    accessible: new_agenda.accessible,
                    note: new_agenda.note.clone(),
                })
            }
            Err(err) if is_foreign_key_violation(&err) => {
                warn!(
                    "event=agenda_create module=repo status=error error_code=not_found user_id={}",
                    new_agenda.user_id
                );
                Err(RepoError::not_found("user", new_agenda.user_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_agenda(&self, id: AgendaId) -> RepoResult<Option<Agenda>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{AGENDA_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_agenda_row(row)?));
        }
        Ok(None)
    }

    fn list_agendas_for_user(
        &self,
        user_id: UserId,
        query: &AgendaListQuery,
    ) -> RepoResult<Vec<Agenda>> {
        load_agendas_for_user(self.conn, user_id, query.accessible_only, query.day)
    }

    fn list_accessible_agendas(&self, excluding_user_id: UserId) -> RepoResult<Vec<Agenda>> {
        let mut stmt = self.conn.prepare(&format!(
            "{AGENDA_SELECT_SQL}
             WHERE accessible = 1
               AND usersid <> ?1;"
        ))?;
        let mut rows = stmt.query([excluding_user_id])?;
        let mut agendas = Vec::new();
        while let Some(row) = rows.next()? {
            agendas.push(parse_agenda_row(row)?);
        }
        agendas.sort_by(|a, b| {
            (a.user_id, a.day, &a.time, a.id).cmp(&(b.user_id, b.day, &b.time, b.id))
        });
        Ok(agendas)
    }

    fn update_agenda(
        &self,
        id: AgendaId,
        requesting_user_id: UserId,
        changes: &AgendaUpdate,
    ) -> RepoResult<Agenda> {
        changes.validate()?;

        let mut agenda = self
            .get_agenda(id)?
            .ok_or_else(|| RepoError::not_found("agenda", id))?;
        if agenda.user_id != requesting_user_id {
            warn!(
                "event=agenda_update module=repo status=error error_code=forbidden agenda_id={id}"
            );
            return Err(RepoError::Forbidden {
                agenda_id: id,
                requesting_user_id,
            });
        }
        if changes.is_empty() {
            return Ok(agenda);
        }

        changes.apply_to(&mut agenda);
        // The row may have been deleted since the read.
        let changed = self.conn.execute(
            "UPDATE agenda
             SET day = ?3, time = ?4, accessible = ?5, note = ?6
             WHERE id = ?1
               AND usersid = ?2;",
            params![
                id,
                requesting_user_id,
                agenda.day.as_str(),
                agenda.time.as_str(),
                bool_to_int(agenda.accessible),
                agenda.note.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(self.ownership_error(id, requesting_user_id)?);
        }

        info!("event=agenda_update module=repo status=ok agenda_id={id}");
        Ok(agenda)
    }

    fn delete_agenda(&self, id: AgendaId, requesting_user_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM agenda WHERE id = ?1 AND usersid = ?2;",
            params![id, requesting_user_id],
        )?;

        if changed == 0 {
            let err = self.ownership_error(id, requesting_user_id)?;
            warn!(
                "event=agenda_delete module=repo status=error error_code={} agenda_id={id}",
                err.code()
            );
            return Err(err);
        }

        info!("event=agenda_delete module=repo status=ok agenda_id={id}");
        Ok(())
    }
}

/// Loads one user's agendas in week order, optionally narrowed to one day.
pub(crate) fn load_agendas_for_user(
    conn: &Connection,
    user_id: UserId,
    accessible_only: bool,
    day: Option<Weekday>,
) -> RepoResult<Vec<Agenda>> {
    let mut stmt = conn.prepare(&format!(
        "{AGENDA_SELECT_SQL}
         WHERE usersid = ?1
           AND (?2 = 0 OR accessible = 1)
           AND (?3 IS NULL OR day = ?3);"
    ))?;
    let mut rows = stmt.query(params![
        user_id,
        bool_to_int(accessible_only),
        day.map(Weekday::as_str),
    ])?;
    let mut agendas = Vec::new();
    while let Some(row) = rows.next()? {
        agendas.push(parse_agenda_row(row)?);
    }
    sort_week_order(&mut agendas);
    Ok(agendas)
}

/// Sorts by weekday, then `HH:MM` (lexical order is chronological), then id.
pub(crate) fn sort_week_order(agendas: &mut [Agenda]) {
    agendas.sort_by(|a, b| (a.day, &a.time, a.id).cmp(&(b.day, &b.time, b.id)));
}

fn parse_agenda_row(row: &Row<'_>) -> RepoResult<Agenda> {
    let day_text: String = row.get("day")?;
    let day = day_text.parse::<Weekday>().map_err(|_| {
        RepoError::InvalidData(format!("invalid day `{day_text}` in agenda.day"))
    })?;
    let time: String = row.get("time")?;
    validate_time(&time).map_err(|_| {
        RepoError::InvalidData(format!("invalid time `{time}` in agenda.time"))
    })?;

    Ok(Agenda {
        id: row.get("id")?,
        user_id: row.get("usersid")?,
        day,
        time,
        accessible: int_to_bool(row.get("accessible")?, "agenda.accessible")?,
        note: row.get("note")?,
    })
}
