//! Agenda use-case service.
//!
//! # Responsibility
//! - Shape agenda lists into calendar views: one user's week, and the
//!   shared view of other users' accessible entries.
//!
//! # Invariants
//! - A weekly schedule always has seven days, Monday first, even when empty.
//! - Shared views contain accessible entries only.
//! - `WeeklySchedule` fields are private so the seven-day shape holds for
//!   every value callers can observe.

use crate::model::agenda::{Agenda, Weekday};
use crate::model::user::UserId;
use crate::repo::agenda_repo::{AgendaListQuery, AgendaRepository};
use crate::repo::user_repo::UserRepository;
use crate::repo::{RepoError, RepoResult};
use log::warn;
use serde::Serialize;

/// Entries of one weekday, ordered by time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub day: Weekday,
    pub entries: Vec<Agenda>,
}

/// A user's week, Monday to Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySchedule {
    user_id: UserId,
    days: Vec<DaySchedule>,
}

impl WeeklySchedule {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// All seven days, Monday first.
    pub fn days(&self) -> &[DaySchedule] {
        &self.days
    }

    pub fn day(&self, day: Weekday) -> &DaySchedule {
        // Built from `Weekday::ALL`, so every weekday has a slot.
        &self.days[day.index()]
    }

    pub fn total_entries(&self) -> usize {
        self.days.iter().map(|day| day.entries.len()).sum()
    }
}

/// Accessible entries of one other user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedAgendas {
    pub owner_id: UserId,
    pub owner_username: String,
    pub agendas: Vec<Agenda>,
}

/// Agenda service over agenda and user repositories.
pub struct AgendaService<A: AgendaRepository, U: UserRepository> {
    agendas: A,
    users: U,
}

impl<A: AgendaRepository, U: UserRepository> AgendaService<A, U> {
    pub fn new(agendas: A, users: U) -> Self {
        Self { agendas, users }
    }

    /// Groups a user's agendas by weekday.
    ///
    /// Returns `NotFound` for unknown users so an empty week always means
    /// "no entries", never "no such user".
    pub fn weekly_schedule(&self, user_id: UserId) -> RepoResult<WeeklySchedule> {
        if self.users.get_user(user_id)?.is_none() {
            return Err(RepoError::not_found("user", user_id));
        }

        let mut days: Vec<DaySchedule> = Weekday::ALL
            .into_iter()
            .map(|day| DaySchedule {
                day,
                entries: Vec::new(),
            })
            .collect();
        for agenda in self
            .agendas
            .list_agendas_for_user(user_id, &AgendaListQuery::default())?
        {
            days[agenda.day.index()].entries.push(agenda);
        }

        Ok(WeeklySchedule { user_id, days })
    }

    /// Accessible agendas of everyone but `viewer_id`, grouped by owner in
    /// owner id order.
    ///
    /// Entries whose owner no longer resolves are left out of the view.
    pub fn shared_schedule(&self, viewer_id: UserId) -> RepoResult<Vec<SharedAgendas>> {
        let mut groups: Vec<SharedAgendas> = Vec::new();
        let mut missing_owner: Option<UserId> = None;
        for agenda in self.agendas.list_accessible_agendas(viewer_id)? {
            if missing_owner == Some(agenda.user_id) {
                continue;
            }
            if let Some(group) = groups
                .last_mut()
                .filter(|group| group.owner_id == agenda.user_id)
            {
                group.agendas.push(agenda);
                continue;
            }

            let Some(owner) = self.users.get_user(agenda.user_id)? else {
                warn!(
                    "event=shared_schedule module=service status=skip reason=owner_missing owner_id={}",
                    agenda.user_id
                );
                missing_owner = Some(agenda.user_id);
                continue;
            };
            groups.push(SharedAgendas {
                owner_id: owner.id,
                owner_username: owner.username,
                agendas: vec![agenda],
            });
        }
        Ok(groups)
    }
}
