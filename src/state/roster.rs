//! Roster rules applied to a single game document: joining, approval, leaving,
//! host transfer, team assignment, attendance and post-game ratings.
//!
//! Every operation validates first and only then mutates, so a rejected call
//! leaves the game untouched.

use std::{collections::HashSet, time::SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{AttendanceEntity, GameEntity, GameStatus, JoinRequestEntity, RatingEntity},
    state::lifecycle::{GameEvent, InvalidTransition, next_status},
};

/// Lowest and highest accepted rating score.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Reasons a roster operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The game is no longer accepting roster changes.
    #[error("game is {0:?}; roster changes require an upcoming game")]
    NotOpen(GameStatus),
    /// Attendance needs an ongoing game.
    #[error("game is not under way")]
    NotUnderway,
    /// Ratings need a completed game.
    #[error("game has not been completed")]
    NotCompleted,
    /// Host or already registered.
    #[error("user already takes part in this game")]
    AlreadyParticipant,
    /// Duplicate join request.
    #[error("a join request is already pending")]
    AlreadyRequested,
    /// Capacity reached.
    #[error("game is full ({max} players)")]
    Full { max: u32 },
    /// Unknown join request.
    #[error("no pending join request from `{0}`")]
    NoSuchRequest(Uuid),
    /// Kicking someone who is not registered.
    #[error("user `{0}` is not registered in this game")]
    NotRegistered(Uuid),
    /// The host tried to leave.
    #[error("the host cannot leave; transfer the game or cancel it")]
    HostCannotLeave,
    /// Target is neither host nor registered player.
    #[error("user `{0}` does not take part in this game")]
    NotParticipant(Uuid),
    /// Same player listed on both teams.
    #[error("user `{0}` cannot play on both teams")]
    TeamOverlap(Uuid),
    /// Rater and target are the same user.
    #[error("players cannot rate themselves")]
    SelfRating,
    /// Duplicate rating for the same pair.
    #[error("this player has already been rated by you")]
    AlreadyRated,
    /// Score outside the accepted range.
    #[error("rating score {0} is outside 1..=5")]
    ScoreOutOfRange(u8),
    /// Capacity lowered below the current roster.
    #[error("max players {requested} is below the {current} current participants")]
    CapacityBelowRoster { requested: u32, current: usize },
    /// Lifecycle transition refused.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// How a join attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The caller is now a registered player.
    Registered,
    /// The caller waits for the host's approval.
    Requested,
}

/// What a leave call removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// A registered player left.
    LeftRoster,
    /// A pending join request was withdrawn.
    WithdrewRequest,
}

impl GameEntity {
    /// Host followed by the registered players.
    pub fn participants(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.host_id).chain(self.registered_players.iter().copied())
    }

    /// Whether `user_id` hosts the game or is registered in it.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.host_id == user_id || self.registered_players.contains(&user_id)
    }

    /// Participants counted against `max_players`, host included.
    pub fn participant_count(&self) -> usize {
        1 + self.registered_players.len()
    }

    /// Whether the roster reached `max_players`.
    pub fn is_full(&self) -> bool {
        self.participant_count() >= self.max_players as usize
    }

    /// Whether `user_id` has a pending join request.
    pub fn has_join_request(&self, user_id: Uuid) -> bool {
        self.join_requests
            .iter()
            .any(|request| request.user_id == user_id)
    }

    fn ensure_open(&self) -> Result<(), RosterError> {
        match self.status {
            GameStatus::Upcoming => Ok(()),
            other => Err(RosterError::NotOpen(other)),
        }
    }

    fn ensure_capacity(&self) -> Result<(), RosterError> {
        if self.is_full() {
            return Err(RosterError::Full {
                max: self.max_players,
            });
        }
        Ok(())
    }

    /// Register `user_id` directly, or queue a request when the host approves joins.
    pub fn join(&mut self, user_id: Uuid, now: SystemTime) -> Result<JoinOutcome, RosterError> {
        self.ensure_open()?;
        if self.is_participant(user_id) {
            return Err(RosterError::AlreadyParticipant);
        }
        if self.has_join_request(user_id) {
            return Err(RosterError::AlreadyRequested);
        }
        self.ensure_capacity()?;

        if self.requires_approval {
            self.join_requests.push(JoinRequestEntity {
                user_id,
                requested_at: now,
            });
            Ok(JoinOutcome::Requested)
        } else {
            self.registered_players.push(user_id);
            Ok(JoinOutcome::Registered)
        }
    }

    /// Move a pending request into the registered roster.
    pub fn approve_request(&mut self, user_id: Uuid) -> Result<(), RosterError> {
        self.ensure_open()?;
        let index = self.request_index(user_id)?;
        self.ensure_capacity()?;
        self.join_requests.remove(index);
        self.registered_players.push(user_id);
        Ok(())
    }

    /// Drop a pending request without registering the player.
    pub fn reject_request(&mut self, user_id: Uuid) -> Result<(), RosterError> {
        self.ensure_open()?;
        let index = self.request_index(user_id)?;
        self.join_requests.remove(index);
        Ok(())
    }

    fn request_index(&self, user_id: Uuid) -> Result<usize, RosterError> {
        self.join_requests
            .iter()
            .position(|request| request.user_id == user_id)
            .ok_or(RosterError::NoSuchRequest(user_id))
    }

    /// Remove the caller from the roster, or withdraw their pending request.
    pub fn leave(&mut self, user_id: Uuid) -> Result<LeaveOutcome, RosterError> {
        self.ensure_open()?;
        if self.host_id == user_id {
            return Err(RosterError::HostCannotLeave);
        }
        if self.registered_players.contains(&user_id) {
            self.drop_player(user_id);
            return Ok(LeaveOutcome::LeftRoster);
        }
        let index = self
            .request_index(user_id)
            .map_err(|_| RosterError::NotRegistered(user_id))?;
        self.join_requests.remove(index);
        Ok(LeaveOutcome::WithdrewRequest)
    }

    /// Remove a registered player on the host's behalf.
    pub fn kick(&mut self, user_id: Uuid) -> Result<(), RosterError> {
        self.ensure_open()?;
        if self.host_id == user_id {
            return Err(RosterError::HostCannotLeave);
        }
        if !self.registered_players.contains(&user_id) {
            return Err(RosterError::NotRegistered(user_id));
        }
        self.drop_player(user_id);
        Ok(())
    }

    /// Hand the game to a registered player; the previous host becomes a registered
    /// player. Returns the previous host.
    pub fn transfer_host(&mut self, new_host_id: Uuid) -> Result<Uuid, RosterError> {
        if self.status.is_terminal() {
            return Err(RosterError::NotOpen(self.status));
        }
        let Some(index) = self
            .registered_players
            .iter()
            .position(|player| *player == new_host_id)
        else {
            return Err(RosterError::NotRegistered(new_host_id));
        };

        let previous = self.host_id;
        self.registered_players.remove(index);
        self.registered_players.push(previous);
        self.host_id = new_host_id;
        Ok(previous)
    }

    /// Replace both team line-ups.
    pub fn assign_teams(&mut self, blue: Vec<Uuid>, red: Vec<Uuid>) -> Result<(), RosterError> {
        if self.status.is_terminal() {
            return Err(RosterError::NotOpen(self.status));
        }
        let blue = dedup(blue);
        let red = dedup(red);
        for member in blue.iter().chain(red.iter()) {
            if !self.is_participant(*member) {
                return Err(RosterError::NotParticipant(*member));
            }
        }
        let blue_set: HashSet<_> = blue.iter().copied().collect();
        if let Some(overlap) = red.iter().find(|member| blue_set.contains(member)) {
            return Err(RosterError::TeamOverlap(*overlap));
        }

        self.team_blue = blue;
        self.team_red = red;
        Ok(())
    }

    /// Apply a lifecycle event to the game status.
    pub fn apply_event(&mut self, event: GameEvent) -> Result<GameStatus, RosterError> {
        let next = next_status(self.status, event)?;
        self.status = next;
        Ok(next)
    }

    /// Upsert an attendance record. Returns `true` when this record completed the game.
    pub fn record_attendance(
        &mut self,
        user_id: Uuid,
        attended: bool,
        now: SystemTime,
    ) -> Result<bool, RosterError> {
        if self.status != GameStatus::Ongoing {
            return Err(RosterError::NotUnderway);
        }
        if !self.is_participant(user_id) {
            return Err(RosterError::NotParticipant(user_id));
        }

        match self
            .attendance
            .iter_mut()
            .find(|record| record.user_id == user_id)
        {
            Some(record) => {
                record.attended = attended;
                record.marked_at = now;
            }
            None => self.attendance.push(AttendanceEntity {
                user_id,
                attended,
                marked_at: now,
            }),
        }

        if self.all_attendance_recorded() {
            self.apply_event(GameEvent::AllAttended)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn all_attendance_recorded(&self) -> bool {
        let recorded: HashSet<_> = self.attendance.iter().map(|record| record.user_id).collect();
        self.participants().all(|user| recorded.contains(&user))
    }

    /// Participants marked present, in roster order.
    pub fn attendees(&self) -> Vec<Uuid> {
        self.participants()
            .filter(|user| {
                self.attendance
                    .iter()
                    .any(|record| record.user_id == *user && record.attended)
            })
            .collect()
    }

    /// Record a post-game rating between two participants.
    pub fn add_rating(
        &mut self,
        rater_id: Uuid,
        target_id: Uuid,
        score: u8,
    ) -> Result<(), RosterError> {
        if self.status != GameStatus::Completed {
            return Err(RosterError::NotCompleted);
        }
        if !RATING_RANGE.contains(&score) {
            return Err(RosterError::ScoreOutOfRange(score));
        }
        if rater_id == target_id {
            return Err(RosterError::SelfRating);
        }
        for user in [rater_id, target_id] {
            if !self.is_participant(user) {
                return Err(RosterError::NotParticipant(user));
            }
        }
        if self
            .ratings
            .iter()
            .any(|rating| rating.rater_id == rater_id && rating.target_id == target_id)
        {
            return Err(RosterError::AlreadyRated);
        }

        self.ratings.push(RatingEntity {
            rater_id,
            target_id,
            score,
        });
        Ok(())
    }

    /// Change the capacity, refusing values below the current participant count.
    pub fn set_max_players(&mut self, max_players: u32) -> Result<(), RosterError> {
        let current = self.participant_count();
        if (max_players as usize) < current {
            return Err(RosterError::CapacityBelowRoster {
                requested: max_players,
                current,
            });
        }
        self.max_players = max_players;
        Ok(())
    }

    /// Scrub every trace of a non-host user from the embedded lists. Returns whether
    /// anything changed.
    pub fn purge_user(&mut self, user_id: Uuid) -> bool {
        let before = (
            self.registered_players.len(),
            self.join_requests.len(),
            self.team_blue.len(),
            self.team_red.len(),
            self.attendance.len(),
        );
        self.drop_player(user_id);
        self.join_requests
            .retain(|request| request.user_id != user_id);
        let after = (
            self.registered_players.len(),
            self.join_requests.len(),
            self.team_blue.len(),
            self.team_red.len(),
            self.attendance.len(),
        );
        before != after
    }

    fn drop_player(&mut self, user_id: Uuid) {
        self.registered_players.retain(|player| *player != user_id);
        self.team_blue.retain(|player| *player != user_id);
        self.team_red.retain(|player| *player != user_id);
        self.attendance.retain(|record| record.user_id != user_id);
    }
}

fn dedup(members: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    members
        .into_iter()
        .filter(|member| seen.insert(*member))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{LocationEntity, SkillLevel};

    fn game(max_players: u32, requires_approval: bool) -> GameEntity {
        let now = SystemTime::now();
        GameEntity {
            id: Uuid::new_v4(),
            title: "Sunday futsal".into(),
            sport: "football".into(),
            description: None,
            location: LocationEntity {
                address: "Pier 7".into(),
                latitude: None,
                longitude: None,
            },
            starts_at: now,
            max_players,
            skill_level: SkillLevel::Any,
            requires_approval,
            host_id: Uuid::new_v4(),
            status: GameStatus::Upcoming,
            registered_players: Vec::new(),
            join_requests: Vec::new(),
            team_blue: Vec::new(),
            team_red: Vec::new(),
            attendance: Vec::new(),
            ratings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_game_registers_until_full() {
        let mut game = game(3, false);
        let now = SystemTime::now();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(game.join(a, now).unwrap(), JoinOutcome::Registered);
        assert_eq!(game.join(b, now).unwrap(), JoinOutcome::Registered);
        assert_eq!(game.join(c, now).unwrap_err(), RosterError::Full { max: 3 });
        assert_eq!(
            game.join(a, now).unwrap_err(),
            RosterError::AlreadyParticipant
        );
        assert_eq!(
            game.join(game.host_id, now).unwrap_err(),
            RosterError::AlreadyParticipant
        );
    }

    #[test]
    fn approval_flow_moves_request_into_roster() {
        let mut game = game(2, true);
        let now = SystemTime::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(game.join(a, now).unwrap(), JoinOutcome::Requested);
        assert_eq!(game.join(b, now).unwrap(), JoinOutcome::Requested);
        assert_eq!(game.join(a, now).unwrap_err(), RosterError::AlreadyRequested);

        game.approve_request(a).unwrap();
        assert_eq!(game.registered_players, vec![a]);
        assert_eq!(
            game.approve_request(b).unwrap_err(),
            RosterError::Full { max: 2 }
        );
        game.reject_request(b).unwrap();
        assert!(game.join_requests.is_empty());
        assert_eq!(
            game.reject_request(b).unwrap_err(),
            RosterError::NoSuchRequest(b)
        );
    }

    #[test]
    fn leaving_clears_teams_and_host_cannot_leave() {
        let mut game = game(4, false);
        let now = SystemTime::now();
        let player = Uuid::new_v4();
        game.join(player, now).unwrap();
        game.assign_teams(vec![player], vec![game.host_id]).unwrap();

        assert_eq!(game.leave(player).unwrap(), LeaveOutcome::LeftRoster);
        assert!(game.team_blue.is_empty());
        assert_eq!(game.leave(player).unwrap_err(), RosterError::NotRegistered(player));
        assert_eq!(
            game.leave(game.host_id).unwrap_err(),
            RosterError::HostCannotLeave
        );
    }

    #[test]
    fn pending_requester_can_withdraw() {
        let mut game = game(4, true);
        let requester = Uuid::new_v4();
        game.join(requester, SystemTime::now()).unwrap();
        assert_eq!(
            game.leave(requester).unwrap(),
            LeaveOutcome::WithdrewRequest
        );
        assert!(!game.has_join_request(requester));
    }

    #[test]
    fn transfer_swaps_host_into_roster() {
        let mut game = game(4, false);
        let old_host = game.host_id;
        let player = Uuid::new_v4();
        game.join(player, SystemTime::now()).unwrap();

        assert_eq!(game.transfer_host(player).unwrap(), old_host);
        assert_eq!(game.host_id, player);
        assert_eq!(game.registered_players, vec![old_host]);
        assert_eq!(game.participant_count(), 2);

        let stranger = Uuid::new_v4();
        assert_eq!(
            game.transfer_host(stranger).unwrap_err(),
            RosterError::NotRegistered(stranger)
        );
    }

    #[test]
    fn teams_reject_outsiders_and_overlap() {
        let mut game = game(4, false);
        let player = Uuid::new_v4();
        game.join(player, SystemTime::now()).unwrap();
        let outsider = Uuid::new_v4();

        assert_eq!(
            game.assign_teams(vec![outsider], vec![]).unwrap_err(),
            RosterError::NotParticipant(outsider)
        );
        assert_eq!(
            game.assign_teams(vec![player], vec![player]).unwrap_err(),
            RosterError::TeamOverlap(player)
        );
        game.assign_teams(vec![player, player], vec![game.host_id])
            .unwrap();
        assert_eq!(game.team_blue, vec![player]);
    }

    #[test]
    fn full_attendance_completes_game() {
        let mut game = game(4, false);
        let now = SystemTime::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        game.join(a, now).unwrap();
        game.join(b, now).unwrap();

        assert_eq!(
            game.record_attendance(a, true, now).unwrap_err(),
            RosterError::NotUnderway
        );
        game.apply_event(GameEvent::Start).unwrap();

        assert!(!game.record_attendance(game.host_id, true, now).unwrap());
        assert!(!game.record_attendance(a, true, now).unwrap());
        // Re-marking an existing record does not complete the game on its own.
        assert!(!game.record_attendance(a, false, now).unwrap());
        assert!(game.record_attendance(b, true, now).unwrap());
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.attendees(), vec![game.host_id, b]);
    }

    #[test]
    fn ratings_only_after_completion_once_per_pair() {
        let mut game = game(3, false);
        let now = SystemTime::now();
        let player = Uuid::new_v4();
        game.join(player, now).unwrap();

        assert_eq!(
            game.add_rating(game.host_id, player, 4).unwrap_err(),
            RosterError::NotCompleted
        );
        game.apply_event(GameEvent::Start).unwrap();
        game.record_attendance(game.host_id, true, now).unwrap();
        game.record_attendance(player, true, now).unwrap();

        let host = game.host_id;
        assert_eq!(
            game.add_rating(host, player, 6).unwrap_err(),
            RosterError::ScoreOutOfRange(6)
        );
        assert_eq!(
            game.add_rating(host, host, 5).unwrap_err(),
            RosterError::SelfRating
        );
        game.add_rating(host, player, 4).unwrap();
        assert_eq!(
            game.add_rating(host, player, 5).unwrap_err(),
            RosterError::AlreadyRated
        );
    }

    #[test]
    fn purge_removes_user_everywhere() {
        let mut game = game(5, false);
        let now = SystemTime::now();
        let player = Uuid::new_v4();
        game.join(player, now).unwrap();
        game.assign_teams(vec![], vec![player]).unwrap();
        game.requires_approval = true;
        let requester = Uuid::new_v4();
        game.join(requester, now).unwrap();

        assert!(game.purge_user(player));
        assert!(game.purge_user(requester));
        assert!(game.registered_players.is_empty());
        assert!(game.team_red.is_empty());
        assert!(game.join_requests.is_empty());
        assert!(!game.purge_user(Uuid::new_v4()));
    }

    #[test]
    fn capacity_cannot_drop_below_roster() {
        let mut game = game(4, false);
        game.join(Uuid::new_v4(), SystemTime::now()).unwrap();
        assert_eq!(
            game.set_max_players(1).unwrap_err(),
            RosterError::CapacityBelowRoster {
                requested: 1,
                current: 2
            }
        );
        game.set_max_players(2).unwrap();
    }
}
