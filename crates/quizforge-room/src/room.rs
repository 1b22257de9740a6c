//! Room actor: one Tokio task per room, sequencing that room's games.
//!
//! Each room runs in its own task and owns all of its state: members,
//! phase, the drawn questions, collected answers, the scoreboard, and a
//! single [`PhaseTimer`]. The outside world talks to it only through a
//! [`RoomHandle`], which sends [`RoomCommand`]s over an mpsc channel and
//! waits for the reply on a oneshot.
//!
//! Because one task processes one command at a time, every mutation of a
//! room is serialized without locks, and different rooms never contend.
//!
//! # The phase driver
//!
//! The actor loop races two things:
//!
//! ```text
//! loop {
//!     select! {
//!         command  → join / leave / ready / answer / status / close
//!         timer    → countdown tick, question time limit, end of review,
//!                    end of results
//!     }
//! }
//! ```
//!
//! "Everyone answered" is handled inside the answer command: it cancels
//! the timer and closes the question on the spot. Nothing polls.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use quizforge_player::{PlayerStatus, SharedPlayers};
use quizforge_protocol::{PlayerId, RoomId, ScoreboardEntry, ServerEvent};
use quizforge_questions::{Question, QuestionBank};
use quizforge_timer::{PhaseTimer, TimerFired};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::scoreboard::{AnswerRecord, ScoredAnswer, Scoreboard, score_answers};
use crate::{Notifier, Persistence, PlayerStatsDelta, RoomConfig, RoomError, RoomPhase};

// ---------------------------------------------------------------------------
// Shared collaborators
// ---------------------------------------------------------------------------

/// Everything a room needs from outside itself. Cloned into every room.
pub struct RoomContext<N, P> {
    pub bank: Arc<QuestionBank>,
    pub players: SharedPlayers,
    pub notifier: Arc<N>,
    pub persistence: Arc<P>,
}

impl<N, P> Clone for RoomContext<N, P> {
    fn clone(&self) -> Self {
        Self {
            bank: Arc::clone(&self.bank),
            players: Arc::clone(&self.players),
            notifier: Arc::clone(&self.notifier),
            persistence: Arc::clone(&self.persistence),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and replies
// ---------------------------------------------------------------------------

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },
    Ready {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Answer {
        player_id: PlayerId,
        answer: String,
        client_elapsed: Option<f64>,
        /// Stamped by the handle before the command is queued.
        received_at: Instant,
        reply: oneshot::Sender<Result<AnswerReceipt, RoomError>>,
    },
    Status {
        reply: oneshot::Sender<RoomStatus>,
    },
    /// Stop the actor. With `if_empty`, refuse while players are seated.
    Close {
        if_empty: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
}

/// Confirmation for an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// 1-based number of the question the answer counts for.
    pub question_number: usize,
    /// Server-measured response time.
    pub elapsed: Duration,
}

/// A read-only snapshot of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub player_count: usize,
    pub ready_count: usize,
    pub min_players: usize,
    pub max_players: usize,
    /// 1-based number of the current question (Question and Review only).
    pub question_number: Option<usize>,
    /// Questions drawn for the running game (0 outside a game).
    pub total_questions: usize,
    /// Answers collected for the open question.
    pub answered_count: usize,
    /// Time left on the phase timer, if armed.
    pub time_remaining: Option<Duration>,
    /// Time since the last player command.
    pub idle_for: Duration,
}

impl RoomStatus {
    /// Returns `true` if a join would currently be accepted.
    pub fn is_joinable(&self) -> bool {
        self.phase.is_joinable() && self.player_count < self.max_players
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: it's an `mpsc::Sender` plus the room id. Every method
/// fails with [`RoomError::Unavailable`] once the actor has stopped.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's id.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Seats a player. Returns the new member count.
    pub async fn join(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Join { player_id, reply })
            .await?
    }

    /// Removes a player. Returns the remaining member count.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    /// Marks a player ready. Idempotent; a no-op outside the waiting phase.
    pub async fn ready(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Ready { player_id, reply })
            .await?
    }

    /// Submits an answer received now.
    pub async fn answer(
        &self,
        player_id: PlayerId,
        answer: impl Into<String>,
        client_elapsed: Option<f64>,
    ) -> Result<AnswerReceipt, RoomError> {
        self.answer_at(player_id, answer, client_elapsed, Instant::now())
            .await
    }

    /// Submits an answer with an explicit receipt time.
    ///
    /// `received_at` is what the response time is measured from, so callers
    /// should stamp it as soon as the event arrives, before waiting on any
    /// shared state.
    pub async fn answer_at(
        &self,
        player_id: PlayerId,
        answer: impl Into<String>,
        client_elapsed: Option<f64>,
        received_at: Instant,
    ) -> Result<AnswerReceipt, RoomError> {
        let answer = answer.into();
        self.request(|reply| RoomCommand::Answer {
            player_id,
            answer,
            client_elapsed,
            received_at,
            reply,
        })
        .await?
    }

    /// Requests a status snapshot.
    pub async fn status(&self) -> Result<RoomStatus, RoomError> {
        self.request(|reply| RoomCommand::Status { reply }).await
    }

    /// Stops the room. With `if_empty`, fails with
    /// [`RoomError::NotEmpty`] while players are seated.
    pub async fn close(&self, if_empty: bool) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Close { if_empty, reply })
            .await?
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns `true` if both handles talk to the same actor.
    pub fn same_actor(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

// ---------------------------------------------------------------------------
// Actor state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Member {
    player_id: PlayerId,
    name: String,
    ready: bool,
}

/// One game in progress.
#[derive(Debug)]
struct Round {
    questions: Vec<Arc<Question>>,
    /// Index of the current (or next to open) question.
    index: usize,
    started_at: Instant,
    opened_at: Option<Instant>,
    deadline: Option<Instant>,
    /// Accepted answers for the open question, in submission order.
    answers: Vec<AnswerRecord>,
    /// When the countdown before the first question runs out.
    countdown_ends: Instant,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<N, P> {
    room_id: RoomId,
    phase: RoomPhase,
    config: RoomConfig,
    /// Seated players in join order.
    members: Vec<Member>,
    round: Option<Round>,
    scoreboard: Scoreboard,
    timer: PhaseTimer,
    ctx: RoomContext<N, P>,
    receiver: mpsc::Receiver<RoomCommand>,
    last_activity: Instant,
}

impl<N: Notifier, P: Persistence> RoomActor<N, P> {
    /// Runs the actor loop until closed or every handle is dropped.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        loop {
            tokio::select! {
                biased;
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }
                fired = self.timer.expired() => self.on_timer(fired).await,
            }
        }

        self.timer.cancel();
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        if !matches!(cmd, RoomCommand::Status { .. }) {
            self.last_activity = Instant::now();
        }

        match cmd {
            RoomCommand::Join { player_id, reply } => {
                let result = self.handle_join(player_id).await;
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(player_id).await;
                let _ = reply.send(result);
            }
            RoomCommand::Ready { player_id, reply } => {
                let result = self.handle_ready(player_id).await;
                let _ = reply.send(result);
            }
            RoomCommand::Answer {
                player_id,
                answer,
                client_elapsed,
                received_at,
                reply,
            } => {
                let result = self
                    .handle_answer(player_id, answer, client_elapsed, received_at)
                    .await;
                let _ = reply.send(result);
            }
            RoomCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            RoomCommand::Close { if_empty, reply } => {
                if if_empty && !self.members.is_empty() {
                    let _ = reply.send(Err(RoomError::NotEmpty(self.room_id)));
                    return ControlFlow::Continue(());
                }
                self.release_members().await;
                tracing::info!(room_id = %self.room_id, "room closing");
                let _ = reply.send(Ok(()));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_timer(&mut self, fired: TimerFired) {
        tracing::trace!(
            room_id = %self.room_id,
            phase = %self.phase,
            generation = fired.generation,
            "phase timer fired"
        );
        match self.phase {
            RoomPhase::Countdown => self.countdown_tick().await,
            RoomPhase::Question => self.close_question().await,
            RoomPhase::Review => self.advance().await,
            RoomPhase::Ended => self.reset_room().await,
            RoomPhase::Waiting => {
                tracing::debug!(room_id = %self.room_id, "stray timer while waiting, ignoring");
            }
        }
    }

    // -- Membership -------------------------------------------------------

    async fn handle_join(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        if self.position(player_id).is_some() {
            return Err(RoomError::AlreadyInRoom(player_id, self.room_id));
        }
        if !self.phase.is_joinable() {
            return Err(RoomError::GameInProgress(self.room_id));
        }
        if self.members.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.room_id));
        }

        let name = {
            let players = self.ctx.players.lock().await;
            players
                .get(player_id)
                .map(|p| p.name.clone())
                .map_err(|_| RoomError::UnknownPlayer(player_id))?
        };

        self.members.push(Member {
            player_id,
            name: name.clone(),
            ready: false,
        });
        let player_count = self.members.len();
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            players = player_count,
            "player joined"
        );

        self.broadcast(ServerEvent::PlayerJoined {
            room_id: self.room_id,
            player_id,
            name,
            player_count,
        });
        self.check_all_ready().await;
        Ok(player_count)
    }

    async fn handle_leave(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        let Some(pos) = self.position(player_id) else {
            return Err(RoomError::NotInRoom(player_id, self.room_id));
        };
        self.members.remove(pos);
        self.scoreboard.remove_player(player_id);
        if let Some(round) = self.round.as_mut() {
            round.answers.retain(|a| a.player_id != player_id);
        }
        self.set_statuses(&[player_id], PlayerStatus::Connected).await;

        let remaining = self.members.len();
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            players = remaining,
            phase = %self.phase,
            "player left"
        );
        self.broadcast(ServerEvent::PlayerLeft {
            room_id: self.room_id,
            player_id,
            player_count: remaining,
        });

        if remaining == 0 {
            self.clear();
            return Ok(0);
        }

        match self.phase {
            RoomPhase::Countdown | RoomPhase::Question
                if remaining < self.config.min_players =>
            {
                self.abort_round("not enough players to continue").await;
            }
            RoomPhase::Question if self.all_answered() => {
                self.close_question().await;
            }
            RoomPhase::Waiting => self.check_all_ready().await,
            _ => {}
        }
        Ok(remaining)
    }

    async fn handle_ready(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let Some(pos) = self.position(player_id) else {
            return Err(RoomError::NotInRoom(player_id, self.room_id));
        };
        if !self.phase.is_joinable() {
            tracing::debug!(
                room_id = %self.room_id,
                %player_id,
                phase = %self.phase,
                "ready outside waiting phase ignored"
            );
            return Ok(());
        }
        if self.members[pos].ready {
            return Ok(());
        }

        self.members[pos].ready = true;
        self.set_statuses(&[player_id], PlayerStatus::Ready).await;
        let ready_count = self.ready_count();
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            ready = ready_count,
            players = self.members.len(),
            "player ready"
        );
        self.broadcast(ServerEvent::PlayerReady {
            player_id,
            ready_count,
            player_count: self.members.len(),
        });
        self.check_all_ready().await;
        Ok(())
    }

    /// Starts a game once enough players are seated and all of them are ready.
    async fn check_all_ready(&mut self) {
        if self.phase == RoomPhase::Waiting
            && self.members.len() >= self.config.min_players
            && self.members.iter().all(|m| m.ready)
        {
            self.start_game().await;
        }
    }

    // -- Game flow --------------------------------------------------------

    async fn start_game(&mut self) {
        let questions = match self
            .ctx
            .bank
            .draw(self.config.questions_per_game, &self.config.question_filter)
        {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                self.force_end(RoomError::InternalTransition(
                    "game configured with zero questions".into(),
                ))
                .await;
                return;
            }
            Err(e) => {
                self.force_end(RoomError::InternalTransition(format!(
                    "cannot draw questions: {e}"
                )))
                .await;
                return;
            }
        };

        if let Err(e) = self.transition(RoomPhase::Countdown) {
            self.force_end(e).await;
            return;
        }

        self.scoreboard = Scoreboard::new();
        for m in &self.members {
            self.scoreboard.add_player(m.player_id, m.name.clone());
        }
        let ids = self.member_ids();
        {
            let mut players = self.ctx.players.lock().await;
            for &id in &ids {
                let _ = players.reset_for_new_game(id);
                let _ = players.set_status(id, PlayerStatus::Playing);
            }
        }

        let total = questions.len();
        let now = Instant::now();
        self.round = Some(Round {
            questions,
            index: 0,
            started_at: now,
            opened_at: None,
            deadline: None,
            answers: Vec::new(),
            countdown_ends: now + self.config.countdown,
        });

        tracing::info!(
            room_id = %self.room_id,
            players = ids.len(),
            questions = total,
            "game starting"
        );
        self.broadcast(ServerEvent::GameStarting {
            total_questions: total,
        });
        self.countdown_tick().await;
    }

    /// Sends the next countdown second, or opens the first question when
    /// the countdown is over.
    ///
    /// Seconds are rounded up, so a sub-second countdown still announces
    /// `1`. The next tick lands on the following whole-second boundary.
    async fn countdown_tick(&mut self) {
        let left = self
            .round
            .as_ref()
            .map_or(Duration::ZERO, |r| r.countdown_ends.saturating_duration_since(Instant::now()));
        if left.is_zero() {
            self.open_question().await;
            return;
        }

        let seconds = left.as_nanos().div_ceil(1_000_000_000) as u64;
        self.broadcast(ServerEvent::Countdown {
            seconds_remaining: seconds,
        });
        self.timer
            .arm(left.saturating_sub(Duration::from_secs(seconds - 1)));
    }

    async fn open_question(&mut self) {
        if let Err(e) = self.transition(RoomPhase::Question) {
            self.force_end(e).await;
            return;
        }

        let now = Instant::now();
        let limit_override = self.config.question_time_limit;
        let opened = self.round.as_mut().and_then(|round| {
            let question = round.questions.get(round.index).cloned()?;
            let limit = limit_override.unwrap_or_else(|| question.time_limit());
            round.opened_at = Some(now);
            round.deadline = Some(now + limit);
            round.answers.clear();
            Some((question, limit, round.index + 1, round.questions.len()))
        });
        let Some((question, limit, number, total)) = opened else {
            self.force_end(RoomError::InternalTransition(
                "question phase without a question".into(),
            ))
            .await;
            return;
        };

        self.timer.arm_at(now + limit);
        tracing::info!(
            room_id = %self.room_id,
            number,
            total,
            question_id = %question.id,
            limit_secs = limit.as_secs_f64(),
            "question opened"
        );
        self.broadcast(ServerEvent::QuestionOpened {
            number,
            total,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            time_limit_secs: limit.as_secs_f64().ceil() as u64,
        });
    }

    async fn handle_answer(
        &mut self,
        player_id: PlayerId,
        answer: String,
        client_elapsed: Option<f64>,
        received_at: Instant,
    ) -> Result<AnswerReceipt, RoomError> {
        let result = self.accept_answer(player_id, answer, client_elapsed, received_at);

        let ack = match &result {
            Ok(_) => ServerEvent::AnswerAck {
                accepted: true,
                reason: None,
            },
            Err(e) => {
                tracing::debug!(
                    room_id = %self.room_id,
                    %player_id,
                    reason = %e,
                    "answer rejected"
                );
                ServerEvent::AnswerAck {
                    accepted: false,
                    reason: Some(e.to_string()),
                }
            }
        };
        self.unicast(player_id, &ack);

        if result.is_ok() && self.all_answered() {
            self.close_question().await;
        }
        result
    }

    fn accept_answer(
        &mut self,
        player_id: PlayerId,
        answer: String,
        client_elapsed: Option<f64>,
        received_at: Instant,
    ) -> Result<AnswerReceipt, RoomError> {
        if self.phase != RoomPhase::Question {
            return Err(RoomError::NotInQuestionPhase);
        }
        if self.position(player_id).is_none() {
            return Err(RoomError::UnknownPlayer(player_id));
        }
        let room_id = self.room_id;
        let round = self.round.as_mut().ok_or(RoomError::NotInQuestionPhase)?;
        let (Some(opened_at), Some(deadline)) = (round.opened_at, round.deadline) else {
            return Err(RoomError::NotInQuestionPhase);
        };
        if received_at < opened_at || received_at >= deadline {
            return Err(RoomError::NotInQuestionPhase);
        }
        if round.answers.iter().any(|a| a.player_id == player_id) {
            return Err(RoomError::AlreadyAnswered(player_id));
        }

        let elapsed = received_at - opened_at;
        if let Some(client) = client_elapsed {
            let drift = client - elapsed.as_secs_f64();
            if drift.abs() > 1.0 {
                tracing::debug!(
                    %room_id,
                    %player_id,
                    client_secs = client,
                    server_secs = elapsed.as_secs_f64(),
                    "client clock disagrees with receipt time"
                );
            }
        }

        round.answers.push(AnswerRecord {
            player_id,
            answer,
            elapsed,
            received_at,
        });
        tracing::debug!(
            %room_id,
            %player_id,
            elapsed_ms = elapsed.as_millis() as u64,
            answered = round.answers.len(),
            "answer accepted"
        );
        Ok(AnswerReceipt {
            question_number: round.index + 1,
            elapsed,
        })
    }

    /// Closes the open question (time limit or everyone answered), scores
    /// it and starts the review.
    async fn close_question(&mut self) {
        let early = self.timer.cancel();
        if let Err(e) = self.transition(RoomPhase::Review) {
            self.force_end(e).await;
            return;
        }

        let taken = self.round.as_mut().and_then(|round| {
            let question = round.questions.get(round.index).cloned()?;
            Some((question, std::mem::take(&mut round.answers), round.index + 1))
        });
        let Some((question, answers, number)) = taken else {
            self.force_end(RoomError::InternalTransition(
                "review without a question".into(),
            ))
            .await;
            return;
        };

        let scored = score_answers(&question, &answers, self.config.speed_bonus);
        for s in &scored {
            self.scoreboard
                .record_answer(s.player_id, s.correct, s.elapsed, s.points);
        }
        {
            let mut players = self.ctx.players.lock().await;
            for s in &scored {
                if let Err(e) = players.record_answer(s.player_id, s.correct, s.elapsed, s.points) {
                    tracing::debug!(room_id = %self.room_id, error = %e, "player gone before review");
                }
            }
        }

        let bonus_player = scored.iter().find(|s| s.speed_bonus).map(|s| s.player_id);
        tracing::info!(
            room_id = %self.room_id,
            number,
            answered = scored.len(),
            members = self.members.len(),
            early,
            "question closed"
        );
        self.broadcast(ServerEvent::QuestionReview {
            number,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            outcomes: scored.iter().map(ScoredAnswer::outcome).collect(),
            bonus_player,
            rankings: self.scoreboard.rankings(),
        });
        self.timer.arm(self.config.review);
    }

    /// After a review: next question, or the end of the game.
    async fn advance(&mut self) {
        let has_next = match self.round.as_mut() {
            Some(round) => {
                round.index += 1;
                round.index < round.questions.len()
            }
            None => false,
        };
        if has_next && self.members.len() >= self.config.min_players {
            self.open_question().await;
        } else {
            self.end_game().await;
        }
    }

    async fn end_game(&mut self) {
        if let Err(e) = self.transition(RoomPhase::Ended) {
            self.force_end(e).await;
            return;
        }

        let rankings = self.scoreboard.rankings();
        let winner = rankings.first().map(|e| e.player_id);
        let duration = self
            .round
            .as_ref()
            .map(|r| r.started_at.elapsed())
            .unwrap_or_default();

        tracing::info!(
            room_id = %self.room_id,
            winner = ?winner,
            duration_secs = duration.as_secs_f64(),
            "game ended"
        );
        self.broadcast(ServerEvent::GameEnded {
            winner,
            final_rankings: rankings.clone(),
            duration_secs: duration.as_secs_f64(),
            statistics: self.scoreboard.statistics(),
        });

        let ids = self.member_ids();
        self.set_statuses(&ids, PlayerStatus::Finished).await;
        let deltas = self.scoreboard.stats_deltas(winner);
        self.persist(rankings, duration, deltas);
        self.timer.arm(self.config.end_grace);
    }

    /// Clears the finished game and waits for a new one.
    async fn reset_room(&mut self) {
        if let Err(e) = self.transition(RoomPhase::Waiting) {
            tracing::error!(room_id = %self.room_id, error = %e, "reset from unexpected phase");
            self.phase = RoomPhase::Waiting;
        }
        self.timer.cancel();
        self.round = None;
        self.scoreboard.reset();
        for m in &mut self.members {
            m.ready = false;
        }
        let ids = self.member_ids();
        {
            let mut players = self.ctx.players.lock().await;
            for &id in &ids {
                let _ = players.reset_for_new_game(id);
            }
        }
        tracing::info!(room_id = %self.room_id, players = ids.len(), "room reset");
        self.broadcast(ServerEvent::RoomReset);
    }

    /// Abandons the running game: nothing from the interrupted question
    /// is credited, and everyone has to ready up again.
    async fn abort_round(&mut self, reason: &str) {
        self.timer.cancel();
        if let Err(e) = self.transition(RoomPhase::Waiting) {
            self.force_end(e).await;
            return;
        }
        self.round = None;
        self.scoreboard.reset();
        for m in &mut self.members {
            m.ready = false;
        }
        let ids = self.member_ids();
        self.set_statuses(&ids, PlayerStatus::Connected).await;
        tracing::info!(room_id = %self.room_id, reason, "game aborted");
        self.broadcast(ServerEvent::RoundAborted {
            reason: reason.to_string(),
        });
    }

    /// Ends the game after an internal error.
    async fn force_end(&mut self, err: RoomError) {
        tracing::error!(
            room_id = %self.room_id,
            phase = %self.phase,
            error = %err,
            "internal error, forcing game end"
        );
        self.timer.cancel();
        self.phase = RoomPhase::Ended;
        self.broadcast(ServerEvent::ErrorOccurred {
            reason: err.to_string(),
        });
        let ids = self.member_ids();
        self.set_statuses(&ids, PlayerStatus::Finished).await;
        self.timer.arm(self.config.end_grace);
    }

    /// The last member left: drop any game and go back to waiting.
    fn clear(&mut self) {
        self.timer.cancel();
        self.round = None;
        self.scoreboard = Scoreboard::new();
        if self.phase != RoomPhase::Waiting {
            tracing::info!(room_id = %self.room_id, phase = %self.phase, "room emptied");
        }
        self.phase = RoomPhase::Waiting;
    }

    async fn release_members(&mut self) {
        let ids = self.member_ids();
        self.set_statuses(&ids, PlayerStatus::Connected).await;
        self.members.clear();
        self.clear();
    }

    // -- Helpers ----------------------------------------------------------

    fn transition(&mut self, next: RoomPhase) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(next) {
            return Err(RoomError::InternalTransition(format!(
                "illegal transition {} -> {}",
                self.phase, next
            )));
        }
        tracing::debug!(room_id = %self.room_id, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Ok(())
    }

    fn all_answered(&self) -> bool {
        self.phase == RoomPhase::Question
            && !self.members.is_empty()
            && self
                .round
                .as_ref()
                .is_some_and(|r| r.answers.len() >= self.members.len())
    }

    fn persist(
        &self,
        rankings: Vec<ScoreboardEntry>,
        duration: Duration,
        deltas: Vec<(PlayerId, PlayerStatsDelta)>,
    ) {
        let persistence = Arc::clone(&self.ctx.persistence);
        let room_id = self.room_id;
        tokio::spawn(async move {
            if let Err(e) = persistence
                .save_game_result(room_id, &rankings, duration)
                .await
            {
                tracing::warn!(%room_id, error = %e, "failed to save game result");
            }
            for (player_id, delta) in deltas {
                if let Err(e) = persistence.save_player_stats(player_id, delta).await {
                    tracing::warn!(%room_id, %player_id, error = %e, "failed to save player stats");
                }
            }
        });
    }

    async fn set_statuses(&self, ids: &[PlayerId], status: PlayerStatus) {
        let mut players = self.ctx.players.lock().await;
        for &id in ids {
            if let Err(e) = players.set_status(id, status) {
                tracing::debug!(room_id = %self.room_id, error = %e, "status update skipped");
            }
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        let members = self.member_ids();
        self.ctx.notifier.broadcast(self.room_id, &members, &event);
    }

    fn unicast(&self, player_id: PlayerId, event: &ServerEvent) {
        if let Err(e) = self.ctx.notifier.unicast(player_id, event) {
            tracing::warn!(room_id = %self.room_id, %player_id, error = %e, "delivery failed");
        }
    }

    fn position(&self, player_id: PlayerId) -> Option<usize> {
        self.members.iter().position(|m| m.player_id == player_id)
    }

    fn member_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|m| m.player_id).collect()
    }

    fn ready_count(&self) -> usize {
        self.members.iter().filter(|m| m.ready).count()
    }

    fn status(&self) -> RoomStatus {
        let (question_number, total_questions, answered_count) = match &self.round {
            Some(r) => (
                matches!(self.phase, RoomPhase::Question | RoomPhase::Review)
                    .then_some(r.index + 1),
                r.questions.len(),
                r.answers.len(),
            ),
            None => (None, 0, 0),
        };
        let time_remaining = match (&self.round, self.phase) {
            (Some(r), RoomPhase::Countdown) => {
                Some(r.countdown_ends.saturating_duration_since(Instant::now()))
            }
            _ => self.timer.remaining(),
        };
        RoomStatus {
            room_id: self.room_id,
            phase: self.phase,
            player_count: self.members.len(),
            ready_count: self.ready_count(),
            min_players: self.config.min_players,
            max_players: self.config.max_players,
            question_number,
            total_questions,
            answered_count,
            time_remaining,
            idle_for: self.last_activity.elapsed(),
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room<N: Notifier, P: Persistence>(
    room_id: RoomId,
    config: RoomConfig,
    ctx: RoomContext<N, P>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let actor = RoomActor {
        room_id,
        phase: RoomPhase::Waiting,
        config,
        members: Vec::new(),
        round: None,
        scoreboard: Scoreboard::new(),
        timer: PhaseTimer::new(),
        ctx,
        receiver: rx,
        last_activity: Instant::now(),
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
