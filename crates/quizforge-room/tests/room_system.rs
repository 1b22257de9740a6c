//! Integration tests for the room system.
//!
//! Every timed test runs on a paused clock: the runtime jumps straight to
//! the next timer whenever all tasks are idle, so phase timing is exact.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use quizforge_player::{PlayerRegistry, PlayerStatus, SharedPlayers};
use quizforge_protocol::{
    ClientEvent, ConnectionId, PlayerId, QuestionId, RoomId, ScoreboardEntry, ServerEvent,
};
use quizforge_questions::{Question, QuestionBank, QuestionFilter};
use quizforge_room::{
    AnswerReceipt, ChannelNotifier, Persistence, PersistenceError, PlayerStatsDelta, RoomConfig,
    RoomContext, RoomError, RoomPhase, RoomRegistry, RouteReply,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant};

// =========================================================================
// Fixtures
// =========================================================================

#[derive(Default)]
struct RecordingPersistence {
    games: Mutex<Vec<(RoomId, Vec<ScoreboardEntry>, Duration)>>,
    stats: Mutex<Vec<(PlayerId, PlayerStatsDelta)>>,
}

impl Persistence for RecordingPersistence {
    async fn save_game_result(
        &self,
        room_id: RoomId,
        final_rankings: &[ScoreboardEntry],
        duration: Duration,
    ) -> Result<(), PersistenceError> {
        self.games
            .lock()
            .unwrap()
            .push((room_id, final_rankings.to_vec(), duration));
        Ok(())
    }

    async fn save_player_stats(
        &self,
        player_id: PlayerId,
        delta: PlayerStatsDelta,
    ) -> Result<(), PersistenceError> {
        self.stats.lock().unwrap().push((player_id, delta));
        Ok(())
    }
}

fn arithmetic(id: &str, prompt: &str) -> Question {
    Question {
        id: QuestionId::new(id),
        prompt: prompt.into(),
        options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
        correct_answer: "4".into(),
        explanation: Some("Basic addition.".into()),
        category: Some("math".into()),
        difficulty: None,
        time_limit_secs: 10,
        points: 10,
    }
}

fn one_question_bank() -> QuestionBank {
    QuestionBank::from_questions([arithmetic("q1", "What is 2 + 2?")]).unwrap()
}

fn two_question_bank() -> QuestionBank {
    QuestionBank::from_questions([
        arithmetic("q1", "What is 2 + 2?"),
        arithmetic("q2", "What is 3 + 1?"),
    ])
    .unwrap()
}

fn config() -> RoomConfig {
    RoomConfig {
        min_players: 2,
        max_players: 4,
        questions_per_game: 1,
        question_time_limit: None,
        countdown: Duration::from_secs(5),
        review: Duration::from_secs(3),
        end_grace: Duration::from_secs(10),
        speed_bonus: 5,
        ..RoomConfig::default()
    }
}

struct Harness {
    registry: RoomRegistry<ChannelNotifier, RecordingPersistence>,
    notifier: Arc<ChannelNotifier>,
    persistence: Arc<RecordingPersistence>,
    players: SharedPlayers,
    next_conn: u64,
}

impl Harness {
    fn new(config: RoomConfig, bank: QuestionBank) -> Self {
        let notifier = Arc::new(ChannelNotifier::new());
        let persistence = Arc::new(RecordingPersistence::default());
        let players = PlayerRegistry::shared();
        let context = RoomContext {
            bank: Arc::new(bank),
            players: Arc::clone(&players),
            notifier: Arc::clone(&notifier),
            persistence: Arc::clone(&persistence),
        };
        Self {
            registry: RoomRegistry::new(context, config),
            notifier,
            persistence,
            players,
            next_conn: 1,
        }
    }

    async fn connect(&mut self, name: &str) -> (PlayerId, UnboundedReceiver<ServerEvent>) {
        let conn = ConnectionId::new(self.next_conn);
        self.next_conn += 1;
        let id = self.players.lock().await.add_player(name, conn).unwrap().id;
        let rx = self.notifier.register(id);
        (id, rx)
    }

    async fn answer(&self, room: RoomId, player_id: PlayerId, answer: &str) -> Result<RouteReply, RoomError> {
        self.registry
            .route(
                room,
                ClientEvent::Answer {
                    player_id,
                    answer: answer.into(),
                    client_elapsed_secs: None,
                },
            )
            .await
    }

    async fn phase(&self, room: RoomId) -> RoomPhase {
        self.registry.status(room).await.unwrap().phase
    }

    async fn score(&self, player_id: PlayerId) -> u32 {
        self.players.lock().await.get(player_id).unwrap().score
    }
}

/// Waits for the first event matching `pred`, skipping everything else.
async fn next_matching(
    rx: &mut UnboundedReceiver<ServerEvent>,
    pred: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    time::timeout(Duration::from_secs(3600), async {
        loop {
            let event = rx.recv().await.expect("notifier channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event never arrived")
}

async fn next_question(rx: &mut UnboundedReceiver<ServerEvent>) -> ServerEvent {
    next_matching(rx, |e| matches!(e, ServerEvent::QuestionOpened { .. })).await
}

async fn next_review(rx: &mut UnboundedReceiver<ServerEvent>) -> ServerEvent {
    next_matching(rx, |e| matches!(e, ServerEvent::QuestionReview { .. })).await
}

fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

const ROOM: RoomId = RoomId(1);

/// Seats every player and readies them all, starting the countdown.
async fn seat_and_ready(h: &Harness, ids: &[PlayerId]) {
    for &id in ids {
        h.registry.join(ROOM, id).await.unwrap();
    }
    for &id in ids {
        h.registry
            .route(ROOM, ClientEvent::Ready { player_id: id })
            .await
            .unwrap();
    }
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ready_all_players_counts_down_then_opens_question() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;

    let start = Instant::now();
    seat_and_ready(&h, &[x, y]).await;
    assert_eq!(h.phase(ROOM).await, RoomPhase::Countdown);

    let opened = next_question(&mut rx_x).await;

    assert_eq!(start.elapsed(), Duration::from_secs(5));
    match opened {
        ServerEvent::QuestionOpened {
            number,
            total,
            prompt,
            options,
            time_limit_secs,
        } => {
            assert_eq!(number, 1);
            assert_eq!(total, 1);
            assert_eq!(prompt, "What is 2 + 2?");
            assert_eq!(options.len(), 4);
            assert_eq!(time_limit_secs, 10);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.phase(ROOM).await, RoomPhase::Question);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_sequence_is_five_to_one() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;

    let mut seconds = Vec::new();
    loop {
        match next_matching(&mut rx_x, |e| {
            matches!(e, ServerEvent::Countdown { .. } | ServerEvent::QuestionOpened { .. })
        })
        .await
        {
            ServerEvent::Countdown { seconds_remaining } => seconds.push(seconds_remaining),
            _ => break,
        }
    }

    assert_eq!(seconds, vec![5, 4, 3, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_sub_second_announces_one_and_opens_on_time() {
    let cfg = RoomConfig {
        countdown: Duration::from_millis(500),
        ..config()
    };
    let mut h = Harness::new(cfg, one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;

    let start = Instant::now();
    seat_and_ready(&h, &[x, y]).await;

    let mut seconds = Vec::new();
    loop {
        match next_matching(&mut rx_x, |e| {
            matches!(e, ServerEvent::Countdown { .. } | ServerEvent::QuestionOpened { .. })
        })
        .await
        {
            ServerEvent::Countdown { seconds_remaining } => seconds.push(seconds_remaining),
            _ => break,
        }
    }

    assert_eq!(seconds, vec![1]);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_status_during_countdown_reports_whole_countdown_left() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;

    time::sleep(Duration::from_millis(2500)).await;
    let status = h.registry.status(ROOM).await.unwrap();

    assert_eq!(status.phase, RoomPhase::Countdown);
    assert_eq!(status.time_remaining, Some(Duration::from_millis(2500)));
}

#[tokio::test(start_paused = true)]
async fn test_answer_fastest_correct_gets_speed_bonus() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;
    next_question(&mut rx_x).await;

    time::sleep(Duration::from_secs(2)).await;
    let reply = h.answer(ROOM, x, "4").await.unwrap();
    match reply {
        RouteReply::Answered(receipt) => {
            assert_eq!(receipt.question_number, 1);
            assert_eq!(receipt.elapsed, Duration::from_secs(2));
        }
        other => panic!("unexpected reply {other:?}"),
    }
    time::sleep(Duration::from_secs(1)).await;
    h.answer(ROOM, y, "4").await.unwrap();

    let review = next_review(&mut rx_x).await;
    let ServerEvent::QuestionReview {
        correct_answer,
        explanation,
        outcomes,
        bonus_player,
        rankings,
        ..
    } = review
    else {
        panic!("expected review");
    };
    assert_eq!(correct_answer, "4");
    assert_eq!(explanation.as_deref(), Some("Basic addition."));
    assert_eq!(bonus_player, Some(x));
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].points, 15);
    assert_eq!(outcomes[1].points, 10);
    assert_eq!(rankings[0].player_id, x);
    assert_eq!(rankings[0].score, 15);
    assert_eq!(rankings[1].score, 10);

    assert_eq!(h.score(x).await, 15);
    assert_eq!(h.score(y).await, 10);
}

#[tokio::test(start_paused = true)]
async fn test_question_silent_player_reviews_at_time_limit() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    let (z, _rx_z) = h.connect("zara").await;
    seat_and_ready(&h, &[x, y, z]).await;

    next_question(&mut rx_x).await;
    let opened_at = Instant::now();
    h.answer(ROOM, x, "4").await.unwrap();
    h.answer(ROOM, y, "5").await.unwrap();

    let review = next_review(&mut rx_x).await;

    assert_eq!(opened_at.elapsed(), Duration::from_secs(10));
    let ServerEvent::QuestionReview { outcomes, rankings, .. } = review else {
        panic!("expected review");
    };
    assert!(outcomes.iter().all(|o| o.player_id != z));
    let z_entry = rankings.iter().find(|e| e.player_id == z).unwrap();
    assert_eq!(z_entry.score, 0);
    assert_eq!(z_entry.answered, 0);

    let players = h.players.lock().await;
    let zara = players.get(z).unwrap();
    assert_eq!(zara.score, 0);
    assert_eq!(zara.stats.answered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_answer_everyone_within_a_second_closes_question_early() {
    let cfg = RoomConfig {
        question_time_limit: Some(Duration::from_secs(30)),
        ..config()
    };
    let mut h = Harness::new(cfg, one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    let (z, _rx_z) = h.connect("zara").await;
    seat_and_ready(&h, &[x, y, z]).await;

    next_question(&mut rx_x).await;
    let opened_at = Instant::now();
    h.answer(ROOM, x, "4").await.unwrap();
    time::sleep(Duration::from_millis(500)).await;
    h.answer(ROOM, y, "4").await.unwrap();
    time::sleep(Duration::from_millis(500)).await;
    h.answer(ROOM, z, "4").await.unwrap();

    // The last answer closed the question before its reply came back.
    let status = h.registry.status(ROOM).await.unwrap();
    assert_eq!(status.phase, RoomPhase::Review);
    assert_eq!(status.time_remaining, Some(Duration::from_secs(3)));

    next_review(&mut rx_x).await;
    assert_eq!(opened_at.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_question_below_min_aborts_without_credit() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;

    next_question(&mut rx_x).await;
    time::sleep(Duration::from_secs(1)).await;
    h.answer(ROOM, x, "4").await.unwrap();

    let reply = h
        .registry
        .route(ROOM, ClientEvent::Leave { player_id: y })
        .await
        .unwrap();
    assert_eq!(reply, RouteReply::Left { remaining: 1 });

    let aborted = next_matching(&mut rx_x, |e| matches!(e, ServerEvent::RoundAborted { .. })).await;
    assert!(matches!(aborted, ServerEvent::RoundAborted { .. }));

    let status = h.registry.status(ROOM).await.unwrap();
    assert_eq!(status.phase, RoomPhase::Waiting);
    assert_eq!(status.ready_count, 0);
    assert_eq!(status.time_remaining, None);
    assert_eq!(h.score(x).await, 0);
    assert_eq!(h.players.lock().await.get(x).unwrap().stats.answered, 0);
    assert_eq!(h.registry.player_room(y).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_leave_last_unanswered_player_closes_question_early() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    let (z, _rx_z) = h.connect("zara").await;
    seat_and_ready(&h, &[x, y, z]).await;

    next_question(&mut rx_x).await;
    let opened_at = Instant::now();
    h.answer(ROOM, x, "4").await.unwrap();
    h.answer(ROOM, y, "4").await.unwrap();
    time::sleep(Duration::from_secs(2)).await;
    h.registry.leave(z).await.unwrap();

    let ServerEvent::QuestionReview { outcomes, .. } = next_review(&mut rx_x).await else {
        panic!("expected review");
    };
    assert_eq!(opened_at.elapsed(), Duration::from_secs(2));
    assert_eq!(outcomes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_full_game_ends_persists_and_resets() {
    let cfg = RoomConfig {
        questions_per_game: 2,
        ..config()
    };
    let mut h = Harness::new(cfg, two_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;

    let start = Instant::now();
    seat_and_ready(&h, &[x, y]).await;

    for _ in 0..2 {
        next_question(&mut rx_x).await;
        time::sleep(Duration::from_secs(1)).await;
        h.answer(ROOM, x, "4").await.unwrap();
        time::sleep(Duration::from_secs(1)).await;
        h.answer(ROOM, y, "3").await.unwrap();
        next_review(&mut rx_x).await;
    }

    let ended = next_matching(&mut rx_x, |e| matches!(e, ServerEvent::GameEnded { .. })).await;
    let ServerEvent::GameEnded {
        winner,
        final_rankings,
        duration_secs,
        statistics,
    } = ended
    else {
        panic!("expected game end");
    };
    assert_eq!(winner, Some(x));
    assert_eq!(final_rankings[0].score, 30);
    assert_eq!(final_rankings[1].score, 0);
    assert_eq!(duration_secs, 15.0);
    assert_eq!(statistics.players, 2);
    assert_eq!(statistics.total_answers, 4);
    assert_eq!(statistics.accuracy_pct, 50.0);
    assert_eq!(statistics.fastest_player, Some(x));
    assert_eq!(statistics.fastest_secs, Some(1.0));
    assert_eq!(h.phase(ROOM).await, RoomPhase::Ended);
    assert_eq!(
        h.players.lock().await.get(x).unwrap().status,
        PlayerStatus::Finished
    );

    next_matching(&mut rx_x, |e| matches!(e, ServerEvent::RoomReset)).await;
    assert_eq!(start.elapsed(), Duration::from_secs(25));

    let status = h.registry.status(ROOM).await.unwrap();
    assert_eq!(status.phase, RoomPhase::Waiting);
    assert_eq!(status.player_count, 2);
    assert_eq!(status.ready_count, 0);
    assert_eq!(h.score(x).await, 0);

    let games = h.persistence.games.lock().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].0, ROOM);
    assert_eq!(games[0].1[0].player_id, x);
    assert_eq!(games[0].2, Duration::from_secs(15));
    let stats = h.persistence.stats.lock().unwrap();
    assert_eq!(stats.len(), 2);
    assert!(stats.iter().any(|(id, d)| *id == x && d.won && d.score == 30));
    assert!(stats.iter().any(|(id, d)| *id == y && !d.won && d.answered == 2));
}

#[tokio::test(start_paused = true)]
async fn test_start_game_without_matching_questions_forces_end_then_resets() {
    let cfg = RoomConfig {
        question_filter: QuestionFilter::any().category("history"),
        ..config()
    };
    let mut h = Harness::new(cfg, one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;

    let start = Instant::now();
    seat_and_ready(&h, &[x, y]).await;

    let first = next_matching(&mut rx_x, |e| {
        matches!(e, ServerEvent::GameStarting { .. } | ServerEvent::ErrorOccurred { .. })
    })
    .await;
    assert!(matches!(first, ServerEvent::ErrorOccurred { .. }));
    assert_eq!(h.phase(ROOM).await, RoomPhase::Ended);
    assert_eq!(
        h.players.lock().await.get(y).unwrap().status,
        PlayerStatus::Finished
    );

    next_matching(&mut rx_x, |e| matches!(e, ServerEvent::RoomReset)).await;
    assert_eq!(start.elapsed(), Duration::from_secs(10));

    let status = h.registry.status(ROOM).await.unwrap();
    assert_eq!(status.phase, RoomPhase::Waiting);
    assert_eq!(status.player_count, 2);
    assert_eq!(status.ready_count, 0);
    assert!(h.persistence.games.lock().unwrap().is_empty());
    assert!(h.persistence.stats.lock().unwrap().is_empty());
}

// =========================================================================
// Answer timing and rejections
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_route_at_times_answer_from_receipt_not_delivery() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;
    next_question(&mut rx_x).await;

    time::sleep(Duration::from_secs(2)).await;
    let received_at = Instant::now();
    time::sleep(Duration::from_secs(3)).await;
    let reply = h
        .registry
        .route_at(
            ROOM,
            ClientEvent::Answer {
                player_id: x,
                answer: "4".into(),
                client_elapsed_secs: None,
            },
            received_at,
        )
        .await
        .unwrap();

    assert_eq!(
        reply,
        RouteReply::Answered(AnswerReceipt {
            question_number: 1,
            elapsed: Duration::from_secs(2),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_answer_twice_returns_already_answered() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;
    next_question(&mut rx_x).await;

    h.answer(ROOM, x, "3").await.unwrap();
    let second = h.answer(ROOM, x, "4").await;

    assert_eq!(second, Err(RoomError::AlreadyAnswered(x)));
    let acks: Vec<bool> = drain(&mut rx_x)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::AnswerAck { accepted, .. } => Some(accepted),
            _ => None,
        })
        .collect();
    assert_eq!(acks, vec![true, false]);

    h.answer(ROOM, y, "4").await.unwrap();
    next_review(&mut rx_x).await;
    assert_eq!(h.score(x).await, 0, "the first (wrong) answer stands");
}

#[tokio::test(start_paused = true)]
async fn test_answer_after_timer_fired_returns_not_in_question_phase() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;
    next_question(&mut rx_x).await;

    next_review(&mut rx_x).await;
    let late = h.answer(ROOM, x, "4").await;

    assert_eq!(late, Err(RoomError::NotInQuestionPhase));
    assert_eq!(h.score(x).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_answer_during_countdown_returns_not_in_question_phase() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    seat_and_ready(&h, &[x, y]).await;

    assert_eq!(
        h.answer(ROOM, x, "4").await,
        Err(RoomError::NotInQuestionPhase)
    );
}

#[tokio::test(start_paused = true)]
async fn test_answer_from_non_member_returns_unknown_player() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _rx_y) = h.connect("yolanda").await;
    let (outsider, _rx_o) = h.connect("oscar").await;
    seat_and_ready(&h, &[x, y]).await;
    next_question(&mut rx_x).await;

    assert_eq!(
        h.answer(ROOM, outsider, "4").await,
        Err(RoomError::UnknownPlayer(outsider))
    );
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_ready_twice_is_same_as_once() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _rx_x) = h.connect("xavier").await;
    let (y, mut rx_y) = h.connect("yolanda").await;
    h.registry.join(ROOM, x).await.unwrap();
    h.registry.join(ROOM, y).await.unwrap();

    for _ in 0..2 {
        h.registry
            .route(ROOM, ClientEvent::Ready { player_id: x })
            .await
            .unwrap();
    }

    let status = h.registry.status(ROOM).await.unwrap();
    assert_eq!(status.phase, RoomPhase::Waiting);
    assert_eq!(status.ready_count, 1);
    let ready_events = drain(&mut rx_y)
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::PlayerReady { .. }))
        .count();
    assert_eq!(ready_events, 1);
    assert_eq!(
        h.players.lock().await.get(x).unwrap().status,
        PlayerStatus::Ready
    );
}

#[tokio::test]
async fn test_join_past_max_returns_room_full() {
    let cfg = RoomConfig {
        max_players: 2,
        ..config()
    };
    let mut h = Harness::new(cfg, one_question_bank());
    let (x, _) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    let (z, _) = h.connect("zara").await;
    h.registry.join(ROOM, x).await.unwrap();
    h.registry.join(ROOM, y).await.unwrap();

    let result = h.registry.join(ROOM, z).await;

    assert_eq!(result, Err(RoomError::RoomFull(ROOM)));
    assert_eq!(h.registry.player_room(z).await, None);
    assert_eq!(h.registry.status(ROOM).await.unwrap().player_count, 2);
}

#[tokio::test]
async fn test_get_or_create_applies_config_to_new_room_only() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    let (z, _) = h.connect("zara").await;
    let duo = RoomConfig {
        min_players: 1,
        max_players: 2,
        ..config()
    };

    h.registry.get_or_create(ROOM, duo).await;
    let handle = h.registry.get_or_create(ROOM, config()).await;
    h.registry.join(ROOM, x).await.unwrap();
    h.registry.join(ROOM, y).await.unwrap();
    let result = h.registry.join(ROOM, z).await;

    assert_eq!(result, Err(RoomError::RoomFull(ROOM)));
    let status = handle.status().await.unwrap();
    assert_eq!(status.min_players, 1);
    assert_eq!(status.max_players, 2);
    assert_eq!(h.registry.room_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_during_game_returns_game_in_progress() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    let (z, _) = h.connect("zara").await;
    seat_and_ready(&h, &[x, y]).await;

    let result = h
        .registry
        .route(ROOM, ClientEvent::Join { player_id: z })
        .await;

    assert_eq!(result, Err(RoomError::GameInProgress(ROOM)));
    assert_eq!(h.registry.player_room(z).await, None);
}

#[tokio::test]
async fn test_join_second_room_returns_already_in_room() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;
    h.registry.join(ROOM, x).await.unwrap();

    let result = h.registry.join(RoomId(2), x).await;

    assert_eq!(result, Err(RoomError::AlreadyInRoom(x, ROOM)));
    assert_eq!(h.registry.room_ids().await, vec![ROOM]);
    assert_eq!(h.registry.player_room(x).await, Some(ROOM));
}

#[tokio::test]
async fn test_join_unregistered_player_leaves_no_room_behind() {
    let h = Harness::new(config(), one_question_bank());

    let result = h.registry.join(ROOM, PlayerId(404)).await;

    assert_eq!(result, Err(RoomError::UnknownPlayer(PlayerId(404))));
    assert_eq!(h.registry.room_count().await, 0);
}

#[tokio::test]
async fn test_join_broadcasts_player_joined_to_members() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    h.registry.join(ROOM, x).await.unwrap();

    let reply = h
        .registry
        .route(ROOM, ClientEvent::Join { player_id: y })
        .await
        .unwrap();

    assert_eq!(reply, RouteReply::Joined { player_count: 2 });
    let joined: Vec<ServerEvent> = drain(&mut rx_x);
    assert!(joined.contains(&ServerEvent::PlayerJoined {
        room_id: ROOM,
        player_id: y,
        name: "yolanda".into(),
        player_count: 2,
    }));
}

#[tokio::test]
async fn test_leave_last_player_tears_room_down() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;
    h.registry.join(ROOM, x).await.unwrap();

    let (room, remaining) = h.registry.leave(x).await.unwrap();

    assert_eq!((room, remaining), (ROOM, 0));
    assert_eq!(h.registry.room_count().await, 0);
    assert_eq!(
        h.registry.status(ROOM).await,
        Err(RoomError::RoomNotFound(ROOM))
    );
}

#[tokio::test]
async fn test_leave_without_room_returns_no_room() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;

    assert_eq!(h.registry.leave(x).await, Err(RoomError::NoRoom(x)));
}

#[tokio::test]
async fn test_route_leave_for_other_room_returns_not_in_room() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    h.registry.join(ROOM, x).await.unwrap();
    h.registry.join(RoomId(2), y).await.unwrap();

    let result = h
        .registry
        .route(RoomId(2), ClientEvent::Leave { player_id: x })
        .await;

    assert_eq!(result, Err(RoomError::NotInRoom(x, RoomId(2))));
    assert_eq!(h.registry.player_room(x).await, Some(ROOM));
}

#[tokio::test]
async fn test_route_to_unknown_room_returns_room_not_found() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;

    let result = h
        .registry
        .route(RoomId(99), ClientEvent::Ready { player_id: x })
        .await;

    assert_eq!(result, Err(RoomError::RoomNotFound(RoomId(99))));
}

#[tokio::test]
async fn test_remove_occupied_room_returns_not_empty() {
    let mut h = Harness::new(config(), one_question_bank());
    let (x, _) = h.connect("xavier").await;
    h.registry.join(ROOM, x).await.unwrap();

    let result = h.registry.remove(ROOM).await;

    assert_eq!(result, Err(RoomError::NotEmpty(ROOM)));
    assert_eq!(h.registry.status(ROOM).await.unwrap().player_count, 1);
}

#[tokio::test]
async fn test_list_rooms_only_joinable() {
    let cfg = RoomConfig {
        max_players: 2,
        ..config()
    };
    let mut h = Harness::new(cfg, one_question_bank());
    let (x, _) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    let (z, _) = h.connect("zara").await;
    h.registry.join(ROOM, x).await.unwrap();
    h.registry.join(ROOM, y).await.unwrap();
    h.registry.join(RoomId(2), z).await.unwrap();

    let listed: Vec<RoomId> = h
        .registry
        .list_rooms()
        .await
        .iter()
        .map(|s| s.room_id)
        .collect();

    assert_eq!(listed, vec![RoomId(2)]);
}

// =========================================================================
// Sweep
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_closes_idle_ended_room_and_keeps_active_ones() {
    let cfg = RoomConfig {
        end_grace: Duration::from_secs(600),
        ..config()
    };
    let mut h = Harness::new(cfg, one_question_bank());
    let (x, mut rx_x) = h.connect("xavier").await;
    let (y, _) = h.connect("yolanda").await;
    let (w, _) = h.connect("wendy").await;
    seat_and_ready(&h, &[x, y]).await;
    h.registry.join(RoomId(2), w).await.unwrap();

    next_matching(&mut rx_x, |e| matches!(e, ServerEvent::GameEnded { .. })).await;
    assert!(h.registry.sweep(Duration::from_secs(60)).await.is_empty());

    time::sleep(Duration::from_secs(120)).await;
    let removed = h.registry.sweep(Duration::from_secs(60)).await;

    assert_eq!(removed, vec![ROOM]);
    assert_eq!(h.registry.room_ids().await, vec![RoomId(2)]);
    assert_eq!(h.registry.player_room(x).await, None);
    assert_eq!(h.registry.player_room(w).await, Some(RoomId(2)));
    assert_eq!(
        h.players.lock().await.get(x).unwrap().status,
        PlayerStatus::Connected
    );
}
