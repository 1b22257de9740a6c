use std::sync::Arc;
use std::time::Duration;

use quizforge::prelude::*;
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::sync::mpsc::UnboundedReceiver;

const ROOM: RoomId = RoomId(1);

// ---------------------------------------------------------------------------
// Storage that only logs
// ---------------------------------------------------------------------------

struct LogPersistence;

impl Persistence for LogPersistence {
    async fn save_game_result(
        &self,
        room_id: RoomId,
        final_rankings: &[ScoreboardEntry],
        duration: Duration,
    ) -> Result<(), PersistenceError> {
        tracing::info!(
            %room_id,
            players = final_rankings.len(),
            duration_secs = duration.as_secs_f64(),
            "game result saved"
        );
        Ok(())
    }

    async fn save_player_stats(
        &self,
        player_id: PlayerId,
        delta: PlayerStatsDelta,
    ) -> Result<(), PersistenceError> {
        tracing::info!(%player_id, score = delta.score, won = delta.won, "player stats saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bots
// ---------------------------------------------------------------------------

struct Bot {
    name: &'static str,
    /// Chance of knowing the right answer.
    skill: f64,
    id: PlayerId,
    events: UnboundedReceiver<ServerEvent>,
}

type Server = QuizServer<ChannelNotifier, LogPersistence>;

/// Plays until the game ends and returns the final rankings.
async fn play(mut bot: Bot, server: Server, bank: Arc<QuestionBank>) -> Option<Vec<ScoreboardEntry>> {
    while let Some(event) = bot.events.recv().await {
        match event {
            ServerEvent::QuestionOpened {
                number,
                prompt,
                options,
                ..
            } => {
                let (delay, answer) = {
                    let mut rng = rand::rng();
                    let known = bank
                        .iter()
                        .find(|q| q.prompt == prompt)
                        .map(|q| q.correct_answer.clone());
                    let answer = match known {
                        Some(correct) if rng.random_bool(bot.skill) => correct,
                        _ => options.choose(&mut rng).cloned().unwrap_or_default(),
                    };
                    (Duration::from_millis(rng.random_range(300..4000)), answer)
                };
                tokio::time::sleep(delay).await;
                tracing::debug!(bot = bot.name, number, %answer, "answering");
                let event = ClientEvent::Answer {
                    player_id: bot.id,
                    answer,
                    client_elapsed_secs: Some(delay.as_secs_f64()),
                };
                if let Err(e) = server.handle(ROOM, event).await {
                    tracing::warn!(bot = bot.name, error = %e, "answer rejected");
                }
            }
            ServerEvent::QuestionReview {
                number,
                correct_answer,
                bonus_player,
                ..
            } if bot.name == "ada" => {
                println!("Q{number}: answer was {correct_answer:?}, bonus to {bonus_player:?}");
            }
            ServerEvent::GameEnded { final_rankings, .. } => return Some(final_rankings),
            ServerEvent::RoundAborted { reason } | ServerEvent::ErrorOccurred { reason } => {
                tracing::warn!(bot = bot.name, %reason, "game stopped");
                return None;
            }
            _ => {}
        }
    }
    None
}

#[tokio::main]
async fn main() -> Result<(), QuizError> {
    quizforge::init_tracing();

    let bank = Arc::new(QuestionBank::sample());
    let notifier = Arc::new(ChannelNotifier::new());
    let config = ServerConfig {
        room: RoomConfig {
            min_players: 3,
            questions_per_game: 5,
            countdown: Duration::from_secs(3),
            review: Duration::from_secs(2),
            end_grace: Duration::from_secs(3),
            ..RoomConfig::default()
        },
        ..ServerConfig::default()
    };
    let server = QuizServerBuilder::new()
        .config(config)
        .questions(bank.as_ref().clone())
        .build(Arc::clone(&notifier), Arc::new(LogPersistence));
    let maintenance = server.spawn_maintenance();

    let mut bots = Vec::new();
    for (i, (name, skill)) in [("ada", 0.9), ("grace", 0.7), ("linus", 0.5)]
        .into_iter()
        .enumerate()
    {
        let id = server.connect(name, ConnectionId::new(i as u64 + 1)).await?;
        let events = notifier.register(id);
        server.handle(ROOM, ClientEvent::Join { player_id: id }).await?;
        bots.push(Bot {
            name,
            skill,
            id,
            events,
        });
    }

    let ids: Vec<PlayerId> = bots.iter().map(|b| b.id).collect();
    let tasks: Vec<_> = bots
        .into_iter()
        .map(|bot| tokio::spawn(play(bot, server.clone(), Arc::clone(&bank))))
        .collect();

    for player_id in ids {
        server.handle(ROOM, ClientEvent::Ready { player_id }).await?;
    }

    let mut rankings = None;
    for task in tasks {
        if let Ok(Some(result)) = task.await {
            rankings.get_or_insert(result);
        }
    }

    match rankings {
        Some(rankings) => {
            println!("\nFinal rankings");
            for entry in rankings {
                println!(
                    "{:>2}. {:<8} {:>3} pts  {}/{} correct  avg {}",
                    entry.rank,
                    entry.name,
                    entry.score,
                    entry.correct,
                    entry.answered,
                    entry
                        .average_secs
                        .map(|s| format!("{s:.2}s"))
                        .unwrap_or_else(|| "-".into()),
                );
            }
        }
        None => println!("the game did not finish"),
    }

    maintenance.abort();
    Ok(())
}
