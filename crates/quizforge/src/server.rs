//! `QuizServer` builder and facade.
//!
//! This is the entry point for embedding Quizforge. It ties the layers
//! together (players → rooms → questions) and runs the periodic
//! maintenance sweeps. Transport stays outside: a connection handler
//! calls [`QuizServer::connect`] once, then forwards every decoded
//! [`ClientEvent`] to [`QuizServer::handle`].

use std::sync::Arc;
use std::time::Duration;

use quizforge_player::{PlayerRegistry, SharedPlayers};
use quizforge_protocol::{ClientEvent, ConnectionId, PlayerId, RoomId};
use quizforge_questions::QuestionBank;
use quizforge_room::{
    DEFAULT_CHANNEL_SIZE, Notifier, Persistence, RoomConfig, RoomContext, RoomError,
    RoomRegistry, RoomStatus, RouteReply,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::QuizError;

/// Server-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Settings every new room starts with.
    pub room: RoomConfig,

    /// Players with no routed event for this long are removed by the
    /// maintenance sweep.
    pub player_inactivity_timeout: Duration,

    /// How often the maintenance task runs.
    pub sweep_interval: Duration,

    /// Ended rooms with no player command for this long are closed.
    pub room_idle_timeout: Duration,

    /// Command queue size of each room actor.
    pub room_channel_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            room: RoomConfig::default(),
            player_inactivity_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            room_idle_timeout: Duration::from_secs(300),
            room_channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}

/// Builder for configuring a Quizforge server.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use quizforge::prelude::*;
///
/// let server = QuizServerBuilder::new()
///     .questions(QuestionBank::sample())
///     .build(Arc::new(ChannelNotifier::new()), Arc::new(NoPersistence));
/// let maintenance = server.spawn_maintenance();
/// ```
#[derive(Debug, Default)]
pub struct QuizServerBuilder {
    config: ServerConfig,
    bank: Option<QuestionBank>,
}

impl QuizServerBuilder {
    /// Creates a new builder with default settings and the sample bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the configuration new rooms are created with.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Sets the question bank. Defaults to [`QuestionBank::sample`].
    pub fn questions(mut self, bank: QuestionBank) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Builds the server around the given delivery and storage backends.
    pub fn build<N: Notifier, P: Persistence>(
        self,
        notifier: Arc<N>,
        persistence: Arc<P>,
    ) -> QuizServer<N, P> {
        let bank = self.bank.unwrap_or_else(QuestionBank::sample);
        let players = PlayerRegistry::shared();
        let context = RoomContext {
            bank: Arc::new(bank),
            players: Arc::clone(&players),
            notifier: Arc::clone(&notifier),
            persistence,
        };
        let rooms = RoomRegistry::new(context, self.config.room.clone())
            .with_channel_size(self.config.room_channel_size);

        tracing::info!(
            min_players = self.config.room.min_players,
            max_players = self.config.room.max_players,
            questions_per_game = self.config.room.questions_per_game,
            "quiz server built"
        );

        QuizServer {
            inner: Arc::new(Inner {
                players,
                rooms,
                notifier,
                config: self.config,
            }),
        }
    }
}

struct Inner<N, P> {
    players: SharedPlayers,
    rooms: RoomRegistry<N, P>,
    notifier: Arc<N>,
    config: ServerConfig,
}

/// A Quizforge server: player registry, room registry and maintenance.
///
/// Cheap to clone; every clone shares the same state.
pub struct QuizServer<N, P> {
    inner: Arc<Inner<N, P>>,
}

impl<N, P> Clone for QuizServer<N, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: Notifier, P: Persistence> QuizServer<N, P> {
    /// Registers a player, or reconnects a disconnected one with the same
    /// name. Returns the player's id.
    pub async fn connect(&self, name: &str, connection: ConnectionId) -> Result<PlayerId, QuizError> {
        let mut players = self.inner.players.lock().await;
        let player = players.add_player(name, connection)?;
        Ok(player.id)
    }

    /// Takes a player out of its room and marks it disconnected. The name
    /// stays reserved for a reconnect.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), QuizError> {
        match self.inner.rooms.leave(player_id).await {
            Ok(_) | Err(RoomError::NoRoom(_)) => {}
            Err(e) => tracing::warn!(%player_id, error = %e, "leave on disconnect failed"),
        }
        self.inner.players.lock().await.disconnect(player_id)?;
        Ok(())
    }

    /// Routes one client event to a room.
    ///
    /// Counts as activity for the sending player, who must be connected.
    /// Answers are timed from the moment this is called.
    pub async fn handle(&self, room_id: RoomId, event: ClientEvent) -> Result<RouteReply, QuizError> {
        let received_at = Instant::now();
        self.inner.players.lock().await.touch(event.player_id())?;
        Ok(self
            .inner
            .rooms
            .route_at(room_id, event, received_at)
            .await?)
    }

    /// Opens a room with its own settings ahead of the first join.
    ///
    /// An existing room is left as it is. A room nobody joins is closed by
    /// the next room sweep.
    pub async fn open_room(&self, room_id: RoomId, config: RoomConfig) -> Result<RoomStatus, QuizError> {
        let handle = self.inner.rooms.get_or_create(room_id, config).await;
        Ok(handle.status().await?)
    }

    /// Status snapshot of one room.
    pub async fn room_status(&self, room_id: RoomId) -> Result<RoomStatus, QuizError> {
        Ok(self.inner.rooms.status(room_id).await?)
    }

    /// Rooms that would accept a join right now.
    pub async fn list_rooms(&self) -> Vec<RoomStatus> {
        self.inner.rooms.list_rooms().await
    }

    /// Removes players idle for longer than the inactivity timeout and
    /// takes them out of their rooms. Returns the removed ids.
    pub async fn sweep_inactive(&self) -> Vec<PlayerId> {
        let stale = self
            .inner
            .players
            .lock()
            .await
            .mark_inactive(self.inner.config.player_inactivity_timeout);

        for &player_id in &stale {
            match self.inner.rooms.leave(player_id).await {
                Ok((room_id, remaining)) => {
                    tracing::info!(%player_id, %room_id, remaining, "inactive player left room");
                }
                Err(RoomError::NoRoom(_)) => {}
                Err(e) => tracing::warn!(%player_id, error = %e, "inactive player leave failed"),
            }
        }
        stale
    }

    /// Closes empty rooms and ended rooms idle past the room idle timeout.
    pub async fn sweep_rooms(&self) -> Vec<RoomId> {
        self.inner
            .rooms
            .sweep(self.inner.config.room_idle_timeout)
            .await
    }

    /// Spawns the periodic maintenance task (player sweep, then room
    /// sweep, every `sweep_interval`). Abort the handle to stop it.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let server = self.clone();
        let period = self.inner.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            tracing::info!(period_secs = period.as_secs_f64(), "maintenance task started");

            loop {
                interval.tick().await;
                let players = server.sweep_inactive().await;
                let rooms = server.sweep_rooms().await;
                if !players.is_empty() || !rooms.is_empty() {
                    tracing::debug!(
                        players = players.len(),
                        rooms = rooms.len(),
                        "maintenance sweep"
                    );
                }
            }
        })
    }

    /// The shared player registry.
    pub fn players(&self) -> &SharedPlayers {
        &self.inner.players
    }

    /// The room registry.
    pub fn rooms(&self) -> &RoomRegistry<N, P> {
        &self.inner.rooms
    }

    /// The notifier events are delivered through.
    pub fn notifier(&self) -> &Arc<N> {
        &self.inner.notifier
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }
}
