//! Room registry: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::time::Duration;

use quizforge_protocol::{ClientEvent, PlayerId, RoomId};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::room::spawn_room;
use crate::{
    AnswerReceipt, Notifier, Persistence, RoomConfig, RoomContext, RoomError, RoomHandle,
    RoomPhase, RoomStatus,
};

/// Default command channel size for room actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// What a routed [`ClientEvent`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReply {
    /// The player was seated; `player_count` includes them.
    Joined { player_count: usize },
    /// The player left; `remaining` players are still seated.
    Left { remaining: usize },
    Ready,
    Answered(AnswerReceipt),
}

/// Manages all active rooms and tracks which player is in which room.
///
/// A player sits in at most one room at a time. The player→room index is
/// reserved before the room is asked to seat the player and released if
/// the room says no, so two concurrent joins for the same player can't
/// both succeed. No registry lock is held while waiting on a room.
///
/// Every method takes `&self`; share the registry behind an `Arc`.
pub struct RoomRegistry<N, P> {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    player_rooms: Mutex<HashMap<PlayerId, RoomId>>,
    context: RoomContext<N, P>,
    config: RoomConfig,
    channel_size: usize,
}

impl<N: Notifier, P: Persistence> RoomRegistry<N, P> {
    /// Creates an empty registry. New rooms get `config`.
    pub fn new(context: RoomContext<N, P>, config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            player_rooms: Mutex::new(HashMap::new()),
            context,
            config,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Sets the command channel size for rooms created from now on.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size;
        self
    }

    /// The config rooms created by a join start with.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the room's handle, spawning the room with `config` if it
    /// doesn't exist (or its actor has stopped). An existing room keeps
    /// the config it was created with.
    pub async fn get_or_create(&self, room_id: RoomId, config: RoomConfig) -> RoomHandle {
        if let Some(handle) = self.rooms.read().await.get(&room_id) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(&room_id) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }
        tracing::info!(
            %room_id,
            min_players = config.min_players,
            max_players = config.max_players,
            "room created"
        );
        let handle = spawn_room(room_id, config, self.context.clone(), self.channel_size);
        rooms.insert(room_id, handle.clone());
        handle
    }

    /// Returns the handle of an existing room.
    pub async fn get(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound(room_id))
    }

    /// Seats a player, creating the room on first join.
    ///
    /// Returns the room's new member count.
    pub async fn join(&self, room_id: RoomId, player_id: PlayerId) -> Result<usize, RoomError> {
        {
            let mut index = self.player_rooms.lock().await;
            if let Some(&current) = index.get(&player_id) {
                return Err(RoomError::AlreadyInRoom(player_id, current));
            }
            index.insert(player_id, room_id);
        }

        let mut result = self
            .get_or_create(room_id, self.config.clone())
            .await
            .join(player_id)
            .await;
        if let Err(RoomError::Unavailable(_)) = result {
            // The actor stopped between lookup and send; a fresh one takes over.
            self.forget_if_closed(room_id).await;
            result = self
                .get_or_create(room_id, self.config.clone())
                .await
                .join(player_id)
                .await;
        }

        match result {
            Ok(count) => Ok(count),
            Err(e) => {
                self.player_rooms.lock().await.remove(&player_id);
                tracing::debug!(%room_id, %player_id, error = %e, "join rejected");
                // Don't leave behind a room this join created.
                let _ = self.remove(room_id).await;
                Err(e)
            }
        }
    }

    /// Removes a player from their current room.
    ///
    /// Returns the room and its remaining member count. The room is torn
    /// down when the last player leaves.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(RoomId, usize), RoomError> {
        let room_id = self
            .player_room(player_id)
            .await
            .ok_or(RoomError::NoRoom(player_id))?;

        let result = match self.get(room_id).await {
            Ok(handle) => handle.leave(player_id).await,
            Err(e) => Err(e),
        };
        self.player_rooms.lock().await.remove(&player_id);

        let remaining = match result {
            Ok(remaining) => remaining,
            Err(RoomError::Unavailable(_) | RoomError::RoomNotFound(_)) => 0,
            Err(e) => return Err(e),
        };

        if remaining == 0 {
            match self.remove(room_id).await {
                Ok(()) | Err(RoomError::NotEmpty(_) | RoomError::RoomNotFound(_)) => {}
                Err(e) => tracing::warn!(%room_id, error = %e, "room teardown failed"),
            }
        }
        Ok((room_id, remaining))
    }

    /// Routes a client event to a room.
    ///
    /// `Join` creates the room if needed; everything else needs an
    /// existing room and fails with [`RoomError::RoomNotFound`] otherwise.
    pub async fn route(&self, room_id: RoomId, event: ClientEvent) -> Result<RouteReply, RoomError> {
        self.route_at(room_id, event, Instant::now()).await
    }

    /// Like [`route`](Self::route), with the time the event arrived.
    /// Answers are timed from `received_at`.
    pub async fn route_at(
        &self,
        room_id: RoomId,
        event: ClientEvent,
        received_at: Instant,
    ) -> Result<RouteReply, RoomError> {
        match event {
            ClientEvent::Join { player_id } => {
                let player_count = self.join(room_id, player_id).await?;
                Ok(RouteReply::Joined { player_count })
            }
            ClientEvent::Leave { player_id } => {
                self.get(room_id).await?;
                match self.player_room(player_id).await {
                    Some(current) if current == room_id => {}
                    _ => return Err(RoomError::NotInRoom(player_id, room_id)),
                }
                let (_, remaining) = self.leave(player_id).await?;
                Ok(RouteReply::Left { remaining })
            }
            ClientEvent::Ready { player_id } => {
                self.get(room_id).await?.ready(player_id).await?;
                Ok(RouteReply::Ready)
            }
            ClientEvent::Answer {
                player_id,
                answer,
                client_elapsed_secs,
            } => {
                let receipt = self
                    .get(room_id)
                    .await?
                    .answer_at(player_id, answer, client_elapsed_secs, received_at)
                    .await?;
                Ok(RouteReply::Answered(receipt))
            }
        }
    }

    /// Shuts down an empty room. Fails with [`RoomError::NotEmpty`] while
    /// players are seated; the room keeps running in that case.
    pub async fn remove(&self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self.get(room_id).await?;
        match handle.close(true).await {
            Ok(()) | Err(RoomError::Unavailable(_)) => {}
            Err(e) => return Err(e),
        }
        self.forget(room_id, &handle).await;
        tracing::info!(%room_id, "room removed");
        Ok(())
    }

    /// Closes rooms that are empty, ended and idle for at least `idle`, or
    /// already stopped. Returns the ids removed, sorted.
    pub async fn sweep(&self, idle: Duration) -> Vec<RoomId> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut removed = Vec::new();

        for handle in handles {
            let room_id = handle.room_id();
            let close = match handle.status().await {
                Ok(status) if status.player_count == 0 => handle.close(true).await,
                Ok(status) if status.phase == RoomPhase::Ended && status.idle_for >= idle => {
                    tracing::info!(
                        %room_id,
                        players = status.player_count,
                        idle_secs = status.idle_for.as_secs(),
                        "closing idle ended room"
                    );
                    let closed = handle.close(false).await;
                    self.player_rooms.lock().await.retain(|_, r| *r != room_id);
                    closed
                }
                Ok(_) => continue,
                Err(e) => Err(e),
            };
            match close {
                Ok(()) | Err(RoomError::Unavailable(_)) => {
                    self.forget(room_id, &handle).await;
                    removed.push(room_id);
                }
                Err(e) => {
                    tracing::debug!(%room_id, error = %e, "room kept by sweep");
                }
            }
        }

        removed.sort();
        if !removed.is_empty() {
            tracing::info!(rooms = removed.len(), "swept rooms");
        }
        removed
    }

    /// The room a player sits in, if any.
    pub async fn player_room(&self, player_id: PlayerId) -> Option<RoomId> {
        self.player_rooms.lock().await.get(&player_id).copied()
    }

    /// Status snapshot of one room.
    pub async fn status(&self, room_id: RoomId) -> Result<RoomStatus, RoomError> {
        self.get(room_id).await?.status().await
    }

    /// Snapshots of every room that would accept a join, by room id.
    pub async fn list_rooms(&self) -> Vec<RoomStatus> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut rooms = Vec::new();
        for handle in handles {
            if let Ok(status) = handle.status().await {
                if status.is_joinable() {
                    rooms.push(status);
                }
            }
        }
        rooms.sort_by_key(|s| s.room_id);
        rooms
    }

    /// Number of rooms currently registered.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Registered room ids, sorted.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Drops a room from the map if `handle` is still the registered actor.
    async fn forget(&self, room_id: RoomId, handle: &RoomHandle) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(&room_id).is_some_and(|h| h.same_actor(handle)) {
            rooms.remove(&room_id);
        }
    }

    async fn forget_if_closed(&self, room_id: RoomId) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(&room_id).is_some_and(RoomHandle::is_closed) {
            rooms.remove(&room_id);
        }
    }
}
