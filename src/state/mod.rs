mod answer;
mod guess;
mod player;
mod question;
mod room;
mod round;
mod scene;
mod topic;

pub use player::BanOutcome;
pub use scene::Followup;

use crate::error::{GameError, GameResult};
use crate::lock::KeyedLock;
use crate::oracle::Oracle;
use crate::research::TopicResearcher;
use crate::store::{keys, Store};
use crate::types::*;
use std::sync::Arc;

/// Shared application state.
///
/// Holds no game data itself: every action reads the room from the store,
/// mutates it and writes it back.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Serializes topic draws per room
    pub round_lock: KeyedLock,
    pub oracle: Arc<dyn Oracle>,
    pub researcher: Arc<dyn TopicResearcher>,
    /// Rules given to newly created rooms
    pub default_config: GameConfig,
}

impl AppState {
    pub fn new(
        store: Store,
        oracle: Arc<dyn Oracle>,
        researcher: Arc<dyn TopicResearcher>,
        default_config: GameConfig,
    ) -> Self {
        Self {
            store,
            round_lock: KeyedLock::new(),
            oracle,
            researcher,
            default_config,
        }
    }

    pub fn with_round_lock(mut self, round_lock: KeyedLock) -> Self {
        self.round_lock = round_lock;
        self
    }

    /// The room a player last created or joined
    pub async fn room_id_for(&self, player: &str) -> GameResult<RoomId> {
        self.store
            .get::<RoomId>(&keys::user_room(player))
            .await?
            .ok_or_else(|| GameError::NotFound("session".to_string()))
    }

    pub async fn load_game(&self, room: &str) -> GameResult<Game> {
        self.store
            .get::<Game>(&keys::room(room))
            .await?
            .ok_or_else(|| GameError::NotFound("room".to_string()))
    }

    /// The caller's room, provided they are still one of its players
    pub async fn game_for_player(&self, player: &str) -> GameResult<Game> {
        let room = self.room_id_for(player).await?;
        let game = self.load_game(&room).await?;
        if !game.has_player(player) {
            return Err(GameError::NotFound("player".to_string()));
        }
        Ok(game)
    }

    /// Read-modify-write of a room. Last writer wins against concurrent updates.
    pub(crate) async fn update_game<F>(&self, room: &str, mutate: F) -> GameResult<Game>
    where
        F: FnOnce(&mut Game) -> GameResult<()>,
    {
        self.store
            .update(&keys::room(room), |game: &mut Game| {
                mutate(game)?;
                game.version += 1;
                Ok(())
            })
            .await
    }
}

/// Current players and the bot may act; anyone else has left the room
fn ensure_member(game: &Game, player: &str) -> GameResult<()> {
    if is_bot(player) || game.has_player(player) {
        Ok(())
    } else {
        Err(GameError::NotFound("player".to_string()))
    }
}
