use super::AppState;
use crate::error::{GameError, GameResult};
use crate::protocol::SceneView;
use crate::store::keys;
use crate::types::*;

fn required(value: &str, what: &str) -> GameResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GameError::precondition(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}

impl AppState {
    /// Open a new room; the creator becomes its host
    pub async fn create_room(
        &self,
        player: &str,
        name: &str,
        passphrase: &str,
        theme: &str,
    ) -> GameResult<Game> {
        let name = required(name, "name")?;
        let passphrase = required(passphrase, "passphrase")?;
        let theme = required(theme, "theme")?;

        // A mapping whose room already expired does not block reuse
        if let Some(existing) = self
            .store
            .get::<RoomId>(&keys::passphrase(&passphrase))
            .await?
        {
            if self.store.get::<Game>(&keys::room(&existing)).await?.is_some() {
                return Err(GameError::precondition("passphrase is already in use"));
            }
        }

        let room_id = ulid::Ulid::new().to_string();
        let mut game = Game::new(
            room_id.clone(),
            passphrase.clone(),
            theme,
            self.default_config.clone(),
        );
        game.players.push(Player::new(player.to_string(), name));

        self.store.set(&keys::room(&room_id), &game).await?;
        self.store.set(&keys::passphrase(&passphrase), &room_id).await?;
        self.store.set(&keys::user_room(player), &room_id).await?;

        tracing::info!("Room {} created by {}", room_id, player);
        Ok(game)
    }

    /// Join a room that has not started play yet
    pub async fn join_room(&self, player: &str, name: &str, passphrase: &str) -> GameResult<Game> {
        let name = required(name, "name")?;
        let passphrase = required(passphrase, "passphrase")?;

        let room_id = self
            .store
            .get::<RoomId>(&keys::passphrase(&passphrase))
            .await?
            .ok_or_else(|| GameError::NotFound("passphrase".to_string()))?;

        let game = self
            .update_game(&room_id, |game| {
                if game.has_player(player) {
                    return Err(GameError::precondition("already joined this room"));
                }
                if !game.rounds.is_empty()
                    || !matches!(
                        game.scene,
                        GameScene::RegisterTopic | GameScene::WaitRoundStart
                    )
                {
                    return Err(GameError::precondition("the game has already started"));
                }
                game.players.push(Player::new(player.to_string(), name));
                // The newcomer still owes a topic
                game.scene = GameScene::RegisterTopic;
                Ok(())
            })
            .await?;

        self.store.set(&keys::user_room(player), &room_id).await?;

        tracing::info!("Player {} joined room {}", player, room_id);
        Ok(game)
    }

    /// Tear the caller's room down for every member
    pub async fn reset_room(&self, player: &str) -> GameResult<()> {
        let game = self.game_for_player(player).await?;
        self.delete_room(&game).await?;
        tracing::info!("Room {} reset by {}", game.id, player);
        Ok(())
    }

    pub(crate) async fn delete_room(&self, game: &Game) -> GameResult<()> {
        self.store.delete(&keys::room(&game.id)).await?;

        let passphrase_key = keys::passphrase(&game.passphrase);
        if self.store.get::<RoomId>(&passphrase_key).await?.as_deref() == Some(game.id.as_str()) {
            self.store.delete(&passphrase_key).await?;
        }

        for member in &game.players {
            let session_key = keys::user_room(&member.id);
            if self.store.get::<RoomId>(&session_key).await?.as_deref() == Some(game.id.as_str()) {
                self.store.delete(&session_key).await?;
            }
        }
        Ok(())
    }

    pub async fn config(&self, player: &str) -> GameResult<GameConfig> {
        Ok(self.game_for_player(player).await?.config)
    }

    /// Replace the room's rules; host only, before the first round
    pub async fn update_config(&self, player: &str, config: GameConfig) -> GameResult<Game> {
        config.validate().map_err(GameError::PreconditionFailed)?;
        let room = self.room_id_for(player).await?;

        self.update_game(&room, |game| {
            if !game.has_player(player) {
                return Err(GameError::NotFound("player".to_string()));
            }
            if !game.is_host(player) {
                return Err(GameError::precondition("only the host can change the rules"));
            }
            if !game.rounds.is_empty() || game.scene == GameScene::TopicSelecting {
                return Err(GameError::precondition(
                    "rules cannot change once play has started",
                ));
            }
            game.config = config;
            Ok(())
        })
        .await
    }

    /// The room as the caller should see it in the current scene
    pub async fn scene_view(&self, player: &str) -> GameResult<SceneView> {
        let game = self.game_for_player(player).await?;
        Ok(SceneView::for_player(&game, player))
    }

    pub async fn round_history(&self, room: &str, index: usize) -> GameResult<Vec<HistoryInfo>> {
        let game = self.load_game(room).await?;
        game.rounds
            .get(index)
            .map(|round| round.histories.clone())
            .ok_or_else(|| GameError::NotFound(format!("round {}", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_create_room_registers_host_and_mappings() {
        let h = harness();
        let game = h
            .state
            .create_room("p1", " Ann ", "secret", "animals")
            .await
            .unwrap();

        assert!(game.is_host("p1"));
        assert_eq!(game.players[0].name, "Ann");
        assert_eq!(h.state.room_id_for("p1").await.unwrap(), game.id);
        let mapped: Option<RoomId> = h.state.store.get(&keys::passphrase("secret")).await.unwrap();
        assert_eq!(mapped, Some(game.id));
    }

    #[tokio::test]
    async fn test_passphrase_in_use_is_rejected() {
        let h = harness();
        h.state.create_room("p1", "Ann", "secret", "animals").await.unwrap();

        let err = h
            .state
            .create_room("p2", "Bob", "secret", "food")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_blank_theme_is_rejected() {
        let h = harness();
        let err = h.state.create_room("p1", "Ann", "secret", "  ").await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(ref msg) if msg.contains("theme")));
    }

    #[tokio::test]
    async fn test_join_unknown_passphrase_is_not_found() {
        let h = harness();
        let err = h.state.join_room("p2", "Bob", "nope").await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_join_twice_is_rejected() {
        let h = harness();
        h.state.create_room("p1", "Ann", "secret", "animals").await.unwrap();
        h.state.join_room("p2", "Bob", "secret").await.unwrap();

        let err = h.state.join_room("p2", "Bob", "secret").await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_join_sends_ready_room_back_to_registration() {
        let h = harness();
        let room = room_with_topics(&h.state, &[("p1", "dog")]).await;
        assert_eq!(
            h.state.load_game(&room).await.unwrap().scene,
            GameScene::WaitRoundStart
        );

        let game = h.state.join_room("p2", "Bob", "pass").await.unwrap();
        assert_eq!(game.scene, GameScene::RegisterTopic);
    }

    #[tokio::test]
    async fn test_reset_removes_every_mapping() {
        let h = harness();
        let room = room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;

        h.state.reset_room("p2").await.unwrap();

        assert!(h.state.load_game(&room).await.is_err());
        assert!(h.state.room_id_for("p1").await.is_err());
        assert!(h.state.room_id_for("p2").await.is_err());
        let mapped: Option<RoomId> = h.state.store.get(&keys::passphrase("pass")).await.unwrap();
        assert!(mapped.is_none());
    }

    #[tokio::test]
    async fn test_only_host_updates_config() {
        let h = harness();
        room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;
        let config = GameConfig {
            question_limit: 8,
            ..GameConfig::default()
        };

        let err = h.state.update_config("p2", config.clone()).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        let game = h.state.update_config("p1", config).await.unwrap();
        assert_eq!(game.config.question_limit, 8);
        assert_eq!(h.state.config("p2").await.unwrap().question_limit, 8);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let h = harness();
        h.state.create_room("p1", "Ann", "secret", "animals").await.unwrap();
        let config = GameConfig {
            answer_limit: 0,
            ..GameConfig::default()
        };
        let err = h.state.update_config("p1", config).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_round_history_out_of_range() {
        let h = harness();
        let game = h.state.create_room("p1", "Ann", "secret", "animals").await.unwrap();
        let err = h.state.round_history(&game.id, 0).await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }
}
