use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::*;
use chrono::Utc;

impl AppState {
    /// Record the caller's secret topic and mark them ready
    pub async fn register_topic(&self, player: &str, topic: &str) -> GameResult<Game> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(GameError::precondition("topic must not be empty"));
        }
        let room = self.room_id_for(player).await?;
        let now = Utc::now();

        let game = self
            .update_game(&room, |game| {
                if !game.has_player(player) {
                    return Err(GameError::NotFound("player".to_string()));
                }
                if !game.rounds.is_empty()
                    || !matches!(
                        game.scene,
                        GameScene::RegisterTopic | GameScene::WaitRoundStart
                    )
                {
                    return Err(GameError::precondition(
                        "topics are closed once play has started",
                    ));
                }
                if game.topics.contains_key(player) {
                    return Err(GameError::precondition("topic already registered"));
                }

                game.topics.insert(player.to_string(), topic.to_string());
                if let Some(p) = game.player_mut(player) {
                    p.scene = GameScene::WaitRoundStart;
                }
                game.reevaluate(now);
                Ok(())
            })
            .await?;

        tracing::info!("Player {} registered a topic in room {}", player, room);
        Ok(game)
    }
}
