use super::{AppState, Followup};
use crate::error::{GameError, GameResult};
use crate::store::keys;
use crate::types::*;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BanOutcome {
    Removed,
    /// The last player left, so the room was deleted
    RoomClosed,
}

impl AppState {
    /// Remove `target` from the caller's room.
    ///
    /// The host may remove anyone; everybody else only themselves. A topic
    /// that was never drawn leaves with its author.
    pub async fn ban_player(&self, actor: &str, target: &str) -> GameResult<BanOutcome> {
        let room = self.room_id_for(actor).await?;
        let now = Utc::now();
        let mut followup = Followup::None;

        let game = self
            .update_game(&room, |game| {
                if !game.has_player(actor) {
                    return Err(GameError::NotFound("player".to_string()));
                }
                if actor != target && !game.is_host(actor) {
                    return Err(GameError::precondition(
                        "only the host can remove other players",
                    ));
                }
                if !game.has_player(target) {
                    return Err(GameError::precondition("no such player"));
                }

                game.players.retain(|p| p.id != target);
                let drawn = game
                    .rounds
                    .iter()
                    .any(|r| r.liars.iter().any(|liar| liar == target));
                if !drawn {
                    game.topics.remove(target);
                }
                if !game.players.is_empty() {
                    followup = game.reevaluate(now);
                }
                Ok(())
            })
            .await?;

        let session_key = keys::user_room(target);
        if self.store.get::<RoomId>(&session_key).await?.as_deref() == Some(room.as_str()) {
            self.store.delete(&session_key).await?;
        }
        tracing::info!("Room {}: {} removed {}", room, actor, target);

        if game.players.is_empty() {
            self.delete_room(&game).await?;
            tracing::info!("Room {} closed, no players left", room);
            return Ok(BanOutcome::RoomClosed);
        }

        self.apply_followup(&room, followup).await;
        Ok(BanOutcome::Removed)
    }

    /// Move the caller between topic registration and ready
    pub async fn set_player_scene(&self, player: &str, scene: GameScene) -> GameResult<Game> {
        let room = self.room_id_for(player).await?;
        let now = Utc::now();

        self.update_game(&room, |game| {
            if !game.rounds.is_empty()
                || !matches!(
                    game.scene,
                    GameScene::RegisterTopic | GameScene::WaitRoundStart
                )
            {
                return Err(GameError::precondition("play has already started"));
            }
            match scene {
                GameScene::RegisterTopic => {}
                GameScene::WaitRoundStart if game.topics.contains_key(player) => {}
                GameScene::WaitRoundStart => {
                    return Err(GameError::precondition("register a topic first"));
                }
                _ => {
                    return Err(GameError::precondition(
                        "players can only choose between registering and ready",
                    ));
                }
            }
            let p = game
                .player_mut(player)
                .ok_or_else(|| GameError::NotFound("player".to_string()))?;
            p.scene = scene;
            game.reevaluate(now);
            Ok(())
        })
        .await
    }
}
