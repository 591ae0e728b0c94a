use super::{AppState, Followup};
use crate::error::{GameError, GameResult};
use crate::store::keys;
use crate::types::*;
use chrono::Utc;
use rand::seq::IndexedRandom;

/// Whether a topic draw may begin from this snapshot
fn ensure_can_start(game: &Game) -> GameResult<()> {
    if game.has_open_round() {
        return Err(GameError::precondition("a round is already in progress"));
    }
    if game.unused_topics().is_empty() {
        return Err(GameError::precondition("no topics left to draw"));
    }
    match game.scene {
        GameScene::WaitRoundStart
            if game.rounds.is_empty() && game.all_players_in(GameScene::WaitRoundStart) =>
        {
            Ok(())
        }
        // An earlier draw was interrupted, or the automatic advance failed
        GameScene::TopicSelecting | GameScene::LiarGuess => Ok(()),
        GameScene::RegisterTopic | GameScene::WaitRoundStart => {
            Err(GameError::precondition("not every player is ready"))
        }
        GameScene::QuestionAnswering | GameScene::GameEnd => {
            Err(GameError::precondition("a round cannot start now"))
        }
    }
}

impl AppState {
    /// Draw the first topic (or resume an interrupted draw).
    ///
    /// Only one caller per room gets past the round lock; a caller that finds
    /// it held is turned away with `LockContention`.
    pub async fn start_round(&self, player: &str) -> GameResult<Game> {
        let game = self.game_for_player(player).await?;
        ensure_can_start(&game)?;

        if self.round_lock.is_locked(&game.id) {
            return Err(GameError::LockContention);
        }
        let _guard = self.round_lock.lock(&game.id).await?;

        // Other starters may have won the lock first; trust only what is stored now
        let game = self.load_game(&game.id).await?;
        ensure_can_start(&game)?;

        let game = self.draw_next_round(&game).await?;

        // The code is free for another room once play begins
        let passphrase_key = keys::passphrase(&game.passphrase);
        if self.store.get::<RoomId>(&passphrase_key).await?.as_deref() == Some(game.id.as_str()) {
            self.store.delete(&passphrase_key).await?;
        }

        Ok(game)
    }

    /// Carry out work a room update asked for.
    ///
    /// The triggering update is already committed, so a failed draw is only
    /// logged. The room stays in a scene from which `start_round` resumes.
    pub(crate) async fn apply_followup(&self, room: &str, followup: Followup) {
        let Followup::DrawNextRound { completed_rounds } = followup else {
            return;
        };
        if let Err(e) = self.advance_to_next_round(room, completed_rounds).await {
            tracing::error!(
                "Room {}: automatic draw after round {} failed: {}",
                room,
                completed_rounds,
                e
            );
        }
    }

    async fn advance_to_next_round(&self, room: &str, completed_rounds: usize) -> GameResult<()> {
        let _guard = self.round_lock.lock(room).await?;

        let game = self.load_game(room).await?;
        if game.rounds.len() != completed_rounds || ensure_can_start(&game).is_err() {
            tracing::debug!("Room {} already advanced past round {}", room, completed_rounds);
            return Ok(());
        }

        self.draw_next_round(&game).await.map(|_| ())
    }

    /// Draw rounds until one opens or the room can no longer start one.
    ///
    /// Must run under the room's round lock. A topic withdrawn while it was
    /// being researched is skipped, and the next unused topic is drawn.
    async fn draw_next_round(&self, game: &Game) -> GameResult<Game> {
        let mut game = self.draw_once(game).await?;
        while game.scene != GameScene::QuestionAnswering {
            if ensure_can_start(&game).is_err() {
                break;
            }
            game = self.draw_once(&game).await?;
        }
        Ok(game)
    }

    /// Pick an unused topic, research it and open its round.
    ///
    /// On a research failure the room returns to the scene it had before the
    /// draw and nothing is appended. The same happens when the topic's owners
    /// left in the meantime, after which the room is reevaluated.
    async fn draw_once(&self, game: &Game) -> GameResult<Game> {
        let room = game.id.as_str();
        let previous_scene = game.scene;
        let completed = game.rounds.len();

        let topic = {
            let unused = game.unused_topics();
            let mut rng = rand::rng();
            unused.choose(&mut rng).cloned()
        }
        .ok_or_else(|| GameError::precondition("no topics left to draw"))?;

        self.update_game(room, |g| {
            if g.rounds.len() != completed {
                return Err(GameError::precondition("a round is already in progress"));
            }
            g.set_scene_all(GameScene::TopicSelecting);
            Ok(())
        })
        .await?;

        tracing::info!("Room {}: drawing round {}", room, completed + 1);

        let topic_info = match self.researcher.lookup(&game.theme, &topic).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Room {}: topic lookup failed: {}", room, e);
                let restored = self
                    .update_game(room, |g| {
                        g.set_scene_all(previous_scene);
                        Ok(())
                    })
                    .await;
                if let Err(restore_err) = restored {
                    tracing::error!("Room {}: could not restore scene: {}", room, restore_err);
                }
                return Err(e.into());
            }
        };

        let now = Utc::now();
        let game = self
            .update_game(room, |g| {
                if g.rounds.len() != completed || g.rounds.iter().any(|r| r.topic == topic) {
                    return Err(GameError::precondition("a round is already in progress"));
                }
                // A ban may already have ended the game
                if g.scene != GameScene::TopicSelecting {
                    return Ok(());
                }
                let liars = g.liars_for(&topic);
                if liars.is_empty() {
                    g.set_scene_all(previous_scene);
                    g.reevaluate(now);
                    return Ok(());
                }
                g.rounds
                    .push(Round::new(topic.clone(), topic_info, liars, now));
                g.set_scene_all(GameScene::QuestionAnswering);
                Ok(())
            })
            .await?;

        if game.rounds.len() == completed {
            tracing::warn!(
                "Room {}: drawn topic was withdrawn, room is now {:?}",
                room,
                game.scene
            );
            return Ok(game);
        }

        tracing::info!(
            "Room {}: round {} started with {} liar(s)",
            room,
            game.rounds.len(),
            game.current_round().map_or(0, |r| r.liars.len())
        );
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::research::CannedResearcher;
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_round_draws_registered_topic() {
        let h = harness();
        room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;

        let game = h.state.start_round("p2").await.unwrap();

        assert_eq!(game.scene, GameScene::QuestionAnswering);
        assert!(game.players.iter().all(|p| p.scene == GameScene::QuestionAnswering));
        let round = game.current_round().unwrap();
        let expected_liar = if round.topic == "dog" { "p1" } else { "p2" };
        assert_eq!(round.liars, vec![expected_liar.to_string()]);
        assert!(!round.topic_info.is_empty());
    }

    #[tokio::test]
    async fn test_start_requires_everyone_ready() {
        let h = harness();
        h.state.create_room("p1", "Ann", "pass", "animals").await.unwrap();
        h.state.join_room("p2", "Bob", "pass").await.unwrap();
        h.state.register_topic("p1", "dog").await.unwrap();

        let err = h.state.start_round("p1").await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let h = harness();
        room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;
        h.state.start_round("p1").await.unwrap();

        let err = h.state.start_round("p2").await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_passphrase_released_on_start() {
        let h = harness();
        room_with_topics(&h.state, &[("p1", "dog")]).await;
        h.state.start_round("p1").await.unwrap();

        let mapped: Option<RoomId> = h.state.store.get(&keys::passphrase("pass")).await.unwrap();
        assert!(mapped.is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_restores_scene_and_writes_no_round() {
        let h = harness();
        let room = room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;
        h.researcher.set_failing(true);

        let err = h.state.start_round("p1").await.unwrap_err();
        assert_eq!(err.code(), "COLLABORATOR_FAILURE");

        let game = h.state.load_game(&room).await.unwrap();
        assert!(game.rounds.is_empty());
        assert_eq!(game.scene, GameScene::WaitRoundStart);
        assert!(game.players.iter().all(|p| p.scene == GameScene::WaitRoundStart));

        // Retrying after the collaborator recovers works
        h.researcher.set_failing(false);
        assert!(h.state.start_round("p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_interrupted_draw_can_resume() {
        let h = harness();
        let room = room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;
        h.state
            .update_game(&room, |g| {
                g.set_scene_all(GameScene::TopicSelecting);
                Ok(())
            })
            .await
            .unwrap();

        let game = h.state.start_round("p1").await.unwrap();
        assert_eq!(game.rounds.len(), 1);
    }

    #[tokio::test]
    async fn test_start_while_drawing_is_contention() {
        let h = harness_with(
            GameConfig::default(),
            CannedResearcher::new().with_delay(Duration::from_millis(200)),
        );
        room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;

        let state = h.state.clone();
        let first = tokio::spawn(async move { state.start_round("p1").await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = h.state.start_round("p2").await.unwrap_err();
        assert!(matches!(err, GameError::LockContention));

        let game = first.await.unwrap().unwrap();
        assert_eq!(game.rounds.len(), 1);
        assert_eq!(h.researcher.lookups(), 1);
    }
}
