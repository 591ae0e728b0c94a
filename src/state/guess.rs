use super::{AppState, Followup};
use crate::error::{GameError, GameResult};
use crate::types::*;
use chrono::Utc;

impl AppState {
    /// Accuse another player of being this round's liar.
    ///
    /// The last outstanding guess scores the round and draws the next topic,
    /// or ends the game when none are left.
    pub async fn guess_liar(&self, player: &str, target: &str) -> GameResult<Game> {
        if player == target {
            return Err(GameError::precondition("you cannot accuse yourself"));
        }
        let room = self.room_id_for(player).await?;
        let now = Utc::now();
        let mut followup = Followup::None;

        self.update_game(&room, |game| {
            if !game.has_player(player) {
                return Err(GameError::NotFound("player".to_string()));
            }
            if game.scene != GameScene::LiarGuess {
                return Err(GameError::precondition("it is not time to guess the liar"));
            }
            if !game.has_player(target) {
                return Err(GameError::precondition("no such player to accuse"));
            }
            let round = game
                .current_round_mut()
                .ok_or_else(|| GameError::precondition("no round in progress"))?;
            if round.scored_at.is_some() {
                return Err(GameError::precondition("guesses for this round are closed"));
            }
            if round.has_guessed(player) {
                return Err(GameError::precondition("you have already guessed"));
            }
            round.liar_guesses.push(LiarGuess {
                player: player.to_string(),
                target: target.to_string(),
            });
            followup = game.reevaluate(now);
            Ok(())
        })
        .await?;

        self.apply_followup(&room, followup).await;
        self.load_game(&room).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::research::CannedResearcher;
    use std::time::Duration;

    fn slow_harness() -> Harness {
        harness_with(
            GameConfig::default(),
            CannedResearcher::new().with_delay(Duration::from_millis(200)),
        )
    }

    fn owner_of(game: &Game, topic: &str) -> String {
        game.topics
            .iter()
            .find(|(_, t)| t.as_str() == topic)
            .map(|(p, _)| p.clone())
            .unwrap()
    }

    /// Two players in LiarGuess after the guesser solved round one
    async fn in_liar_guess(h: &Harness, entries: &[(&str, &str)]) -> (RoomId, String, String) {
        let room = room_with_topics(&h.state, entries).await;
        let game = h.state.start_round("p1").await.unwrap();
        let round = game.current_round().unwrap();
        let liar = round.liars[0].clone();
        let guesser = game
            .players
            .iter()
            .find(|p| !round.liars.contains(&p.id))
            .map(|p| p.id.clone())
            .unwrap();
        h.state.submit_answer(&guesser, &round.topic).await.unwrap();
        (room, liar, guesser)
    }

    #[tokio::test]
    async fn test_self_accusation_is_rejected() {
        let h = harness();
        let (_, liar, _) = in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat")]).await;
        let err = h.state.guess_liar(&liar, &liar).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_correct_accusation_scores_and_next_round_starts() {
        let h = harness();
        let (room, liar, guesser) = in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat")]).await;

        h.state.guess_liar(&guesser, &liar).await.unwrap();
        let game = h.state.guess_liar(&liar, &guesser).await.unwrap();

        // 20 for solving, 30 for finding the liar
        assert_eq!(game.player(&guesser).unwrap().points, 50);
        assert_eq!(game.player(&liar).unwrap().points, 0);
        assert_eq!(game.rounds.len(), 2);
        assert_eq!(game.scene, GameScene::QuestionAnswering);
        assert!(game.rounds[0].scored_at.is_some());
        assert_ne!(game.rounds[0].topic, game.rounds[1].topic);
        assert_eq!(h.state.load_game(&room).await.unwrap().version, game.version);
    }

    #[tokio::test]
    async fn test_wrong_accusation_scores_nothing() {
        let h = harness();
        let (_, liar, guesser) =
            in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat"), ("p3", "cow")]).await;
        let innocent = ["p1", "p2", "p3"]
            .into_iter()
            .find(|p| *p != liar && *p != guesser)
            .unwrap();

        let game = h.state.guess_liar(&guesser, innocent).await.unwrap();

        assert_eq!(game.player(&guesser).unwrap().points, 20);
        assert_eq!(game.scene, GameScene::LiarGuess);
    }

    #[tokio::test]
    async fn test_second_guess_is_rejected() {
        let h = harness();
        let (_, liar, guesser) =
            in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat"), ("p3", "cow")]).await;

        h.state.guess_liar(&guesser, &liar).await.unwrap();
        let err = h.state.guess_liar(&guesser, &liar).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_failed_draw_keeps_committed_guess() {
        let h = harness();
        let (room, liar, guesser) = in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat")]).await;
        h.state.guess_liar(&guesser, &liar).await.unwrap();
        h.researcher.set_failing(true);

        let game = h.state.guess_liar(&liar, &guesser).await.unwrap();

        assert_eq!(game.rounds.len(), 1);
        assert!(game.rounds[0].scored_at.is_some());
        assert_eq!(game.scene, GameScene::LiarGuess);
        assert_eq!(game.player(&guesser).unwrap().points, 50);

        // Guessing again is refused rather than reported as a lookup failure
        let err = h.state.guess_liar(&liar, &guesser).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        h.researcher.set_failing(false);
        let game = h.state.start_round(&liar).await.unwrap();
        assert_eq!(game.rounds.len(), 2);
        assert_eq!(game.scene, GameScene::QuestionAnswering);
        assert_eq!(h.state.load_game(&room).await.unwrap().rounds.len(), 2);
    }

    #[tokio::test]
    async fn test_leaving_during_last_draw_ends_game() {
        let h = slow_harness();
        let (room, liar, guesser) = in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat")]).await;
        h.state.guess_liar(&guesser, &liar).await.unwrap();

        let state = h.state.clone();
        let (l, g) = (liar.clone(), guesser.clone());
        let last_guess = tokio::spawn(async move { state.guess_liar(&l, &g).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The only undrawn topic leaves with its owner mid-draw
        h.state.ban_player(&guesser, &guesser).await.unwrap();
        let game = last_guess.await.unwrap().unwrap();

        assert_eq!(game.scene, GameScene::GameEnd);
        assert_eq!(game.rounds.len(), 1);
        assert!(game.players.iter().all(|p| p.scene == GameScene::GameEnd));
        let stored = h.state.load_game(&room).await.unwrap();
        assert_eq!(stored.scene, GameScene::GameEnd);

        let err = h.state.start_round(&liar).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_withdrawn_topic_is_replaced_by_another() {
        let h = slow_harness();
        let (room, liar, guesser) =
            in_liar_guess(&h, &[("p1", "dog"), ("p2", "cat"), ("p3", "cow")]).await;
        let other = ["p1", "p2", "p3"]
            .into_iter()
            .find(|p| *p != liar && *p != guesser)
            .unwrap();
        h.state.guess_liar(&guesser, &liar).await.unwrap();
        h.state.guess_liar(other, &liar).await.unwrap();

        let before = h.state.load_game(&room).await.unwrap();
        let unused = before.unused_topics();
        let leaving = owner_of(&before, &unused[0]);
        let kept = unused[1].clone();
        let kept_owner = owner_of(&before, &kept);

        let state = h.state.clone();
        let (l, g) = (liar.clone(), guesser.clone());
        let last_guess = tokio::spawn(async move { state.guess_liar(&l, &g).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        h.state.ban_player(&leaving, &leaving).await.unwrap();
        last_guess.await.unwrap().unwrap();

        let game = h.state.load_game(&room).await.unwrap();
        assert_eq!(game.scene, GameScene::QuestionAnswering);
        assert_eq!(game.rounds.len(), 2);
        assert_eq!(game.rounds[1].topic, kept);
        assert_eq!(game.rounds[1].liars, vec![kept_owner]);
    }
}
