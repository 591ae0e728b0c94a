use super::{AppState, Followup};
use crate::error::{GameError, GameResult};
use crate::oracle::{AnswerJudgeRequest, Verdict};
use crate::types::*;
use chrono::Utc;

/// Index of the round `player` may still answer in
fn ensure_answer_allowed(game: &Game, player: &str) -> GameResult<usize> {
    if !game.has_player(player) {
        return Err(GameError::NotFound("player".to_string()));
    }
    // The first correct answer closes the round for everyone
    if game.scene != GameScene::QuestionAnswering {
        return Err(GameError::precondition("answers are closed"));
    }
    let index = game
        .rounds
        .len()
        .checked_sub(1)
        .ok_or_else(|| GameError::precondition("no round in progress"))?;
    let limit = game.config.answer_limit as usize;
    if game.rounds[index].answer_count(player) >= limit {
        return Err(GameError::precondition(format!(
            "answer limit of {} reached",
            limit
        )));
    }
    Ok(index)
}

impl AppState {
    /// Guess the hidden topic.
    ///
    /// An exact match is correct without consulting the oracle. A correct
    /// answer scores and closes the round; when every player has used up their
    /// answers without one, the round is abandoned.
    pub async fn submit_answer(&self, player: &str, answer: &str) -> GameResult<HistoryInfo> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(GameError::precondition("answer must not be empty"));
        }

        let game = self.game_for_player(player).await?;
        let index = ensure_answer_allowed(&game, player)?;
        let round = &game.rounds[index];

        let verdict = if answer == round.topic {
            Verdict::new(AnswerOutcome::Correct, "exact match")
        } else {
            let keywords = self
                .oracle
                .relation_keywords(&game.theme, &round.topic, answer)
                .await?;
            self.oracle
                .judge_answer(AnswerJudgeRequest {
                    theme: &game.theme,
                    topic: &round.topic,
                    background: &round.topic_info,
                    answer,
                    keywords: &keywords,
                })
                .await?
        };

        let now = Utc::now();
        let entry = HistoryInfo {
            result: HistoryResult::Answer {
                player: player.to_string(),
                answer: answer.to_string(),
                outcome: verdict.outcome,
            },
            reason: verdict.reason,
            posted_at: now,
        };
        let recorded = entry.clone();
        let correct = entry.result.is_correct_answer();
        let mut followup = Followup::None;

        self.update_game(&game.id, |g| {
            if ensure_answer_allowed(g, player)? != index {
                return Err(GameError::precondition("the round has moved on"));
            }
            g.rounds[index].histories.push(entry);
            if correct {
                g.award(player, g.config.correct_point);
                g.set_scene_all(GameScene::LiarGuess);
            }
            followup = g.reevaluate(now);
            Ok(())
        })
        .await?;

        if correct {
            tracing::info!("Room {}: {} solved round {}", game.id, player, index + 1);
        }
        self.apply_followup(&game.id, followup).await;
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    /// Started two-player room; returns (room, topic, liar, guesser)
    async fn started(h: &Harness) -> (RoomId, String, String, String) {
        let room = room_with_topics(&h.state, &[("p1", "dog"), ("p2", "cat")]).await;
        let game = h.state.start_round("p1").await.unwrap();
        let round = game.current_round().unwrap();
        let liar = round.liars[0].clone();
        let guesser = if liar == "p1" { "p2" } else { "p1" };
        (room, round.topic.clone(), liar, guesser.to_string())
    }

    #[tokio::test]
    async fn test_exact_answer_scores_without_oracle() {
        let h = harness();
        let (room, topic, _, guesser) = started(&h).await;

        let entry = h.state.submit_answer(&guesser, &topic).await.unwrap();

        assert!(entry.result.is_correct_answer());
        assert_eq!(h.oracle.answer_calls(), 0);
        let game = h.state.load_game(&room).await.unwrap();
        assert_eq!(game.scene, GameScene::LiarGuess);
        assert_eq!(game.player(&guesser).unwrap().points, 20);
    }

    #[tokio::test]
    async fn test_repeated_exact_answer_scores_once() {
        let h = harness();
        let (room, topic, _, guesser) = started(&h).await;

        h.state.submit_answer(&guesser, &topic).await.unwrap();
        let err = h.state.submit_answer(&guesser, &topic).await.unwrap_err();

        assert!(matches!(err, GameError::PreconditionFailed(_)));
        let game = h.state.load_game(&room).await.unwrap();
        assert_eq!(game.player(&guesser).unwrap().points, 20);
        assert_eq!(game.current_round().unwrap().answer_count(&guesser), 1);
    }

    #[tokio::test]
    async fn test_oracle_correct_verdict_closes_round() {
        let h = harness();
        let (room, _, _, guesser) = started(&h).await;
        h.oracle
            .push_answer_verdict(AnswerOutcome::Correct, "same animal")
            .await;

        h.state.submit_answer(&guesser, "a pet").await.unwrap();

        let game = h.state.load_game(&room).await.unwrap();
        assert_eq!(game.scene, GameScene::LiarGuess);
        assert_eq!(game.current_round().unwrap().correct_players(), vec![guesser]);
    }

    #[tokio::test]
    async fn test_exhausted_answers_penalize_liar() {
        let h = harness();
        let (room, _, liar, guesser) = started(&h).await;

        for _ in 0..3 {
            h.state.submit_answer(&guesser, "wrong").await.unwrap();
        }
        for _ in 0..2 {
            h.state.submit_answer(&liar, "wrong").await.unwrap();
        }
        assert_eq!(
            h.state.load_game(&room).await.unwrap().scene,
            GameScene::QuestionAnswering
        );
        h.state.submit_answer(&liar, "wrong").await.unwrap();

        let game = h.state.load_game(&room).await.unwrap();
        assert_eq!(game.scene, GameScene::LiarGuess);
        assert_eq!(game.player(&liar).unwrap().points, -10);
        assert_eq!(game.player(&guesser).unwrap().points, 0);
        assert!(!game.current_round().unwrap().is_solved());
    }

    #[tokio::test]
    async fn test_answer_limit_is_enforced() {
        let h = harness();
        let (room, _, _, guesser) = started(&h).await;
        for _ in 0..3 {
            h.state.submit_answer(&guesser, "wrong").await.unwrap();
        }

        let err = h.state.submit_answer(&guesser, "wrong").await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
        let game = h.state.load_game(&room).await.unwrap();
        assert_eq!(game.current_round().unwrap().answer_count(&guesser), 3);
    }

    #[tokio::test]
    async fn test_judge_failure_writes_nothing() {
        let h = harness();
        let (room, _, _, guesser) = started(&h).await;
        h.oracle.set_failing(true);

        let err = h.state.submit_answer(&guesser, "wolf").await.unwrap_err();

        assert_eq!(err.code(), "COLLABORATOR_FAILURE");
        let game = h.state.load_game(&room).await.unwrap();
        assert!(game.current_round().unwrap().histories.is_empty());
    }
}
