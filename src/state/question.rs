use super::{ensure_member, AppState};
use crate::error::{GameError, GameResult};
use crate::oracle::{QuestionJudgeRequest, Verdict};
use crate::types::*;
use chrono::Utc;

/// Index of the round `asker` may still put a question to
fn ensure_question_allowed(game: &Game, asker: &str) -> GameResult<usize> {
    ensure_member(game, asker)?;
    if game.scene != GameScene::QuestionAnswering {
        return Err(GameError::precondition("questions are closed"));
    }
    let index = game
        .rounds
        .len()
        .checked_sub(1)
        .ok_or_else(|| GameError::precondition("no round in progress"))?;
    let round = &game.rounds[index];
    let limit = game.config.question_limit as usize;

    let asked = if is_bot(asker) {
        round.question_tally().1
    } else {
        round.question_count(asker)
    };
    if asked >= limit {
        return Err(GameError::precondition(format!(
            "question limit of {} reached",
            limit
        )));
    }
    Ok(index)
}

impl AppState {
    /// Put a yes/no question about the hidden topic to the oracle
    pub async fn ask_question(&self, player: &str, question: &str) -> GameResult<HistoryInfo> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GameError::precondition("question must not be empty"));
        }

        let game = self.game_for_player(player).await?;
        let index = ensure_question_allowed(&game, player)?;
        let round = &game.rounds[index];

        let existing = round.question_texts();
        let verdict = self
            .oracle
            .judge_question(QuestionJudgeRequest {
                theme: &game.theme,
                topic: &round.topic,
                background: &round.topic_info,
                existing_questions: &existing,
                question,
            })
            .await?;

        self.append_question(&game.id, index, player, question, verdict)
            .await
    }

    /// Record a judged question, re-checking the limits against the stored room
    pub(crate) async fn append_question(
        &self,
        room: &str,
        round_index: usize,
        asker: &str,
        question: &str,
        verdict: Verdict<QuestionOutcome>,
    ) -> GameResult<HistoryInfo> {
        let entry = HistoryInfo {
            result: HistoryResult::Question {
                player: asker.to_string(),
                question: question.to_string(),
                outcome: verdict.outcome,
            },
            reason: verdict.reason,
            posted_at: Utc::now(),
        };
        let recorded = entry.clone();

        self.update_game(room, |game| {
            if ensure_question_allowed(game, asker)? != round_index {
                return Err(GameError::precondition("the round has moved on"));
            }
            game.rounds[round_index].histories.push(entry);
            Ok(())
        })
        .await?;

        tracing::debug!("Room {}: {} asked '{}'", room, asker, question);
        Ok(recorded)
    }
}
