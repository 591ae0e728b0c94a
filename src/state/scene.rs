//! Phase completion rules, applied inside a room update.

use crate::types::*;
use chrono::{DateTime, Utc};

/// Work left to do after a room update has been written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    /// Liar guesses were scored and topics remain; `completed_rounds` lets the
    /// drawer detect that somebody else already advanced the room
    DrawNextRound { completed_rounds: usize },
}

impl Game {
    /// Re-check the current phase's completion condition, e.g. after a player
    /// posted, guessed or was removed.
    pub fn reevaluate(&mut self, now: DateTime<Utc>) -> Followup {
        match self.scene {
            GameScene::RegisterTopic | GameScene::WaitRoundStart => {
                self.refresh_readiness();
                Followup::None
            }
            GameScene::QuestionAnswering => {
                if self.close_if_exhausted() {
                    self.resolve_liar_guesses(now)
                } else {
                    Followup::None
                }
            }
            GameScene::LiarGuess => self.resolve_liar_guesses(now),
            // Every topic left in the pool was withdrawn while drawing
            GameScene::TopicSelecting
                if !self.has_open_round() && self.unused_topics().is_empty() =>
            {
                self.finish_game();
                Followup::None
            }
            GameScene::TopicSelecting | GameScene::GameEnd => Followup::None,
        }
    }

    fn refresh_readiness(&mut self) {
        self.scene = if self.all_players_in(GameScene::WaitRoundStart) {
            GameScene::WaitRoundStart
        } else {
            GameScene::RegisterTopic
        };
    }

    /// Abandon the round once every player has used up their answers without
    /// a correct one. Returns whether the room moved to `LiarGuess`.
    pub(crate) fn close_if_exhausted(&mut self) -> bool {
        let limit = self.config.answer_limit as usize;
        let Some(round) = self.rounds.last() else {
            return false;
        };
        if round.is_solved() || self.players.is_empty() {
            return false;
        }
        if !self
            .players
            .iter()
            .all(|p| round.answer_count(&p.id) >= limit)
        {
            return false;
        }

        if self.config.no_correct_timing == NoCorrectTiming::OnExhaustion {
            let liars = round.liars.clone();
            for liar in &liars {
                self.award(liar, self.config.no_correct_point);
            }
        }
        tracing::info!("Room {}: every answer used, round abandoned", self.id);
        self.set_scene_all(GameScene::LiarGuess);
        true
    }

    /// Score the round once every player who can accuse someone has done so
    fn resolve_liar_guesses(&mut self, now: DateTime<Utc>) -> Followup {
        let Some(round) = self.rounds.last() else {
            return Followup::None;
        };

        if round.scored_at.is_none() {
            // A lone player has nobody to accuse
            let waiting = self.players.len() > 1
                && self.players.iter().any(|p| !round.has_guessed(&p.id));
            if waiting {
                return Followup::None;
            }

            let winners: Vec<PlayerId> = round
                .liar_correct_players()
                .into_iter()
                .filter(|p| self.has_player(p))
                .collect();
            for winner in &winners {
                self.award(winner, self.config.liar_point);
            }
            if let Some(round) = self.current_round_mut() {
                round.scored_at = Some(now);
            }
            tracing::info!(
                "Room {}: round {} scored, {} found a liar",
                self.id,
                self.rounds.len(),
                winners.len()
            );
        }

        if self.unused_topics().is_empty() {
            self.finish_game();
            Followup::None
        } else {
            Followup::DrawNextRound {
                completed_rounds: self.rounds.len(),
            }
        }
    }

    fn finish_game(&mut self) {
        if self.config.no_correct_timing == NoCorrectTiming::AtGameEnd {
            let penalized: Vec<PlayerId> = self
                .rounds
                .iter()
                .filter(|r| !r.is_solved())
                .flat_map(|r| r.liars.iter().cloned())
                .collect();
            for liar in &penalized {
                self.award(liar, self.config.no_correct_point);
            }
        }
        self.set_scene_all(GameScene::GameEnd);
        tracing::info!("Room {}: game over after {} rounds", self.id, self.rounds.len());
    }
}
