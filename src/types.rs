use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type PlayerId = String;

/// Reserved asker id for questions posted by the inactivity scanner.
/// It is the nil ULID, so it can never collide with a minted player id.
pub const BOT_PLAYER_ID: &str = "00000000000000000000000000";

pub fn is_bot(player: &str) -> bool {
    player == BOT_PLAYER_ID
}

/// Phase of the room, and of each player's personal readiness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameScene {
    #[default]
    RegisterTopic,
    WaitRoundStart,
    TopicSelecting,
    QuestionAnswering,
    LiarGuess,
    GameEnd,
}

/// When liars of an unsolved round are paid `no_correct_point`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoCorrectTiming {
    /// As soon as every player has used up their answers
    #[default]
    OnExhaustion,
    /// Once, for every unsolved round, when the game ends
    AtGameEnd,
}

impl FromStr for NoCorrectTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_exhaustion" => Ok(Self::OnExhaustion),
            "at_game_end" => Ok(Self::AtGameEnd),
            other => Err(format!("unknown no-correct timing '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    /// Questions per player per round
    pub question_limit: u32,
    /// Answers per player per round
    pub answer_limit: u32,
    pub correct_point: i32,
    pub liar_point: i32,
    /// Paid to each liar when nobody solves the round (zero or negative)
    pub no_correct_point: i32,
    pub inactivity_threshold_minutes: u32,
    /// Fraction of the human question budget that must be spent before the bot may ask
    pub ai_question_threshold: f64,
    #[serde(default)]
    pub no_correct_timing: NoCorrectTiming,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            question_limit: 5,
            answer_limit: 3,
            correct_point: 20,
            liar_point: 30,
            no_correct_point: -10,
            inactivity_threshold_minutes: 2,
            ai_question_threshold: 0.5,
            no_correct_timing: NoCorrectTiming::OnExhaustion,
        }
    }
}

impl GameConfig {
    /// Reject configurations the state machine cannot make progress with
    pub fn validate(&self) -> Result<(), String> {
        if self.question_limit == 0 {
            return Err("question limit must be at least 1".to_string());
        }
        if self.answer_limit == 0 {
            return Err("answer limit must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.ai_question_threshold) {
            return Err("AI question threshold must be between 0 and 1".to_string());
        }
        if self.no_correct_point > 0 {
            return Err("no-correct point must not be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub scene: GameScene,
    pub points: i32,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            scene: GameScene::RegisterTopic,
            points: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOutcome {
    Yes,
    No,
    Unanswerable,
}

impl FromStr for QuestionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_matches('`').to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "unanswerable" => Ok(Self::Unanswerable),
            other => Err(format!("unknown question outcome '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    MoreSpecific,
    Incorrect,
}

impl FromStr for AnswerOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s
            .trim()
            .trim_matches('`')
            .to_ascii_lowercase()
            .replace([' ', '-'], "_")
            .as_str()
        {
            "correct" => Ok(Self::Correct),
            "more_specific" => Ok(Self::MoreSpecific),
            "incorrect" => Ok(Self::Incorrect),
            other => Err(format!("unknown answer outcome '{}'", other)),
        }
    }
}

/// What a history entry records: a yes/no question or a guess at the topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryResult {
    Question {
        player: PlayerId,
        question: String,
        outcome: QuestionOutcome,
    },
    Answer {
        player: PlayerId,
        answer: String,
        outcome: AnswerOutcome,
    },
}

impl HistoryResult {
    pub fn player(&self) -> &str {
        match self {
            HistoryResult::Question { player, .. } | HistoryResult::Answer { player, .. } => player,
        }
    }

    pub fn is_correct_answer(&self) -> bool {
        matches!(
            self,
            HistoryResult::Answer {
                outcome: AnswerOutcome::Correct,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryInfo {
    pub result: HistoryResult,
    /// The oracle's justification
    pub reason: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiarGuess {
    pub player: PlayerId,
    pub target: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub topic: String,
    /// Background text gathered once when the round starts
    pub topic_info: String,
    /// Snapshot of the players whose topic is this round's topic
    pub liars: Vec<PlayerId>,
    pub histories: Vec<HistoryInfo>,
    pub liar_guesses: Vec<LiarGuess>,
    pub started_at: DateTime<Utc>,
    /// Set once liar guesses are resolved (for idempotency)
    #[serde(default)]
    pub scored_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn new(topic: String, topic_info: String, liars: Vec<PlayerId>, now: DateTime<Utc>) -> Self {
        Self {
            topic,
            topic_info,
            liars,
            histories: Vec::new(),
            liar_guesses: Vec::new(),
            started_at: now,
            scored_at: None,
        }
    }

    pub fn question_count(&self, player: &str) -> usize {
        self.histories
            .iter()
            .filter(|h| matches!(&h.result, HistoryResult::Question { player: p, .. } if p == player))
            .count()
    }

    pub fn answer_count(&self, player: &str) -> usize {
        self.histories
            .iter()
            .filter(|h| matches!(&h.result, HistoryResult::Answer { player: p, .. } if p == player))
            .count()
    }

    /// Question texts asked so far, by anyone
    pub fn question_texts(&self) -> Vec<String> {
        self.histories
            .iter()
            .filter_map(|h| match &h.result {
                HistoryResult::Question { question, .. } => Some(question.clone()),
                HistoryResult::Answer { .. } => None,
            })
            .collect()
    }

    /// Returns (human questions, bot questions)
    pub fn question_tally(&self) -> (usize, usize) {
        self.histories
            .iter()
            .filter_map(|h| match &h.result {
                HistoryResult::Question { player, .. } => Some(is_bot(player)),
                HistoryResult::Answer { .. } => None,
            })
            .fold((0, 0), |(human, bot), asked_by_bot| {
                if asked_by_bot {
                    (human, bot + 1)
                } else {
                    (human + 1, bot)
                }
            })
    }

    /// Players with a Correct answer in this round, in posting order
    pub fn correct_players(&self) -> Vec<PlayerId> {
        let mut seen = BTreeSet::new();
        self.histories
            .iter()
            .filter(|h| h.result.is_correct_answer())
            .map(|h| h.result.player().to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    pub fn is_solved(&self) -> bool {
        self.histories.iter().any(|h| h.result.is_correct_answer())
    }

    pub fn has_guessed(&self, player: &str) -> bool {
        self.liar_guesses.iter().any(|g| g.player == player)
    }

    /// Guessers whose target was one of the liars
    pub fn liar_correct_players(&self) -> Vec<PlayerId> {
        self.liar_guesses
            .iter()
            .filter(|g| self.liars.contains(&g.target))
            .map(|g| g.player.clone())
            .collect()
    }

    pub fn last_posted_at(&self) -> DateTime<Utc> {
        self.histories
            .last()
            .map(|h| h.posted_at)
            .unwrap_or(self.started_at)
    }
}

/// A room: the root aggregate stored under `game/room/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: RoomId,
    /// Human-shareable join code
    pub passphrase: String,
    pub theme: String,
    /// Bumped on every stored mutation
    #[serde(default)]
    pub version: u64,
    /// Join order; index 0 is the host
    pub players: Vec<Player>,
    pub topics: BTreeMap<PlayerId, String>,
    pub rounds: Vec<Round>,
    pub scene: GameScene,
    pub config: GameConfig,
}

impl Game {
    pub fn new(id: RoomId, passphrase: String, theme: String, config: GameConfig) -> Self {
        Self {
            id,
            passphrase,
            theme,
            version: 1,
            players: Vec::new(),
            topics: BTreeMap::new(),
            rounds: Vec::new(),
            scene: GameScene::RegisterTopic,
            config,
        }
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn is_host(&self, player: &str) -> bool {
        self.host().is_some_and(|p| p.id == player)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.last_mut()
    }

    /// True while a round exists whose liar guesses have not been resolved
    pub fn has_open_round(&self) -> bool {
        self.rounds.last().is_some_and(|r| r.scored_at.is_none())
    }

    /// Players whose submitted topic is `topic`; collisions make joint liars
    pub fn liars_for(&self, topic: &str) -> Vec<PlayerId> {
        self.topics
            .iter()
            .filter(|(_, t)| t.as_str() == topic)
            .map(|(player, _)| player.clone())
            .collect()
    }

    /// Distinct topic values not yet drawn into a round, sorted
    pub fn unused_topics(&self) -> Vec<String> {
        let drawn: BTreeSet<&str> = self.rounds.iter().map(|r| r.topic.as_str()).collect();
        self.topics
            .values()
            .map(String::as_str)
            .filter(|t| !drawn.contains(t))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn distinct_topic_count(&self) -> usize {
        self.topics.values().collect::<BTreeSet<_>>().len()
    }

    pub fn all_players_in(&self, scene: GameScene) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.scene == scene)
    }

    /// Move the room and every player to `scene`
    pub fn set_scene_all(&mut self, scene: GameScene) {
        self.scene = scene;
        for player in &mut self.players {
            player.scene = scene;
        }
    }

    pub fn award(&mut self, player: &str, points: i32) {
        if let Some(p) = self.player_mut(player) {
            p.points += points;
        }
    }

    /// Check the structural invariants of the aggregate
    pub fn validate(&self) -> Result<(), String> {
        if !self.rounds.is_empty() && self.players.is_empty() {
            return Err("a started game must have players".to_string());
        }
        // Drawn topics outlive a banned author; undrawn ones must not
        for orphan in self.topics.keys().filter(|id| !self.has_player(id)) {
            if !self.rounds.iter().any(|r| r.liars.contains(orphan)) {
                return Err(format!("topic registered by unknown player {}", orphan));
            }
        }
        if self.rounds.len() > self.distinct_topic_count() {
            return Err(format!(
                "{} rounds exceed {} distinct topics",
                self.rounds.len(),
                self.distinct_topic_count()
            ));
        }
        let mut drawn = BTreeSet::new();
        for round in &self.rounds {
            if !drawn.insert(round.topic.as_str()) {
                return Err(format!("topic '{}' drawn twice", round.topic));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(player: &str, outcome: QuestionOutcome) -> HistoryInfo {
        HistoryInfo {
            result: HistoryResult::Question {
                player: player.to_string(),
                question: "is it alive?".to_string(),
                outcome,
            },
            reason: String::new(),
            posted_at: Utc::now(),
        }
    }

    fn answer(player: &str, outcome: AnswerOutcome) -> HistoryInfo {
        HistoryInfo {
            result: HistoryResult::Answer {
                player: player.to_string(),
                answer: "dog".to_string(),
                outcome,
            },
            reason: String::new(),
            posted_at: Utc::now(),
        }
    }

    fn game_with_topics(topics: &[(&str, &str)]) -> Game {
        let mut game = Game::new(
            "room".to_string(),
            "pass".to_string(),
            "animals".to_string(),
            GameConfig::default(),
        );
        for (id, topic) in topics {
            game.players.push(Player::new(id.to_string(), id.to_string()));
            game.topics.insert(id.to_string(), topic.to_string());
        }
        game
    }

    #[test]
    fn test_liars_include_ties() {
        let game = game_with_topics(&[("p1", "dog"), ("p2", "cat"), ("p3", "dog")]);

        assert_eq!(game.liars_for("dog"), vec!["p1".to_string(), "p3".to_string()]);
        assert_eq!(game.liars_for("cat"), vec!["p2".to_string()]);
        assert!(game.liars_for("cow").is_empty());
    }

    #[test]
    fn test_unused_topics_are_distinct_and_skip_drawn() {
        let mut game = game_with_topics(&[("p1", "dog"), ("p2", "cat"), ("p3", "dog")]);
        assert_eq!(game.unused_topics(), vec!["cat".to_string(), "dog".to_string()]);
        assert_eq!(game.distinct_topic_count(), 2);

        game.rounds.push(Round::new(
            "dog".to_string(),
            String::new(),
            game.liars_for("dog"),
            Utc::now(),
        ));
        assert_eq!(game.unused_topics(), vec!["cat".to_string()]);
    }

    #[test]
    fn test_round_counts_and_correct_players() {
        let mut round = Round::new("dog".to_string(), String::new(), vec![], Utc::now());
        round.histories.push(question("p1", QuestionOutcome::Yes));
        round.histories.push(question(BOT_PLAYER_ID, QuestionOutcome::No));
        round.histories.push(answer("p2", AnswerOutcome::Incorrect));
        round.histories.push(answer("p2", AnswerOutcome::Correct));

        assert_eq!(round.question_count("p1"), 1);
        assert_eq!(round.answer_count("p2"), 2);
        assert_eq!(round.question_tally(), (1, 1));
        assert_eq!(round.correct_players(), vec!["p2".to_string()]);
        assert!(round.is_solved());
    }

    #[test]
    fn test_outcome_parsing_is_lenient() {
        assert_eq!("Yes".parse::<QuestionOutcome>(), Ok(QuestionOutcome::Yes));
        assert_eq!("`no`".parse::<QuestionOutcome>(), Ok(QuestionOutcome::No));
        assert_eq!(
            "more specific".parse::<AnswerOutcome>(),
            Ok(AnswerOutcome::MoreSpecific)
        );
        assert!("maybe".parse::<QuestionOutcome>().is_err());
    }

    #[test]
    fn test_history_result_serializes_tagged() {
        let entry = question("p1", QuestionOutcome::Unanswerable);
        let json = serde_json::to_value(&entry.result).unwrap();
        assert_eq!(json["kind"], "question");
        assert_eq!(json["outcome"], "unanswerable");
    }

    #[test]
    fn test_validate_detects_orphan_topic() {
        let mut game = game_with_topics(&[("p1", "dog"), ("p2", "cat")]);
        assert!(game.validate().is_ok());

        game.players.retain(|p| p.id != "p2");
        assert!(game.validate().unwrap_err().contains("unknown player"));

        // Once drawn, the banned author's topic stays
        game.rounds.push(Round::new(
            "cat".to_string(),
            String::new(),
            vec!["p2".to_string()],
            Utc::now(),
        ));
        assert!(game.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(GameConfig::default().validate().is_ok());

        let config = GameConfig {
            answer_limit: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            ai_question_threshold: 1.5,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
