use crate::types::*;
use serde::Serialize;

/// A room snapshot tailored to what the caller may see in the current scene
#[derive(Debug, Clone, Serialize)]
pub struct SceneView {
    pub id: RoomId,
    pub passphrase: String,
    pub theme: String,
    pub scene: GameScene,
    /// Rounds drawn so far
    pub round: usize,
    pub players: Vec<PlayerInfo>,
    /// The caller's own topic, once registered
    pub my_topic: Option<String>,
    pub info: SceneInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub scene: GameScene,
    pub points: i32,
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum SceneInfo {
    Empty,
    WaitRoundStart {
        /// Players ready for the round to start
        waiting: usize,
    },
    TopicSelecting,
    QuestionAnswering {
        /// Public log; the oracle's reasons stay hidden until the round closes
        histories: Vec<HistoryResult>,
    },
    LiarGuess {
        topic: String,
        topic_correct_players: Vec<PlayerId>,
        guessed_players: Vec<PlayerId>,
        histories: Vec<HistoryInfo>,
    },
    GameEnd {
        results: Vec<RoundResult>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoundResult {
    pub topic: String,
    pub topic_correct_players: Vec<PlayerId>,
    pub liar_players: Vec<PlayerId>,
    pub liar_correct_players: Vec<PlayerId>,
}

impl From<&Round> for RoundResult {
    fn from(round: &Round) -> Self {
        Self {
            topic: round.topic.clone(),
            topic_correct_players: round.correct_players(),
            liar_players: round.liars.clone(),
            liar_correct_players: round.liar_correct_players(),
        }
    }
}

impl SceneInfo {
    fn for_game(game: &Game) -> Self {
        let round = game.current_round();
        match (game.scene, round) {
            (GameScene::WaitRoundStart, _) => SceneInfo::WaitRoundStart {
                waiting: game
                    .players
                    .iter()
                    .filter(|p| p.scene == GameScene::WaitRoundStart)
                    .count(),
            },
            (GameScene::TopicSelecting, _) => SceneInfo::TopicSelecting,
            (GameScene::QuestionAnswering, Some(round)) => SceneInfo::QuestionAnswering {
                histories: round.histories.iter().map(|h| h.result.clone()).collect(),
            },
            (GameScene::LiarGuess, Some(round)) => SceneInfo::LiarGuess {
                topic: round.topic.clone(),
                topic_correct_players: round.correct_players(),
                guessed_players: round.liar_guesses.iter().map(|g| g.player.clone()).collect(),
                histories: round.histories.clone(),
            },
            (GameScene::GameEnd, _) => SceneInfo::GameEnd {
                results: game.rounds.iter().map(RoundResult::from).collect(),
            },
            _ => SceneInfo::Empty,
        }
    }
}

impl SceneView {
    pub fn for_player(game: &Game, player: &str) -> Self {
        Self {
            id: game.id.clone(),
            passphrase: game.passphrase.clone(),
            theme: game.theme.clone(),
            scene: game.scene,
            round: game.rounds.len(),
            players: game
                .players
                .iter()
                .map(|p| PlayerInfo {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    scene: p.scene,
                    points: p.points,
                    is_host: game.is_host(&p.id),
                })
                .collect(),
            my_topic: game.topics.get(player).cloned(),
            info: SceneInfo::for_game(game),
        }
    }
}
