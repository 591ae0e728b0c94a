//! Background loop that asks a question on behalf of a stalled room.

use crate::error::GameResult;
use crate::oracle::{QuestionGenerationRequest, QuestionJudgeRequest};
use crate::state::AppState;
use crate::store::keys;
use crate::types::*;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The room expired or was deleted mid-scan
    Gone,
    NotQuestionAnswering,
    /// The latest entry already solved the round
    RoundClosed,
    RecentActivity,
    /// Humans have not used enough of their questions yet
    HumanQuota,
    BotQuota,
    NothingGenerated,
    /// The generated question contains the topic itself
    RevealsTopic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Posted,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub posted: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotPolicy {
    pub allow_proper_nouns: bool,
}

/// Whether the bot may ask in `round` at all, and how pointed it may be
pub fn bot_question_policy(game: &Game, round: &Round) -> Result<BotPolicy, SkipReason> {
    let limit = game.config.question_limit as usize;
    let budget = (limit * game.players.len()) as f64;
    let (human, bot) = round.question_tally();

    if (human as f64) < game.config.ai_question_threshold * budget {
        return Err(SkipReason::HumanQuota);
    }
    if bot >= limit {
        return Err(SkipReason::BotQuota);
    }

    // Proper nouns only late in the round, so the bot does not give it away early
    Ok(BotPolicy {
        allow_proper_nouns: bot > limit / 2 && (human as f64) > budget * 0.75,
    })
}

/// Evaluate one room and post a bot question if it has gone quiet
pub async fn scan_room(state: &AppState, key: &str, now: DateTime<Utc>) -> GameResult<ScanOutcome> {
    let Some(game) = state.store.peek::<Game>(key).await? else {
        return Ok(ScanOutcome::Skipped(SkipReason::Gone));
    };
    if game.scene != GameScene::QuestionAnswering {
        return Ok(ScanOutcome::Skipped(SkipReason::NotQuestionAnswering));
    }
    let Some(round) = game.current_round() else {
        return Ok(ScanOutcome::Skipped(SkipReason::RoundClosed));
    };
    if round
        .histories
        .last()
        .is_some_and(|h| h.result.is_correct_answer())
    {
        return Ok(ScanOutcome::Skipped(SkipReason::RoundClosed));
    }

    let threshold = chrono::Duration::minutes(i64::from(game.config.inactivity_threshold_minutes));
    if now - round.last_posted_at() < threshold {
        return Ok(ScanOutcome::Skipped(SkipReason::RecentActivity));
    }

    let policy = match bot_question_policy(&game, round) {
        Ok(policy) => policy,
        Err(reason) => return Ok(ScanOutcome::Skipped(reason)),
    };

    let want_yes = rand::rng().random_bool(0.5);
    let existing = round.question_texts();
    let generated = state
        .oracle
        .generate_question(QuestionGenerationRequest {
            theme: &game.theme,
            topic: &round.topic,
            background: &round.topic_info,
            existing_questions: &existing,
            want_yes,
            allow_proper_nouns: policy.allow_proper_nouns,
        })
        .await?;

    let Some(question) = generated.filter(|q| !q.trim().is_empty()) else {
        tracing::warn!("Room {}: no bot question generated", game.id);
        return Ok(ScanOutcome::Skipped(SkipReason::NothingGenerated));
    };
    if question
        .to_lowercase()
        .contains(&round.topic.to_lowercase())
    {
        tracing::info!("Room {}: generated question names the topic, dropped", game.id);
        return Ok(ScanOutcome::Skipped(SkipReason::RevealsTopic));
    }

    let verdict = state
        .oracle
        .judge_question(QuestionJudgeRequest {
            theme: &game.theme,
            topic: &round.topic,
            background: &round.topic_info,
            existing_questions: &existing,
            question: &question,
        })
        .await?;

    state
        .append_question(&game.id, game.rounds.len() - 1, BOT_PLAYER_ID, &question, verdict)
        .await?;
    tracing::info!("Room {}: posted bot question", game.id);
    Ok(ScanOutcome::Posted)
}

/// One pass over every live room. A failing room is logged and counted; it
/// never stops the others.
pub async fn scan_rooms(state: &AppState, now: DateTime<Utc>) -> ScanReport {
    let room_keys = match state.store.keys(keys::ROOM_PREFIX).await {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!("Listing rooms failed: {}", e);
            return ScanReport::default();
        }
    };

    let outcomes = join_all(room_keys.iter().map(|key| async move {
        (key, scan_room(state, key, now).await)
    }))
    .await;

    let mut report = ScanReport::default();
    for (key, outcome) in outcomes {
        match outcome {
            Ok(ScanOutcome::Posted) => report.posted += 1,
            Ok(ScanOutcome::Skipped(reason)) => {
                tracing::trace!("{} skipped: {:?}", key, reason);
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!("Scanning {} failed: {}", key, e);
                report.failed += 1;
            }
        }
    }
    report
}

/// Spawn the periodic scan; runs until the handle is aborted or the runtime stops
pub fn spawn_inactivity_scanner(state: Arc<AppState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let report = scan_rooms(&state, Utc::now()).await;
            tracing::debug!(
                "Inactivity scan: {} posted, {} skipped, {} failed",
                report.posted,
                report.skipped,
                report.failed
            );
        }
    })
}
