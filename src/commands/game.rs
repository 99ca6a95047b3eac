// 游戏命令模块
// 提供与传输层无关的操作接口，负责模型与传输对象的转换

use serde::{Deserialize, Serialize};

use crate::models::Attempt;
use crate::services::database::NewTerm;
use crate::services::game::{GameError, GameService};

/// 应用状态
pub struct AppState {
    pub game: GameService,
}

/// 尝试记录传输对象（时间戳为 RFC 3339 字符串）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDto {
    pub id: String,
    pub term_id: i64,
    pub puzzle_day: String,
    pub attempted_by: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub guesses: Vec<String>,
    pub attempts_used: u32,
    pub hint_used: bool,
    pub duration_of_attempt: Option<i64>,
    pub attempt_status: Option<String>,
    pub attempt_score: Option<i64>,
    pub created_at: String,
}

impl AttemptDto {
    /// 谜底词条文本不随传输对象下发，只返回状态与计分
    fn from_model(a: Attempt) -> Self {
        Self {
            id: a.id,
            term_id: a.term_id,
            puzzle_day: a.puzzle_day,
            attempted_by: a.attempted_by,
            started_at: a.started_at.to_rfc3339(),
            completed_at: a.completed_at.map(|t| t.to_rfc3339()),
            guesses: a.guesses,
            attempts_used: a.attempts_used,
            hint_used: a.hint_used,
            duration_of_attempt: a.duration_of_attempt,
            attempt_status: a.status.as_db(),
            attempt_score: a.attempt_score,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// 提示传输对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintDto {
    pub attempt: AttemptDto,
    pub hints: String,
}

/// 命令错误传输对象，code 区分错误分类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl CommandError {
    /// 参考 HTTP 映射使用的状态码
    pub fn status(&self) -> u16 {
        match self.code.as_str() {
            "unauthorized" => 403,
            "not_found" => 404,
            "invalid_format" => 400,
            "invalid_word" => 422,
            "attempt_exhausted" => 400,
            _ => 500,
        }
    }
}

impl From<GameError> for CommandError {
    fn from(err: GameError) -> Self {
        let code = match &err {
            GameError::Unauthorized => "unauthorized",
            GameError::NotFound => "not_found",
            GameError::InvalidFormat => "invalid_format",
            GameError::InvalidWord => "invalid_word",
            GameError::AttemptExhausted => "attempt_exhausted",
            GameError::NoTermAvailable => "no_term_available",
            GameError::Conflict => "conflict",
            GameError::Repository(_) => "repository_error",
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

/// 列出用户的所有尝试记录
pub async fn list_attempts(
    state: &AppState,
    user_id: i64,
) -> Result<Vec<AttemptDto>, CommandError> {
    let attempts = state.game.list_attempts(user_id)?;
    Ok(attempts.into_iter().map(AttemptDto::from_model).collect())
}

/// 开始一次新的尝试
pub async fn start_attempt(state: &AppState, user_id: i64) -> Result<AttemptDto, CommandError> {
    let attempt = state.game.start_attempt(user_id)?;
    Ok(AttemptDto::from_model(attempt))
}

/// 获取单个尝试记录
pub async fn get_attempt(
    state: &AppState,
    user_id: i64,
    attempt_id: String,
) -> Result<AttemptDto, CommandError> {
    let attempt = state.game.get_attempt(user_id, &attempt_id)?;
    Ok(AttemptDto::from_model(attempt))
}

/// 提交一次猜词
pub async fn submit_guess(
    state: &AppState,
    user_id: i64,
    attempt_id: String,
    guess: String,
) -> Result<AttemptDto, CommandError> {
    let attempt = state.game.submit_guess(user_id, &attempt_id, &guess)?;
    Ok(AttemptDto::from_model(attempt))
}

/// 使用提示
pub async fn apply_hint(
    state: &AppState,
    user_id: i64,
    attempt_id: String,
) -> Result<HintDto, CommandError> {
    let (attempt, hints) = state.game.apply_hint(user_id, &attempt_id)?;
    Ok(HintDto {
        attempt: AttemptDto::from_model(attempt),
        hints,
    })
}

/// 删除尝试记录
pub async fn delete_attempt(
    state: &AppState,
    user_id: i64,
    attempt_id: String,
) -> Result<(), CommandError> {
    state.game.delete_attempt(user_id, &attempt_id)?;
    Ok(())
}

/// 批量导入词条
pub async fn import_terms(
    state: &AppState,
    terms: Vec<NewTerm>,
) -> Result<usize, CommandError> {
    state
        .game
        .database()
        .import_terms(&terms)
        .map_err(|e| CommandError::from(GameError::Repository(e)))
}

/// 批量导入词典单词
pub async fn import_dictionary(
    state: &AppState,
    words: Vec<String>,
) -> Result<usize, CommandError> {
    state
        .game
        .database()
        .import_dictionary(&words)
        .map_err(|e| CommandError::from(GameError::Repository(e)))
}
