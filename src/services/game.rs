// 游戏服务模块
// 猜词尝试的状态机与计分引擎

use chrono::{Local, Utc};
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Attempt, AttemptStatus, MAX_GUESSES, WORD_LENGTH};
use crate::services::database::DatabaseService;

/// 计分参数
const BASE_SCORE: i64 = 1000;
const GUESS_PENALTY: i64 = 50;
const HINT_PENALTY: i64 = 100;

/// 游戏错误分类
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Attempt not found")]
    NotFound,
    #[error("Guess must be exactly 5 characters")]
    InvalidFormat,
    #[error("Not a valid word")]
    InvalidWord,
    #[error("Max attempts reached")]
    AttemptExhausted,
    #[error("No term available")]
    NoTermAvailable,
    /// 乐观锁守卫检测到并发更新，调用方可安全重试
    #[error("Concurrent update detected")]
    Conflict,
    #[error("Storage failure: {0}")]
    Repository(#[from] rusqlite::Error),
}

/// 游戏服务
///
/// 服务本身无内部状态，每个操作都是一次独立的短生命周期工作单元。
pub struct GameService {
    db: Arc<DatabaseService>,
}

impl GameService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &DatabaseService {
        &self.db
    }

    /// 开始一次新的尝试：随机选取词条并创建初始记录
    pub fn start_attempt(&self, user_id: i64) -> Result<Attempt, GameError> {
        let term = self
            .db
            .pick_random_term()?
            .ok_or(GameError::NoTermAvailable)?;

        let now = Utc::now();
        let attempt = Attempt {
            id: Uuid::new_v4().to_string(),
            term_id: term.id,
            term: term.term.to_uppercase(),
            puzzle_day: Local::now().format("%Y-%m-%d").to_string(),
            attempted_by: user_id,
            started_at: now,
            completed_at: None,
            guesses: Vec::new(),
            attempts_used: 0,
            hint_used: false,
            duration_of_attempt: None,
            status: AttemptStatus::InProgress,
            attempt_score: None,
            created_at: now,
        };

        self.db.create_attempt(&attempt)?;
        info!("用户 {} 开始尝试 {}（词条 {}）", user_id, attempt.id, term.id);
        Ok(attempt)
    }

    /// 提交一次猜词
    ///
    /// 校验顺序：归属 → 终态 → 格式 → 词典 → 次数上限；
    /// 校验失败不产生任何状态变更。
    pub fn submit_guess(
        &self,
        user_id: i64,
        attempt_id: &str,
        raw_guess: &str,
    ) -> Result<Attempt, GameError> {
        let mut attempt = self.load_owned(user_id, attempt_id)?;

        if attempt.status.is_terminal() {
            return Err(GameError::AttemptExhausted);
        }

        let guess = raw_guess.trim().to_uppercase();
        if guess.chars().count() != WORD_LENGTH {
            return Err(GameError::InvalidFormat);
        }

        if !self.db.contains_word(&guess)? {
            info!("无效单词: {}（尝试 {}）", guess, attempt.id);
            return Err(GameError::InvalidWord);
        }

        if attempt.attempts_used >= MAX_GUESSES {
            return Err(GameError::AttemptExhausted);
        }

        let expected_used = attempt.attempts_used;
        attempt.guesses.push(guess.clone());
        attempt.attempts_used += 1;
        let used = attempt.attempts_used;

        if guess == attempt.term.to_uppercase() {
            attempt.status = AttemptStatus::SolvedOn(used as u8);
            attempt.completed_at = Some(Utc::now());
        } else if used == MAX_GUESSES {
            attempt.status = AttemptStatus::Failed;
            attempt.completed_at = Some(Utc::now());
        }

        if attempt.status.is_terminal() {
            let completed = attempt.completed_at.unwrap_or_else(Utc::now);
            // 时钟回拨时截断为 0，不允许负时长
            attempt.duration_of_attempt =
                Some((completed - attempt.started_at).num_seconds().max(0));

            let mut score = BASE_SCORE - (used as i64 - 1) * GUESS_PENALTY;
            if attempt.hint_used {
                score -= HINT_PENALTY;
            }
            attempt.attempt_score = Some(score.max(0));
        }

        if !self.db.update_attempt(&attempt, expected_used)? {
            return Err(GameError::Conflict);
        }

        info!(
            "尝试 {} 提交猜词 {}（已用 {} 次，状态 {:?}）",
            attempt.id, guess, attempt.attempts_used, attempt.status
        );
        Ok(attempt)
    }

    /// 使用提示：幂等地置位 hint_used，并返回词条的提示文本
    ///
    /// 提示的扣分只在终态计分时生效。
    pub fn apply_hint(
        &self,
        user_id: i64,
        attempt_id: &str,
    ) -> Result<(Attempt, String), GameError> {
        let mut attempt = self.load_owned(user_id, attempt_id)?;

        if !attempt.hint_used {
            attempt.hint_used = true;
            if !self.db.update_attempt(&attempt, attempt.attempts_used)? {
                return Err(GameError::Conflict);
            }
            info!("尝试 {} 使用提示", attempt.id);
        }

        let hints = self
            .db
            .get_term(attempt.term_id)?
            .map(|t| t.hints)
            .unwrap_or_default();

        Ok((attempt, hints))
    }

    /// 获取单个尝试记录
    pub fn get_attempt(&self, user_id: i64, attempt_id: &str) -> Result<Attempt, GameError> {
        self.load_owned(user_id, attempt_id)
    }

    /// 列出用户的所有尝试记录（最新创建的在前）
    pub fn list_attempts(&self, user_id: i64) -> Result<Vec<Attempt>, GameError> {
        Ok(self.db.list_attempts_by_user(user_id)?)
    }

    /// 删除尝试记录（无论是否终态）
    pub fn delete_attempt(&self, user_id: i64, attempt_id: &str) -> Result<(), GameError> {
        let attempt = self.load_owned(user_id, attempt_id)?;
        self.db.delete_attempt(&attempt.id)?;
        info!("尝试 {} 已删除", attempt.id);
        Ok(())
    }

    /// 读取尝试记录并校验归属
    fn load_owned(&self, user_id: i64, attempt_id: &str) -> Result<Attempt, GameError> {
        let attempt = self.db.find_attempt(attempt_id)?.ok_or(GameError::NotFound)?;
        if attempt.attempted_by != user_id {
            warn!("用户 {} 越权访问尝试 {}", user_id, attempt.id);
            return Err(GameError::Unauthorized);
        }
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 单词条的测试环境，start_attempt 必然选中 PLANT
    fn test_service() -> GameService {
        let db = DatabaseService::open_in_memory().unwrap();
        db.add_term("PLANT", "会生长的绿色生物").unwrap();
        db.import_dictionary(
            &["PLANT", "CRANE", "PLANE", "HOUSE", "MOUSE", "STONE", "BREAD"]
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>(),
        )
        .unwrap();
        GameService::new(Arc::new(db))
    }

    #[test]
    fn test_start_attempt_initial_state() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        assert_eq!(attempt.term, "PLANT");
        assert_eq!(attempt.attempted_by, 1);
        assert_eq!(attempt.attempts_used, 0);
        assert!(attempt.guesses.is_empty());
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert!(!attempt.hint_used);
        assert!(attempt.completed_at.is_none());
        assert!(attempt.duration_of_attempt.is_none());
        assert!(attempt.attempt_score.is_none());
        assert_eq!(
            attempt.puzzle_day,
            Local::now().format("%Y-%m-%d").to_string()
        );

        // 记录已持久化
        let stored = game.get_attempt(1, &attempt.id).unwrap();
        assert_eq!(stored, attempt);
    }

    #[test]
    fn test_start_attempt_no_term_available() {
        let db = DatabaseService::open_in_memory().unwrap();
        let game = GameService::new(Arc::new(db));
        assert!(matches!(
            game.start_attempt(1),
            Err(GameError::NoTermAvailable)
        ));
    }

    #[test]
    fn test_guess_invalid_format_leaves_attempt_unchanged() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        for bad in ["TREE", "CRANES", "", "猜"] {
            assert!(matches!(
                game.submit_guess(1, &attempt.id, bad),
                Err(GameError::InvalidFormat)
            ));
        }

        let stored = game.get_attempt(1, &attempt.id).unwrap();
        assert_eq!(stored.attempts_used, 0);
        assert!(stored.guesses.is_empty());
    }

    #[test]
    fn test_guess_invalid_word_leaves_attempt_unchanged() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        assert!(matches!(
            game.submit_guess(1, &attempt.id, "ZZZZZ"),
            Err(GameError::InvalidWord)
        ));

        let stored = game.get_attempt(1, &attempt.id).unwrap();
        assert_eq!(stored.attempts_used, 0);
    }

    #[test]
    fn test_solved_on_third_guess_scoring() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        let a = game.submit_guess(1, &attempt.id, "CRANE").unwrap();
        assert_eq!(a.status, AttemptStatus::InProgress);
        assert_eq!(a.attempts_used, 1);
        assert!(a.attempt_score.is_none());

        let a = game.submit_guess(1, &attempt.id, "PLANE").unwrap();
        assert_eq!(a.status, AttemptStatus::InProgress);
        assert_eq!(a.attempts_used, 2);

        let a = game.submit_guess(1, &attempt.id, "PLANT").unwrap();
        assert_eq!(a.status, AttemptStatus::SolvedOn(3));
        assert_eq!(a.attempts_used, 3);
        assert_eq!(a.guesses, vec!["CRANE", "PLANE", "PLANT"]);
        assert_eq!(a.attempt_score, Some(900));
        assert!(a.completed_at.is_some());
        assert!(a.duration_of_attempt.unwrap() >= 0);
    }

    #[test]
    fn test_solved_on_first_guess_full_score() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        let a = game.submit_guess(1, &attempt.id, "PLANT").unwrap();
        assert_eq!(a.status, AttemptStatus::SolvedOn(1));
        assert_eq!(a.attempt_score, Some(1000));
    }

    #[test]
    fn test_lowercase_guess_is_normalized() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        let a = game.submit_guess(1, &attempt.id, "plant").unwrap();
        assert_eq!(a.status, AttemptStatus::SolvedOn(1));
        assert_eq!(a.guesses, vec!["PLANT"]);
    }

    #[test]
    fn test_failed_after_five_wrong_guesses() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        for word in ["CRANE", "PLANE", "HOUSE", "MOUSE"] {
            let a = game.submit_guess(1, &attempt.id, word).unwrap();
            assert_eq!(a.status, AttemptStatus::InProgress);
        }

        let a = game.submit_guess(1, &attempt.id, "STONE").unwrap();
        assert_eq!(a.status, AttemptStatus::Failed);
        assert_eq!(a.attempts_used, 5);
        assert!(a.completed_at.is_some());
        // k=5 计分：1000 - 4*50
        assert_eq!(a.attempt_score, Some(800));
    }

    #[test]
    fn test_terminal_attempt_rejects_further_guesses() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();
        game.submit_guess(1, &attempt.id, "PLANT").unwrap();

        assert!(matches!(
            game.submit_guess(1, &attempt.id, "CRANE"),
            Err(GameError::AttemptExhausted)
        ));

        let stored = game.get_attempt(1, &attempt.id).unwrap();
        assert_eq!(stored.attempts_used, 1);
        assert_eq!(stored.status, AttemptStatus::SolvedOn(1));
    }

    #[test]
    fn test_hint_is_idempotent_and_penalized_once() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        let (a, hints) = game.apply_hint(1, &attempt.id).unwrap();
        assert!(a.hint_used);
        assert_eq!(hints, "会生长的绿色生物");

        // 重复使用无额外效果
        let (a, hints) = game.apply_hint(1, &attempt.id).unwrap();
        assert!(a.hint_used);
        assert_eq!(hints, "会生长的绿色生物");

        let a = game.submit_guess(1, &attempt.id, "PLANT").unwrap();
        assert_eq!(a.attempt_score, Some(900));
    }

    #[test]
    fn test_hint_before_third_guess_scoring() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        game.submit_guess(1, &attempt.id, "CRANE").unwrap();
        game.apply_hint(1, &attempt.id).unwrap();
        game.submit_guess(1, &attempt.id, "PLANE").unwrap();
        let a = game.submit_guess(1, &attempt.id, "PLANT").unwrap();

        // 1000 - 2*50 - 100
        assert_eq!(a.attempt_score, Some(800));
    }

    #[test]
    fn test_ownership_is_enforced() {
        let game = test_service();
        let attempt = game.start_attempt(1).unwrap();

        assert!(matches!(
            game.get_attempt(2, &attempt.id),
            Err(GameError::Unauthorized)
        ));
        assert!(matches!(
            game.submit_guess(2, &attempt.id, "CRANE"),
            Err(GameError::Unauthorized)
        ));
        assert!(matches!(
            game.apply_hint(2, &attempt.id),
            Err(GameError::Unauthorized)
        ));
        assert!(matches!(
            game.delete_attempt(2, &attempt.id),
            Err(GameError::Unauthorized)
        ));

        // 越权操作不产生变更
        let stored = game.get_attempt(1, &attempt.id).unwrap();
        assert_eq!(stored.attempts_used, 0);
        assert!(!stored.hint_used);
    }

    #[test]
    fn test_unknown_attempt_not_found() {
        let game = test_service();
        assert!(matches!(
            game.get_attempt(1, "no-such-id"),
            Err(GameError::NotFound)
        ));
    }

    #[test]
    fn test_delete_attempt_regardless_of_state() {
        let game = test_service();

        // 未完成的也可删除
        let open = game.start_attempt(1).unwrap();
        game.delete_attempt(1, &open.id).unwrap();
        assert!(matches!(
            game.get_attempt(1, &open.id),
            Err(GameError::NotFound)
        ));

        let solved = game.start_attempt(1).unwrap();
        game.submit_guess(1, &solved.id, "PLANT").unwrap();
        game.delete_attempt(1, &solved.id).unwrap();
        assert!(matches!(
            game.get_attempt(1, &solved.id),
            Err(GameError::NotFound)
        ));
    }

    #[test]
    fn test_list_attempts_most_recent_first() {
        let game = test_service();

        let first = game.start_attempt(1).unwrap();
        let second = game.start_attempt(1).unwrap();
        let third = game.start_attempt(1).unwrap();
        game.start_attempt(2).unwrap();

        let listed = game.list_attempts(1).unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]
        );
    }
}
