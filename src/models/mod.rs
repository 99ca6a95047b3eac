use serde::{Deserialize, Serialize};

/// 每次尝试最多允许的猜词次数
pub const MAX_GUESSES: u32 = 5;

/// 词条固定长度
pub const WORD_LENGTH: usize = 5;

/// 词条数据结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub term: String,
    pub hints: String,
    pub is_used: bool,
    pub usage_date: Option<chrono::DateTime<chrono::Utc>>,
    pub viewed_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// 尝试状态
///
/// 持久化形式为字符串："solved_on_3"、"failed"，进行中为 NULL。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    SolvedOn(u8),
    Failed,
}

impl AttemptStatus {
    /// 是否为终态（终态之后不再接受猜词）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }

    /// 转换为数据库字符串形式
    pub fn as_db(&self) -> Option<String> {
        match self {
            AttemptStatus::InProgress => None,
            AttemptStatus::SolvedOn(n) => Some(format!("solved_on_{}", n)),
            AttemptStatus::Failed => Some("failed".to_string()),
        }
    }

    /// 从数据库字符串形式解析
    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            None => AttemptStatus::InProgress,
            Some("failed") => AttemptStatus::Failed,
            Some(s) => s
                .strip_prefix("solved_on_")
                .and_then(|n| n.parse().ok())
                .map(AttemptStatus::SolvedOn)
                .unwrap_or(AttemptStatus::InProgress),
        }
    }
}

impl Serialize for AttemptStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_db().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttemptStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(AttemptStatus::from_db(value.as_deref()))
    }
}

/// 尝试记录
///
/// guesses 为有序序列，第 N 个元素即第 N 次猜词，
/// 存储层映射到 attempt_one..attempt_five 五个槽位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub term_id: i64,
    pub term: String,
    pub puzzle_day: String,
    pub attempted_by: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub guesses: Vec<String>,
    pub attempts_used: u32,
    pub hint_used: bool,
    pub duration_of_attempt: Option<i64>,
    pub status: AttemptStatus,
    pub attempt_score: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
