// 数据库服务模块
// 提供 SQLite 数据库操作，管理词条池、词典与尝试记录

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::models::{Attempt, AttemptStatus, Term, MAX_GUESSES};

/// 数据库文件名
const DB_FILE_NAME: &str = "caici.db";

/// 批量导入的词条（term 入库前统一转为大写）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTerm {
    pub term: String,
    pub hints: String,
}

/// 数据库服务
pub struct DatabaseService {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl DatabaseService {
    /// 创建新的数据库服务
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let db_path = Self::get_default_db_path();
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        let service = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        };
        service.initialize()?;
        Ok(service)
    }

    /// 创建内存数据库服务（测试与演示用）
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let service = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        };
        service.initialize()?;
        Ok(service)
    }

    /// 获取默认数据库路径（可执行文件旁的 data 目录）
    fn get_default_db_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        exe_dir.join("data").join(DB_FILE_NAME)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        // WAL 模式提升并发性能
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS terms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                term TEXT NOT NULL CHECK(length(term) = 5),
                hints TEXT NOT NULL DEFAULT '',
                is_used INTEGER NOT NULL DEFAULT 0,
                usage_date TEXT,
                viewed_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dictionary_words (
                word TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS attempts (
                id TEXT PRIMARY KEY,
                term_id INTEGER NOT NULL,
                term TEXT NOT NULL,
                puzzle_day TEXT NOT NULL,
                attempted_by INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                attempt_one TEXT,
                attempt_two TEXT,
                attempt_three TEXT,
                attempt_four TEXT,
                attempt_five TEXT,
                attempts_used INTEGER NOT NULL DEFAULT 0 CHECK(attempts_used BETWEEN 0 AND 5),
                hint_used INTEGER NOT NULL DEFAULT 0,
                duration_of_attempt INTEGER,
                attempt_status TEXT,
                attempt_score INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (term_id) REFERENCES terms(id)
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_user ON attempts(attempted_by);
            CREATE INDEX IF NOT EXISTS idx_attempts_term_user_day
                ON attempts(term_id, attempted_by, puzzle_day);
            CREATE INDEX IF NOT EXISTS idx_terms_is_used ON terms(is_used);
        ",
        )?;

        Ok(())
    }

    // ==================== 词条池 ====================

    /// 添加单个词条
    pub fn add_term(&self, term: &str, hints: &str) -> Result<i64, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO terms (term, hints, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![term.to_uppercase(), hints, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 批量导入词条（事务内完成）
    pub fn import_terms(&self, terms: &[NewTerm]) -> Result<usize, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();

        {
            let mut stmt =
                tx.prepare("INSERT INTO terms (term, hints, created_at) VALUES (?1, ?2, ?3)")?;
            for entry in terms {
                stmt.execute(rusqlite::params![entry.term.to_uppercase(), entry.hints, now])?;
            }
        }

        tx.commit()?;
        Ok(terms.len())
    }

    /// 随机选取一个词条，并更新其使用统计
    pub fn pick_random_term(&self) -> Result<Option<Term>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        let term = conn
            .query_row(
                "SELECT id, term, hints, is_used, usage_date, viewed_count, created_at
                 FROM terms ORDER BY RANDOM() LIMIT 1",
                [],
                Self::row_to_term,
            )
            .optional()?;

        let Some(mut term) = term else {
            return Ok(None);
        };

        let now = Utc::now();
        conn.execute(
            "UPDATE terms SET viewed_count = viewed_count + 1, is_used = 1, usage_date = ?1
             WHERE id = ?2",
            rusqlite::params![now, term.id],
        )?;

        term.viewed_count += 1;
        term.is_used = true;
        term.usage_date = Some(now);

        debug!("已选取词条 {} (viewed_count={})", term.id, term.viewed_count);
        Ok(Some(term))
    }

    /// 获取单个词条
    pub fn get_term(&self, id: i64) -> Result<Option<Term>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, term, hints, is_used, usage_date, viewed_count, created_at
             FROM terms WHERE id = ?1",
            rusqlite::params![id],
            Self::row_to_term,
        )
        .optional()
    }

    /// 词条总数
    pub fn term_count(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM terms", [], |row| row.get(0))
    }

    // ==================== 词典 ====================

    /// 批量导入词典单词（事务内完成，入库前统一大写）
    pub fn import_dictionary(&self, words: &[String]) -> Result<usize, rusqlite::Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO dictionary_words (word) VALUES (?1)")?;
            for word in words {
                stmt.execute(rusqlite::params![word.to_uppercase()])?;
            }
        }

        tx.commit()?;
        Ok(words.len())
    }

    /// 查询单词是否在词典中
    pub fn contains_word(&self, word: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT 1 FROM dictionary_words WHERE word = ?1")?;
        stmt.exists(rusqlite::params![word])
    }

    /// 词典单词总数
    pub fn dictionary_count(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM dictionary_words", [], |row| row.get(0))
    }

    // ==================== 尝试记录 ====================

    /// 创建尝试记录
    pub fn create_attempt(&self, attempt: &Attempt) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let slots = Self::guess_slots(attempt);

        conn.execute(
            "INSERT INTO attempts
             (id, term_id, term, puzzle_day, attempted_by, started_at, completed_at,
              attempt_one, attempt_two, attempt_three, attempt_four, attempt_five,
              attempts_used, hint_used, duration_of_attempt, attempt_status, attempt_score,
              created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            rusqlite::params![
                attempt.id,
                attempt.term_id,
                attempt.term,
                attempt.puzzle_day,
                attempt.attempted_by,
                attempt.started_at,
                attempt.completed_at,
                slots[0],
                slots[1],
                slots[2],
                slots[3],
                slots[4],
                attempt.attempts_used,
                attempt.hint_used,
                attempt.duration_of_attempt,
                attempt.status.as_db(),
                attempt.attempt_score,
                attempt.created_at,
            ],
        )?;

        Ok(())
    }

    /// 查找尝试记录
    pub fn find_attempt(&self, id: &str) -> Result<Option<Attempt>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, term_id, term, puzzle_day, attempted_by, started_at, completed_at,
                    attempt_one, attempt_two, attempt_three, attempt_four, attempt_five,
                    attempts_used, hint_used, duration_of_attempt, attempt_status, attempt_score,
                    created_at
             FROM attempts WHERE id = ?1",
            rusqlite::params![id],
            Self::row_to_attempt,
        )
        .optional()
    }

    /// 更新尝试记录的可变字段
    ///
    /// expected_attempts_used 为读取时的已用次数，作为乐观锁守卫：
    /// 并发提交导致的丢失更新在此处返回 false，而不会覆盖写入。
    pub fn update_attempt(
        &self,
        attempt: &Attempt,
        expected_attempts_used: u32,
    ) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let slots = Self::guess_slots(attempt);

        let changed = conn.execute(
            "UPDATE attempts SET
                completed_at = ?1,
                attempt_one = ?2, attempt_two = ?3, attempt_three = ?4,
                attempt_four = ?5, attempt_five = ?6,
                attempts_used = ?7, hint_used = ?8,
                duration_of_attempt = ?9, attempt_status = ?10, attempt_score = ?11
             WHERE id = ?12 AND attempts_used = ?13",
            rusqlite::params![
                attempt.completed_at,
                slots[0],
                slots[1],
                slots[2],
                slots[3],
                slots[4],
                attempt.attempts_used,
                attempt.hint_used,
                attempt.duration_of_attempt,
                attempt.status.as_db(),
                attempt.attempt_score,
                attempt.id,
                expected_attempts_used,
            ],
        )?;

        Ok(changed > 0)
    }

    /// 删除尝试记录
    pub fn delete_attempt(&self, id: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM attempts WHERE id = ?1", rusqlite::params![id])?;
        Ok(())
    }

    /// 列出用户的所有尝试记录（最新创建的在前）
    pub fn list_attempts_by_user(&self, user_id: i64) -> Result<Vec<Attempt>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, term_id, term, puzzle_day, attempted_by, started_at, completed_at,
                    attempt_one, attempt_two, attempt_three, attempt_four, attempt_five,
                    attempts_used, hint_used, duration_of_attempt, attempt_status, attempt_score,
                    created_at
             FROM attempts WHERE attempted_by = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(rusqlite::params![user_id], Self::row_to_attempt)?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?);
        }

        Ok(attempts)
    }

    // ==================== 辅助方法 ====================

    /// 猜词序列映射到五个槽位，槽位 N 对应第 N 次猜词
    fn guess_slots(attempt: &Attempt) -> [Option<&str>; MAX_GUESSES as usize] {
        let mut slots = [None; MAX_GUESSES as usize];
        for (i, guess) in attempt.guesses.iter().take(slots.len()).enumerate() {
            slots[i] = Some(guess.as_str());
        }
        slots
    }

    /// 从数据库行转换为 Term
    fn row_to_term(row: &Row) -> Result<Term, rusqlite::Error> {
        Ok(Term {
            id: row.get(0)?,
            term: row.get(1)?,
            hints: row.get(2)?,
            is_used: row.get(3)?,
            usage_date: row.get(4)?,
            viewed_count: row.get(5)?,
            created_at: row.get::<_, DateTime<Utc>>(6)?,
        })
    }

    /// 从数据库行转换为 Attempt
    fn row_to_attempt(row: &Row) -> Result<Attempt, rusqlite::Error> {
        let mut guesses = Vec::new();
        for idx in 7..12 {
            if let Some(guess) = row.get::<_, Option<String>>(idx)? {
                guesses.push(guess);
            }
        }

        let status: Option<String> = row.get(15)?;

        Ok(Attempt {
            id: row.get(0)?,
            term_id: row.get(1)?,
            term: row.get(2)?,
            puzzle_day: row.get(3)?,
            attempted_by: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
            guesses,
            attempts_used: row.get(12)?,
            hint_used: row.get(13)?,
            duration_of_attempt: row.get(14)?,
            status: AttemptStatus::from_db(status.as_deref()),
            attempt_score: row.get(16)?,
            created_at: row.get(17)?,
        })
    }
}
