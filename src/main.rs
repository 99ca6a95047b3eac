// 每日猜词游戏后端的控制台入口
// 初始化日志与数据库，首次运行时灌入内置词条与词典

use anyhow::anyhow;
use log::info;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use caici::commands::{self, AppState};
use caici::services::{DatabaseService, GameService, NewTerm};
use caici::MAX_GUESSES;

/// 本地演示用的固定用户
const DEMO_USER_ID: i64 = 1;

/// 内置词条池
const SEED_TERMS: &[(&str, &str)] = &[
    ("PLANT", "会生长的绿色生物"),
    ("STONE", "河边常见，又硬又沉"),
    ("BREAD", "早餐桌上的烘焙主食"),
    ("CLOUD", "天上飘的，有时会下雨"),
    ("RIVER", "一直向低处流的水"),
];

/// 内置词典
const SEED_DICTIONARY: &[&str] = &[
    "PLANT", "CRANE", "PLANE", "STONE", "BREAD", "CLOUD", "RIVER", "HOUSE", "MOUSE", "DREAM",
    "APPLE", "GRAPE", "LEMON", "TIGER", "HORSE", "SNAKE", "EAGLE", "SHARK", "WHALE", "TRAIN",
    "SMILE", "LIGHT", "NIGHT", "WATER", "EARTH", "FLAME", "GREEN", "BLACK", "WHITE", "BROWN",
    "SWEET", "SOUND", "MUSIC", "DANCE", "PAPER", "PHONE", "TABLE", "CHAIR",
];

fn setup_logging() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

/// 首次运行时灌入内置数据
async fn seed_if_empty(state: &AppState) -> anyhow::Result<()> {
    let db = state.game.database();

    if db.term_count()? == 0 {
        let terms: Vec<NewTerm> = SEED_TERMS
            .iter()
            .map(|(term, hints)| NewTerm {
                term: term.to_string(),
                hints: hints.to_string(),
            })
            .collect();
        let count = commands::import_terms(state, terms)
            .await
            .map_err(|e| anyhow!("词条导入失败: {}", e.message))?;
        info!("已导入 {} 个词条", count);
    }

    if db.dictionary_count()? == 0 {
        let words: Vec<String> = SEED_DICTIONARY.iter().map(|w| w.to_string()).collect();
        let count = commands::import_dictionary(state, words)
            .await
            .map_err(|e| anyhow!("词典导入失败: {}", e.message))?;
        info!("已导入 {} 个词典单词", count);
    }

    Ok(())
}

/// 进行一局游戏
async fn play_round(state: &AppState) -> anyhow::Result<()> {
    let attempt = commands::start_attempt(state, DEMO_USER_ID)
        .await
        .map_err(|e| anyhow!("开局失败: {}", e.message))?;

    println!(
        "新的一局开始！共 {} 次机会，请输入 5 个字母的英文单词；输入 hint 查看提示。",
        MAX_GUESSES
    );

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("hint") {
            match commands::apply_hint(state, DEMO_USER_ID, attempt.id.clone()).await {
                Ok(hint) => println!("提示（终局计分 -100）：{}", hint.hints),
                Err(e) => println!("{}", e.message),
            }
            continue;
        }

        match commands::submit_guess(state, DEMO_USER_ID, attempt.id.clone(), input.to_string())
            .await
        {
            Ok(a) => match a.attempt_status.as_deref() {
                Some(status) if status.starts_with("solved_on_") => {
                    println!(
                        "猜中了！第 {} 次命中，得分 {}，用时 {} 秒",
                        a.attempts_used,
                        a.attempt_score.unwrap_or(0),
                        a.duration_of_attempt.unwrap_or(0)
                    );
                    return Ok(());
                }
                Some("failed") => {
                    println!("五次机会用完，本局失败。");
                    return Ok(());
                }
                _ => println!("没猜中，还剩 {} 次机会", MAX_GUESSES - a.attempts_used),
            },
            Err(e) => println!("{}（{}）", e.message, e.code),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging()?;

    let db = DatabaseService::new().map_err(|e| anyhow!("数据库初始化失败: {}", e))?;
    info!("数据库就绪: {}", db.db_path().display());

    let state = AppState {
        game: GameService::new(Arc::new(db)),
    };
    seed_if_empty(&state).await?;

    let history = commands::list_attempts(&state, DEMO_USER_ID)
        .await
        .map_err(|e| anyhow!(e.message))?;
    if let Some(latest) = history.first() {
        println!(
            "历史共 {} 局，最近一局：\n{}",
            history.len(),
            serde_json::to_string_pretty(latest)?
        );
    }

    let stdin = io::stdin();
    loop {
        play_round(&state).await?;

        print!("再来一局？(y/n) ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || !line.trim().eq_ignore_ascii_case("y") {
            break;
        }
    }

    Ok(())
}
