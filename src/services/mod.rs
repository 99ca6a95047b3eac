// 服务模块
// 提供核心业务逻辑服务

pub mod database;
pub mod game;

pub use database::{DatabaseService, NewTerm};

pub use game::{GameError, GameService};
