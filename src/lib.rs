pub mod commands;
pub mod models;
pub mod services;

pub use commands::{AppState, AttemptDto, CommandError, HintDto};
pub use models::{Attempt, AttemptStatus, Term, MAX_GUESSES, WORD_LENGTH};
pub use services::{DatabaseService, GameError, GameService, NewTerm};
