// 命令模块
// 提供供传输层调用的操作接口

pub mod game;

pub use game::{
    apply_hint,
    delete_attempt,
    get_attempt,
    import_dictionary,
    import_terms,
    list_attempts,
    start_attempt,
    submit_guess,
    AppState,
    AttemptDto,
    CommandError,
    HintDto,
};
