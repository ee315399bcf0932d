// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エンティティの基本インターフェース（trait）定義
pub mod traits;

// 各モデルの実装
pub mod agent;
pub mod command;
pub mod flag;
pub mod team;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use agent::Agent;
pub use command::{Command, CommandError, RawAction, ACTION_MOVE};
pub use flag::{Flag, FlagEvent, FlagState, leading_team};
pub use team::Team;
