//! # Error モジュール
//!
//! シミュレーションコアのエラー分類を定義します。
//!
//! - `Configuration`: 構築パラメータが不正（World構築時に致命的）
//! - `Arity`: 行動バッチの形状がチーム・エージェント数と一致しない
//! - `InvalidCommand`: 未知の行動種別、または不正なペイロード
//! - `InvariantViolation`: 内部整合性の破綻（コアのバグ、以降のWorldは使用不可）
//!
//! `Arity` と `InvalidCommand` は呼び出し側で回復可能であり、
//! これらが返された場合のWorldの状態は呼び出し前と完全に同一です。

use std::fmt;

use thiserror::Error;

use crate::models::{CommandError, TeamId};

/// 行動バッチの形状検証でどの階層が不一致だったか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityScope {
    /// チーム数の不一致
    Teams,
    /// 指定チーム内のエージェント数の不一致
    Agents(TeamId),
}

impl fmt::Display for ArityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityScope::Teams => write!(f, "teams"),
            ArityScope::Agents(team) => write!(f, "agents of {}", team),
        }
    }
}

/// シミュレーションコアのエラー
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error("行動数の不一致 ({scope}): 期待値 {expected}, 実際 {actual}")]
    Arity {
        scope: ArityScope,
        expected: usize,
        actual: usize,
    },

    #[error("不正なコマンド ({team}, agent {agent}): {source}")]
    InvalidCommand {
        team: TeamId,
        agent: usize,
        #[source]
        source: CommandError,
    },

    #[error("内部不変条件違反: {0}")]
    InvariantViolation(String),
}

impl SimError {
    /// 呼び出し側で回復可能なエラーかどうか
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimError::Arity { .. } | SimError::InvalidCommand { .. })
    }
}
