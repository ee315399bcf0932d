use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::common::Vector2D;

/// 行動種別: 移動
pub const ACTION_MOVE: i64 = 0;

/// 外部ドライバから渡される1エージェント分の生の行動 `(actionKind, vector)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    pub kind: i64,
    pub payload: Vec<f64>,
}

impl RawAction {
    pub fn new(kind: i64, payload: Vec<f64>) -> Self {
        Self { kind, payload }
    }

    /// 移動行動を作成
    pub fn move_by(dx: f64, dy: f64) -> Self {
        Self::new(ACTION_MOVE, vec![dx, dy])
    }
}

/// 行動のパースエラー
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("未知の行動種別: {0}")]
    UnknownKind(i64),

    #[error("行動種別 {kind} のペイロード長が不正: {len}")]
    MalformedPayload { kind: i64, len: usize },

    #[error("ペイロードに有限でない値が含まれています")]
    NonFiniteComponent,
}

/// エージェントに適用される型付きコマンド
///
/// 現在定義されている種別は移動のみです。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// 変位ベクトル分だけ移動
    Move(Vector2D),
}

impl Command {
    /// 生の行動をコマンドに変換
    ///
    /// 副作用はなく、失敗時は `CommandError` を返します。
    pub fn from_action(action: &RawAction) -> Result<Self, CommandError> {
        match action.kind {
            ACTION_MOVE => {
                let &[dx, dy] = action.payload.as_slice() else {
                    return Err(CommandError::MalformedPayload {
                        kind: action.kind,
                        len: action.payload.len(),
                    });
                };
                if !dx.is_finite() || !dy.is_finite() {
                    return Err(CommandError::NonFiniteComponent);
                }
                Ok(Command::Move(Vector2D::new(dx, dy)))
            }
            other => Err(CommandError::UnknownKind(other)),
        }
    }

    /// 行動種別の数値表現
    pub fn kind(&self) -> i64 {
        match self {
            Command::Move(_) => ACTION_MOVE,
        }
    }
}
