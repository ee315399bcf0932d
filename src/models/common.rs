use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{ArityScope, SimError};

/// 2次元位置を表す構造体
///
/// 座標系はWorldの領域 `[0, width) × [0, height)` と同じですが、
/// エージェントは領域外にも移動できるため値の範囲は制限しません。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position2D {
    pub x: f64, // 横方向（width）
    pub y: f64, // 縦方向（height）
}

impl Position2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// ユークリッド距離を計算
    ///
    /// フラッグの判定半径との比較に使います。
    pub fn distance(&self, other: &Position2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Add<Vector2D> for Position2D {
    type Output = Self;

    fn add(self, v: Vector2D) -> Self::Output {
        Self::new(self.x + v.dx, self.y + v.dy)
    }
}

impl Sub for Position2D {
    type Output = Vector2D;

    fn sub(self, other: Self) -> Self::Output {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

/// 2次元変位ベクトル（1ティック分の移動量）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    pub dx: f64, // x方向の移動量
    pub dy: f64, // y方向の移動量
}

impl Vector2D {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// ベクトルの大きさ（移動距離）
    pub fn magnitude(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2)).sqrt()
    }

    /// 移動なしかどうか
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    /// ベクトルの向き（ラジアン, [0, 2π)）。ゼロベクトルの場合はNone
    pub fn heading(&self) -> Option<f64> {
        if self.is_zero() {
            None
        } else {
            Some(math_utils::normalize_orientation(self.dy.atan2(self.dx)))
        }
    }
}

/// チーム識別子
///
/// 報酬・観測値・占領状態でチームを区別するキーです。表示は `team{n}` 形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team{}", self.0)
    }
}

impl From<u32> for TeamId {
    fn from(id: u32) -> Self {
        TeamId(id)
    }
}

/// 長さが等しい2つの列を要素ごとに組み合わせる
///
/// `Iterator::zip` と異なり、長さが一致しない場合は切り詰めずに
/// `SimError::Arity` を返します。`f` がエラーを返した場合もそこで中断します。
///
/// # 引数
///
/// * `scope` - 不一致時のエラーに記録する階層（チーム数かエージェント数か）
/// * `left` - 基準となる列（`expected` の長さ）
/// * `right` - 対応付ける列（`actual` の長さ）
/// * `f` - 各要素の組に適用する関数
///
/// # 戻り値
///
/// `f` の結果を `left` の順に並べたベクター
pub fn zip_exact<A, B, C, F>(
    scope: ArityScope,
    left: &[A],
    right: &[B],
    mut f: F,
) -> Result<Vec<C>, SimError>
where
    F: FnMut(&A, &B) -> Result<C, SimError>,
{
    if left.len() != right.len() {
        return Err(SimError::Arity {
            scope,
            expected: left.len(),
            actual: right.len(),
        });
    }

    left.iter().zip(right).map(|(a, b)| f(a, b)).collect()
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use std::f64::consts::TAU;

    /// 角度を[0, 2π)の範囲に正規化
    pub fn normalize_orientation(angle_rad: f64) -> f64 {
        let normalized = angle_rad.rem_euclid(TAU);
        // rem_euclid は丸めにより TAU そのものを返すことがある
        if normalized >= TAU { 0.0 } else { normalized }
    }
}
