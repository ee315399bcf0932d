use rand::Rng;

use crate::error::SimError;
use crate::models::{
    common::{Position2D, TeamId},
    team::Team,
    traits::IObservable,
};
use crate::observation::{FlagObservation, UNCLAIMED};

/// フラッグの占領状態
///
/// `Free` → `Contesting` → `Captured` と遷移し、`Captured` は
/// エピソード中の終端状態です（`reset` でのみ `Free` に戻る）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    /// 未占領（チームなし、カウント0）
    Free,
    /// 占領進行中（0 < count < time_to_score）
    Contesting { team: TeamId, count: u32 },
    /// 占領済み（count >= time_to_score）
    Captured { team: TeamId, count: u32 },
}

/// 1ティックのスコア処理で発生した状態遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagEvent {
    /// 新しいチームが優勢になりカウントが1から始まった
    ContestStarted { team: TeamId },
    /// 同じチームが優勢を維持しカウントが増えた
    ContestProgressed { team: TeamId, count: u32 },
    /// 占領が確定した
    Captured { team: TeamId },
}

/// フラッグ
///
/// 位置は作成時に固定され、変化するのは占領状態のみです。
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    /// フラッグの位置（固定）
    pub position: Position2D,
    /// スコア判定半径
    pub scoring_radius: f64,
    pub(crate) state: FlagState,
}

impl Flag {
    /// 指定位置に未占領のフラッグを作成します
    ///
    /// # 引数
    ///
    /// * `position` - フラッグの位置（以後変化しない）
    /// * `scoring_radius` - スコア判定半径
    pub fn new(position: Position2D, scoring_radius: f64) -> Self {
        Self {
            position,
            scoring_radius,
            state: FlagState::Free,
        }
    }

    /// 矩形 `[min, max)` 内の一様乱数位置にフラッグを作成
    ///
    /// # 引数
    ///
    /// * `rng` - 位置の抽選に使う乱数生成器（呼び出し側が所有・シード管理する）
    /// * `min` - 配置範囲の下限（含む）
    /// * `max` - 配置範囲の上限（含まない）
    /// * `scoring_radius` - スコア判定半径
    ///
    /// # 戻り値
    ///
    /// 未占領のフラッグ。範囲が空・逆転・非有限、または半径が正でない場合は
    /// `SimError::Configuration`
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        min: Position2D,
        max: Position2D,
        scoring_radius: f64,
    ) -> Result<Self, SimError> {
        let finite = min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite();
        if !finite || min.x >= max.x || min.y >= max.y {
            return Err(SimError::Configuration(format!(
                "flag placement area is empty: ({}, {})..({}, {})",
                min.x, min.y, max.x, max.y
            )));
        }
        if !(scoring_radius.is_finite() && scoring_radius > 0.0) {
            return Err(SimError::Configuration(format!(
                "flag scoring radius must be positive: {}",
                scoring_radius
            )));
        }

        let x = rng.gen_range(min.x..max.x);
        let y = rng.gen_range(min.y..max.y);
        Ok(Self::new(Position2D::new(x, y), scoring_radius))
    }

    pub fn state(&self) -> FlagState {
        self.state
    }

    /// 現在スコア中（または占領済み）のチーム
    pub fn scoring_team(&self) -> Option<TeamId> {
        match self.state {
            FlagState::Free => None,
            FlagState::Contesting { team, .. } | FlagState::Captured { team, .. } => Some(team),
        }
    }

    pub fn scoring_count(&self) -> u32 {
        match self.state {
            FlagState::Free => 0,
            FlagState::Contesting { count, .. } | FlagState::Captured { count, .. } => count,
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self.state, FlagState::Captured { .. })
    }

    /// 占領済みの場合、占領チーム
    pub fn captured_by(&self) -> Option<TeamId> {
        match self.state {
            FlagState::Captured { team, .. } => Some(team),
            _ => None,
        }
    }

    /// 指定位置がスコア判定半径内かどうか
    ///
    /// 境界上（距離がちょうど半径）の位置も判定範囲内として扱います。
    pub fn within_scoring_distance(&self, other: &Position2D) -> bool {
        self.position.distance(other) <= self.scoring_radius
    }

    /// チームごとの判定半径内エージェント数（チーム順）
    pub fn presence_counts(&self, teams: &[Team]) -> Vec<(TeamId, usize)> {
        teams
            .iter()
            .map(|team| {
                let count = team
                    .agents()
                    .iter()
                    .filter(|a| self.within_scoring_distance(&a.position))
                    .count();
                (team.id(), count)
            })
            .collect()
    }

    /// 優勢チームに基づいて1ティック分の状態遷移を行う
    ///
    /// 占領済みのフラッグ、または優勢チームなしの場合は何も変化しません。
    ///
    /// # 引数
    ///
    /// * `leader` - このティックの優勢チーム（`leading_team` の結果）
    /// * `time_to_score` - 占領に必要な連続優勢ティック数
    ///
    /// # 戻り値
    ///
    /// 状態が変化した場合はその遷移イベント、変化しなかった場合は `None`
    pub fn advance(&mut self, leader: Option<TeamId>, time_to_score: u32) -> Option<FlagEvent> {
        if self.is_captured() {
            return None;
        }
        let leader = leader?;

        let (count, event) = match self.state {
            FlagState::Contesting { team, count } if team == leader => {
                (count + 1, FlagEvent::ContestProgressed { team, count: count + 1 })
            }
            _ => (1, FlagEvent::ContestStarted { team: leader }),
        };

        if count >= time_to_score {
            self.state = FlagState::Captured { team: leader, count };
            Some(FlagEvent::Captured { team: leader })
        } else {
            self.state = FlagState::Contesting { team: leader, count };
            Some(event)
        }
    }

    /// 状態の整合性を検証
    pub fn check_invariants(&self, time_to_score: u32) -> Result<(), String> {
        match self.state {
            FlagState::Free => Ok(()),
            FlagState::Contesting { team, count } => {
                if count == 0 || count >= time_to_score {
                    Err(format!(
                        "contesting flag at ({}, {}) has count {} for {} (time_to_score {})",
                        self.position.x, self.position.y, count, team, time_to_score
                    ))
                } else {
                    Ok(())
                }
            }
            FlagState::Captured { team, count } => {
                if count < time_to_score {
                    Err(format!(
                        "captured flag at ({}, {}) has count {} for {} (time_to_score {})",
                        self.position.x, self.position.y, count, team, time_to_score
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// 初期状態（未占領）に戻す。位置は保持
    pub fn reset(&mut self) {
        self.state = FlagState::Free;
    }
}

impl IObservable for Flag {
    type Observation = FlagObservation;

    fn observe(&self) -> FlagObservation {
        FlagObservation {
            x: self.position.x,
            y: self.position.y,
            team: self.captured_by().map_or(UNCLAIMED, |t| i64::from(t.0)),
        }
    }
}

/// 判定半径内のエージェント数が唯一最大（かつ1以上）のチーム
///
/// 最大値で複数チームが並んだ場合はチーム順に依存しないよう、優勢チームなしとします。
pub fn leading_team(counts: &[(TeamId, usize)]) -> Option<TeamId> {
    let max = counts.iter().map(|&(_, c)| c).max().filter(|&m| m > 0)?;
    let mut leaders = counts.iter().filter(|&&(_, c)| c == max);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(*leader)
    }
}
