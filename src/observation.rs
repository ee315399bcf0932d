//! # Observation モジュール
//!
//! Worldから外部ドライバへ渡す読み取り専用スナップショットを定義します。
//!
//! 観測値の形は `(agentObs*, flagObs*, tick)` で、エージェントとフラッグの順序は
//! それぞれチーム・フラッグの構築順に一致し、エピソード中は安定しています。

use serde::Serialize;

use crate::models::TeamId;

/// 未占領フラッグのチーム値
pub const UNCLAIMED: i64 = -1;

/// エージェントの観測値 `(x, y, orientation, team)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentObservation {
    pub x: f64,
    pub y: f64,
    pub orientation: f64,
    pub team: TeamId,
}

impl AgentObservation {
    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.orientation, f64::from(self.team.0)]
    }
}

/// フラッグの観測値 `(x, y, teamIdOrMinusOne)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlagObservation {
    pub x: f64,
    pub y: f64,
    /// 占領チームのID。未占領の場合は -1
    pub team: i64,
}

impl FlagObservation {
    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.team as f64]
    }

    pub fn is_claimed(&self) -> bool {
        self.team != UNCLAIMED
    }
}

/// World全体の観測値
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub agents: Vec<AgentObservation>,
    pub flags: Vec<FlagObservation>,
    pub tick: u64,
}

impl Observation {
    /// 方策ネットワーク入力用の平坦なベクトルに変換
    ///
    /// エージェント4要素ずつ、フラッグ3要素ずつ、最後にティック値。
    pub fn flatten(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.agents.len() * 4 + self.flags.len() * 3 + 1);
        for agent in &self.agents {
            flat.extend_from_slice(&agent.to_array());
        }
        for flag in &self.flags {
            flat.extend_from_slice(&flag.to_array());
        }
        flat.push(self.tick as f64);
        flat
    }
}

/// `World::step` の戻り値
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub observation: Observation,
    /// チームごとの報酬（そのチームが占領済みのフラッグ数）。チーム順
    pub reward: Vec<u32>,
    pub tick: u64,
}
