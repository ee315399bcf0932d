//! # Scenario モジュール
//!
//! YAMLシナリオファイルからWorldの構築パラメータ、チーム、フラッグ、
//! およびエピソード実行設定を読み込みます。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SimError;
use crate::models::{Agent, Flag, Position2D, Team, TeamId};
use crate::world::{World, WorldConfig};

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// エピソード実行設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub max_ticks: u64,
    /// デモ用ドライバが1ティックに動かす最大距離
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    #[serde(default)]
    pub reposition_agents_on_reset: bool,
}

fn default_max_step() -> f64 {
    1.0
}

fn default_time_to_score() -> u32 {
    5
}

/// 世界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldSettings {
    pub height: f64,
    pub width: f64,
    #[serde(default)]
    pub scoring_radius: Option<f64>,
    #[serde(default)]
    pub flag_count: Option<usize>,
    #[serde(default = "default_time_to_score")]
    pub time_to_score: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub orientation: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeamConfig {
    pub id: u32,
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlagConfig {
    pub x: f64,
    pub y: f64,
    /// 省略時はWorldの判定半径
    #[serde(default)]
    pub radius: Option<f64>,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldSettings,
    pub teams: Vec<TeamConfig>,
    /// 省略時はランダム配置
    #[serde(default)]
    pub flags: Option<Vec<FlagConfig>>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::Parse(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の基本的な検証
    ///
    /// World構築時の検証（寸法・半径・フラッグ数）とは別に、
    /// ファイル固有の項目を検証します。
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sim.max_ticks == 0 {
            return Err(ScenarioError::Validation("max_ticks must be positive".to_string()));
        }
        if !(self.sim.max_step.is_finite() && self.sim.max_step > 0.0) {
            return Err(ScenarioError::Validation("max_step must be positive".to_string()));
        }
        if self.teams.is_empty() {
            return Err(ScenarioError::Validation("at least one team is required".to_string()));
        }

        let mut ids = HashSet::new();
        for team in &self.teams {
            if !ids.insert(team.id) {
                return Err(ScenarioError::Validation(format!("duplicate team id {}", team.id)));
            }
            if team.agents.iter().any(|a| !(a.x.is_finite() && a.y.is_finite() && a.orientation.is_finite())) {
                return Err(ScenarioError::Validation(format!(
                    "team {} has an agent with a non-finite position",
                    team.id
                )));
            }
        }

        if let Some(flags) = &self.flags {
            if flags.iter().any(|f| !(f.x.is_finite() && f.y.is_finite())) {
                return Err(ScenarioError::Validation("flag position must be finite".to_string()));
            }
        }

        Ok(())
    }

    /// World構築パラメータに変換
    pub fn to_world_config(&self) -> WorldConfig {
        WorldConfig {
            height: self.world.height,
            width: self.world.width,
            scoring_radius: self.world.scoring_radius,
            flag_count: self.world.flag_count,
            time_to_score: self.world.time_to_score,
            seed: self.sim.seed,
            reposition_agents_on_reset: self.sim.reposition_agents_on_reset,
        }
    }

    pub fn build_teams(&self) -> Vec<Team> {
        self.teams
            .iter()
            .map(|team| {
                let id = TeamId(team.id);
                Team::new(
                    id,
                    team.agents
                        .iter()
                        .map(|a| Agent::new(Position2D::new(a.x, a.y), a.orientation, id)),
                )
            })
            .collect()
    }

    pub fn build_flags(&self) -> Option<Vec<Flag>> {
        let default_radius = self
            .world
            .scoring_radius
            .unwrap_or_else(|| World::default_scoring_radius(self.world.height, self.world.width));

        self.flags.as_ref().map(|flags| {
            flags
                .iter()
                .map(|f| Flag::new(Position2D::new(f.x, f.y), f.radius.unwrap_or(default_radius)))
                .collect()
        })
    }

    /// シナリオからWorldを構築
    pub fn build_world(&self) -> Result<World, SimError> {
        World::new(self.to_world_config(), self.build_teams(), self.build_flags())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("最大ティック: {}", self.sim.max_ticks);
        println!("最大移動量: {:.2}", self.sim.max_step);
        println!("シード値: {}", self.sim.seed);
        println!("リセット時の再配置: {}", self.sim.reposition_agents_on_reset);
        println!();

        println!("=== 世界設定 ===");
        println!("サイズ: {} x {}", self.world.width, self.world.height);
        match self.world.scoring_radius {
            Some(r) => println!("判定半径: {:.3}", r),
            None => println!(
                "判定半径: {:.3} (既定)",
                World::default_scoring_radius(self.world.height, self.world.width)
            ),
        }
        println!("占領ティック数: {}", self.world.time_to_score);
        match &self.flags {
            Some(flags) => println!("フラッグ: {}本 (固定配置)", flags.len()),
            None => println!("フラッグ: ランダム配置"),
        }
        println!();

        println!("=== チーム ===");
        for team in &self.teams {
            println!("  team{}: {}体", team.id, team.agents.len());
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlagState;

    const SCENARIO: &str = r#"
meta:
  version: "1.0"
  name: two-teams
  description: test
sim:
  seed: 7
  max_ticks: 50
world:
  height: 20
  width: 30
  scoring_radius: 2.0
  time_to_score: 3
teams:
  - id: 0
    agents:
      - { x: 1.0, y: 1.0 }
      - { x: 2.0, y: 1.0, orientation: 1.5 }
  - id: 1
    agents:
      - { x: 10.0, y: 10.0 }
flags:
  - { x: 1.0, y: 1.0 }
  - { x: 15.0, y: 15.0, radius: 4.0 }
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = ScenarioConfig::from_yaml(SCENARIO).unwrap();

        assert_eq!(scenario.sim.max_step, 1.0);
        assert!(!scenario.sim.reposition_agents_on_reset);
        assert_eq!(scenario.teams.len(), 2);

        let config = scenario.to_world_config();
        assert_eq!(config.seed, 7);
        assert_eq!(config.time_to_score, 3);
    }

    #[test]
    fn test_build_world() {
        let scenario = ScenarioConfig::from_yaml(SCENARIO).unwrap();
        let world = scenario.build_world().unwrap();

        assert_eq!(world.teams().len(), 2);
        assert_eq!(world.teams()[0].agents()[1].orientation, 1.5);
        assert_eq!(world.flags()[0].scoring_radius, 2.0);
        assert_eq!(world.flags()[1].scoring_radius, 4.0);
        assert!(world.flags().iter().all(|f| f.state() == FlagState::Free));
    }

    #[test]
    fn test_validation_errors() {
        let zero_ticks = SCENARIO.replace("max_ticks: 50", "max_ticks: 0");
        assert!(matches!(
            ScenarioConfig::from_yaml(&zero_ticks),
            Err(ScenarioError::Validation(_))
        ));

        let duplicate = SCENARIO.replace("- id: 1", "- id: 0");
        assert!(matches!(
            ScenarioConfig::from_yaml(&duplicate),
            Err(ScenarioError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ScenarioConfig::from_yaml("meta: [unterminated"),
            Err(ScenarioError::Parse(_, _))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScenarioConfig::from_file("does/not/exist.yaml"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
