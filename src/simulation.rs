//! # Simulation モジュール
//!
//! シナリオに基づいて1エピソードを実行するエピソードドライバを提供します。
//!
//! Worldは外部から与えられた行動で状態を進めるだけで、エピソード終了の判断は
//! 持ちません。このモジュールの `SimulationEngine` がドライバとして
//! 毎ティックの行動を生成し、ティック上限との比較で終了を判断します。
//!
//! ## 処理順序
//!
//! 1. **行動生成**: 全エージェントについてランダムウォークの移動行動を生成
//! 2. **World更新**: `World::step` で移動・フラッグ判定・時刻進行
//! 3. **占領記録**: 新たに占領されたフラッグを記録
//! 4. **終了判定**: ティックが `max_ticks` に達したら終了
//!
//! ## 使用例
//!
//! ```rust,no_run
//! use ctfsim::scenario::ScenarioConfig;
//! use ctfsim::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/two_teams.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1)?;
//! let summary = engine.run()?;
//! println!("{:?}", summary.rewards);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::SimError;
use crate::models::{RawAction, TeamId};
use crate::observation::{Observation, StepResult};
use crate::scenario::ScenarioConfig;
use crate::world::World;

/// ドライバ用乱数シードをWorldのシードからずらす値
const DRIVER_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// 占領の記録
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureRecord {
    pub flag: usize,
    pub team: TeamId,
    pub tick: u64,
}

/// チームごとの最終報酬
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamReward {
    pub team: TeamId,
    pub captured: u32,
}

/// エピソード結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub scenario: String,
    pub seed: u64,
    pub ticks: u64,
    pub rewards: Vec<TeamReward>,
    pub captures: Vec<CaptureRecord>,
    pub final_observation: Observation,
}

pub struct SimulationEngine {
    pub world: World,
    pub max_ticks: u64,
    pub max_step: f64,
    pub seed: u64,
    pub step_count: u64,
    pub captures: Vec<CaptureRecord>,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
    driver_rng: ChaCha8Rng,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Result<Self, SimError> {
        let world = scenario.build_world()?;
        let seed = scenario.sim.seed;

        if verbose_level > 0 {
            info!(
                "シミュレーションエンジンを初期化: チーム {}, フラッグ {}",
                world.teams().len(),
                world.flags().len()
            );
        }

        Ok(Self {
            world,
            max_ticks: scenario.sim.max_ticks,
            max_step: scenario.sim.max_step,
            seed,
            step_count: 0,
            captures: Vec::new(),
            scenario_config: scenario,
            verbose_level,
            driver_rng: ChaCha8Rng::seed_from_u64(seed ^ DRIVER_SEED_OFFSET),
        })
    }

    /// エピソードが終了したかどうか
    pub fn is_done(&self) -> bool {
        self.world.tick() >= self.max_ticks
    }

    pub fn run(&mut self) -> Result<EpisodeSummary, SimError> {
        info!("=== エピソード実行開始: {} ===", self.scenario_config.meta.name);

        while !self.is_done() {
            let result = self.step()?;

            if self.verbose_level > 2 {
                trace!("ティック: {} 報酬: {:?}", result.tick, result.reward);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.world.tick() as f64 / self.max_ticks as f64) * 100.0;
                info!("進行状況: {:.1}% ({}/{}ティック)", progress, self.world.tick(), self.max_ticks);
            }
        }

        let summary = self.summary();

        info!("=== エピソード完了 ===");
        info!("総ティック数: {}", summary.ticks);
        for reward in &summary.rewards {
            info!("  {}: 占領 {}本", reward.team, reward.captured);
        }

        Ok(summary)
    }

    /// ドライバの1ティック: 行動生成 → World更新 → 占領記録
    pub fn step(&mut self) -> Result<StepResult, SimError> {
        let actions = self.sample_actions();
        let captured_before: Vec<bool> = self.world.flags().iter().map(|f| f.is_captured()).collect();

        let result = self.world.step(&actions)?;
        self.step_count += 1;

        for (index, (flag, was_captured)) in self.world.flags().iter().zip(captured_before).enumerate() {
            if let (false, Some(team)) = (was_captured, flag.captured_by()) {
                if self.verbose_level > 1 {
                    debug!("占領記録: フラッグ{} {} (ティック {})", index, team, result.tick);
                }
                self.captures.push(CaptureRecord {
                    flag: index,
                    team,
                    tick: result.tick,
                });
            }
        }

        Ok(result)
    }

    /// 全エージェントのランダムウォーク行動（チーム順・エージェント順）
    fn sample_actions(&mut self) -> Vec<Vec<RawAction>> {
        let shape = self.world.action_shape();
        shape
            .into_iter()
            .map(|agents| {
                (0..agents)
                    .map(|_| {
                        let heading = self.driver_rng.gen_range(0.0..TAU);
                        let distance = self.driver_rng.gen_range(0.0..=self.max_step);
                        RawAction::move_by(distance * heading.cos(), distance * heading.sin())
                    })
                    .collect()
            })
            .collect()
    }

    /// 現在までの結果
    pub fn summary(&self) -> EpisodeSummary {
        let rewards = self
            .world
            .teams()
            .iter()
            .zip(self.world.rewards())
            .map(|(team, captured)| TeamReward {
                team: team.id(),
                captured,
            })
            .collect();

        EpisodeSummary {
            scenario: self.scenario_config.meta.name.clone(),
            seed: self.seed,
            ticks: self.world.tick(),
            rewards,
            captures: self.captures.clone(),
            final_observation: self.world.get_observation(),
        }
    }

    /// シードを差し替えたシナリオで新しいエンジンを作成（バッチ実行用）
    pub fn with_seed(scenario: &ScenarioConfig, seed: u64, verbose_level: u8) -> Result<Self, SimError> {
        let mut scenario = scenario.clone();
        scenario.sim.seed = seed;
        Self::new(scenario, verbose_level)
    }
}
