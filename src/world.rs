//! # World モジュール
//!
//! キャプチャー・ザ・フラッグシミュレーションの中核となるWorldを提供します。
//!
//! Worldは全てのチームとフラッグを排他的に所有し、1ティック分の処理を
//! 以下の順序で実行します。
//!
//! 1. **形状検証**: 行動バッチのチーム数・エージェント数を検証
//! 2. **コマンド変換**: 全ての生の行動をコマンドに変換
//! 3. **移動処理**: ティック開始時点の位置から各エージェントの新しい値を計算し、
//!    チームのエージェント列を丸ごと置き換え
//! 4. **フラッグ判定**: 移動後の位置でスコア処理を実行
//! 5. **時刻進行**: ティックを1進める
//!
//! 1と2の検証が全て成功するまで状態は一切変更されません。失敗時のWorldは
//! 呼び出し前と完全に同一です。
//!
//! ## 使用例
//!
//! ```rust
//! use ctfsim::{RawAction, Team, TeamId, Agent, World, WorldConfig};
//! use ctfsim::models::Position2D;
//!
//! let teams = vec![Team::new(TeamId(0), vec![Agent::new(Position2D::new(1.0, 1.0), 0.0, TeamId(0))])];
//! let mut world = World::new(WorldConfig::default(), teams, None)?;
//!
//! let result = world.step(&[vec![RawAction::move_by(0.5, 0.0)]])?;
//! assert_eq!(result.tick, 1);
//! # Ok::<(), ctfsim::SimError>(())
//! ```

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ArityScope, SimError};
use crate::models::{
    Agent, Command, Flag, FlagEvent, ICommandable, IObservable, Position2D, RawAction, Team,
    TeamId, leading_team, zip_exact,
};
use crate::observation::{Observation, StepResult};

/// 判定半径省略時の係数（面積 × 0.01）
const DEFAULT_RADIUS_FACTOR: f64 = 0.01;

/// フラッグ数省略時の分母係数。重ならなければ領域の約1/10が判定範囲になる（30 ≈ 10π）
const FLAG_DENSITY_DIVISOR: f64 = 30.0;

/// 1つのWorldが持てるフラッグ数の上限
pub const MAX_FLAG_COUNT: usize = 10_000;

/// World構築パラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub height: f64,
    pub width: f64,
    /// 省略時は `height * width * 0.01`
    pub scoring_radius: Option<f64>,
    /// 省略時は `area / (30 * radius²)` の切り捨て
    pub flag_count: Option<usize>,
    /// 占領に必要な連続優勢ティック数
    pub time_to_score: u32,
    /// フラッグ配置・再配置用の乱数シード
    pub seed: u64,
    /// `reset()` でエージェントを再配置するかどうか
    pub reposition_agents_on_reset: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            height: 10.0,
            width: 10.0,
            scoring_radius: None,
            flag_count: None,
            time_to_score: 5,
            seed: 0,
            reposition_agents_on_reset: false,
        }
    }
}

impl WorldConfig {
    pub fn new(height: f64, width: f64) -> Self {
        Self {
            height,
            width,
            ..Self::default()
        }
    }
}

/// シミュレーションWorld
#[derive(Debug, Clone)]
pub struct World {
    height: f64,
    width: f64,
    teams: Vec<Team>,
    flags: Vec<Flag>,
    scoring_radius: f64,
    time_to_score: u32,
    tick: u64,
    reposition_agents_on_reset: bool,
    rng: ChaCha8Rng,
    /// 不変条件違反を検出した場合、その内容
    poisoned: Option<String>,
    /// 再配置で決めたエピソード開始時のエージェント（最初の `step` で破棄）
    episode_start: Option<Vec<Vec<Agent>>>,
}

impl World {
    /// 新しいWorldを作成
    ///
    /// `flags` を省略するとWorldのシード付き乱数でフラッグをランダム配置します。
    ///
    /// # 引数
    ///
    /// * `config` - 領域サイズ・判定半径・フラッグ数・占領ティック数・乱数シード
    /// * `teams` - 参加チーム（この順序が行動バッチと報酬の順序になる）
    /// * `flags` - 固定配置のフラッグ（テストなど決定的な配置が必要な場合）
    ///
    /// # 戻り値
    ///
    /// 構築したWorld。寸法・半径が正でない、`time_to_score` が0、チームIDが重複、
    /// フラッグ数が0または `MAX_FLAG_COUNT` を超える場合は `SimError::Configuration`
    pub fn new(config: WorldConfig, teams: Vec<Team>, flags: Option<Vec<Flag>>) -> Result<Self, SimError> {
        let WorldConfig {
            height,
            width,
            scoring_radius,
            flag_count,
            time_to_score,
            seed,
            reposition_agents_on_reset,
        } = config;

        if !(height.is_finite() && height > 0.0) || !(width.is_finite() && width > 0.0) {
            return Err(SimError::Configuration(format!(
                "world dimensions must be positive: height={}, width={}",
                height, width
            )));
        }

        let scoring_radius = scoring_radius.unwrap_or_else(|| Self::default_scoring_radius(height, width));
        if !(scoring_radius.is_finite() && scoring_radius > 0.0) {
            return Err(SimError::Configuration(format!(
                "scoring radius must be positive: {}",
                scoring_radius
            )));
        }

        if time_to_score == 0 {
            return Err(SimError::Configuration("time_to_score must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = teams.iter().map(Team::id).find(|id| !seen.insert(*id)) {
            return Err(SimError::Configuration(format!("duplicate team id: {}", duplicate)));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        if let Some(count) = flag_count {
            Self::check_flag_count(count)?;
        }

        let flags = match flags {
            Some(flags) => {
                Self::check_flag_count(flags.len())?;
                if let Some(count) = flag_count {
                    if count != flags.len() {
                        return Err(SimError::Configuration(format!(
                            "flag_count {} does not match {} explicit flags",
                            count,
                            flags.len()
                        )));
                    }
                }
                if let Some(bad) = flags
                    .iter()
                    .find(|f| !(f.scoring_radius.is_finite() && f.scoring_radius > 0.0))
                {
                    return Err(SimError::Configuration(format!(
                        "flag scoring radius must be positive: {}",
                        bad.scoring_radius
                    )));
                }
                flags
            }
            None => {
                let count = flag_count
                    .unwrap_or_else(|| Self::default_flag_count(height, width, scoring_radius));
                Self::generate_flags(&mut rng, width, height, count, scoring_radius)?
            }
        };

        if flags.is_empty() {
            return Err(SimError::Configuration("flag count must be positive".to_string()));
        }

        info!(
            "World作成: {}x{}, チーム: {}, フラッグ: {} (半径 {:.3}, 占領ティック {})",
            width,
            height,
            teams.len(),
            flags.len(),
            scoring_radius,
            time_to_score
        );

        Ok(Self {
            height,
            width,
            teams,
            flags,
            scoring_radius,
            time_to_score,
            tick: 0,
            reposition_agents_on_reset,
            rng,
            poisoned: None,
            episode_start: None,
        })
    }

    /// 判定半径の既定値（`height * width * 0.01`）
    pub fn default_scoring_radius(height: f64, width: f64) -> f64 {
        height * width * DEFAULT_RADIUS_FACTOR
    }

    /// フラッグ数の既定値
    ///
    /// 面積を `30 × radius²` で割って切り捨てた値です。半径が極端に小さいと
    /// 巨大な値になることがあり、その場合は `generate_flags` が上限超過として拒否します。
    pub fn default_flag_count(height: f64, width: f64, scoring_radius: f64) -> usize {
        let area = height * width;
        // f64 → usize の変換は飽和するため、無限大も usize::MAX になる
        (area / (FLAG_DENSITY_DIVISOR * scoring_radius * scoring_radius)).floor() as usize
    }

    fn check_flag_count(count: usize) -> Result<(), SimError> {
        if count > MAX_FLAG_COUNT {
            return Err(SimError::Configuration(format!(
                "flag count {} exceeds the limit of {}",
                count, MAX_FLAG_COUNT
            )));
        }
        Ok(())
    }

    /// `[0, width) × [0, height)` に一様分布でフラッグを生成
    ///
    /// # 引数
    ///
    /// * `rng` - 配置に使う乱数生成器
    /// * `width` / `height` - 配置領域のサイズ
    /// * `count` - 生成するフラッグ数（`MAX_FLAG_COUNT` 以下）
    /// * `scoring_radius` - 全フラッグ共通の判定半径
    ///
    /// # 戻り値
    ///
    /// 生成したフラッグ列。件数が上限を超える、領域が空、または半径が正でない
    /// 場合は `SimError::Configuration`
    pub fn generate_flags<R: Rng + ?Sized>(
        rng: &mut R,
        width: f64,
        height: f64,
        count: usize,
        scoring_radius: f64,
    ) -> Result<Vec<Flag>, SimError> {
        Self::check_flag_count(count)?;
        let min = Position2D::new(0.0, 0.0);
        let max = Position2D::new(width, height);
        (0..count)
            .map(|_| Flag::random(&mut *rng, min, max, scoring_radius))
            .collect()
    }

    /// Worldの乱数でフラッグを生成（Worldのフラッグ一覧には追加しない）
    ///
    /// Worldの乱数を進めるため、以降の再配置結果にも影響します。
    pub fn create_flags(&mut self, count: usize, scoring_radius: f64) -> Result<Vec<Flag>, SimError> {
        Self::generate_flags(&mut self.rng, self.width, self.height, count, scoring_radius)
    }

    /// 1ティック進める
    ///
    /// 行動バッチの形状不一致は `SimError::Arity`、変換失敗は
    /// `SimError::InvalidCommand` を返し、その場合Worldは変更されません。
    ///
    /// # 引数
    ///
    /// * `actions` - チーム順・エージェント順に並んだ生の行動
    ///
    /// # 戻り値
    ///
    /// 移動とフラッグ判定後の観測値・チームごとの報酬・進行後のティック
    pub fn step(&mut self, actions: &[Vec<RawAction>]) -> Result<StepResult, SimError> {
        self.ensure_sound()?;

        let commands = self.parse_actions(actions).inspect_err(|e| {
            warn!("ティック {} の行動を拒否: {}", self.tick, e);
        })?;

        // 全エージェントの移動はティック開始時点の位置から計算する
        let moved: Vec<Vec<Agent>> =
            zip_exact(ArityScope::Teams, self.teams.as_slice(), commands.as_slice(), |team, commands| {
                zip_exact(ArityScope::Agents(team.id()), team.agents(), commands.as_slice(), |agent, command| {
                    Ok(agent.apply_command(command))
                })
            })?;

        for (team, agents) in self.teams.iter_mut().zip(moved) {
            team.replace_agents(agents);
        }

        self.score_flags()?;
        self.tick += 1;
        self.episode_start = None;

        let reward = self.rewards();
        debug!("ティック {} 完了, 報酬: {:?}", self.tick, reward);

        Ok(StepResult {
            observation: self.get_observation(),
            reward,
            tick: self.tick,
        })
    }

    /// 行動バッチを検証してコマンドに変換（状態は変更しない）
    fn parse_actions(&self, actions: &[Vec<RawAction>]) -> Result<Vec<Vec<Command>>, SimError> {
        if actions.len() != self.teams.len() {
            return Err(SimError::Arity {
                scope: ArityScope::Teams,
                expected: self.teams.len(),
                actual: actions.len(),
            });
        }

        for (team, team_actions) in self.teams.iter().zip(actions) {
            if team_actions.len() != team.len() {
                return Err(SimError::Arity {
                    scope: ArityScope::Agents(team.id()),
                    expected: team.len(),
                    actual: team_actions.len(),
                });
            }
        }

        self.teams
            .iter()
            .zip(actions)
            .map(|(team, team_actions)| {
                team_actions
                    .iter()
                    .enumerate()
                    .map(|(agent, action)| {
                        Command::from_action(action).map_err(|source| SimError::InvalidCommand {
                            team: team.id(),
                            agent,
                            source,
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// 現在のエージェント位置で全フラッグのスコア処理を行う
    ///
    /// 発生した状態遷移を `(フラッグ番号, イベント)` の列で返します。
    pub fn score_flags(&mut self) -> Result<Vec<(usize, FlagEvent)>, SimError> {
        self.ensure_sound()?;

        let captured_before: Vec<Option<TeamId>> = self.flags.iter().map(Flag::captured_by).collect();
        let mut events = Vec::new();

        for (index, flag) in self.flags.iter_mut().enumerate() {
            if flag.is_captured() {
                continue;
            }

            let counts = flag.presence_counts(&self.teams);
            let leader = leading_team(&counts);

            if let Some(event) = flag.advance(leader, self.time_to_score) {
                match event {
                    FlagEvent::Captured { team } => {
                        info!("フラッグ{} を {} が占領 (ティック {})", index, team, self.tick + 1);
                    }
                    _ => trace!("フラッグ{}: {:?}", index, event),
                }
                events.push((index, event));
            }
        }

        self.verify_invariants(&captured_before)?;
        Ok(events)
    }

    fn verify_invariants(&mut self, captured_before: &[Option<TeamId>]) -> Result<(), SimError> {
        let mut violation = None;

        for (index, (flag, before)) in self.flags.iter().zip(captured_before).enumerate() {
            if let Err(msg) = flag.check_invariants(self.time_to_score) {
                violation = Some(msg);
                break;
            }
            if before.is_some() && flag.captured_by() != *before {
                violation = Some(format!(
                    "flag {} left CAPTURED({:?}) and is now {:?}",
                    index, before, flag.state()
                ));
                break;
            }
        }

        match violation {
            Some(msg) => {
                error!("不変条件違反を検出: {}", msg);
                self.poisoned = Some(msg.clone());
                Err(SimError::InvariantViolation(msg))
            }
            None => Ok(()),
        }
    }

    fn ensure_sound(&self) -> Result<(), SimError> {
        match &self.poisoned {
            Some(msg) => Err(SimError::InvariantViolation(msg.clone())),
            None => Ok(()),
        }
    }

    /// 全フラッグを未占領に戻し、時刻を0にする
    ///
    /// 再配置が有効な場合、エージェントの開始位置はエピソードごとに1回だけ
    /// 抽選します。`step` を挟まずに繰り返し呼んでも同じ開始位置を返します。
    ///
    /// # 戻り値
    ///
    /// リセット後の観測値
    pub fn reset(&mut self) -> Observation {
        for flag in &mut self.flags {
            flag.reset();
        }
        self.tick = 0;

        if self.reposition_agents_on_reset {
            self.reposition_agents();
        }

        info!("Worldをリセット (エージェント再配置: {})", self.reposition_agents_on_reset);
        self.get_observation()
    }

    /// 全エージェントを領域内の一様乱数位置に再配置（向きは保持）
    fn reposition_agents(&mut self) {
        let start = match self.episode_start.take() {
            Some(start) => start,
            None => self.scatter_agents(),
        };

        for (team, agents) in self.teams.iter_mut().zip(&start) {
            team.replace_agents(agents.iter().copied());
        }
        self.episode_start = Some(start);
    }

    fn scatter_agents(&mut self) -> Vec<Vec<Agent>> {
        let (width, height) = (self.width, self.height);
        let rng = &mut self.rng;
        self.teams
            .iter()
            .map(|team| {
                team.agents()
                    .iter()
                    .map(|agent| {
                        let position = Position2D::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
                        agent.update_move(position, agent.orientation)
                    })
                    .collect()
            })
            .collect()
    }

    /// 現在の観測値（状態は変更しない）
    ///
    /// エージェントはチーム順・エージェント順、フラッグは作成順に並びます。
    pub fn get_observation(&self) -> Observation {
        Observation {
            agents: self.teams.iter().flat_map(IObservable::observe).collect(),
            flags: self.flags.iter().map(IObservable::observe).collect(),
            tick: self.tick,
        }
    }

    /// チームごとの占領済みフラッグ数（チーム順）
    ///
    /// 占領は取り消されないため、エピソード中の各値は単調非減少です。
    pub fn rewards(&self) -> Vec<u32> {
        self.teams
            .iter()
            .map(|team| {
                self.flags
                    .iter()
                    .filter(|f| f.captured_by() == Some(team.id()))
                    .count() as u32
            })
            .collect()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn scoring_radius(&self) -> f64 {
        self.scoring_radius
    }

    pub fn time_to_score(&self) -> u32 {
        self.time_to_score
    }

    /// 行動バッチの形状（チームごとのエージェント数）
    pub fn action_shape(&self) -> Vec<usize> {
        self.teams.iter().map(Team::len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommandError, FlagState};

    fn agent(x: f64, y: f64) -> Agent {
        Agent::new(Position2D::new(x, y), 0.0, TeamId(0))
    }

    fn team(id: u32, positions: &[(f64, f64)]) -> Team {
        Team::new(TeamId(id), positions.iter().map(|&(x, y)| agent(x, y)))
    }

    fn stay(world: &World) -> Vec<Vec<RawAction>> {
        world
            .action_shape()
            .into_iter()
            .map(|n| vec![RawAction::move_by(0.0, 0.0); n])
            .collect()
    }

    /// フラッグ (1,1) 半径1.5、チームAの2体が判定範囲内、チームBの2体は遠方
    fn contested_world(time_to_score: u32) -> World {
        let config = WorldConfig {
            time_to_score,
            ..WorldConfig::default()
        };
        World::new(
            config,
            vec![
                team(0, &[(1.0, 1.0), (1.0, 2.0)]),
                team(1, &[(8.0, 8.0), (9.0, 9.0)]),
            ],
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), 1.5)]),
        )
        .unwrap()
    }

    #[test]
    fn test_default_flag_values() {
        let world = World::new(WorldConfig::default(), vec![team(0, &[(0.0, 0.0)])], None).unwrap();

        assert!((world.scoring_radius() - 1.0).abs() < 1e-12);
        assert_eq!(world.flags().len(), 3);
        assert_eq!(world.time_to_score(), 5);
        for flag in world.flags() {
            assert!(flag.position.x >= 0.0 && flag.position.x < 10.0);
            assert!(flag.position.y >= 0.0 && flag.position.y < 10.0);
        }
    }

    #[test]
    fn test_configuration_errors() {
        let teams = || vec![team(0, &[(0.0, 0.0)])];

        let cases = vec![
            WorldConfig::new(0.0, 10.0),
            WorldConfig::new(10.0, -1.0),
            WorldConfig { scoring_radius: Some(0.0), ..WorldConfig::default() },
            WorldConfig { flag_count: Some(0), ..WorldConfig::default() },
            WorldConfig { time_to_score: 0, ..WorldConfig::default() },
            // 既定のフラッグ数が0になる
            WorldConfig { scoring_radius: Some(5.0), ..WorldConfig::default() },
            // 既定のフラッグ数が上限を大きく超える
            WorldConfig { scoring_radius: Some(1e-4), ..WorldConfig::new(100.0, 100.0) },
            WorldConfig { flag_count: Some(MAX_FLAG_COUNT + 1), ..WorldConfig::default() },
        ];

        for config in cases {
            let result = World::new(config.clone(), teams(), None);
            assert!(
                matches!(result, Err(SimError::Configuration(_))),
                "expected configuration error for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_duplicate_team_ids_rejected() {
        let result = World::new(
            WorldConfig::default(),
            vec![team(1, &[(0.0, 0.0)]), team(1, &[(1.0, 1.0)])],
            None,
        );
        assert!(matches!(result, Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_explicit_flags_validated() {
        let empty = World::new(WorldConfig::default(), Vec::new(), Some(Vec::new()));
        assert!(matches!(empty, Err(SimError::Configuration(_))));

        let bad_radius = World::new(
            WorldConfig::default(),
            Vec::new(),
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), -1.0)]),
        );
        assert!(matches!(bad_radius, Err(SimError::Configuration(_))));

        let too_many = World::new(
            WorldConfig::default(),
            Vec::new(),
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), 1.0); MAX_FLAG_COUNT + 1]),
        );
        assert!(matches!(too_many, Err(SimError::Configuration(_))));

        let mismatched = World::new(
            WorldConfig { flag_count: Some(2), ..WorldConfig::default() },
            Vec::new(),
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), 1.0)]),
        );
        assert!(matches!(mismatched, Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_step_advances_tick() {
        let mut world = World::new(WorldConfig::default(), Vec::new(), None).unwrap();
        let result = world.step(&[]).unwrap();
        assert_eq!(result.tick, 1);
        assert_eq!(world.tick(), 1);
        assert!(result.reward.is_empty());
    }

    #[test]
    fn test_step_moves_agents() {
        let mut world = contested_world(5);
        let actions = vec![
            vec![RawAction::move_by(1.0, 0.0), RawAction::move_by(0.0, 0.0)],
            vec![RawAction::move_by(-1.0, -1.0), RawAction::move_by(0.0, 2.0)],
        ];

        let result = world.step(&actions).unwrap();
        let positions: Vec<(f64, f64)> = result.observation.agents.iter().map(|a| (a.x, a.y)).collect();

        assert_eq!(positions, vec![(2.0, 1.0), (1.0, 2.0), (7.0, 7.0), (9.0, 11.0)]);
        assert_eq!(result.observation.agents[2].team, TeamId(1));
    }

    #[test]
    fn test_score_flags_single_pass() {
        let mut world = contested_world(5);
        world.score_flags().unwrap();

        let flag = &world.flags()[0];
        assert_eq!(flag.state(), FlagState::Contesting { team: TeamId(0), count: 1 });
        assert_eq!(flag.scoring_team(), Some(TeamId(0)));
        assert_eq!(flag.scoring_count(), 1);
    }

    #[test]
    fn test_score_flags_switches_team() {
        let mut world = World::new(
            WorldConfig::default(),
            vec![
                team(0, &[(1.0, 1.0), (1.0, 2.0)]),
                team(1, &[(1.0, 1.0), (4.0, 4.0)]),
            ],
            Some(vec![
                Flag::new(Position2D::new(1.0, 1.0), 1.5),
                Flag::new(Position2D::new(4.0, 4.0), 0.5),
            ]),
        )
        .unwrap();
        world.flags[1].state = FlagState::Contesting { team: TeamId(0), count: 2 };

        world.score_flags().unwrap();

        assert_eq!(world.flags()[0].scoring_team(), Some(TeamId(0)));
        assert_eq!(world.flags()[0].scoring_count(), 1);
        assert_eq!(world.flags()[1].scoring_team(), Some(TeamId(1)));
        assert_eq!(world.flags()[1].scoring_count(), 1);
    }

    #[test]
    fn test_capture_credited_once() {
        let mut world = contested_world(5);

        for tick in 1..=4 {
            let result = world.step(&stay(&world)).unwrap();
            assert_eq!(result.reward, vec![0, 0], "tick {}", tick);
            assert!(!world.flags()[0].is_captured());
        }

        let result = world.step(&stay(&world)).unwrap();
        assert_eq!(result.reward, vec![1, 0]);
        assert_eq!(world.flags()[0].captured_by(), Some(TeamId(0)));
        assert_eq!(result.observation.flags[0].team, 0);

        for _ in 0..3 {
            let result = world.step(&stay(&world)).unwrap();
            assert_eq!(result.reward, vec![1, 0]);
        }
    }

    #[test]
    fn test_capture_is_permanent() {
        let mut world = contested_world(2);
        world.step(&stay(&world)).unwrap();
        world.step(&stay(&world)).unwrap();
        assert_eq!(world.flags()[0].captured_by(), Some(TeamId(0)));

        // チームAは離脱し、チームBが占拠する
        let actions = vec![
            vec![RawAction::move_by(8.0, 8.0), RawAction::move_by(8.0, 7.0)],
            vec![RawAction::move_by(-7.0, -7.0), RawAction::move_by(-8.0, -8.0)],
        ];
        world.step(&actions).unwrap();
        for _ in 0..5 {
            world.step(&stay(&world)).unwrap();
        }

        assert_eq!(world.flags()[0].captured_by(), Some(TeamId(0)));
        assert_eq!(world.rewards(), vec![1, 0]);
    }

    #[test]
    fn test_tie_gives_no_credit() {
        let mut world = World::new(
            WorldConfig::default(),
            vec![team(0, &[(1.0, 1.0)]), team(1, &[(1.5, 1.0)])],
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), 1.5)]),
        )
        .unwrap();
        world.flags[0].state = FlagState::Contesting { team: TeamId(0), count: 2 };

        world.step(&stay(&world)).unwrap();
        world.step(&stay(&world)).unwrap();

        assert_eq!(world.flags()[0].state(), FlagState::Contesting { team: TeamId(0), count: 2 });
    }

    #[test]
    fn test_team_arity_mismatch_leaves_world_unchanged() {
        let mut world = contested_world(5);
        world.step(&stay(&world)).unwrap();
        let before_obs = world.get_observation();
        let before_flags = world.flags().to_vec();

        let actions = vec![
            vec![RawAction::move_by(1.0, 1.0)],
            vec![RawAction::move_by(1.0, 1.0), RawAction::move_by(1.0, 1.0)],
        ];
        let result = world.step(&actions);

        assert_eq!(
            result,
            Err(SimError::Arity {
                scope: ArityScope::Agents(TeamId(0)),
                expected: 2,
                actual: 1,
            })
        );
        assert_eq!(world.get_observation(), before_obs);
        assert_eq!(world.flags(), &before_flags[..]);
        assert_eq!(world.tick(), 1);
    }

    #[test]
    fn test_outer_arity_mismatch() {
        let mut world = contested_world(5);
        let before = world.get_observation();

        let result = world.step(&[vec![RawAction::move_by(0.0, 0.0); 2]]);

        assert_eq!(
            result,
            Err(SimError::Arity { scope: ArityScope::Teams, expected: 2, actual: 1 })
        );
        assert_eq!(world.get_observation(), before);
    }

    #[test]
    fn test_invalid_command_is_atomic() {
        let mut world = contested_world(5);
        let before = world.get_observation();

        let actions = vec![
            vec![RawAction::move_by(1.0, 0.0), RawAction::move_by(1.0, 0.0)],
            vec![RawAction::move_by(1.0, 0.0), RawAction::new(3, vec![1.0, 0.0])],
        ];
        let result = world.step(&actions);

        assert_eq!(
            result,
            Err(SimError::InvalidCommand {
                team: TeamId(1),
                agent: 1,
                source: CommandError::UnknownKind(3),
            })
        );
        assert!(result.unwrap_err().is_recoverable());
        assert_eq!(world.get_observation(), before);
        assert_eq!(world.flags()[0].state(), FlagState::Free);
    }

    #[test]
    fn test_reset() {
        let mut world = contested_world(2);
        world.step(&stay(&world)).unwrap();
        world.step(&stay(&world)).unwrap();
        assert!(world.flags()[0].is_captured());

        let observation = world.reset();

        assert_eq!(world.tick(), 0);
        assert_eq!(observation.tick, 0);
        assert!(world.flags().iter().all(|f| f.state() == FlagState::Free));
        assert_eq!(world.flags()[0].position, Position2D::new(1.0, 1.0));
        assert_eq!(world.rewards(), vec![0, 0]);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut world = contested_world(3);
        for _ in 0..4 {
            world.step(&stay(&world)).unwrap();
        }

        let first = world.reset();
        let second = world.reset();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_keeps_agent_positions_by_default() {
        let mut world = contested_world(5);
        let actions = vec![
            vec![RawAction::move_by(1.0, 0.0), RawAction::move_by(1.0, 0.0)],
            vec![RawAction::move_by(0.0, 0.0), RawAction::move_by(0.0, 0.0)],
        ];
        world.step(&actions).unwrap();
        let moved = world.get_observation().agents;

        let observation = world.reset();
        assert_eq!(observation.agents, moved);
    }

    #[test]
    fn test_reset_repositions_agents_when_enabled() {
        let config = WorldConfig {
            reposition_agents_on_reset: true,
            seed: 11,
            ..WorldConfig::new(50.0, 40.0)
        };
        let mut world = World::new(
            config,
            vec![team(0, &[(-100.0, -100.0), (-100.0, -100.0)]), team(1, &[(-100.0, -100.0)])],
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), 1.0)]),
        )
        .unwrap();

        let observation = world.reset();

        assert_eq!(observation.agents.len(), 3);
        for agent in &observation.agents {
            assert!(agent.x >= 0.0 && agent.x < 40.0);
            assert!(agent.y >= 0.0 && agent.y < 50.0);
        }
        assert_eq!(observation.agents[2].team, TeamId(1));
    }

    fn repositioning_world() -> World {
        let config = WorldConfig {
            reposition_agents_on_reset: true,
            seed: 11,
            ..WorldConfig::new(50.0, 40.0)
        };
        World::new(
            config,
            vec![team(0, &[(1.0, 1.0)]), team(1, &[(2.0, 2.0)])],
            Some(vec![Flag::new(Position2D::new(1.0, 1.0), 1.0)]),
        )
        .unwrap()
    }

    #[test]
    fn test_reset_with_reposition_is_idempotent() {
        let mut world = repositioning_world();

        let first = world.reset();
        let second = world.reset();
        assert_eq!(first, second);

        world.step(&stay(&world)).unwrap();
        let third = world.reset();
        assert_eq!(third, world.reset());
        assert_eq!(third.tick, 0);
    }

    #[test]
    fn test_reset_with_reposition_draws_new_start_each_episode() {
        let mut world = repositioning_world();
        let first = world.reset();

        world.step(&stay(&world)).unwrap();
        let next = world.reset();

        assert_ne!(first.agents, next.agents);
        for agent in &next.agents {
            assert!(agent.x >= 0.0 && agent.x < 40.0);
            assert!(agent.y >= 0.0 && agent.y < 50.0);
        }
    }

    #[test]
    fn test_determinism() {
        fn run(seed: u64) -> Vec<StepResult> {
            let config = WorldConfig {
                seed,
                scoring_radius: Some(2.0),
                ..WorldConfig::new(20.0, 20.0)
            };
            let mut world = World::new(
                config,
                vec![team(0, &[(5.0, 5.0), (6.0, 6.0)]), team(1, &[(15.0, 15.0)])],
                None,
            )
            .unwrap();

            let mut driver = ChaCha8Rng::seed_from_u64(99);
            (0..30)
                .map(|_| {
                    let actions: Vec<Vec<RawAction>> = world
                        .action_shape()
                        .into_iter()
                        .map(|n| {
                            (0..n)
                                .map(|_| {
                                    RawAction::move_by(driver.gen_range(-1.0..1.0), driver.gen_range(-1.0..1.0))
                                })
                                .collect()
                        })
                        .collect();
                    world.step(&actions).unwrap()
                })
                .collect()
        }

        assert_eq!(run(3), run(3));
    }

    #[test]
    fn test_reward_is_monotonic() {
        let config = WorldConfig {
            time_to_score: 2,
            seed: 5,
            scoring_radius: Some(3.0),
            flag_count: Some(4),
            ..WorldConfig::new(20.0, 20.0)
        };
        let mut world = World::new(
            config,
            vec![team(0, &[(10.0, 10.0); 3]), team(1, &[(10.0, 10.0); 2])],
            None,
        )
        .unwrap();

        let mut driver = ChaCha8Rng::seed_from_u64(1);
        let mut previous = world.rewards();
        for _ in 0..200 {
            let actions: Vec<Vec<RawAction>> = world
                .action_shape()
                .into_iter()
                .map(|n| {
                    (0..n)
                        .map(|_| RawAction::move_by(driver.gen_range(-2.0..2.0), driver.gen_range(-2.0..2.0)))
                        .collect()
                })
                .collect();
            let result = world.step(&actions).unwrap();
            for (now, before) in result.reward.iter().zip(&previous) {
                assert!(now >= before);
            }
            previous = result.reward;
        }
    }

    #[test]
    fn test_invariant_violation_is_fatal() {
        let mut world = contested_world(5);
        world.flags[0].state = FlagState::Captured { team: TeamId(1), count: 1 };

        let first = world.step(&stay(&world));
        assert!(matches!(first, Err(SimError::InvariantViolation(_))));
        assert!(!first.unwrap_err().is_recoverable());

        let second = world.step(&stay(&world));
        assert!(matches!(second, Err(SimError::InvariantViolation(_))));
    }

    #[test]
    fn test_observation_order() {
        let world = contested_world(5);
        let observation = world.get_observation();

        assert_eq!(observation.agents.len(), 4);
        assert_eq!(observation.flags.len(), 1);
        assert_eq!((observation.agents[0].x, observation.agents[0].y), (1.0, 1.0));
        assert_eq!((observation.agents[3].x, observation.agents[3].y), (9.0, 9.0));
        assert_eq!(observation.flags[0].team, -1);
        assert_eq!(observation.tick, 0);
    }

    #[test]
    fn test_create_flags_does_not_touch_world() {
        let mut world = contested_world(5);
        let flags = world.create_flags(4, 2.0).unwrap();

        assert_eq!(flags.len(), 4);
        assert!(flags.iter().all(|f| f.scoring_radius == 2.0));
        assert_eq!(world.flags().len(), 1);
    }

    #[test]
    fn test_create_flags_rejects_bad_arguments() {
        let mut world = contested_world(5);

        assert!(matches!(world.create_flags(2, 0.0), Err(SimError::Configuration(_))));
        assert!(matches!(world.create_flags(2, -1.0), Err(SimError::Configuration(_))));
        assert!(matches!(
            world.create_flags(MAX_FLAG_COUNT + 1, 1.0),
            Err(SimError::Configuration(_))
        ));
        assert!(world.create_flags(0, 1.0).unwrap().is_empty());
    }
}
