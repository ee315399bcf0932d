use crate::models::{
    command::Command,
    common::{Position2D, TeamId, Vector2D, math_utils},
    traits::{ICommandable, IObservable},
};
use crate::observation::AgentObservation;

/// 移動エージェント
///
/// 位置・向き・所属チームのみを持つ値型です。移動やチーム変更は
/// 常に新しい `Agent` を返し、受け手を変更しません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    /// 現在位置（World境界による制限なし）
    pub position: Position2D,
    /// 向き（ラジアン, [0, 2π)）
    pub orientation: f64,
    /// 所属チーム
    pub team: TeamId,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            position: Position2D::new(0.0, 0.0),
            orientation: 0.0,
            team: TeamId(1),
        }
    }
}

impl Agent {
    pub fn new(position: Position2D, orientation: f64, team: TeamId) -> Self {
        Self {
            position,
            orientation: math_utils::normalize_orientation(orientation),
            team,
        }
    }

    /// 変位ベクトル分移動した新しいエージェントを返す
    ///
    /// 向きは `atan2(dy, dx)` から求めます。ゼロベクトルの場合は
    /// 向きが定まらないため、移動前の向きを保持します。
    pub fn move_by(&self, vector: Vector2D) -> Agent {
        let orientation = vector.heading().unwrap_or(self.orientation);
        self.update_move(self.position + vector, orientation)
    }

    /// 位置と向きを置き換えた新しいエージェントを返す
    pub fn update_move(&self, position: Position2D, orientation: f64) -> Agent {
        Agent {
            position,
            orientation: math_utils::normalize_orientation(orientation),
            ..*self
        }
    }

    /// 所属チームを置き換えた新しいエージェントを返す
    pub fn with_team(&self, team: TeamId) -> Agent {
        Agent { team, ..*self }
    }

    /// 向きの方向を指す三角形の頂点（描画用）
    ///
    /// 先端の頂点から時計回りに3点を返します。`height` を省略すると
    /// `base` と同じ値になります。
    pub fn triangle(&self, base: f64, height: Option<f64>) -> [Position2D; 3] {
        let height = height.unwrap_or(base);
        let (dy, dx) = self.orientation.sin_cos();
        let Position2D { x, y } = self.position;

        let top = Position2D::new(x + dx * 0.5 * height, y + dy * 0.5 * height);
        let base_mid = Position2D::new(x - dx * 0.5 * height, y - dy * 0.5 * height);
        // 向きに垂直な底辺方向
        let (base_dx, base_dy) = (dy * 0.5 * base, -dx * 0.5 * base);

        [
            top,
            Position2D::new(base_mid.x + base_dx, base_mid.y + base_dy),
            Position2D::new(base_mid.x - base_dx, base_mid.y - base_dy),
        ]
    }
}

impl ICommandable for Agent {
    fn apply_command(&self, command: &Command) -> Self {
        match command {
            Command::Move(vector) => self.move_by(*vector),
        }
    }
}

impl IObservable for Agent {
    type Observation = AgentObservation;

    fn observe(&self) -> AgentObservation {
        AgentObservation {
            x: self.position.x,
            y: self.position.y,
            orientation: self.orientation,
            team: self.team,
        }
    }
}
