use crate::models::{
    agent::Agent,
    common::{Position2D, TeamId},
    traits::IObservable,
};
use crate::observation::AgentObservation;

/// チーム
///
/// エージェントの順序付きの列を所有します。この順序は行動バッチと
/// エージェントの対応付けに使われるため、常に保持されます。
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    id: TeamId,
    agents: Vec<Agent>,
}

impl Team {
    /// 新しいチームを作成し、全エージェントの所属をこのチームに設定
    pub fn new(id: TeamId, agents: impl IntoIterator<Item = Agent>) -> Self {
        Self {
            id,
            agents: Self::stamp(id, agents),
        }
    }

    /// 先頭エージェントの所属からチームIDを決めて作成（空の場合は 0）
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        let id = agents.first().map(|a| a.team).unwrap_or(TeamId(0));
        Self::new(id, agents)
    }

    fn stamp(id: TeamId, agents: impl IntoIterator<Item = Agent>) -> Vec<Agent> {
        agents.into_iter().map(|a| a.with_team(id)).collect()
    }

    pub fn id(&self) -> TeamId {
        self.id
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// エージェント列を丸ごと置き換える
    pub fn replace_agents(&mut self, agents: impl IntoIterator<Item = Agent>) {
        self.agents = Self::stamp(self.id, agents);
    }

    /// エージェント列を置き換えた新しいチームを返す
    pub fn with_agents(&self, agents: impl IntoIterator<Item = Agent>) -> Team {
        Team::new(self.id, agents)
    }

    /// 描画用の三角形（エージェント順）
    pub fn triangles(&self, base: f64, height: Option<f64>) -> Vec<[Position2D; 3]> {
        self.agents.iter().map(|a| a.triangle(base, height)).collect()
    }
}

impl IObservable for Team {
    type Observation = Vec<AgentObservation>;

    fn observe(&self) -> Vec<AgentObservation> {
        self.agents.iter().map(IObservable::observe).collect()
    }
}
