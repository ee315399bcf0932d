//! # ctfsim
//!
//! ターン制・複数チームの「キャプチャー・ザ・フラッグ」シミュレーションコアです。
//!
//! 各チームのエージェントが毎ティック移動し、固定されたフラッグの周囲に
//! 滞在し続けることでフラッグを占領します。占領はエピソード中永続します。

pub mod error;
pub mod logging;
pub mod models;
pub mod observation;
pub mod scenario;
pub mod simulation;
pub mod world;

pub use error::{ArityScope, SimError};
pub use models::{Agent, Command, CommandError, Flag, FlagState, RawAction, Team, TeamId};
pub use observation::{AgentObservation, FlagObservation, Observation, StepResult};
pub use world::{MAX_FLAG_COUNT, World, WorldConfig};
