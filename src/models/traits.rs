use crate::models::command::Command;

/// 観測値を生成できるエンティティの基本インターフェース
pub trait IObservable {
    /// 観測値の型
    type Observation;

    /// 副作用なしで現在の観測値を返す
    fn observe(&self) -> Self::Observation;
}

/// コマンドを適用できるエンティティのインターフェース
///
/// 適用は値の置き換えであり、受け手自身は変更されません。
pub trait ICommandable: Sized {
    /// コマンドを適用した新しい値を返す
    fn apply_command(&self, command: &Command) -> Self;
}
