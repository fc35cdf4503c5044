/// 機能別モジュール
///
/// 各機能モジュールは、その機能に関連するモデルとサービスを含む自己完結型のユニットです。
pub mod categories;
pub mod preview;
pub mod receipts;
pub mod trips;
