/// 共有モジュール
///
/// 複数の機能モジュールから使用されるエラー型・設定・通信層を提供します。
pub mod api_client;
pub mod backend;
pub mod config;
pub mod errors;

#[cfg(test)]
pub mod testing;

pub use api_client::ApiClient;
pub use backend::ExpenseBackend;
pub use errors::{AppError, AppResult, ErrorSeverity};
