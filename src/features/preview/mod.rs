/// 精算プレビュー機能モジュール
///
/// サーバーが計算したプレビューの整形と、書類生成の可否判定を提供します。
pub mod aggregator;
pub mod generation;
pub mod models;

pub use aggregator::{
    format_rub, BalanceKind, BalanceLine, CategoryLine, PerDiemLine, PreviewAggregator,
    PreviewDisplay, RenderedPreview,
};
pub use generation::GenerationGate;
pub use models::{GenerateResponse, PreviewPayload};
