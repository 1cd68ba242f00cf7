//! Ports - 抽象化レイヤー
//!
//! キューが外部に求める能力を trait として定義します。
//! 実装（ファイル・DB・HTTP 送信など）は host 側、または `impls` に置きます。
//!
//! # 所有関係
//! - キューはこれらを `Arc<dyn ...>` で参照するだけ（所有者は host）
//! - 1 つのキューがこれらを自分自身と並行に呼ぶことはない

pub mod persister;
pub mod processor;
pub mod retry_strategy;

pub use self::persister::JobPersister;
pub use self::processor::JobProcessor;
pub use self::retry_strategy::RetryStrategy;
