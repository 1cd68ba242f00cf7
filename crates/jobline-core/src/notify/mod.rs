//! Notify - observer の登録と通知の配送
//!
//! # 学習ポイント
//! - キューは observer を `Weak` でしか持たない。`NotificationToken` を drop
//!   すれば購読解除（明示的な unsubscribe は不要）
//! - 通知は queue ごとに 1 本の dispatcher タスクから順番に配送する。
//!   observer 同士が並行に呼ばれることはない

mod dispatcher;
mod registry;
mod token;

pub(crate) use dispatcher::{Notification, spawn_dispatcher};
pub(crate) use registry::ObserverRegistry;
pub use token::{NotificationToken, ObserverId};
