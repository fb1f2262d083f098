//! # renderlink-dispatch
//!
//! 受信メッセージをタグごとの購読者に配るディスパッチャ。
//!
//! ## 役割
//!
//! ```text
//! TransportChannel::accept() → Message
//!   → Communicator（Enabled 状態のときだけ）
//!   → ReceiveDispatcher::dispatch(&message)
//!   → message.type に登録されたハンドラを登録順に呼ぶ
//! ```
//!
//! - 1 つのタグに複数のハンドラを登録できる
//! - ハンドラの失敗は他のハンドラに影響しない（ログに残して続行）
//! - 登録・解除はハンドラの中を含めいつでも行える
//!
//! 「有効化前のメッセージは捨てる」ゲートは Communicator 側の状態機械が担当し、
//! このクレートは関知しない。

#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod error;
pub mod registry;

pub use error::HandlerError;
pub use registry::{DispatchReport, HandlerResult, ReceiveDispatcher, Subscription};
