//! # renderlink-transport
//!
//! `window.postMessage` の上に、origin と送信元フレームで受信をフィルタする
//! 送受信チャンネルを作る。
//!
//! ## 構成
//!
//! ```text
//! TransportChannel<P>
//!   ├── Origin          : new URL(...).origin 相当の正規化済み origin
//!   ├── FramePort (P)   : 送信先ウィンドウ（WASM では Window、ネイティブでは MemoryPort）
//!   ├── MessageTarget   : (ポート, origin) の組。ハンドシェイク前は未設定
//!   └── InboundEvent    : 生の受信イベント（origin, source, data）
//! ```
//!
//! ## セキュリティ境界
//!
//! 受信側のフィルタ（[`TransportChannel::accept`]）がメッセージ注入に対する
//! 主な防御線。origin 不一致・未知のタグは例外にせず、ログに残して捨てる。
//! 送信は確定した送信先 origin 宛てにのみ行い、`"*"` は使わない。
//!
//! ## I/O
//!
//! 受信はホストが `MessageEvent` を [`InboundEvent`] に変換して渡す（sans-IO）。
//! 送信は [`FramePort`] 実装を通して行う。

pub mod channel;
pub mod error;
pub mod origin;
pub mod port;

pub use channel::{ChannelStats, DropReason, InboundEvent, MessageTarget, SendOutcome, TransportChannel};
pub use error::TransportError;
pub use origin::Origin;
pub use port::{FramePort, MemoryPort, PostedMessage};
