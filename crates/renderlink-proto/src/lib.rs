//! # renderlink-proto
//!
//! エディタページと iframe 内レンダラーの間で `postMessage` を通してやり取りする
//! メッセージの定義と、構造化データとの相互変換。
//!
//! ## メッセージの役割
//!
//! すべてのメッセージは `type` フィールドを持つ単純なレコードで、
//! `type` の値が閉じた列挙 [`CommunicationMessageType`] のいずれかに一致する。
//! 残りのフィールドはタグごとに固定されている。
//!
//! - 送信側はトランスポートを意識せずに [`Message`] を組み立てる
//! - 受信側は `type` だけを見てディスパッチする
//! - 未知のタグはデコード境界（[`Message::from_value`]）で拒否する
//!
//! ## 通信方向
//!
//! 送信できるタグは方向ごとに決まっている（[`CommunicationMessageType::sent_by`]）。
//! `SET_SCROLL_STATE` のみ両方向で使う。

#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod error;
pub mod message;
pub mod payload;

pub use error::ProtoError;
pub use message::{CommunicationMessageType, Message};
pub use payload::{BaseConfiguration, RendererType, ScrollState, SlideOptions};

/// 通信路のどちら側か
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// エディタページ（iframe の親）
    Editor,
    /// iframe 内のレンダラーページ
    Renderer,
}

impl Side {
    /// 相手側
    pub fn peer(&self) -> Side {
        match self {
            Side::Editor => Side::Renderer,
            Side::Renderer => Side::Editor,
        }
    }
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Side::Editor => write!(f, "editor"),
            Side::Renderer => write!(f, "renderer"),
        }
    }
}
