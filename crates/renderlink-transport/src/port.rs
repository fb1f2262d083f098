//! 送信先ウィンドウの抽象化
//!
//! ブラウザでは `Window` の `postMessage(message, targetOrigin)` に相当する。
//! WASM 以外（ネイティブのテストやホスト）では [`MemoryPort`] を使う。

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use renderlink_proto::Message;
use serde_json::Value;

use crate::error::TransportError;
use crate::origin::Origin;

/// メッセージの送信先（相手フレームのウィンドウハンドル）
///
/// ## 実装上の約束
///
/// `post_message` は非同期配送であること。呼び出し中に受信側の
/// Communicator を同期的に呼び戻してはならない（ブラウザの `postMessage` と同じ）。
pub trait FramePort: Clone {
    /// `message` を構造化データにして `target_origin` 宛てに送る
    ///
    /// 相手フレームの実際の origin が `target_origin` と異なる場合、
    /// ブラウザと同様にメッセージは黙って配送されない（エラーにはならない）。
    fn post_message(&self, message: &Message, target_origin: &Origin) -> Result<(), TransportError>;

    /// `other` が同じフレーム（ウィンドウ）を指しているか
    fn is_same_frame(&self, other: &Self) -> bool;
}

/// `MemoryPort` に積まれた 1 通
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    /// 構造化クローン後のデータ（受信側の `event.data`）
    pub data: Value,
    /// 送信時に指定された targetOrigin
    pub target_origin: Origin,
}

/// プロセス内のキューでフレームを模倣するポート
///
/// `Clone` は同じフレームを指すハンドルを作る。
/// 送信されたメッセージは受信箱に溜まり、ホストが [`MemoryPort::drain`] で取り出して
/// 相手側の Communicator に渡す。
#[derive(Clone)]
pub struct MemoryPort {
    /// このフレームの実際の origin
    origin: Origin,
    inbox: Rc<RefCell<VecDeque<PostedMessage>>>,
    closed: Rc<Cell<bool>>,
}

impl MemoryPort {
    /// `origin` で動いているフレームを作る
    pub fn new(origin: Origin) -> Self {
        MemoryPort {
            origin,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            closed: Rc::new(Cell::new(false)),
        }
    }

    /// このフレームの origin
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// 受信箱に溜まっているメッセージをすべて取り出す（送信順）
    pub fn drain(&self) -> Vec<PostedMessage> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    /// 受信箱のメッセージ数
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// フレームを閉じる（以降の送信は `PortClosed`）
    pub fn close(&self) {
        self.closed.set(true);
    }

    /// 閉じたフレームを再び開く（再読み込み後のフレーム相当）
    pub fn reopen(&self) {
        self.closed.set(false);
    }
}

impl FramePort for MemoryPort {
    fn post_message(&self, message: &Message, target_origin: &Origin) -> Result<(), TransportError> {
        if self.closed.get() {
            return Err(TransportError::PortClosed);
        }
        let data = message.to_value()?;
        if target_origin != &self.origin {
            // ブラウザは targetOrigin 不一致のメッセージを黙って捨てる
            log::debug!(
                "Message {} for {} not delivered to frame at {}",
                message.message_type(),
                target_origin,
                self.origin
            );
            return Ok(());
        }
        self.inbox.borrow_mut().push_back(PostedMessage {
            data,
            target_origin: target_origin.clone(),
        });
        Ok(())
    }

    fn is_same_frame(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inbox, &other.inbox)
    }
}

impl std::fmt::Debug for MemoryPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPort")
            .field("origin", &self.origin)
            .field("pending", &self.pending())
            .field("closed", &self.closed.get())
            .finish()
    }
}
