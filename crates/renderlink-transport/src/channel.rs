//! origin / 送信元フレームでフィルタする送受信チャンネル
//!
//! ## 受信時のフィルタ（上から順に判定）
//! ```text
//! 1. リスナー未登録           → NotListening
//! 2. event.origin 不一致      → OriginMismatch   (送信先確定後は target.origin、それまでは設定上の相手 origin)
//! 3. event.source 不一致      → ForeignSource    (送信先確定後のみ)
//! 4. デコード失敗・未知のタグ → Undecodable
//! 5. 相手側が送らないタグ     → WrongDirection
//! ```
//! どの場合もアプリケーションにはエラーとして上げず、ログに残して捨てる。

use renderlink_proto::{CommunicationMessageType, Message, ProtoError, Side};
use serde_json::Value;

use crate::error::TransportError;
use crate::origin::Origin;
use crate::port::FramePort;

/// 生の受信イベント（ブラウザの `MessageEvent` 相当）
#[derive(Debug, Clone)]
pub struct InboundEvent<P> {
    /// 送信元フレームの origin（`event.origin`）
    pub origin: String,
    /// 送信元フレーム（`event.source`）。不明な場合は `None`。
    pub source: Option<P>,
    /// 構造化データ（`event.data`）
    pub data: Value,
}

/// 送信先（ウィンドウハンドル + origin）
#[derive(Debug, Clone)]
pub struct MessageTarget<P> {
    pub port: P,
    pub origin: Origin,
}

/// `send` の結果
///
/// 送信できなかった場合もエラーにはしない。呼び出し側は確認しなくてよい。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// postMessage に渡した
    Delivered,
    /// 送信先が未設定（ハンドシェイク前）
    NoTarget,
    /// 送信先はあるが Communicator がまだ通信を有効化していない
    NotEnabled,
    /// このチャンネルの側が送るべきでないタグ
    WrongDirection(CommunicationMessageType),
    /// 下位の postMessage が失敗した
    Failed(TransportError),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

/// 受信イベントを捨てた理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NotListening,
    OriginMismatch { expected: Origin, actual: String },
    ForeignSource,
    Undecodable(ProtoError),
    WrongDirection(CommunicationMessageType),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NotListening => write!(f, "listener not registered"),
            DropReason::OriginMismatch { expected, actual } => {
                write!(f, "origin {} does not match {}", actual, expected)
            }
            DropReason::ForeignSource => write!(f, "event source is not the target frame"),
            DropReason::Undecodable(e) => write!(f, "{}", e),
            DropReason::WrongDirection(tag) => write!(f, "{} is not sent by this peer", tag),
        }
    }
}

/// チャンネル統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// postMessage に渡した数
    pub sent: u64,
    /// 送信先未設定・方向違いで送らなかった数
    pub not_sent: u64,
    /// postMessage が失敗した数
    pub failed: u64,
    /// フィルタを通過した受信数
    pub received: u64,
    /// フィルタで捨てた受信数
    pub dropped: u64,
}

/// 送受信チャンネル
///
/// `side` はこのチャンネルを持つ側。受信は `side.peer()` が送るタグだけを通す。
pub struct TransportChannel<P: FramePort> {
    side: Side,
    /// 送信先確定前に受け付ける相手の origin
    peer_origin: Option<Origin>,
    target: Option<MessageTarget<P>>,
    listening: bool,
    stats: ChannelStats,
}

impl<P: FramePort> TransportChannel<P> {
    /// チャンネルを生成する
    ///
    /// # 引数
    /// - `side`: このチャンネルを持つ側
    /// - `peer_origin`: 相手フレームの origin（設定から分かっている場合）。
    ///   `None` の場合、送信先確定前はどの origin からのイベントも受け付ける。
    pub fn new(side: Side, peer_origin: Option<Origin>) -> Self {
        TransportChannel {
            side,
            peer_origin,
            target: None,
            listening: false,
            stats: ChannelStats::default(),
        }
    }

    /// 受信リスナーを登録する
    ///
    /// 実際に状態が変わったときだけ `true` を返す。ホストは `true` のときだけ
    /// ブラウザの `message` リスナーを追加すること（二重登録による重複配送を防ぐ）。
    pub fn register_listener(&mut self) -> bool {
        if self.listening {
            return false;
        }
        self.listening = true;
        true
    }

    /// 受信リスナーを解除する。状態が変わったときだけ `true`。
    pub fn unregister_listener(&mut self) -> bool {
        if !self.listening {
            return false;
        }
        self.listening = false;
        true
    }

    /// 送信先を設定する
    pub fn set_target(&mut self, port: P, origin: Origin) {
        log::debug!("Set message target with origin {}", origin);
        self.target = Some(MessageTarget { port, origin });
    }

    /// 送信先をクリアする
    pub fn clear_target(&mut self) {
        if self.target.take().is_some() {
            log::debug!("Unset message target");
        }
    }

    pub fn target(&self) -> Option<&MessageTarget<P>> {
        self.target.as_ref()
    }

    /// メッセージを送信先に送る
    ///
    /// 送信先が未設定でもエラーにはせず、ログに残して `NoTarget` を返す。
    pub fn send(&mut self, message: &Message) -> SendOutcome {
        let tag = message.message_type();
        if !tag.sent_by(self.side) {
            log::warn!("Refused to send {} from the {} side", tag, self.side);
            self.stats.not_sent += 1;
            return SendOutcome::WrongDirection(tag);
        }

        let target = match &self.target {
            Some(target) => target,
            None => {
                log::warn!("Other side is not set. Message {} was not sent", tag);
                self.stats.not_sent += 1;
                return SendOutcome::NoTarget;
            }
        };

        match target.port.post_message(message, &target.origin) {
            Ok(()) => {
                log::debug!("Sent event {} to {}", tag, target.origin);
                self.stats.sent += 1;
                SendOutcome::Delivered
            }
            Err(e) => {
                log::error!("Sending {} to {} failed: {}", tag, target.origin, e);
                self.stats.failed += 1;
                SendOutcome::Failed(e)
            }
        }
    }

    /// 受信イベントをフィルタしてメッセージにデコードする
    ///
    /// 捨てる場合は理由を返す。理由はログ用で、アプリケーションに上げるものではない。
    pub fn accept(&mut self, event: InboundEvent<P>) -> Result<Message, DropReason> {
        match self.filter(event) {
            Ok(message) => {
                self.stats.received += 1;
                Ok(message)
            }
            Err(reason) => {
                log::debug!("Dropped incoming event: {}", reason);
                self.stats.dropped += 1;
                Err(reason)
            }
        }
    }

    /// 呼び出し側の判断で送らなかったメッセージを統計に数える
    pub fn record_not_sent(&mut self, message: &Message) {
        log::trace!("Counted {} as not sent", message.message_type());
        self.stats.not_sent += 1;
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    // ===== Private メソッド =====

    fn filter(&self, event: InboundEvent<P>) -> Result<Message, DropReason> {
        if !self.listening {
            return Err(DropReason::NotListening);
        }

        let expected = self
            .target
            .as_ref()
            .map(|t| &t.origin)
            .or(self.peer_origin.as_ref());
        if let Some(expected) = expected {
            if !expected.matches(&event.origin) {
                return Err(DropReason::OriginMismatch {
                    expected: expected.clone(),
                    actual: event.origin,
                });
            }
        }

        if let Some(target) = &self.target {
            let same = event
                .source
                .as_ref()
                .map_or(false, |source| target.port.is_same_frame(source));
            if !same {
                return Err(DropReason::ForeignSource);
            }
        }

        let message = Message::from_value(event.data).map_err(DropReason::Undecodable)?;

        let tag = message.message_type();
        if !tag.sent_by(self.side.peer()) {
            return Err(DropReason::WrongDirection(tag));
        }
        Ok(message)
    }
}
