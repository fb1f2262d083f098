//! レンダラー側 Communicator
//!
//! render ページ（iframe の中）で動く。起動時に親ウィンドウへ `RENDERER_READY` を送り、
//! エディタから届く設定・markdown・ダークモードを [`RendererModel`] に反映する。
//!
//! ## 表示の切り替え
//!
//! ```text
//! 親ウィンドウなし        → Placeholder(MissingParent)
//! ?uuid= がない           → Placeholder(MissingIdentity)
//! SET_BASE_CONFIGURATION 前 → Placeholder(AwaitingConfiguration)
//! それ以降               → rendererType に応じた View
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use renderlink_dispatch::{HandlerResult, ReceiveDispatcher, Subscription};
use renderlink_proto::{
    BaseConfiguration, CommunicationMessageType, Message, RendererType, ScrollState, Side, SlideOptions,
};
use renderlink_transport::{ChannelStats, FramePort, InboundEvent, Origin, SendOutcome, TransportChannel};
use serde_json::Value;

use crate::config::RendererConfig;
use crate::error::SessionError;
use crate::identity::CommunicatorIdentity;
use crate::outcome::{send_if_enabled, EventOutcome};
use crate::scroll::ScrollSourceGuard;
use crate::state::CommunicatorState;
use crate::word_count::count_words;

/// 設定ミスのときに render ページに表示する文言
pub const PLACEHOLDER_TEXT: &str =
    "This is the render endpoint. If you can read this text then please check your configuration.";

/// ワードカウントの計算方法（markdown の行 → 語数）
pub type WordCounter = Rc<dyn Fn(&[String]) -> u32>;

/// プレースホルダーを表示している理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderReason {
    /// iframe の中で開かれていない
    MissingParent,
    /// URL に Communicator Identity がない
    MissingIdentity,
    /// エディタからまだ `SET_BASE_CONFIGURATION` が届いていない
    AwaitingConfiguration,
}

/// render ページが表示すべきもの
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererView {
    Placeholder(PlaceholderReason),
    Document,
    Slideshow,
    Motd,
    Intro,
}

impl RendererView {
    fn for_type(renderer_type: RendererType) -> Self {
        match renderer_type {
            RendererType::Document => RendererView::Document,
            RendererType::Slideshow => RendererView::Slideshow,
            RendererType::Motd => RendererView::Motd,
            RendererType::Intro => RendererView::Intro,
        }
    }

    /// スクロール位置を報告する View か
    pub fn reports_scroll(&self) -> bool {
        matches!(self, RendererView::Document)
    }

    /// 高さの変化を報告する View か
    pub fn reports_height(&self) -> bool {
        matches!(self, RendererView::Document | RendererView::Motd | RendererView::Intro)
    }

    /// 最初の見出しを報告する View か
    pub fn reports_first_heading(&self) -> bool {
        matches!(self, RendererView::Document | RendererView::Slideshow)
    }

    /// プレースホルダーなら表示する文言
    pub fn placeholder_text(&self) -> Option<&'static str> {
        match self {
            RendererView::Placeholder(_) => Some(PLACEHOLDER_TEXT),
            _ => None,
        }
    }
}

/// エディタから受け取った状態
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererModel {
    pub base_configuration: Option<BaseConfiguration>,
    pub content: Vec<String>,
    pub dark_mode: bool,
    pub scroll_state: Option<ScrollState>,
    pub slide_options: Option<SlideOptions>,
}

impl RendererModel {
    /// 状態を変えるメッセージなら反映して `true`
    pub fn apply(&mut self, message: &Message) -> bool {
        match message {
            Message::SetBaseConfiguration { base_configuration } => {
                self.base_configuration = Some(base_configuration.clone());
            }
            Message::SetMarkdownContent { content } => self.content = content.clone(),
            Message::SetDarkMode { activated } => self.dark_mode = *activated,
            Message::SetScrollState { scroll_state } => self.scroll_state = Some(*scroll_state),
            Message::SetSlideOptions { slide_options } => {
                self.slide_options = Some(slide_options.clone());
            }
            _ => return false,
        }
        true
    }

    pub fn renderer_type(&self) -> Option<RendererType> {
        self.base_configuration.as_ref().map(|c| c.renderer_type)
    }
}

struct RendererInner<P: FramePort> {
    state: CommunicatorState,
    channel: TransportChannel<P>,
    model: RendererModel,
    scroll: ScrollSourceGuard,
    last_height: Option<f64>,
    last_first_heading: Option<Option<String>>,
}

impl<P: FramePort> RendererInner<P> {
    fn send(&mut self, message: &Message) -> SendOutcome {
        send_if_enabled(self.state, &mut self.channel, message)
    }
}

/// レンダラー側 Communicator
///
/// [`EditorCommunicator`](crate::EditorCommunicator) と同じく `&self` で操作し、
/// ハンドラの中から呼び戻してよい。
pub struct RendererCommunicator<P: FramePort> {
    editor_origin: Origin,
    parent: Option<P>,
    identity: Option<CommunicatorIdentity>,
    dispatcher: ReceiveDispatcher,
    word_counter: RefCell<WordCounter>,
    inner: RefCell<RendererInner<P>>,
}

impl<P: FramePort> RendererCommunicator<P> {
    /// Communicator を生成する
    ///
    /// # 引数
    /// - `parent`: 親ウィンドウ（iframe の中で開かれていなければ `None`）
    /// - `identity`: render ページの URL から取り出した Identity
    ///
    /// # エラー
    /// - `editor_base_url` が解釈できない
    pub fn new(
        config: RendererConfig,
        parent: Option<P>,
        identity: Option<CommunicatorIdentity>,
    ) -> Result<Self, SessionError> {
        let editor_origin = config.editor_origin()?;
        let word_counter: WordCounter = Rc::new(count_words);
        Ok(RendererCommunicator {
            inner: RefCell::new(RendererInner {
                state: CommunicatorState::Uninitialized,
                channel: TransportChannel::new(Side::Renderer, Some(editor_origin.clone())),
                model: RendererModel::default(),
                scroll: ScrollSourceGuard::default(),
                last_height: None,
                last_first_heading: None,
            }),
            editor_origin,
            parent,
            identity,
            dispatcher: ReceiveDispatcher::new(),
            word_counter: RefCell::new(word_counter),
        })
    }

    pub fn identity(&self) -> Option<&CommunicatorIdentity> {
        self.identity.as_ref()
    }

    pub fn editor_origin(&self) -> &Origin {
        &self.editor_origin
    }

    pub fn state(&self) -> CommunicatorState {
        self.inner.borrow().state
    }

    pub fn stats(&self) -> ChannelStats {
        self.inner.borrow().channel.stats()
    }

    pub fn dispatcher(&self) -> &ReceiveDispatcher {
        &self.dispatcher
    }

    pub fn subscribe<F>(&self, tag: CommunicationMessageType, handler: F) -> Subscription
    where
        F: FnMut(&Message) -> HandlerResult + 'static,
    {
        self.dispatcher.subscribe(tag, handler)
    }

    // ===== ライフサイクル =====

    /// 受信リスナーを登録する。実際に登録状態が変わったときだけ `true`。
    pub fn register_event_listener(&self) -> Result<bool, SessionError> {
        let mut inner = self.inner.borrow_mut();
        inner.state = inner.state.on_listen()?;
        Ok(inner.channel.register_listener())
    }

    /// 親ウィンドウを送信先にして通信を有効化し、`RENDERER_READY` を送る
    ///
    /// 親ウィンドウか Identity がなければ何もしない（プレースホルダー表示のまま）。
    pub fn announce_ready(&self) -> Result<SendOutcome, SessionError> {
        let parent = match (&self.parent, &self.identity) {
            (Some(parent), Some(_)) => parent.clone(),
            (None, _) => {
                log::warn!("Renderer is not embedded in a frame");
                return Ok(SendOutcome::NoTarget);
            }
            (_, None) => {
                log::warn!("Renderer was opened without a communicator identity");
                return Ok(SendOutcome::NoTarget);
            }
        };

        let mut inner = self.inner.borrow_mut();
        inner.state = inner.state.on_target_set()?;
        inner.channel.set_target(parent, self.editor_origin.clone());
        inner.state = inner.state.on_enable()?;
        let outcome = inner.send(&Message::RendererReady);
        log::debug!("Announced renderer ready to {}", self.editor_origin);
        Ok(outcome)
    }

    /// リスナー登録とハンドシェイク開始をまとめて行う
    pub fn start(&self) -> Result<SendOutcome, SessionError> {
        self.register_event_listener()?;
        self.announce_ready()
    }

    /// 受信リスナーを解除する（終端）
    pub fn unregister_event_listener(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let changed = inner.channel.unregister_listener();
        inner.channel.clear_target();
        inner.state = inner.state.on_close();
        changed
    }

    // ===== 送受信 =====

    pub fn send_message(&self, message: Message) -> SendOutcome {
        self.inner.borrow_mut().send(&message)
    }

    /// 受信イベントを処理する
    ///
    /// 状態を変えるメッセージはモデルに反映してから購読者に配る。
    /// `GET_WORD_COUNT` にはこの Communicator が返信する。
    pub fn handle_event(&self, event: InboundEvent<P>) -> EventOutcome {
        let message = {
            let mut inner = self.inner.borrow_mut();
            let message = match inner.channel.accept(event) {
                Ok(message) => message,
                Err(reason) => return EventOutcome::Dropped(reason),
            };
            if !inner.state.is_enabled() {
                log::debug!("Dropped {} received before communication was enabled", message.message_type());
                return EventOutcome::NotEnabled(message.message_type());
            }
            inner.model.apply(&message);
            if matches!(message, Message::DisableRendererScrollSource) {
                inner.scroll.disable();
            }
            message
        };

        if matches!(message, Message::GetWordCount) {
            self.answer_word_count();
        }
        EventOutcome::Dispatched(self.dispatcher.dispatch(&message))
    }

    // ===== 表示 =====

    /// 現在表示すべきもの
    pub fn view(&self) -> RendererView {
        if self.parent.is_none() {
            return RendererView::Placeholder(PlaceholderReason::MissingParent);
        }
        if self.identity.is_none() {
            return RendererView::Placeholder(PlaceholderReason::MissingIdentity);
        }
        match self.inner.borrow().model.renderer_type() {
            Some(renderer_type) => RendererView::for_type(renderer_type),
            None => RendererView::Placeholder(PlaceholderReason::AwaitingConfiguration),
        }
    }

    pub fn content(&self) -> Vec<String> {
        self.inner.borrow().model.content.clone()
    }

    pub fn dark_mode(&self) -> bool {
        self.inner.borrow().model.dark_mode
    }

    pub fn base_configuration(&self) -> Option<BaseConfiguration> {
        self.inner.borrow().model.base_configuration.clone()
    }

    // ===== エディタへの報告 =====

    /// 描画後の高さを報告する（変わったときだけ送る）
    ///
    /// 有限でない値は送らない。
    pub fn report_height(&self, height: f64) -> bool {
        if !height.is_finite() {
            log::warn!("Ignored non-finite height {}", height);
            return false;
        }
        if !self.view().reports_height() {
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.last_height == Some(height) {
            return false;
        }
        let delivered = inner.send(&Message::OnHeightChange { height }).is_delivered();
        if delivered {
            inner.last_height = Some(height);
        }
        delivered
    }

    /// 最初の見出しを報告する（変わったときだけ送る）
    pub fn report_first_heading(&self, first_heading: Option<String>) -> bool {
        if !self.view().reports_first_heading() {
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.last_first_heading.as_ref() == Some(&first_heading) {
            return false;
        }
        let delivered = inner
            .send(&Message::OnFirstHeadingChange {
                first_heading: first_heading.clone(),
            })
            .is_delivered();
        if delivered {
            inner.last_first_heading = Some(first_heading);
        }
        delivered
    }

    /// ユーザーが iframe 内をスクロールし始めた
    ///
    /// スクロールソースでなかった場合だけ `ENABLE_RENDERER_SCROLL_SOURCE` を送る。
    pub fn make_scroll_source(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.scroll.is_active() {
            return false;
        }
        let delivered = inner.send(&Message::EnableRendererScrollSource).is_delivered();
        if delivered {
            inner.scroll.enable();
        }
        delivered
    }

    pub fn is_scroll_source(&self) -> bool {
        self.inner.borrow().scroll.is_active()
    }

    /// スクロール位置を報告する。スクロールソースでなければ送らない。
    pub fn report_scroll(&self, scroll_state: ScrollState) -> bool {
        if !scroll_state.scrolled_percentage.is_finite() {
            log::warn!("Ignored non-finite scroll state {:?}", scroll_state);
            return false;
        }
        if !self.view().reports_scroll() {
            return false;
        }
        let mut inner = self.inner.borrow_mut();
        if !inner.scroll.is_active() {
            return false;
        }
        inner.send(&Message::SetScrollState { scroll_state }).is_delivered()
    }

    /// 拡張機能のイベントをエディタに送る
    pub fn emit_extension_event(&self, event_name: &str, payload: Value) -> bool {
        self.inner
            .borrow_mut()
            .send(&Message::ExtensionEvent {
                event_name: event_name.to_string(),
                payload,
            })
            .is_delivered()
    }

    /// `GET_WORD_COUNT` の計算方法を差し替える
    pub fn set_word_counter(&self, counter: WordCounter) {
        *self.word_counter.borrow_mut() = counter;
    }

    // ===== Private メソッド =====

    fn answer_word_count(&self) {
        let content = self.content();
        let counter = self.word_counter.borrow().clone();
        let words = counter(&content);
        self.send_message(Message::OnWordCountCalculated { words });
    }
}
