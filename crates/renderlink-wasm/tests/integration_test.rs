//! renderlink 統合テスト
//!
//! エディタ側とレンダラー側の Communicator を MemoryPort でつなぎ、
//! ハンドシェイクからメッセージ配送までのパイプライン全体をテストする。
//! ブラウザは不要（postMessage の配送はテスト側のポンプで行う）。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;

use renderlink_dispatch::HandlerResult;
use renderlink_proto::{
    BaseConfiguration, CommunicationMessageType as T, Message, RendererType, ScrollState, Side, SlideOptions,
};
use renderlink_session::{
    CommunicatorIdentity, CommunicatorState, EditorCommunicator, EditorConfig, EventOutcome, RendererCommunicator,
    RendererConfig, RendererView,
};
use renderlink_transport::{InboundEvent, MemoryPort, Origin};

const EDITOR_BASE: &str = "https://md.example.com/n/features";
const EDITOR_ORIGIN: &str = "https://md.example.com";
const RENDERER_BASE: &str = "https://render.example.com/";
const RENDERER_ORIGIN: &str = "https://render.example.com";

// ==============================================================
// ヘルパー: 2 つのフレームとポンプ
// ==============================================================

/// エディタページ + iframe 内の render ページ
struct Pipeline {
    editor: Rc<EditorCommunicator<MemoryPort>>,
    renderer: Rc<RendererCommunicator<MemoryPort>>,
    /// iframe のウィンドウ（エディタが送る先）
    frame: MemoryPort,
    /// エディタのウィンドウ（レンダラーが送る先）
    parent: MemoryPort,
}

impl Pipeline {
    /// 両側を生成する。レンダラーはまだ起動しない。
    fn new(adapt_frame_height: bool) -> Self {
        let identity = CommunicatorIdentity::from_random_bytes([9; 16]);
        let config = EditorConfig::new(EDITOR_BASE, RENDERER_BASE).with_adapt_frame_height(adapt_frame_height);
        let editor = EditorCommunicator::new(config, identity).unwrap();

        let frame = MemoryPort::new(Origin::parse(RENDERER_BASE).unwrap());
        let parent = MemoryPort::new(Origin::parse(EDITOR_BASE).unwrap());

        // render ページは自分の URL から Identity を読む
        let identity = CommunicatorIdentity::from_render_page_url(editor.render_page_url());
        assert!(identity.is_some(), "render ページの URL から Identity が取れること");
        let renderer =
            RendererCommunicator::new(RendererConfig::new("https://md.example.com/"), Some(parent.clone()), identity)
                .unwrap();

        editor.register_event_listener().unwrap();
        editor.attach_frame(frame.clone());

        Pipeline {
            editor: Rc::new(editor),
            renderer: Rc::new(renderer),
            frame,
            parent,
        }
    }

    /// ハンドシェイクまで済ませる
    fn connected(adapt_frame_height: bool) -> Self {
        let pipeline = Pipeline::new(adapt_frame_height);
        pipeline.renderer.start().unwrap();
        pipeline.pump();
        assert!(pipeline.editor.is_renderer_ready(), "ハンドシェイクが完了すること");
        pipeline
    }

    /// 両方向の受信箱が空になるまで配送する
    fn pump(&self) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let to_editor = self.parent.drain();
            let to_renderer = self.frame.drain();
            if to_editor.is_empty() && to_renderer.is_empty() {
                return outcomes;
            }
            for posted in to_editor {
                outcomes.push(self.editor.handle_event(InboundEvent {
                    origin: RENDERER_ORIGIN.to_string(),
                    source: Some(self.frame.clone()),
                    data: posted.data,
                }));
            }
            for posted in to_renderer {
                outcomes.push(self.renderer.handle_event(InboundEvent {
                    origin: EDITOR_ORIGIN.to_string(),
                    source: Some(self.parent.clone()),
                    data: posted.data,
                }));
            }
        }
    }

    /// エディタ側でタグの受信回数を数える
    fn count_on_editor(&self, tag: T) -> Rc<Cell<usize>> {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        self.editor.subscribe(tag, move |_| {
            h.set(h.get() + 1);
            Ok(())
        });
        hits
    }

    /// レンダラー側でタグの受信回数を数える
    fn count_on_renderer(&self, tag: T) -> Rc<Cell<usize>> {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        self.renderer.subscribe(tag, move |_| {
            h.set(h.get() + 1);
            Ok(())
        });
        hits
    }
}

/// タグごとの代表的なメッセージ
fn sample(tag: T) -> Message {
    match tag {
        T::SetBaseConfiguration => Message::SetBaseConfiguration {
            base_configuration: BaseConfiguration {
                base_url: "https://md.example.com/".to_string(),
                renderer_type: RendererType::Intro,
            },
        },
        T::SetMarkdownContent => Message::SetMarkdownContent {
            content: vec!["# Title".to_string(), String::new(), "body".to_string()],
        },
        T::SetDarkMode => Message::SetDarkMode { activated: true },
        T::SetScrollState => Message::SetScrollState {
            scroll_state: ScrollState::new(12, 37.5),
        },
        T::EnableRendererScrollSource => Message::EnableRendererScrollSource,
        T::DisableRendererScrollSource => Message::DisableRendererScrollSource,
        T::OnHeightChange => Message::OnHeightChange { height: 480.0 },
        T::OnFirstHeadingChange => Message::OnFirstHeadingChange {
            first_heading: Some("Features".to_string()),
        },
        T::RendererReady => Message::RendererReady,
        T::GetWordCount => Message::GetWordCount,
        T::OnWordCountCalculated => Message::OnWordCountCalculated { words: 1234 },
        T::ExtensionEvent => Message::ExtensionEvent {
            event_name: "vega.render".to_string(),
            payload: json!({ "ok": true, "size": [1, 2] }),
        },
        T::SetSlideOptions => Message::SetSlideOptions {
            slide_options: SlideOptions {
                transition: Some("zoom".to_string()),
                slide_number: Some(true),
                ..SlideOptions::default()
            },
        },
    }
}

// ==============================================================
// メッセージ単体
// ==============================================================

#[test]
fn test_every_tag_reaches_the_peer_handler() {
    for side in [Side::Editor, Side::Renderer] {
        for tag in T::ALL.into_iter().filter(|t| t.sent_by(side)) {
            let pipeline = Pipeline::connected(false);
            let message = sample(tag);
            let received = Rc::new(RefCell::new(Vec::new()));
            let r = received.clone();
            let record = move |m: &Message| -> HandlerResult {
                r.borrow_mut().push(m.clone());
                Ok(())
            };

            let outcome = match side {
                Side::Editor => {
                    pipeline.renderer.subscribe(tag, record);
                    pipeline.editor.send_message(message.clone())
                }
                Side::Renderer => {
                    pipeline.editor.subscribe(tag, record);
                    pipeline.renderer.send_message(message.clone())
                }
            };
            assert!(outcome.is_delivered(), "{} ({}) が送信されること: {:?}", tag, side, outcome);

            pipeline.pump();
            assert_eq!(
                *received.borrow(),
                vec![message],
                "{} ({}) が相手側のハンドラに同じ値で届くこと",
                tag,
                side
            );
        }
    }
}

// ==============================================================
// ハンドシェイク
// ==============================================================

#[test]
fn test_handshake_configures_renderer() {
    let pipeline = Pipeline::new(false);
    assert_eq!(
        pipeline.renderer.view(),
        RendererView::Placeholder(renderlink_session::PlaceholderReason::AwaitingConfiguration)
    );

    pipeline.renderer.start().unwrap();
    let outcomes = pipeline.pump();
    assert!(matches!(outcomes[0], EventOutcome::HandshakeCompleted(_)));

    assert_eq!(pipeline.editor.state(), CommunicatorState::Enabled);
    assert_eq!(pipeline.renderer.state(), CommunicatorState::Enabled);
    assert_eq!(pipeline.renderer.view(), RendererView::Document);
    assert_eq!(
        pipeline.renderer.base_configuration().unwrap().base_url,
        EDITOR_BASE,
        "baseUrl はエディタのベース URL"
    );
}

#[test]
fn test_base_configuration_sent_once_per_handshake() {
    let pipeline = Pipeline::new(false);
    let configured = pipeline.count_on_renderer(T::SetBaseConfiguration);
    pipeline.renderer.start().unwrap();
    pipeline.pump();
    pipeline.editor.set_markdown_content(vec!["a".to_string()]);
    pipeline.editor.set_dark_mode(true);
    pipeline.pump();
    assert_eq!(configured.get(), 1);
}

#[test]
fn test_renderer_ready_dispatched_after_configuration_sent() {
    let pipeline = Pipeline::new(false);
    let editor = Rc::downgrade(&pipeline.editor);
    let frame = pipeline.frame.clone();
    let seen_on_ready = Rc::new(RefCell::new(Vec::new()));
    let s = seen_on_ready.clone();
    pipeline.editor.subscribe(T::RendererReady, move |_| {
        // ハンドラが呼ばれた時点で設定はもう送られている
        *s.borrow_mut() = frame
            .drain()
            .iter()
            .map(|p| p.data["type"].as_str().unwrap_or_default().to_string())
            .collect();
        assert!(editor.upgrade().map_or(false, |e| e.is_renderer_ready()));
        Ok(())
    });

    pipeline.editor.set_dark_mode(false);
    pipeline.renderer.start().unwrap();
    pipeline.pump();
    assert_eq!(*seen_on_ready.borrow(), vec!["SET_BASE_CONFIGURATION", "SET_DARKMODE"]);
}

// ==============================================================
// 有効化前のメッセージ
// ==============================================================

#[test]
fn test_no_dispatch_before_enabled() {
    let pipeline = Pipeline::new(false);
    let headings = pipeline.count_on_editor(T::OnFirstHeadingChange);

    // ハンドシェイク前に届いた見出し
    let outcome = pipeline.editor.handle_event(InboundEvent {
        origin: RENDERER_ORIGIN.to_string(),
        source: Some(pipeline.frame.clone()),
        data: json!({ "type": "ON_FIRST_HEADING_CHANGE", "firstHeading": "Early" }),
    });
    assert_eq!(outcome, EventOutcome::NotEnabled(T::OnFirstHeadingChange));
    assert_eq!(headings.get(), 0, "有効化前はディスパッチしないこと");
    assert_eq!(pipeline.editor.first_heading(), None);
}

#[test]
fn test_content_set_before_handshake_arrives_once_after() {
    let pipeline = Pipeline::new(false);
    let received = pipeline.count_on_renderer(T::SetMarkdownContent);

    let lines = vec!["# Hello".to_string(), "world".to_string()];
    assert!(!pipeline.editor.set_markdown_content(lines.clone()), "ハンドシェイク前は送らない");
    assert_eq!(pipeline.frame.pending(), 0);

    pipeline.renderer.start().unwrap();
    pipeline.pump();
    assert_eq!(received.get(), 1, "ハンドシェイク後にちょうど 1 回届くこと");
    assert_eq!(pipeline.renderer.content(), lines);

    // 同じ内容は送り直さない
    assert!(!pipeline.editor.set_markdown_content(lines));
    pipeline.pump();
    assert_eq!(received.get(), 1);
}

// ==============================================================
// origin
// ==============================================================

#[test]
fn test_foreign_origin_never_dispatched() {
    let pipeline = Pipeline::connected(false);
    let heights = pipeline.count_on_editor(T::OnHeightChange);
    let before = pipeline.editor.stats().dropped;

    let outcome = pipeline.editor.handle_event(InboundEvent {
        origin: "https://evil.example.org".to_string(),
        source: Some(pipeline.frame.clone()),
        data: json!({ "type": "ON_HEIGHT_CHANGE", "height": 9999 }),
    });
    assert!(matches!(outcome, EventOutcome::Dropped(_)));
    assert_eq!(heights.get(), 0);
    assert_eq!(pipeline.editor.stats().dropped, before + 1);

    let dark = pipeline.count_on_renderer(T::SetDarkMode);
    pipeline.renderer.handle_event(InboundEvent {
        origin: "https://evil.example.org".to_string(),
        source: Some(pipeline.parent.clone()),
        data: json!({ "type": "SET_DARKMODE", "activated": true }),
    });
    assert_eq!(dark.get(), 0);
    assert!(!pipeline.renderer.dark_mode());
}

#[test]
fn test_same_origin_other_frame_never_dispatched() {
    let pipeline = Pipeline::connected(false);
    let counts = pipeline.count_on_editor(T::OnWordCountCalculated);
    let impostor = MemoryPort::new(Origin::parse(RENDERER_BASE).unwrap());

    let outcome = pipeline.editor.handle_event(InboundEvent {
        origin: RENDERER_ORIGIN.to_string(),
        source: Some(impostor),
        data: json!({ "type": "ON_WORD_COUNT_CALCULATED", "words": 1 }),
    });
    assert!(matches!(outcome, EventOutcome::Dropped(_)));
    assert_eq!(counts.get(), 0);
}

// ==============================================================
// スクロール
// ==============================================================

#[test]
fn test_scroll_source_on_then_off_sends_no_scroll_state() {
    let pipeline = Pipeline::connected(false);
    let scrolls = pipeline.count_on_editor(T::SetScrollState);

    assert!(pipeline.renderer.make_scroll_source());
    pipeline.pump();
    assert!(pipeline.editor.make_editor_scroll_source());
    pipeline.pump();

    assert!(!pipeline.renderer.report_scroll(ScrollState::new(10, 50.0)));
    pipeline.pump();
    assert_eq!(scrolls.get(), 0, "スクロールソースを外した後は 1 通も送らないこと");
}

#[test]
fn test_scroll_follows_source() {
    let pipeline = Pipeline::connected(false);
    let on_editor = pipeline.count_on_editor(T::SetScrollState);
    let on_renderer = pipeline.count_on_renderer(T::SetScrollState);

    assert!(pipeline.editor.send_scroll_state(ScrollState::new(3, 0.0)));
    pipeline.pump();
    assert_eq!(on_renderer.get(), 1);

    pipeline.renderer.make_scroll_source();
    pipeline.pump();
    assert!(pipeline.renderer.report_scroll(ScrollState::new(8, 20.0)));
    assert!(!pipeline.editor.send_scroll_state(ScrollState::new(4, 0.0)), "レンダラーがソースの間は送らない");
    pipeline.pump();
    assert_eq!(on_editor.get(), 1);
    assert_eq!(on_renderer.get(), 1);
}

// ==============================================================
// 高さ・見出し・ワードカウント・拡張イベント
// ==============================================================

#[test]
fn test_height_change_sets_frame_style() {
    let pipeline = Pipeline::connected(true);
    assert!(pipeline.renderer.report_height(480.0));
    pipeline.pump();
    assert_eq!(pipeline.editor.frame_style(), "height: 480px");
}

#[test]
fn test_word_count_round_trip() {
    let pipeline = Pipeline::connected(false);
    pipeline
        .editor
        .set_markdown_content(vec!["one two three".to_string(), "```".to_string(), "code".to_string()]);
    pipeline.pump();

    assert!(pipeline.editor.request_word_count());
    pipeline.pump();
    assert_eq!(pipeline.editor.word_count(), Some(3));
}

#[test]
fn test_extension_event_reaches_editor_emitter() {
    let pipeline = Pipeline::connected(false);
    let emitter = renderlink_session::ExtensionEventEmitter::new();
    let names = Rc::new(RefCell::new(Vec::new()));
    let n = names.clone();
    emitter.on("plantuml.**", move |name, _| n.borrow_mut().push(name.to_string()));
    pipeline.editor.set_extension_event_emitter(Some(emitter));

    pipeline.renderer.emit_extension_event("plantuml.render.done", json!({}));
    pipeline.renderer.emit_extension_event("vega.render", json!({}));
    pipeline.pump();
    assert_eq!(*names.borrow(), vec!["plantuml.render.done"]);
}

// ==============================================================
// 購読解除
// ==============================================================

#[test]
fn test_unsubscribe_mid_batch_stops_second_message_only() {
    let pipeline = Pipeline::connected(true);
    let calls = Rc::new(Cell::new(0));
    let subscription = Rc::new(RefCell::new(None::<renderlink_dispatch::Subscription>));

    let (c, s) = (calls.clone(), subscription.clone());
    let handle = pipeline.editor.subscribe(T::OnHeightChange, move |_| {
        c.set(c.get() + 1);
        if let Some(subscription) = s.borrow().as_ref() {
            subscription.unsubscribe();
        }
        Ok(())
    });
    *subscription.borrow_mut() = Some(handle);

    // 2 通を同じバッチで配送する
    pipeline.renderer.report_height(100.0);
    pipeline.renderer.report_height(200.0);
    assert_eq!(pipeline.parent.pending(), 2);
    pipeline.pump();

    assert_eq!(calls.get(), 1, "2 通目では呼ばれないこと");
    assert_eq!(pipeline.editor.frame_height(), 200.0, "Communicator 自身の反映は続くこと");
}

// ==============================================================
// 再読み込み
// ==============================================================

#[test]
fn test_renderer_type_change_rehandshakes_with_new_type() {
    let pipeline = Pipeline::connected(false);
    let ready = pipeline.count_on_editor(T::RendererReady);

    let action = pipeline.editor.set_renderer_type(RendererType::Slideshow);
    assert!(matches!(action, Some(renderlink_session::FrameLoadAction::Navigate(_))));
    assert_eq!(pipeline.editor.state(), CommunicatorState::Listening);

    // iframe の再読み込みで新しい render ページが起動する
    assert_eq!(
        pipeline.editor.on_frame_load(),
        renderlink_session::FrameLoadAction::RedirectComplete
    );
    let renderer = RendererCommunicator::new(
        RendererConfig::new("https://md.example.com/"),
        Some(pipeline.parent.clone()),
        CommunicatorIdentity::from_render_page_url(pipeline.editor.render_page_url()),
    )
    .unwrap();
    renderer.start().unwrap();
    for posted in pipeline.parent.drain() {
        pipeline.editor.handle_event(InboundEvent {
            origin: RENDERER_ORIGIN.to_string(),
            source: Some(pipeline.frame.clone()),
            data: posted.data,
        });
    }
    for posted in pipeline.frame.drain() {
        renderer.handle_event(InboundEvent {
            origin: EDITOR_ORIGIN.to_string(),
            source: Some(pipeline.parent.clone()),
            data: posted.data,
        });
    }

    assert_eq!(ready.get(), 1, "既存のハンドラで再ハンドシェイクを受け取れること");
    assert_eq!(renderer.view(), RendererView::Slideshow);
}
