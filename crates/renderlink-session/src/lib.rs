//! # renderlink-session
//!
//! エディタ側・レンダラー側の Communicator と、その周辺の状態
//! （ハンドシェイク、スクロールソース、ダークモード、拡張イベント）。
//!
//! ## ハンドシェイクの流れ
//!
//! ```text
//! editor                                       renderer (iframe)
//!   │ iframe.src = <rendererBaseUrl>/render?uuid=<identity>
//!   │ ───────────────────────────────────────────▶ │ start()
//!   │                                              │ register → set target(parent) → enable
//!   │ ◀──────────────────────────── RENDERER_READY │
//!   │ set target(iframe) → enable                  │
//!   │ SET_BASE_CONFIGURATION ────────────────────▶ │ view: Placeholder → Document など
//!   │ SET_DARKMODE / SET_MARKDOWN_CONTENT ───────▶ │
//! ```
//!
//! ## 状態機械
//!
//! どちらの Communicator も [`CommunicatorState`] に従う。
//! `Enabled` になるまで送信も受信ディスパッチもしない。
//! 有効化前に届いたメッセージはキューに積まずに捨てる。
//!
//! ## I/O
//!
//! ブラウザには依存しない。受信はホストが [`InboundEvent`] を `handle_event` に渡し、
//! 送信は [`FramePort`] を通して行う。

pub mod config;
pub mod darkmode;
pub mod editor;
pub mod error;
pub mod extension;
pub mod identity;
pub mod outcome;
pub mod renderer;
pub mod scroll;
pub mod state;
pub mod word_count;

pub use config::{EditorConfig, RendererConfig};
pub use darkmode::{
    color_scheme_storage_value, forced_from_color_scheme, DarkModeAction, DarkModeConfig, DarkModeStore,
};
pub use editor::{EditorCommunicator, FrameLoadAction};
pub use error::SessionError;
pub use extension::{ExtensionEventEmitter, ExtensionListener};
pub use identity::CommunicatorIdentity;
pub use outcome::{EventOutcome, HandshakeRejection};
pub use renderer::{
    PlaceholderReason, RendererCommunicator, RendererModel, RendererView, WordCounter, PLACEHOLDER_TEXT,
};
pub use scroll::{EditorScrollSync, ScrollSource, ScrollSourceGuard};
pub use state::CommunicatorState;
pub use word_count::count_words;

pub use renderlink_transport::{FramePort, InboundEvent};

/// レンダラー側の render ページのパス（`rendererBaseUrl` からの相対）
pub const RENDER_PAGE_PATH: &str = "render";

/// render ページの URL で Communicator Identity を渡すクエリパラメータ
pub const IDENTITY_QUERY_PARAM: &str = "uuid";

/// 強制ダークモードを保存する localStorage のキー（値は `"dark"` / `"light"`）
pub const FORCED_COLOR_SCHEME_KEY: &str = "forcedColorScheme";

/// ブラウザのダークモード設定を調べるメディアクエリ
pub const DARK_MODE_MEDIA_QUERY: &str = "(prefers-color-scheme: dark)";
