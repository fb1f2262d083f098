//! # renderlink-wasm
//!
//! wasm-bindgen エクスポート：エディタページと render ページ（iframe）から呼び出す公開 API。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { EditorBridge, RendererBridge, init_panic_hook, initLogging } from '../renderlink-wasm-pkg/renderlink_wasm';
//!
//! // パニック時のスタックトレースを有効化（開発時）
//! init_panic_hook();
//! initLogging("debug");
//!
//! // エディタページ
//! const editor = new EditorBridge({ baseUrl: location.href, rendererBaseUrl: "https://render.example.com/" });
//! editor.registerEventListener();
//! editor.attachFrame(iframe);
//! iframe.addEventListener("load", () => {
//!     const url = editor.onFrameLoad();
//!     if (url) iframe.src = url;
//! });
//! editor.on("ON_HEIGHT_CHANGE", () => { iframe.style.cssText = editor.frameStyle; });
//! editor.setMarkdownContent(markdown.split("\n"));
//!
//! // render ページ
//! const renderer = new RendererBridge({ editorBaseUrl: "https://md.example.com/" });
//! renderer.on("SET_MARKDOWN_CONTENT", (message) => render(message.content));
//! renderer.start();
//! ```

use wasm_bindgen::prelude::*;

pub mod darkmode;
pub mod editor;
pub mod handle;
pub mod logger;
pub mod port;
pub mod renderer;

pub use editor::EditorBridge;
pub use handle::{ExtensionListenerHandle, SubscriptionHandle};
pub use port::WindowPort;
pub use renderer::RendererBridge;

/// パニック時にブラウザコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// ログをブラウザのコンソールに出す
///
/// # 引数
/// - `level`: `"error"` / `"warn"` / `"info"` / `"debug"` / `"trace"` / `"off"`。省略時は `"info"`。
///
/// # エラー
/// - 不明なレベル名
#[wasm_bindgen(js_name = "initLogging")]
pub fn init_logging(level: Option<String>) -> Result<(), JsError> {
    let level = match level {
        Some(name) => {
            logger::parse_level(&name).ok_or_else(|| JsError::new(&format!("Unknown log level {}", name)))?
        }
        None => log::LevelFilter::Info,
    };
    logger::install(level);
    Ok(())
}
