//! ダークモードの状態コンテナ
//!
//! 実効値は「ユーザーが強制した値」があればそれ、なければブラウザの設定。
//! 強制値はブラウザの localStorage に `"dark"` / `"light"` で保存する
//! （読み書きはホスト側。ここでは文字列との変換だけを行う）。

/// ダークモード設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DarkModeConfig {
    /// ユーザーが強制した値（`None` = ブラウザに従う）
    pub forced_to_dark: Option<bool>,
    /// ブラウザが `prefers-color-scheme: dark` を報告しているか
    pub browser_is_dark: bool,
}

/// 状態更新アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DarkModeAction {
    /// 両方を置き換える（起動時の読み込み）
    SetDarkMode {
        forced_to_dark: Option<bool>,
        browser_is_dark: bool,
    },
    /// 強制値だけを変える（設定ダイアログ）
    SetForcedDarkMode { forced_to_dark: Option<bool> },
}

impl DarkModeConfig {
    /// 実効値
    pub fn is_dark(&self) -> bool {
        self.forced_to_dark.unwrap_or(self.browser_is_dark)
    }

    /// アクションを適用した新しい状態を返す
    pub fn reduce(self, action: DarkModeAction) -> Self {
        match action {
            DarkModeAction::SetDarkMode {
                forced_to_dark,
                browser_is_dark,
            } => DarkModeConfig {
                forced_to_dark,
                browser_is_dark,
            },
            DarkModeAction::SetForcedDarkMode { forced_to_dark } => DarkModeConfig {
                forced_to_dark,
                ..self
            },
        }
    }
}

/// 保存されていた color scheme から強制値を復元する
pub fn forced_from_color_scheme(stored: Option<&str>) -> Option<bool> {
    match stored {
        Some("dark") => Some(true),
        Some("light") => Some(false),
        _ => None,
    }
}

/// 強制値を保存用の文字列にする（`None` は保存値を削除する）
pub fn color_scheme_storage_value(forced_to_dark: Option<bool>) -> Option<&'static str> {
    forced_to_dark.map(|dark| if dark { "dark" } else { "light" })
}

/// ダークモードの状態を保持し、変化を検出する
///
/// グローバルなストアではなく、必要なコンポーネントに参照で渡して使う。
#[derive(Debug, Clone, Default)]
pub struct DarkModeStore {
    state: DarkModeConfig,
}

impl DarkModeStore {
    pub fn new(initial: DarkModeConfig) -> Self {
        DarkModeStore { state: initial }
    }

    pub fn state(&self) -> DarkModeConfig {
        self.state
    }

    /// アクションを適用する。実効値が変わった場合は新しい値を返す。
    pub fn dispatch(&mut self, action: DarkModeAction) -> Option<bool> {
        let before = self.state.is_dark();
        self.state = self.state.reduce(action);
        let after = self.state.is_dark();
        (before != after).then_some(after)
    }
}
