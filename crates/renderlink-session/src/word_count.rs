//! ワードカウント
//!
//! `GET_WORD_COUNT` への既定の応答。レンダリング結果の DOM は扱わないので、
//! markdown の行から語を数える。
//!
//! - フェンスで囲まれたコードブロックは数えない
//! - 英数字を 1 文字も含まないトークン（`#`, `-`, `|` など）は数えない

/// markdown の行から語数を数える
pub fn count_words(lines: &[String]) -> u32 {
    let mut in_code_block = false;
    let mut count: u32 = 0;
    for line in lines {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        let words = line
            .split_whitespace()
            .filter(|token| token.chars().any(char::is_alphanumeric))
            .count();
        count = count.saturating_add(words as u32);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_counts_plain_words() {
        assert_eq!(count_words(&lines("hello world\nthree more words")), 5);
    }

    #[test]
    fn test_ignores_markup_tokens() {
        assert_eq!(count_words(&lines("# Title\n- item one\n| a | b |")), 5);
    }

    #[test]
    fn test_skips_code_blocks() {
        let text = "before\n```rust\nlet x = 1;\n```\nafter";
        assert_eq!(count_words(&lines(text)), 2);
    }

    #[test]
    fn test_empty() {
        assert_eq!(count_words(&[]), 0);
    }
}
