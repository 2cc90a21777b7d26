//! Overlapping-window text chunker.
//!
//! Long content is split into fixed-size character windows that overlap by a
//! configurable amount, so a phrase falling on a boundary stays intact in at
//! least one window. Windows share a chunk group id assigned by the caller.

/// One window of a chunked document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkWindow {
    /// Position of this window, `0..total`.
    pub index: usize,
    /// Total number of windows produced for the document.
    pub total: usize,
    pub text: String,
}

/// Split `text` into windows of `chunk_size` characters advancing by
/// `chunk_size - overlap`. The final window may be shorter; input at or under
/// `chunk_size` yields a single window. Offsets are measured in characters,
/// never splitting a UTF-8 scalar.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkWindow> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size || chunk_size == 0 {
        return vec![ChunkWindow {
            index: 0,
            total: 1,
            text: text.to_string(),
        }];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect::<String>());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    let total = windows.len();
    windows
        .into_iter()
        .enumerate()
        .map(|(index, text)| ChunkWindow { index, total, text })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_single_window() {
        let windows = chunk_text("hello", 1000, 200);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].index, 0);
        assert_eq!(windows[0].total, 1);
        assert_eq!(windows[0].text, "hello");
    }

    #[test]
    fn exact_boundary_single_window() {
        let text = "a".repeat(1000);
        let windows = chunk_text(&text, 1000, 200);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn windows_cover_entire_input() {
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let windows = chunk_text(&text, 1000, 200);
        assert!(windows.len() >= 2);

        // Reassemble: window k starts at k * (chunk_size - overlap)
        let step = 800;
        let chars: Vec<char> = text.chars().collect();
        for window in &windows {
            let start = window.index * step;
            let expected: String = chars[start..(start + 1000).min(chars.len())]
                .iter()
                .collect();
            assert_eq!(window.text, expected);
        }
        let last = windows.last().unwrap();
        assert!(text.ends_with(&last.text));
    }

    #[test]
    fn consecutive_windows_share_overlap() {
        let text = "x ".repeat(600);
        let windows = chunk_text(&text, 1000, 200);
        assert!(windows.len() >= 2);
        for pair in windows.windows(2) {
            let head: String = pair[0].text.chars().skip(800).collect();
            let tail: String = pair[1].text.chars().take(head.chars().count()).collect();
            assert_eq!(head, tail);
        }
    }

    #[test]
    fn indices_contiguous_and_total_consistent() {
        let text = "m".repeat(3300);
        let windows = chunk_text(&text, 1000, 200);
        let total = windows.len();
        for (i, window) in windows.iter().enumerate() {
            assert_eq!(window.index, i);
            assert_eq!(window.total, total);
        }
    }

    #[test]
    fn multibyte_text_not_split_mid_char() {
        let text = "héllo wörld ".repeat(200);
        let windows = chunk_text(&text, 1000, 200);
        for window in &windows {
            assert!(window.text.chars().count() <= 1000);
        }
    }

    #[test]
    fn zero_overlap_partitions() {
        let text = "z".repeat(2000);
        let windows = chunk_text(&text, 1000, 0);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].text.len(), 1000);
        assert_eq!(windows[1].text.len(), 1000);
    }
}
