//! Splitting long messages for channels with a size cap.

/// Split `message` into pieces of at most `max_chars` characters.
///
/// Breaks on line boundaries where possible; a single line longer than
/// the cap is split mid-line. A mid-line split never separates a
/// backslash escape from the character it escapes.
pub fn chunk_message(message: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            split_line(line, max_chars, &mut chunks);
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_line(line: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut piece = String::new();
    let mut piece_len = 0;

    for ch in line.chars() {
        if piece_len == max_chars {
            let carry = if max_chars > 1 && ends_with_open_escape(&piece) {
                piece.pop()
            } else {
                None
            };
            chunks.push(std::mem::take(&mut piece));
            piece_len = 0;
            if let Some(c) = carry {
                piece.push(c);
                piece_len = 1;
            }
        }
        piece.push(ch);
        piece_len += 1;
    }
    if !piece.is_empty() {
        chunks.push(piece);
    }
}

/// Whether `s` ends in a backslash that escapes whatever follows it.
fn ends_with_open_escape(s: &str) -> bool {
    s.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_one_chunk() {
        assert_eq!(chunk_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn splits_on_lines() {
        let chunks = chunk_message("aaaa\nbbbb\ncccc\n", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
    }

    #[test]
    fn splits_oversized_line() {
        let chunks = chunk_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn escape_pair_is_not_split() {
        let chunks = chunk_message(r"abc\.def", 4);
        assert_eq!(chunks, vec!["abc", r"\.de", "f"]);
    }

    #[test]
    fn escaped_backslash_may_end_a_chunk() {
        let chunks = chunk_message(r"ab\\cd", 4);
        assert_eq!(chunks, vec![r"ab\\", "cd"]);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let chunks = chunk_message("♨️♨️♨️", 4);
        assert_eq!(chunks.concat(), "♨️♨️♨️");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }
}
