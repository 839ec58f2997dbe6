use compact_str::CompactString;

use super::{CharStream, IntStream, UNKNOWN_SOURCE_NAME};
use crate::interval::EOF;

/// In-memory stream of Unicode scalar values
///
/// Indexes count code points, not bytes.
#[derive(Debug, Clone)]
pub struct CodePointCharStream {
    data: Vec<char>,
    p: usize,
    name: CompactString,
}

impl CodePointCharStream {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            data: text.chars().collect(),
            p: 0,
            name: CompactString::from(UNKNOWN_SOURCE_NAME),
        }
    }

    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<CompactString>) -> Self {
        self.name = name.into();
        self
    }
}

impl IntStream for CodePointCharStream {
    fn consume(&mut self) {
        if self.p < self.data.len() {
            self.p += 1;
        }
    }

    fn la(&mut self, i: isize) -> i32 {
        let index = match i {
            0 => return 0,
            i if i > 0 => self.p.checked_add(i.unsigned_abs() - 1),
            i => self.p.checked_sub(i.unsigned_abs()),
        };
        index
            .and_then(|index| self.data.get(index))
            .map_or(EOF, |&c| c as i32)
    }

    fn index(&self) -> usize {
        self.p
    }

    fn seek(&mut self, index: usize) {
        self.p = index.min(self.data.len());
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

impl CharStream for CodePointCharStream {
    fn text(&self, start: usize, stop: usize) -> String {
        if start >= self.data.len() || stop < start {
            return String::new();
        }
        let stop = stop.min(self.data.len() - 1);
        self.data[start..=stop].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_past_either_end() {
        let mut input = CodePointCharStream::new("héllo");
        assert_eq!(input.la(-1), EOF);
        assert_eq!(input.la(2), 'é' as i32);
        input.seek(4);
        assert_eq!(input.la(1), 'o' as i32);
        assert_eq!(input.la(2), EOF);
        input.consume();
        input.consume();
        assert_eq!(input.index(), 5);
        assert_eq!(input.la(1), EOF);
    }

    #[test]
    fn test_text_is_inclusive_and_clamped() {
        let input = CodePointCharStream::new("abc");
        assert_eq!(input.text(1, 1), "b");
        assert_eq!(input.text(1, 10), "bc");
        assert_eq!(input.text(3, 4), "");
    }
}
