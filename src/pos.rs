//! Source position types shared by the lexer, parser, and every query.

/// A 1-based line, 0-based column, 0-based byte-offset position.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Pos { line, column, offset }
    }
}

/// A half-open byte range `[start, end)` into the source buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Like `contains`, but also accepts the end offset itself -- used when
    /// resolving a caret that sits right after a token or at the closing
    /// edge of a scope.
    pub fn contains_inclusive(&self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// `loc` pairing for a span, carried alongside it on most AST nodes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Loc {
    pub start: Pos,
    pub end: Pos,
}

/// Builds `Pos` values from byte offsets by scanning newlines once up front,
/// the way a text editor's backing buffer would. Columns and lines are
/// counted in `char`s, not UTF-16 code units -- this service has no LSP
/// transport to match, so there is no reason to carry that encoding here.
pub struct LineIndex {
    line_starts: Vec<u32>,
    source_len: u32,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        LineIndex {
            line_starts,
            source_len: source.len() as u32,
        }
    }

    fn line_for_offset(&self, offset: u32) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    pub fn position(&self, source: &str, offset: u32) -> Pos {
        let offset = offset.min(self.source_len);
        let line_idx = self.line_for_offset(offset);
        let line_start = self.line_starts[line_idx];
        let column = source
            .get(line_start as usize..offset as usize)
            .map(|s| s.chars().count() as u32)
            .unwrap_or(0);
        Pos::new((line_idx + 1) as u32, column, offset)
    }

    pub fn line_start_offset(&self, line: u32) -> Option<u32> {
        self.line_starts.get((line.saturating_sub(1)) as usize).copied()
    }

    pub fn offset(&self, source: &str, pos: Pos) -> u32 {
        let line_start = match self.line_start_offset(pos.line) {
            Some(o) => o,
            None => return self.source_len,
        };
        let line_end = self
            .line_starts
            .get(pos.line as usize)
            .copied()
            .unwrap_or(self.source_len);
        let line_text = &source[line_start as usize..line_end as usize];
        let byte_len: usize = line_text
            .chars()
            .take(pos.column as usize)
            .map(|c| c.len_utf8())
            .sum();
        (line_start as usize + byte_len).min(self.source_len as usize) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_contains_checks_half_open_range() {
        let s = Span::new(3, 7);
        assert!(!s.contains(2));
        assert!(s.contains(3));
        assert!(s.contains(6));
        assert!(!s.contains(7));
        assert!(s.contains_inclusive(7));
    }

    #[test]
    fn line_index_first_line() {
        let src = "local x = 1\nreturn x\n";
        let idx = LineIndex::new(src);
        let pos = idx.position(src, 6);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 6);
    }

    #[test]
    fn line_index_second_line() {
        let src = "local x = 1\nreturn x\n";
        let idx = LineIndex::new(src);
        let pos = idx.position(src, 13);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 0);
    }

    #[test]
    fn line_index_roundtrip() {
        let src = "local a = 1\nlocal b = 2\nreturn a + b\n";
        let idx = LineIndex::new(src);
        for offset in [0u32, 5, 12, 20, 30] {
            let pos = idx.position(src, offset);
            let back = idx.offset(src, pos);
            assert_eq!(back, offset, "roundtrip mismatch at offset {offset}");
        }
    }

    #[test]
    fn line_index_multibyte() {
        let src = "local caf\u{e9} = 1\nreturn caf\u{e9}\n";
        let idx = LineIndex::new(src);
        let pos = idx.position(src, src.find("caf\u{e9}").unwrap() as u32 + 5);
        assert_eq!(pos.line, 1);
    }

    #[test]
    fn line_index_out_of_bounds_clamped() {
        let src = "x = 1\n";
        let idx = LineIndex::new(src);
        let pos = idx.position(src, 1000);
        assert_eq!(pos.offset, src.len() as u32);
    }

    #[test]
    fn line_index_empty_source() {
        let idx = LineIndex::new("");
        let pos = idx.position("", 0);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 0);
    }
}
