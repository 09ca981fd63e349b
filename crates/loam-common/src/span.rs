//! Source location tracking.
//!
//! The engine consumes an already-built program graph, so it never maps
//! byte offsets to lines itself; every node carries both a byte `Span`
//! and a `SourcePos` supplied by the front-end.

/// Half-open byte range `[start, end)` in the original source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// One-based line/column position, used for diagnostic placement and
/// deduplication.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub const DUMMY: SourcePos = SourcePos { line: 0, column: 0 };

    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}
