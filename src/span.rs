/// A byte range inside a model source (JSON document or expression text).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift a span that was computed relative to an embedded string
    /// (e.g. a constraint inside the model file) to an absolute offset.
    pub fn offset(self, by: u32) -> Span {
        Span {
            start: self.start + by,
            end: self.end + by,
        }
    }

    /// Span of the line/column position reported by serde_json (1-based).
    pub fn at_line_col(source: &str, line: usize, column: usize) -> Span {
        let mut offset = 0usize;
        for (idx, text) in source.split_inclusive('\n').enumerate() {
            if idx + 1 == line {
                let col = column.saturating_sub(1).min(text.len());
                let start = (offset + col) as u32;
                return Span::new(start, start + 1);
            }
            offset += text.len();
        }
        let end = source.len() as u32;
        Span::new(end, end)
    }
}

/// A value annotated with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}
