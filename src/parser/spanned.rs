#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Where a span starts in its source, both counted from 1.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct LineCol {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn line_col(&self, source: &str) -> LineCol {
        let mut line = 1;
        let mut line_start = 0;

        for (offset, c) in source.char_indices() {
            if offset >= self.start {
                break;
            }

            if c == '\n' {
                line += 1;
                line_start = offset + 1;
            }
        }

        let col = source
            .get(line_start..self.start.min(source.len()))
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0)
            + 1;

        LineCol { line, col }
    }
}

impl<T> Spanned<T> {
    pub fn new(item: T, span: Span) -> Self {
        Self { item, span }
    }

    pub fn map<N>(self, func: impl FnOnce(T) -> N) -> Spanned<N> {
        Spanned::new(func(self.item), self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let source = "param p\nx = read p.f+8\n";

        assert_eq!(Span::new(0, 5).line_col(source), LineCol { line: 1, col: 1 });
        assert_eq!(Span::new(12, 16).line_col(source), LineCol { line: 2, col: 5 });
    }
}
