use pest::Span;

use crate::model::Comments;

/// Line-oriented view of the source used to attach `//` comments to elements.
/// The grammar drops comments, so they are recovered from element spans instead.
pub(crate) struct CommentIndex<'a> {
    src: &'a str,
    lines: Vec<&'a str>,
}

enum Line<'a> {
    Blank,
    Comment(&'a str),
    Code,
}

impl<'a> CommentIndex<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            lines: src.lines().collect(),
        }
    }

    fn classify(&self, idx: usize) -> Line<'a> {
        let line = self.lines[idx].trim();
        if line.is_empty() {
            Line::Blank
        } else if let Some(text) = line.strip_prefix("//") {
            Line::Comment(text)
        } else {
            Line::Code
        }
    }

    pub(crate) fn comments_for(&self, span: Span<'_>) -> Comments {
        let (start_line, _) = span.start_pos().line_col();
        let mut comments = Comments::default();

        // Walk upwards from the line above the element. 0-based index of that line is start_line - 2.
        let mut idx = start_line.checked_sub(2);
        let mut leading = Vec::new();
        while let Some(i) = idx {
            match self.classify(i) {
                Line::Comment(text) => leading.push(text),
                _ => break,
            }
            idx = i.checked_sub(1);
        }
        leading.reverse();
        comments.leading = join_block(&leading);

        // Earlier blocks separated by blank lines are detached.
        let mut detached: Vec<String> = Vec::new();
        let mut block: Vec<&str> = Vec::new();
        while let Some(i) = idx {
            match self.classify(i) {
                Line::Comment(text) => block.push(text),
                Line::Blank => {
                    if !block.is_empty() {
                        block.reverse();
                        detached.push(join_block(&block));
                        block.clear();
                    }
                }
                Line::Code => break,
            }
            idx = i.checked_sub(1);
        }
        if !block.is_empty() {
            block.reverse();
            detached.push(join_block(&block));
        }
        detached.reverse();
        comments.leading_detached = detached;

        // Trailing: `//` after the element on its final line.
        let end = span.end();
        let rest = &self.src[end..];
        let rest = rest.split('\n').next().unwrap_or_default().trim();
        if let Some(text) = rest.strip_prefix("//") {
            comments.trailing = text.trim().to_string();
        }

        comments
    }
}

fn join_block(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|&l| l.strip_prefix(' ').unwrap_or(l).trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span_of<'a>(src: &'a str, needle: &str) -> Span<'a> {
        let start = src.find(needle).unwrap();
        Span::new(src, start, start + needle.len()).unwrap()
    }

    #[test]
    fn leading_trailing_and_detached() {
        let src = "\
// detached 0

// leading 0
// leading 1
bool a = 1; // trailing
bool b = 2;
";
        let index = CommentIndex::new(src);
        let a = index.comments_for(span_of(src, "bool a = 1;"));
        assert_eq!(a.leading, "leading 0\nleading 1");
        assert_eq!(a.leading_detached, vec!["detached 0".to_string()]);
        assert_eq!(a.trailing, "trailing");

        // Code on the line above stops the search.
        let b = index.comments_for(span_of(src, "bool b = 2;"));
        assert!(b.is_empty());
    }

    #[test]
    fn first_line_has_no_leading() {
        let src = "message A {}";
        let index = CommentIndex::new(src);
        assert!(index.comments_for(span_of(src, "message A {}")).is_empty());
    }
}
