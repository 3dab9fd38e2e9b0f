//! Static complexity estimates for `loopscript` source.

use loop_core::artifact::ComplexityMetrics;

use super::lexer::{tokenize, TokenKind};

const BRANCH_WORDS: &[&str] = &["if", "while", "for", "and", "or"];

/// Lines of code (non-blank, non-comment) and a cyclomatic estimate of
/// `1 + branch points`. Source that does not tokenize falls back to a plain
/// word count so generated drafts still get a number.
pub fn estimate(source: &str) -> ComplexityMetrics {
    let lines = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count();
    let branches = match tokenize(source) {
        Ok(tokens) => tokens
            .iter()
            .filter(|token| {
                matches!(
                    token.kind,
                    TokenKind::If | TokenKind::While | TokenKind::For | TokenKind::And | TokenKind::Or
                )
            })
            .count(),
        Err(_) => source
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|word| BRANCH_WORDS.contains(word))
            .count(),
    };
    ComplexityMetrics {
        lines_of_code: Some(u32::try_from(lines).unwrap_or(u32::MAX)),
        cyclomatic_complexity: Some(u32::try_from(branches + 1).unwrap_or(u32::MAX)),
        estimated_latency_ms: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_and_branches() {
        let source = "# spam filter\nfn classify(text) {\n\n  if \"buy\" in lower(text) or \"free\" in lower(text) {\n    return \"spam\"\n  }\n  return \"ham\"\n}\n";
        let metrics = estimate(source);
        assert_eq!(metrics.lines_of_code, Some(6));
        assert_eq!(metrics.cyclomatic_complexity, Some(3));
    }

    #[test]
    fn strings_do_not_count_as_branches() {
        let metrics = estimate("fn classify(text) { return \"if or and\" }");
        assert_eq!(metrics.cyclomatic_complexity, Some(1));
    }
}
