use tutor_core::types::FusedResult;

/// Rendered when no source produced anything usable.
pub const INSUFFICIENT_CONTEXT: &str =
    "Insufficient context: no relevant passages were found in the indexed documents or external sources.";

/// Joins results as `Source: <source> (p.<page>)` blocks separated by
/// `---` rules, best first.
pub fn render_context(results: &[FusedResult]) -> String {
    if results.is_empty() {
        return INSUFFICIENT_CONTEXT.to_string();
    }
    results
        .iter()
        .map(|r| format!("Source: {} (p.{})\n{}", r.chunk.source, r.chunk.page, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tutor_core::types::{Chunk, SourceKind};

    #[test]
    fn renders_blocks_in_order() {
        let result = |source: &str, page, text: &str| FusedResult {
            score: 1.0,
            chunk: Arc::new(Chunk { id: None, source: source.into(), page, chunk_index: 0, text: text.into() }),
            source: SourceKind::Fused,
            occurrences: 1,
        };
        let out = render_context(&[result("bio.pdf", 3, "Cells."), result("chem.pdf", 7, "Atoms.")]);
        assert_eq!(out, "Source: bio.pdf (p.3)\nCells.\n\n---\n\nSource: chem.pdf (p.7)\nAtoms.");
    }

    #[test]
    fn empty_is_explicit() {
        assert_eq!(render_context(&[]), INSUFFICIENT_CONTEXT);
    }
}
