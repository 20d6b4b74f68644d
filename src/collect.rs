//! Collection pass over the markdown tree.
//!
//! Collection and mutation are strictly separated: the whole tree is
//! visited and every diagram recorded before the first splice happens.
//! Splicing replaces one node with one or two, which would shift sibling
//! positions of not-yet-visited nodes if it ran mid-traversal.

use comrak::nodes::{AstNode, NodeValue};

/// Language tag that marks a fenced code block as diagram source.
pub const MERMAID_MARKER: &str = "mermaid";

/// One diagram to render, with enough positional context to splice its
/// replacement back in.
pub struct WorkItem<'a> {
    /// Raw diagram source (the code block literal).
    pub source: String,
    /// The code block node itself.
    pub node: &'a AstNode<'a>,
    /// Container the node sits in.
    pub parent: &'a AstNode<'a>,
    /// Position among the parent's children at collection time.
    pub index: usize,
}

/// Gather every mermaid code block in document order.
///
/// Read-only: the tree is not touched. Nodes without a parent cannot be
/// spliced and are skipped.
pub fn collect_diagrams<'a>(root: &'a AstNode<'a>) -> Vec<WorkItem<'a>> {
    let mut items = Vec::new();

    for node in root.descendants() {
        let Some(source) = diagram_source(node) else {
            continue;
        };
        let Some(parent) = node.parent() else {
            tracing::warn!("skipping mermaid block with no parent container");
            continue;
        };
        let Some(index) = parent
            .children()
            .position(|sibling| std::ptr::eq(sibling, node))
        else {
            continue;
        };

        items.push(WorkItem {
            source,
            node,
            parent,
            index,
        });
    }

    items
}

/// The block's literal, if its language tag is the mermaid marker.
fn diagram_source<'a>(node: &'a AstNode<'a>) -> Option<String> {
    let data = node.data.borrow();
    match &data.value {
        NodeValue::CodeBlock(block)
            if block.info.split_whitespace().next() == Some(MERMAID_MARKER) =>
        {
            Some(block.literal.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comrak::{Arena, parse_document};

    fn parse<'a>(arena: &'a Arena<AstNode<'a>>, source: &str) -> &'a AstNode<'a> {
        parse_document(arena, source, &comrak::Options::default())
    }

    #[test]
    fn collects_only_mermaid_blocks() {
        let arena = Arena::new();
        let root = parse(
            &arena,
            "# Title\n\n```mermaid\ngraph TD; A-->B;\n```\n\n```rust\nfn main() {}\n```\n\n```\nplain\n```\n",
        );

        let items = collect_diagrams(root);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "graph TD; A-->B;\n");
    }

    #[test]
    fn records_position_within_parent() {
        let arena = Arena::new();
        let root = parse(&arena, "intro\n\n```mermaid\ngraph TD; A;\n```\n\noutro\n");

        let items = collect_diagrams(root);
        assert_eq!(items.len(), 1);
        assert!(std::ptr::eq(items[0].parent, root));
        // paragraph, code block, paragraph
        assert_eq!(items[0].index, 1);
    }

    #[test]
    fn collects_in_document_order_across_containers() {
        let arena = Arena::new();
        let root = parse(
            &arena,
            "```mermaid\nfirst\n```\n\n> ```mermaid\n> second\n> ```\n\n- item\n\n  ```mermaid\n  third\n  ```\n",
        );

        let items = collect_diagrams(root);
        let sources: Vec<&str> = items.iter().map(|item| item.source.trim()).collect();
        assert_eq!(sources, ["first", "second", "third"]);

        // Each item recorded its own container.
        assert!(std::ptr::eq(items[0].parent, root));
        assert!(!std::ptr::eq(items[1].parent, root));
        assert!(!std::ptr::eq(items[2].parent, root));
    }

    #[test]
    fn language_tag_must_match_exactly() {
        let arena = Arena::new();
        let root = parse(
            &arena,
            "```mermaidjs\nnope\n```\n\n```Mermaid\nnope\n```\n",
        );
        assert!(collect_diagrams(root).is_empty());
    }

    #[test]
    fn info_string_attributes_do_not_hide_the_marker() {
        let arena = Arena::new();
        let root = parse(&arena, "```mermaid title=\"flow\"\ngraph TD; A;\n```\n");
        assert_eq!(collect_diagrams(root).len(), 1);
    }

    #[test]
    fn empty_document_collects_nothing() {
        let arena = Arena::new();
        let root = parse(&arena, "");
        assert!(collect_diagrams(root).is_empty());
    }

    #[test]
    fn detached_code_block_is_skipped_not_crashed() {
        use std::cell::RefCell;

        use comrak::nodes::{Ast, LineColumn, NodeCodeBlock};

        // A mermaid block with no parent cannot be spliced; collection must
        // skip it rather than panic.
        let arena = Arena::new();
        let orphan = arena.alloc(AstNode::new(RefCell::new(Ast::new(
            NodeValue::CodeBlock(NodeCodeBlock {
                info: "mermaid".into(),
                literal: "graph TD; A;\n".into(),
                ..NodeCodeBlock::default()
            }),
            LineColumn { line: 0, column: 0 },
        ))));

        assert!(collect_diagrams(orphan).is_empty());
    }
}
