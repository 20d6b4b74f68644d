//! The transform orchestrator.
//!
//! One call = one sandbox session. The call runs through a fixed sequence:
//! launch the session, collect every diagram in the tree, fan out one or
//! two renders per diagram, wait for the whole set, splice the results in,
//! close the session. A failure anywhere aborts the call with the tree
//! unspliced; the session is closed on every exit path.

use std::cell::RefCell;

use comrak::Arena;
use comrak::nodes::{Ast, AstNode, LineColumn, NodeHtmlBlock, NodeValue};
use futures::future::{join, join_all};
use serde_json::Value;

use crate::collect::{WorkItem, collect_diagrams};
use crate::error::TransformError;
use crate::options::{Options, RenderMode};
use crate::session::{BrowserSession, RenderSession};
use crate::translate::translate;

/// The markup replacing one work item: always a light render, plus a dark
/// render when dual-theme is enabled.
struct RenderedItem {
    light: String,
    dark: Option<String>,
}

/// Render every mermaid code block in `root` and splice the results in.
///
/// The tree is mutated in place. Launches one [`BrowserSession`] for the
/// duration of the call; to reuse a custom session, see
/// [`transform_with_session`].
///
/// # Errors
///
/// Any render or sandbox failure aborts the whole call; no node is spliced
/// for a document where any render failed.
pub async fn transform<'a>(
    root: &'a AstNode<'a>,
    arena: &'a Arena<AstNode<'a>>,
    options: &Options,
) -> Result<(), TransformError> {
    let session = BrowserSession::launch().await?;
    transform_with_session(root, arena, options, session).await
}

/// [`transform`] against a caller-supplied session.
///
/// Takes the session by value and closes it on every exit path, success or
/// failure.
pub async fn transform_with_session<'a, S: RenderSession>(
    root: &'a AstNode<'a>,
    arena: &'a Arena<AstNode<'a>>,
    options: &Options,
    session: S,
) -> Result<(), TransformError> {
    let result = render_and_splice(root, arena, options, &session).await;
    match (result, session.close().await) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_err)) => Err(close_err),
        (Err(err), close_result) => {
            if let Err(close_err) = close_result {
                tracing::warn!("sandbox shutdown after a failed transform also failed: {close_err}");
            }
            Err(err)
        }
    }
}

async fn render_and_splice<'a, S: RenderSession>(
    root: &'a AstNode<'a>,
    arena: &'a Arena<AstNode<'a>>,
    options: &Options,
    session: &S,
) -> Result<(), TransformError> {
    let items = collect_diagrams(root);
    if items.is_empty() {
        tracing::debug!("no mermaid blocks to render");
        return Ok(());
    }

    let dual_theme = options.dark_enabled();
    let light_config = translate(options, RenderMode::Light)?;
    let dark_config = if dual_theme {
        Some(translate(options, RenderMode::Dark)?)
    } else {
        None
    };

    tracing::debug!(diagrams = items.len(), dual_theme, "rendering mermaid blocks");

    // Fan out: every render of every item is started here, and the whole
    // set settles before the first error (if any) surfaces.
    let renders = items
        .iter()
        .map(|item| render_item(session, item, &light_config, dark_config.as_ref()));
    let outcomes = join_all(renders).await;

    let mut rendered = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        rendered.push(outcome?);
    }

    // Mutation only starts once every render is known good.
    for (item, output) in items.iter().zip(rendered) {
        splice(arena, item, output);
    }
    Ok(())
}

/// Render one work item. With dual-theme enabled the light and dark renders
/// race against each other; there is no ordering between them.
async fn render_item<S: RenderSession>(
    session: &S,
    item: &WorkItem<'_>,
    light_config: &Value,
    dark_config: Option<&Value>,
) -> Result<RenderedItem, TransformError> {
    match dark_config {
        Some(config) => {
            let (light, dark) = join(
                session.render(&item.source, light_config, RenderMode::Light),
                session.render(&item.source, config, RenderMode::Dark),
            )
            .await;
            Ok(RenderedItem {
                light: light?,
                dark: Some(dark?),
            })
        }
        None => Ok(RenderedItem {
            light: session
                .render(&item.source, light_config, RenderMode::Light)
                .await?,
            dark: None,
        }),
    }
}

/// Replace one collected node with its rendered markup, light before dark.
fn splice<'a>(arena: &'a Arena<AstNode<'a>>, item: &WorkItem<'a>, output: RenderedItem) {
    tracing::debug!(index = item.index, "splicing rendered diagram");
    item.node.insert_before(html_node(arena, output.light));
    if let Some(dark) = output.dark {
        item.node.insert_before(html_node(arena, dark));
    }
    item.node.detach();
}

fn html_node<'a>(arena: &'a Arena<AstNode<'a>>, mut literal: String) -> &'a AstNode<'a> {
    if !literal.ends_with('\n') {
        literal.push('\n');
    }
    arena.alloc(AstNode::new(RefCell::new(Ast::new(
        NodeValue::HtmlBlock(NodeHtmlBlock {
            block_type: 0,
            literal,
        }),
        LineColumn { line: 0, column: 0 },
    ))))
}
