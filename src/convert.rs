// ABOUTME: Converts a document and its top-level blocks into an article payload
// ABOUTME: Pure and deterministic; missing fields degrade to empty strings

use crate::model::{plain_text, ArticlePayload, Block, BlockKind, Document};
use crate::util::escape_html;
use tracing::debug;

pub const AUTHOR_PROPERTY: &str = "Author";
pub const DIGEST_PROPERTY: &str = "Digest";
pub const COVER_PROPERTY: &str = "Cover";

pub fn transform(document: &Document, blocks: &[Block]) -> ArticlePayload {
    let content = blocks
        .iter()
        .map(block_to_html)
        .collect::<Vec<_>>()
        .join("\n");

    ArticlePayload {
        title: document.title.clone(),
        author: document.property_text(AUTHOR_PROPERTY),
        digest: document.property_text(DIGEST_PROPERTY),
        content,
        cover_url: document
            .property(COVER_PROPERTY)
            .and_then(|prop| prop.link())
            .map(str::to_string),
        content_source_url: document.url.clone(),
        show_cover_pic: true,
        need_open_comment: true,
        only_fans_can_comment: false,
    }
}

fn block_to_html(block: &Block) -> String {
    match &block.kind {
        BlockKind::Paragraph(runs) => format!("<p>{}</p>", escape_html(&plain_text(runs))),
        BlockKind::Heading(level, runs) => {
            let tag = level.tag();
            format!("<{tag}>{}</{tag}>", escape_html(&plain_text(runs)))
        }
        BlockKind::Image { url, caption } => {
            let alt = caption
                .first()
                .map(|run| run.plain_text.as_str())
                .unwrap_or("");
            format!(
                r#"<img src="{}" alt="{}" />"#,
                escape_html(url),
                escape_html(alt)
            )
        }
        // No markup mapping yet; the block still takes its slot in the output
        BlockKind::Unsupported(kind) => {
            debug!(block_id = %block.id, kind = %kind, "dropping unsupported block");
            String::new()
        }
    }
}
