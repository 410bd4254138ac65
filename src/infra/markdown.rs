//! Filesystem-backed markdown renderer.
//!
//! Maps a route key to `<content_dir>/<key>.md` (the root key `/` maps to
//! `index.md`), renders it with comrak, and reads an optional TOML front
//! matter block for a per-key revalidation override:
//!
//! ```markdown
//! +++
//! revalidate = 30        # or revalidate = "never"
//! +++
//! # Page title
//! ```

use std::path::{Component, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use comrak::markdown_to_html;
use comrak::options::Options;
use serde::Deserialize;
use tracing::debug;

use crate::application::renderer::{RenderError, RenderedPage, Renderer};
use crate::domain::artifact::Revalidate;
use crate::domain::key::RouteKey;

const FRONT_MATTER_DELIMITER: &str = "+++";
const INDEX_FILE_STEM: &str = "index";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    revalidate: Option<RevalidateField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RevalidateField {
    Seconds(u64),
    Keyword(String),
}

pub struct MarkdownRenderer {
    content_dir: PathBuf,
    options: Options<'static>,
}

impl MarkdownRenderer {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
            options: default_options(),
        }
    }

    /// Map a route key to a file under the content directory.
    ///
    /// Keys with parent-directory or otherwise non-plain components resolve
    /// to not-found rather than escaping the content root.
    fn resolve(&self, key: &RouteKey) -> Result<PathBuf, RenderError> {
        let trimmed = key.as_str().trim_matches('/');
        let relative = if trimmed.is_empty() {
            PathBuf::from(INDEX_FILE_STEM)
        } else {
            let candidate = PathBuf::from(trimmed);
            if candidate
                .components()
                .any(|part| !matches!(part, Component::Normal(_)))
            {
                return Err(RenderError::not_found(key));
            }
            candidate
        };

        Ok(self.content_dir.join(relative.with_extension("md")))
    }
}

#[async_trait]
impl Renderer for MarkdownRenderer {
    async fn render(&self, key: &RouteKey) -> Result<RenderedPage, RenderError> {
        let path = self.resolve(key)?;
        let raw = tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RenderError::not_found(key)
            } else {
                RenderError::failed(format!("read `{}`: {err}", path.display()))
            }
        })?;

        let revalidate = parse_front_matter(&raw, key)?;
        let html = markdown_to_html(&raw, &self.options);

        debug!(key = %key, path = %path.display(), bytes = html.len(), "rendered markdown source");
        Ok(RenderedPage {
            body: Bytes::from(html),
            revalidate,
        })
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.front_matter_delimiter = Some(FRONT_MATTER_DELIMITER.to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.gfm_quirks = true;

    options
}

/// Extract the front matter block, if any, and read the revalidation
/// override from it.
fn parse_front_matter(raw: &str, key: &RouteKey) -> Result<Option<Revalidate>, RenderError> {
    let Some(block) = front_matter_block(raw) else {
        return Ok(None);
    };

    let front: FrontMatter = toml::from_str(block)
        .map_err(|err| RenderError::failed(format!("front matter for `{key}`: {err}")))?;

    match front.revalidate {
        None => Ok(None),
        Some(RevalidateField::Seconds(secs)) => Ok(Some(Revalidate::AfterSeconds(secs))),
        Some(RevalidateField::Keyword(word)) if word == "never" => Ok(Some(Revalidate::Never)),
        Some(RevalidateField::Keyword(word)) => Err(RenderError::failed(format!(
            "front matter for `{key}`: revalidate must be a non-negative integer or \"never\", got `{word}`"
        ))),
    }
}

fn front_matter_block(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix(FRONT_MATTER_DELIMITER)?;
    let rest = rest.strip_prefix('\n').or_else(|| {
        rest.strip_prefix("\r\n")
    })?;
    let end = rest.find(&format!("\n{FRONT_MATTER_DELIMITER}"))?;
    Some(&rest[..end])
}
