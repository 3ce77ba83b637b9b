//! Serving files from a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mime_guess::mime;
use tracing::debug;

use crate::context::Context;
use crate::handler::{BoxFuture, Handler, HandlerResult};
use crate::path::clean;
use crate::response::Response;

/// Name of the catch-all parameter holding the requested file.
pub const FILEPATH_PARAM: &str = "filepath";

/// Handler answering with the file named by the `filepath` parameter.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Serves files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory files are served from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a requested path below the root. `..` never leaves the root.
    pub fn resolve(&self, requested: &str) -> PathBuf {
        let cleaned = clean(requested);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

impl Handler for StaticFiles {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let path = self.resolve(ctx.param(FILEPATH_PARAM).unwrap_or_default());

            let is_file = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.is_file(),
                Err(err) if err.kind() == ErrorKind::NotFound => false,
                Err(err) => return Err(err.into()),
            };
            if !is_file {
                debug!(path = %path.display(), "no such file");
                ctx.send(Response::not_found());
                return Ok(());
            }

            let body = tokio::fs::read(&path).await?;
            ctx.send(
                Response::ok()
                    .header("Content-Type", content_type(&path))
                    .body(body),
            );
            Ok(())
        })
    }
}

/// Guesses a `Content-Type` from the file extension.
///
/// Text types are labelled UTF-8.
pub fn content_type(path: &Path) -> String {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    if guessed.type_() == mime::TEXT && guessed.get_param(mime::CHARSET).is_none() {
        format!("{guessed}; charset=utf-8")
    } else {
        guessed.to_string()
    }
}
