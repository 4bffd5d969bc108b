//! Static directory endpoints.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use brisk_model::{HttpError, RequestContext};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http::{Method, StatusCode};

use crate::body::ResponseBody;
use crate::handler::Endpoint;
use crate::response::{Response, error_to_response};

/// Name of the catch-all parameter holding the requested file.
pub const FILEPATH: &str = "filepath";

/// Content type by file extension.
fn content_type(path: &Path) -> mime::Mime {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT_UTF_8,
        "json" => mime::APPLICATION_JSON,
        "xml" => mime::TEXT_XML,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "csv" => mime::TEXT_CSV_UTF_8,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Map a request path below the root to a file path, refusing anything that
/// would leave the root.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

async fn serve(root: &Path, relative: &str, head: bool) -> Response {
    let not_found = || error_to_response(&HttpError::not_found("not found"));
    let Some(mut path) = resolve(root, relative) else {
        return not_found();
    };
    if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path.push("index.html");
    }

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            return not_found();
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read static file");
            return error_to_response(&HttpError::internal("failed to read file"));
        }
    };

    let length = HeaderValue::from(data.len());
    let body = if head {
        ResponseBody::empty()
    } else {
        ResponseBody::from_bytes(data)
    };
    let mut response = http::Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type(&path).as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, length);
    response
}

/// Endpoint serving files below `root`.
pub(crate) fn directory(root: PathBuf) -> Endpoint {
    let root = Arc::new(root);
    Arc::new(move |ctx: RequestContext, _body: Bytes| -> BoxFuture<'static, Response> {
        let root = Arc::clone(&root);
        Box::pin(async move {
            let relative = ctx.params().get(FILEPATH).unwrap_or_default();
            serve(&root, relative, ctx.method() == Method::HEAD).await
        })
    })
}
