//! Raw value lookup in the matched request.
//!
//! Query string, cookies and forms are parsed lazily, at most once per
//! request, and only if some descriptor asks for them.

use std::cell::OnceCell;

use brisk_model::{HttpError, RequestContext, UploadedFile};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use percent_encoding::percent_decode_str;

use crate::multipart::{MultipartForm, extract_boundary, parse_multipart};

/// Lazily parsed view of one request.
#[derive(Debug)]
pub struct RequestData<'a> {
    ctx: &'a RequestContext,
    body: &'a Bytes,
    multipart: bool,
    query: OnceCell<Vec<(String, String)>>,
    cookies: OnceCell<Vec<(String, String)>>,
    form: OnceCell<MultipartForm>,
}

impl<'a> RequestData<'a> {
    /// Wrap a request. `multipart` forces multipart form parsing even when
    /// the content type says otherwise (the input declares file fields).
    #[must_use]
    pub fn new(ctx: &'a RequestContext, body: &'a Bytes, multipart: bool) -> Self {
        Self {
            ctx,
            body,
            multipart,
            query: OnceCell::new(),
            cookies: OnceCell::new(),
            form: OnceCell::new(),
        }
    }

    /// The request context.
    #[must_use]
    pub fn context(&self) -> &'a RequestContext {
        self.ctx
    }

    /// The collected body.
    #[must_use]
    pub fn body(&self) -> &'a Bytes {
        self.body
    }

    /// `Content-Type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&'a str> {
        self.ctx
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Every value of a header.
    #[must_use]
    pub fn header(&self, key: &str) -> Vec<&'a str> {
        self.ctx
            .headers()
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// A path parameter captured by the router.
    #[must_use]
    pub fn path(&self, key: &str) -> Vec<&'a str> {
        self.ctx.params().get(key).into_iter().collect()
    }

    /// Every value of a query parameter.
    #[must_use]
    pub fn query(&self, key: &str) -> Vec<&str> {
        let pairs = self.query.get_or_init(|| {
            self.ctx
                .uri()
                .query()
                .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
                .unwrap_or_default()
        });
        lookup(pairs, key)
    }

    /// Every value of a cookie.
    #[must_use]
    pub fn cookie(&self, key: &str) -> Vec<&str> {
        let pairs = self.cookies.get_or_init(|| {
            self.ctx
                .headers()
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|header| header.split(';'))
                .filter_map(|pair| {
                    let (name, value) = pair.trim().split_once('=')?;
                    let value = value.trim().trim_matches('"');
                    Some((
                        name.trim().to_owned(),
                        percent_decode_str(value).decode_utf8_lossy().into_owned(),
                    ))
                })
                .collect()
        });
        lookup(pairs, key)
    }

    /// Every value of a form field.
    pub fn form(&self, key: &str) -> Result<Vec<&str>, HttpError> {
        Ok(lookup(&self.parsed_form()?.fields, key))
    }

    /// Every file uploaded under `key`.
    pub fn files(&self, key: &str) -> Result<Vec<&UploadedFile>, HttpError> {
        Ok(self
            .parsed_form()?
            .files
            .iter()
            .filter(|(name, _)| name == key)
            .map(|(_, file)| file)
            .collect())
    }

    fn parsed_form(&self) -> Result<&MultipartForm, HttpError> {
        if let Some(form) = self.form.get() {
            return Ok(form);
        }
        let content_type = self.content_type().unwrap_or_default();
        let is_multipart = content_type
            .to_ascii_lowercase()
            .starts_with("multipart/form-data");
        let form = if self.multipart || is_multipart {
            let boundary = extract_boundary(content_type)
                .map_err(|e| HttpError::bad_request(e.to_string()))?;
            parse_multipart(self.body, &boundary)
        } else {
            MultipartForm {
                fields: form_urlencoded::parse(self.body).into_owned().collect(),
                files: Vec::new(),
            }
        };
        Ok(self.form.get_or_init(|| form))
    }
}

fn lookup<'p>(pairs: &'p [(String, String)], key: &str) -> Vec<&'p str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}
