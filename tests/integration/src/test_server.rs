//! Service-level behavior: panics, middleware, localization, transport.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use brisk_core::Catalog;
    use brisk_http::{Api, ApiService, Middleware, Next, Responder, Response, TraceRequests};
    use brisk_model::{Bits, Field, FieldType, HttpError, Input, RequestContext, Shape};
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use http::header::HeaderValue;
    use http::{Method, StatusCode};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
    use serde::Deserialize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::{TestRequest, init_tracing};

    #[derive(Debug, Deserialize)]
    struct Divide {
        a: i64,
        b: i64,
    }

    impl Input for Divide {
        fn shape() -> Shape {
            Shape::new("Divide")
                .field(Field::route().tag("path", "/divide").tag("method", "GET"))
                .field(Field::new("a", FieldType::Int(Bits::B64)).tag("query", "a"))
                .field(Field::new("b", FieldType::Int(Bits::B64)).tag("query", "b,omitempty"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Ping {}

    impl Input for Ping {
        fn shape() -> Shape {
            Shape::new("Ping").field(Field::route().tag("path", "/ping").tag("method", "GET,HEAD"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Forget {}

    impl Input for Forget {
        fn shape() -> Shape {
            Shape::new("Forget").field(Field::route().tag("path", "/forget").tag("method", "DELETE"))
        }
    }

    async fn divide(input: Divide) -> Result<String, HttpError> {
        if input.b == 0 {
            return Err(HttpError::bad_request("division by zero"));
        }
        if input.a == i64::MIN && input.b == -1 {
            panic!("overflow dividing {} by {}", input.a, input.b);
        }
        Ok((input.a / input.b).to_string())
    }

    async fn ping(_: Ping) -> &'static str {
        "pong"
    }

    async fn forget(_: Forget) {}

    fn api() -> Api {
        register(Api::default())
    }

    fn register(mut api: Api) -> Api {
        init_tracing();
        api.register(divide).unwrap();
        api.register(ping).unwrap();
        api.register(forget).unwrap();
        api
    }

    fn service() -> ApiService {
        api().into_service()
    }

    #[tokio::test]
    async fn test_should_convert_handler_errors() {
        let service = service();

        let response = TestRequest::get("/divide?a=9&b=3").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "3");

        let response = TestRequest::get("/divide?a=9").send(&service).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json(),
            serde_json::json!({"code": 400, "detail": "division by zero"})
        );
        assert_eq!(response.headers["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_should_recover_from_panic_and_keep_serving() {
        let service = service();

        let response = TestRequest::get(format!("/divide?a={}&b=-1", i64::MIN))
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json()["code"], 500);
        assert!(response.headers.contains_key("x-request-id"));

        let response = TestRequest::get("/ping").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_answer_unit_handlers_with_no_content() {
        let response = TestRequest::new(Method::DELETE, "/forget").send(&service()).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_should_stamp_request_id_and_server() {
        let service = service();
        let first = TestRequest::get("/ping").send(&service).await;
        let second = TestRequest::get("/ping").send(&service).await;
        assert_eq!(first.headers["server"], "brisk");
        assert_ne!(first.headers["x-request-id"], second.headers["x-request-id"]);
    }

    #[tokio::test]
    async fn test_should_localize_messages_by_accept_language() {
        let catalog = Catalog::new("en").with_language(
            "de",
            [
                ("required", "{field} ist erforderlich"),
                ("parse", "{field} ist keine gültige Zahl"),
            ],
        );
        let service = register(Api::default().with_localizer(catalog)).into_service();

        let response = TestRequest::get("/divide")
            .header("accept-language", "de-CH, de;q=0.9, en;q=0.5")
            .send(&service)
            .await;
        assert_eq!(response.detail(), "a ist erforderlich");

        let response = TestRequest::get("/divide")
            .header("accept-language", "fr")
            .send(&service)
            .await;
        assert_eq!(response.detail(), "a is required");
    }

    /// Records the order in which links run.
    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Record {
        fn handle<'a>(&'a self, ctx: RequestContext, body: Bytes, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} {}", self.name, ctx.path()));
                let mut response = next.run(ctx, body).await;
                response
                    .headers_mut()
                    .append("x-via", HeaderValue::from_static(self.name));
                response
            })
        }
    }

    /// Rejects requests without an `x-tenant` header.
    struct RequireTenant;

    impl Middleware for RequireTenant {
        fn handle<'a>(&'a self, ctx: RequestContext, body: Bytes, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                if ctx.header("x-tenant").is_none() {
                    return HttpError::forbidden("missing tenant").respond();
                }
                next.run(ctx, body).await
            })
        }
    }

    #[tokio::test]
    async fn test_should_run_middleware_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut api = api();
        api.middleware(Record {
            name: "outer",
            log: Arc::clone(&log),
        })
        .middleware(TraceRequests)
        .middleware(RequireTenant)
        .middleware(Record {
            name: "inner",
            log: Arc::clone(&log),
        });
        let service = api.into_service();

        let response = TestRequest::get("/ping")
            .header("x-tenant", "acme")
            .send(&service)
            .await;
        assert_eq!(response.text(), "pong");
        let via: Vec<_> = response.headers.get_all("x-via").iter().collect();
        assert_eq!(via, ["inner", "outer"]);

        let response = TestRequest::get("/ping").send(&service).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), ["outer /ping", "inner /ping", "outer /ping"]);

        // Unmatched requests pass through the chain too.
        let response = TestRequest::get("/missing")
            .header("x-tenant", "acme")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("inner /missing"));
    }

    #[tokio::test]
    async fn test_should_serve_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = service();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            HttpConnBuilder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
                .unwrap();
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /divide?a=10&b=4 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        server.await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains("server: brisk"), "{response}");
        assert!(response.ends_with("\r\n\r\n2"), "{response}");
    }
}
