//! Decoding and validation through the full service.

#[cfg(test)]
mod tests {
    use brisk_core::ApiConfig;
    use brisk_http::{Api, ApiService, Json};
    use brisk_model::{Bits, Field, FieldType, Input, Shape, UploadedFile};
    use http::{Method, StatusCode};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use crate::{TestRequest, init_tracing};

    fn route(path: &str, method: &str) -> Field {
        Field::route().tag("path", path).tag("method", method)
    }

    #[derive(Debug, Deserialize)]
    struct Count {
        n: i64,
    }

    #[derive(Debug, Deserialize)]
    struct OptionalCount {
        n: i64,
    }

    impl Input for Count {
        fn shape() -> Shape {
            Shape::new("Count")
                .field(route("/count", "GET"))
                .field(Field::new("n", FieldType::Int(Bits::B64)).tag("query", "n"))
        }
    }

    impl Input for OptionalCount {
        fn shape() -> Shape {
            Shape::new("OptionalCount")
                .field(route("/maybe", "GET"))
                .field(Field::new("n", FieldType::Int(Bits::B64)).tag("query", "n,omitempty"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Bounded {
        level: u8,
        step: f64,
    }

    impl Input for Bounded {
        fn shape() -> Shape {
            Shape::new("Bounded")
                .field(route("/bounded", "GET"))
                .field(
                    Field::new("level", FieldType::Uint(Bits::B8))
                        .tag("query", "level,omitempty")
                        .tag("gte", "1")
                        .tag("lte", "10")
                        .tag("default", "5"),
                )
                .field(
                    Field::new("step", FieldType::Float(Bits::B64))
                        .tag("query", "step,omitempty")
                        .tag("multiple", "0.5")
                        .tag("default", "1"),
                )
        }
    }

    #[derive(Debug, Deserialize)]
    struct Search {
        q: String,
        page: u32,
        tags: Vec<String>,
        trace: Option<String>,
        session: Option<String>,
    }

    impl Input for Search {
        fn shape() -> Shape {
            Shape::new("Search")
                .field(route("/search", "GET"))
                .field(
                    Field::new("q", FieldType::String)
                        .tag("query", "q")
                        .tag("min", "2")
                        .tag("regexp", "^[a-z ]+$"),
                )
                .field(
                    Field::new("page", FieldType::Uint(Bits::B32))
                        .tag("query", "page")
                        .tag("gte", "1"),
                )
                .field(
                    Field::new("tags", FieldType::slice(FieldType::String))
                        .tag("query", "tags,omitempty")
                        .tag("enum", "rust,go,zig")
                        .tag("unique", "true"),
                )
                .field(Field::new("trace", FieldType::optional(FieldType::String)).tag("header", "x-trace"))
                .field(Field::new("session", FieldType::optional(FieldType::String)).tag("cookie", "sid"))
        }
    }

    #[derive(Debug, Serialize)]
    struct SearchEcho {
        q: String,
        page: u32,
        tags: Vec<String>,
        trace: Option<String>,
        session: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        sku: String,
        qty: u32,
    }

    #[derive(Debug, Deserialize)]
    struct CreateOrder {
        id: u64,
        order: Order,
    }

    #[derive(Debug, Deserialize)]
    struct Order {
        customer: String,
        items: Vec<Item>,
        note: Option<String>,
    }

    impl Input for CreateOrder {
        fn shape() -> Shape {
            let item = Shape::new("Item")
                .field(
                    Field::new("sku", FieldType::String)
                        .tag("json", "sku")
                        .tag("xml", "Sku")
                        .tag("min", "3"),
                )
                .field(
                    Field::new("qty", FieldType::Uint(Bits::B32))
                        .tag("json", "qty")
                        .tag("xml", "Qty")
                        .tag("gte", "1"),
                );
            let order = Shape::new("Order")
                .field(Field::new("customer", FieldType::String).tag("json", "customer").tag("xml", "Customer"))
                .field(
                    Field::new("items", FieldType::slice(FieldType::Struct(item)))
                        .tag("json", "items")
                        .tag("xml", "Item")
                        .tag("min", "1"),
                )
                .field(
                    Field::new("note", FieldType::optional(FieldType::String))
                        .tag("json", "note,omitempty")
                        .tag("xml", "Note"),
                );
            Shape::new("CreateOrder")
                .field(route("/shops/{id}/orders", "POST"))
                .field(Field::new("id", FieldType::Uint(Bits::B64)).tag("path", "id"))
                .field(Field::new("order", FieldType::Struct(order)).tag("body", "json,xml"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Upload {
        title: String,
        files: Vec<UploadedFile>,
    }

    impl Input for Upload {
        fn shape() -> Shape {
            Shape::new("Upload")
                .field(route("/upload", "POST"))
                .field(Field::new("title", FieldType::String).tag("form", "title"))
                .field(Field::new("files", FieldType::Files).tag("file", "doc").tag("max", "2"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Login {
        user: String,
        remember: bool,
    }

    impl Input for Login {
        fn shape() -> Shape {
            Shape::new("Login")
                .field(route("/login", "POST"))
                .field(Field::new("user", FieldType::String).tag("form", "user"))
                .field(Field::new("remember", FieldType::Bool).tag("form", "remember,omitempty"))
        }
    }

    fn service_with(config: ApiConfig) -> ApiService {
        init_tracing();
        let mut api = Api::new(config);
        api.register(|input: Count| async move { input.n.to_string() }).unwrap();
        api.register(|input: OptionalCount| async move { input.n.to_string() })
            .unwrap();
        api.register(|input: Bounded| async move { format!("{}/{}", input.level, input.step) })
            .unwrap();
        api.register(|input: Search| async move {
            Json(SearchEcho {
                q: input.q,
                page: input.page,
                tags: input.tags,
                trace: input.trace,
                session: input.session,
            })
        })
        .unwrap();
        api.register(|input: CreateOrder| async move {
            let total: u32 = input.order.items.iter().map(|i| i.qty).sum();
            Json(json!({
                "shop": input.id,
                "customer": input.order.customer,
                "total": total,
                "note": input.order.note,
            }))
        })
        .unwrap();
        api.register(|input: Upload| async move {
            let names: Vec<_> = input.files.iter().map(|f| f.filename.clone()).collect();
            format!("{}: {}", input.title, names.join(","))
        })
        .unwrap();
        api.register(|input: Login| async move { format!("{} {}", input.user, input.remember) })
            .unwrap();
        api.into_service()
    }

    fn service() -> ApiService {
        service_with(ApiConfig::default())
    }

    #[tokio::test]
    async fn test_should_round_trip_query_number() {
        let service = service();

        let response = TestRequest::get("/count?n=42").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "42");

        let response = TestRequest::get("/maybe").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "0");

        let response = TestRequest::get("/count").send(&service).await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json()["code"], 422);
        assert_eq!(response.detail(), "n is required");
    }

    #[tokio::test]
    async fn test_should_reject_unparseable_number() {
        let response = TestRequest::get("/count?n=forty").send(&service()).await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.detail().starts_with("n: cannot parse"), "{}", response.detail());
    }

    #[tokio::test]
    async fn test_should_enforce_inclusive_bounds() {
        let service = service();
        for (level, ok) in [("1", true), ("10", true), ("0", false), ("11", false)] {
            let response = TestRequest::get(format!("/bounded?level={level}"))
                .send(&service)
                .await;
            assert_eq!(response.status == StatusCode::OK, ok, "level={level}: {}", response.text());
        }

        let response = TestRequest::get("/bounded?level=11").send(&service).await;
        assert_eq!(response.detail(), "level must be less than or equal to 10");

        let response = TestRequest::get("/bounded").send(&service).await;
        assert_eq!(response.text(), "5/1");
    }

    #[tokio::test]
    async fn test_should_check_decimal_multiples() {
        let service = service();

        let response = TestRequest::get("/bounded?step=1.5").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "5/1.5");

        let response = TestRequest::get("/bounded?step=1.3").send(&service).await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.detail().contains("multiple of"), "{}", response.detail());
    }

    #[tokio::test]
    async fn test_should_report_only_first_invalid_field() {
        let response = TestRequest::get("/bounded?level=0&step=0.3")
            .send(&service())
            .await;
        assert_eq!(response.detail(), "level must be greater than or equal to 1");

        let response = TestRequest::get("/search?q=X&page=0").send(&service()).await;
        assert!(response.detail().starts_with("q "), "{}", response.detail());
    }

    #[tokio::test]
    async fn test_should_bind_query_header_and_cookie() {
        let response = TestRequest::get("/search?q=hello&page=2&tags=rust,zig")
            .header("x-trace", "t-1")
            .header("cookie", "theme=dark; sid=abc")
            .send(&service())
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        assert_eq!(
            response.json(),
            json!({
                "q": "hello",
                "page": 2,
                "tags": ["rust", "zig"],
                "trace": "t-1",
                "session": "abc",
            })
        );
    }

    #[tokio::test]
    async fn test_should_validate_slice_elements() {
        let service = service();

        let response = TestRequest::get("/search?q=hello&page=1&tags=rust,java")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

        let response = TestRequest::get("/search?q=hello&page=1&tags=go,go")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.detail().starts_with("tags "), "{}", response.detail());
    }

    #[tokio::test]
    async fn test_should_decode_json_and_xml_bodies() {
        let service = service();

        let response = TestRequest::new(Method::POST, "/shops/7/orders")
            .json(&json!({
                "customer": "ann",
                "items": [{"sku": "abc", "qty": 2}, {"sku": "xyz", "qty": 3}],
            }))
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        assert_eq!(
            response.json(),
            json!({"shop": 7, "customer": "ann", "total": 5, "note": null})
        );

        let xml = "<Order><Customer>bob</Customer><Item><Sku>abc</Sku><Qty>4</Qty></Item>\
                   <Note>fragile</Note></Order>";
        let response = TestRequest::new(Method::POST, "/shops/8/orders")
            .header("content-type", "application/xml; charset=utf-8")
            .body(xml)
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        assert_eq!(
            response.json(),
            json!({"shop": 8, "customer": "bob", "total": 4, "note": "fragile"})
        );
    }

    #[tokio::test]
    async fn test_should_validate_nested_body_fields() {
        let service = service();

        let response = TestRequest::new(Method::POST, "/shops/7/orders")
            .json(&json!({"customer": "ann", "items": [{"sku": "abc", "qty": 0}]}))
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.detail().contains("qty"), "{}", response.detail());

        let response = TestRequest::new(Method::POST, "/shops/7/orders")
            .json(&json!({"customer": "ann", "items": []}))
            .send(&service)
            .await;
        assert_eq!(response.detail(), "order.items must have a length of at least 1");

        let response = TestRequest::new(Method::POST, "/shops/7/orders")
            .header("content-type", "application/json")
            .body("{not json")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_should_reject_unsupported_media_type() {
        let response = TestRequest::new(Method::POST, "/shops/7/orders")
            .header("content-type", "text/csv")
            .body("a,b")
            .send(&service())
            .await;
        assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_should_honor_configured_media_types_and_status() {
        let service = service_with(ApiConfig {
            validation_status: 400,
            media_types: vec![brisk_core::MediaType::Json],
            ..ApiConfig::default()
        });

        let response = TestRequest::new(Method::POST, "/shops/1/orders")
            .header("content-type", "application/xml")
            .body("<Order><Customer>bob</Customer></Order>")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = TestRequest::get("/count").send(&service).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json()["code"], 400);
    }

    #[tokio::test]
    async fn test_should_reject_oversized_body() {
        let service = service_with(ApiConfig {
            max_body_bytes: 16,
            ..ApiConfig::default()
        });
        let response = TestRequest::new(Method::POST, "/shops/7/orders")
            .json(&json!({"customer": "a very long customer name", "items": []}))
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_should_bind_multipart_files() {
        let body = "--B\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nreport\r\n\
--B\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\nalpha\r\n\
--B\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"b.txt\"\r\n\r\nbeta\r\n--B--\r\n";
        let response = TestRequest::new(Method::POST, "/upload")
            .header("content-type", "multipart/form-data; boundary=B")
            .body(body)
            .send(&service())
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        assert_eq!(response.text(), "report: a.txt,b.txt");
    }

    #[tokio::test]
    async fn test_should_bind_urlencoded_form() {
        let service = service();

        let response = TestRequest::new(Method::POST, "/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("user=ann+lee&remember=true")
            .send(&service)
            .await;
        assert_eq!(response.text(), "ann lee true");

        let response = TestRequest::new(Method::POST, "/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("remember=true")
            .send(&service)
            .await;
        assert_eq!(response.detail(), "user is required");
    }
}
