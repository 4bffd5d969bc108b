//! Route resolution through the full service.

#[cfg(test)]
mod tests {
    use brisk_http::{Api, ApiError, RouteError};
    use brisk_model::{Field, FieldType, Input, RequestContext, Shape};
    use http::{Method, StatusCode};
    use serde::Deserialize;

    use crate::{TestRequest, init_tracing};

    #[derive(Debug, Deserialize)]
    struct Me {}

    impl Input for Me {
        fn shape() -> Shape {
            Shape::new("Me").field(Field::route().tag("path", "/users/me").tag("method", "GET"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct ById {
        id: String,
    }

    impl Input for ById {
        fn shape() -> Shape {
            Shape::new("ById")
                .field(Field::route().tag("path", "/users/{id}").tag("method", "GET"))
                .field(Field::new("id", FieldType::String).tag("path", "id"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Slug {
        name: String,
        ext: String,
    }

    impl Input for Slug {
        fn shape() -> Shape {
            Shape::new("Slug")
                .field(Field::route().tag("path", "/files/{name}.{ext}").tag("method", "GET"))
                .field(Field::new("name", FieldType::String).tag("path", "name"))
                .field(Field::new("ext", FieldType::String).tag("path", "ext"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct ByName {
        name: String,
    }

    impl Input for ByName {
        fn shape() -> Shape {
            Shape::new("ByName")
                .field(Field::route().tag("path", "/users/{name}").tag("method", "GET"))
                .field(Field::new("name", FieldType::String).tag("path", "name"))
        }
    }

    fn api(literal_first: bool) -> Api {
        init_tracing();
        let mut api = Api::default();
        let me = |_: Me| async { "me" };
        let by_id = |input: ById| async move { format!("id={}", input.id) };
        if literal_first {
            api.register(me).unwrap();
            api.register(by_id).unwrap();
        } else {
            api.register(by_id).unwrap();
            api.register(me).unwrap();
        }
        api
    }

    #[tokio::test]
    async fn test_should_prefer_literal_over_param_in_either_order() {
        for literal_first in [true, false] {
            let service = api(literal_first).into_service();

            let response = TestRequest::get("/users/me").send(&service).await;
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.text(), "me");

            let response = TestRequest::get("/users/123").send(&service).await;
            assert_eq!(response.text(), "id=123");
        }
    }

    #[tokio::test]
    async fn test_should_keep_first_registered_overlapping_param() {
        let mut api = api(true);
        api.register(|input: ByName| async move { format!("name={}", input.name) })
            .unwrap();
        let service = api.into_service();

        let response = TestRequest::get("/users/ann").send(&service).await;
        assert_eq!(response.text(), "id=ann");
    }

    #[tokio::test]
    async fn test_should_capture_params_around_fixed_text() {
        let mut api = Api::default();
        api.register(|input: Slug| async move { format!("{}|{}", input.name, input.ext) })
            .unwrap();
        let service = api.into_service();

        let response = TestRequest::get("/files/report.final.pdf").send(&service).await;
        assert_eq!(response.text(), "report|final.pdf");

        let response = TestRequest::get("/files/readme").send(&service).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_decode_percent_encoded_params() {
        let service = api(true).into_service();
        let response = TestRequest::get("/users/a%20b").send(&service).await;
        assert_eq!(response.text(), "id=a b");
    }

    #[tokio::test]
    async fn test_should_serve_static_prefix_and_subpaths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>root</p>").unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        std::fs::write(dir.path().join("x/y.png"), b"\x89PNG").unwrap();

        let mut api = Api::default();
        api.static_dir("/assets", dir.path()).unwrap();
        let service = api.into_service();

        let response = TestRequest::get("/assets").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "<p>root</p>");

        let response = TestRequest::get("/assets/x/y.png").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["content-type"], "image/png");
        assert_eq!(response.body.as_ref(), b"\x89PNG");

        let response = TestRequest::get("/assets/../Cargo.toml").send(&service).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_answer_unmatched_method_and_path_with_404() {
        let service = api(true).into_service();

        let response = TestRequest::new(Method::POST, "/users/me").send(&service).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json()["code"], 404);

        let response = TestRequest::get("/nowhere").send(&service).await;
        assert_eq!(response.detail(), "no route for GET /nowhere");
    }

    #[tokio::test]
    async fn test_should_use_custom_not_found_handler() {
        let mut api = api(true);
        api.not_found(|ctx: RequestContext| async move {
            (StatusCode::NOT_FOUND, format!("missing {}", ctx.path()))
        });
        let service = api.into_service();

        let response = TestRequest::get("/gone").send(&service).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "missing /gone");
    }

    #[test]
    fn test_should_fail_registration_on_duplicate_route() {
        let mut api = api(true);
        let err = api.register(|_: Me| async {}).unwrap_err();
        assert!(matches!(err, ApiError::Route(RouteError::Duplicate { .. })));
    }
}
