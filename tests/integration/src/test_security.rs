//! Security hooks through the full service.

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use brisk_http::{Api, ApiService, Json};
    use brisk_model::{
        ApiKeyAuth, AuthFuture, Bits, Field, FieldType, HttpError, Input, RequestContext,
        SecurityScheme, Shape,
    };
    use futures::FutureExt;
    use http::StatusCode;
    use serde::Deserialize;
    use serde_json::{Value, json};

    use crate::{TestRequest, init_tracing};

    /// Request ids seen by the verifier, one entry per call.
    static VERIFIED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn verifications(request_id: &str) -> usize {
        VERIFIED.lock().unwrap().iter().filter(|id| *id == request_id).count()
    }

    /// Accepts key `k1` for tenant `acme` only.
    struct TenantKeys;

    impl ApiKeyAuth for TenantKeys {
        fn verify<'a>(&'a self, ctx: &'a RequestContext, keys: Value) -> AuthFuture<'a> {
            VERIFIED.lock().unwrap().push(ctx.request_id().to_owned());
            async move {
                match (keys["key"].as_str(), keys["tenant"].as_str()) {
                    (Some("k1"), Some("acme")) => Ok(json!({
                        "tenant": "acme",
                        "request": ctx.request_id(),
                    })),
                    (Some("k1"), _) => Err(HttpError::forbidden("tenant not allowed")),
                    _ => Err(HttpError::unauthorized("invalid api key")),
                }
            }
            .boxed()
        }
    }

    fn tenant_keys() -> Shape {
        Shape::new("TenantKeys")
            .field(Field::new("key", FieldType::String).tag("header", "x-api-key"))
            .field(Field::new("tenant", FieldType::String).tag("query", "tenant"))
    }

    #[derive(Debug, Deserialize)]
    struct Report {
        year: u16,
        auth: Value,
    }

    impl Input for Report {
        fn shape() -> Shape {
            let scheme = SecurityScheme::api_key(tenant_keys(), TenantKeys);
            Shape::new("Report")
                .field(Field::route().tag("path", "/reports/{year}").tag("method", "GET"))
                .field(
                    Field::new("year", FieldType::Uint(Bits::B16))
                        .tag("path", "year")
                        .tag("gte", "2000"),
                )
                .field(Field::new("auth", FieldType::Security(scheme)))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Session {
        token: String,
    }

    #[derive(Debug, Deserialize)]
    struct Profile {
        session: Session,
        user: Value,
    }

    impl Input for Profile {
        fn shape() -> Shape {
            let bearer = SecurityScheme::bearer_fn(|ctx, token| {
                let session = ctx.header("x-session").unwrap_or_default();
                if token == "t0ken" {
                    Ok(json!({ "name": "ann", "session": session }))
                } else {
                    Err(HttpError::forbidden("unknown token"))
                }
            });
            // Mix-in struct: its fields bind as if declared inline.
            let session = Shape::new("Session")
                .field(Field::new("token", FieldType::String).tag("header", "x-session"));
            Shape::new("Profile")
                .field(Field::route().tag("path", "/profile").tag("method", "GET"))
                .field(Field::new("user", FieldType::Security(bearer)))
                .field(Field::new("session", FieldType::Struct(session)))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Admin {
        who: Option<Value>,
    }

    impl Input for Admin {
        fn shape() -> Shape {
            let basic = SecurityScheme::basic_fn(|_, creds| {
                if creds.username == "root" && creds.password == "hunter2" {
                    Ok(Value::from(creds.username.clone()))
                } else {
                    Err(HttpError::unauthorized("bad credentials"))
                }
            });
            Shape::new("Admin")
                .field(Field::route().tag("path", "/admin").tag("method", "GET"))
                .field(Field::new("who", FieldType::optional(FieldType::Security(basic))))
        }
    }

    fn service() -> ApiService {
        init_tracing();
        let mut api = Api::default();
        api.register(|input: Report| async move { Json(json!({"year": input.year, "auth": input.auth})) })
            .unwrap();
        api.register(|input: Profile| async move {
            Json(json!({"user": input.user, "session": input.session.token}))
        })
        .unwrap();
        api.register(|input: Admin| async move {
            input
                .who
                .and_then(|w| w.as_str().map(str::to_owned))
                .unwrap_or_else(|| "anonymous".to_owned())
        })
        .unwrap();
        api.into_service()
    }

    #[tokio::test]
    async fn test_should_verify_api_key_object_once_per_request() {
        let response = TestRequest::get("/reports/2024?tenant=acme")
            .header("x-api-key", "k1")
            .send(&service())
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());

        let request_id = response.headers["x-request-id"].to_str().unwrap();
        assert_eq!(verifications(request_id), 1);
        let body = response.json();
        assert_eq!(body["auth"]["tenant"], "acme");
        assert_eq!(body["auth"]["request"], request_id);
    }

    #[tokio::test]
    async fn test_should_run_hooks_after_plain_fields() {
        let response = TestRequest::get("/reports/1999?tenant=acme")
            .header("x-api-key", "k1")
            .send(&service())
            .await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.detail(), "year must be greater than or equal to 2000");

        let request_id = response.headers["x-request-id"].to_str().unwrap();
        assert_eq!(verifications(request_id), 0);
    }

    #[tokio::test]
    async fn test_should_surface_verifier_errors() {
        let service = service();

        let response = TestRequest::get("/reports/2024?tenant=other")
            .header("x-api-key", "k1")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.detail(), "tenant not allowed");

        let response = TestRequest::get("/reports/2024?tenant=acme")
            .header("x-api-key", "nope")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let response = TestRequest::get("/reports/2024?tenant=acme").send(&service).await;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.detail().contains("is required"), "{}", response.detail());
    }

    #[tokio::test]
    async fn test_should_verify_bearer_with_mixin_fields_bound() {
        let service = service();

        let response = TestRequest::get("/profile")
            .header("authorization", "Bearer t0ken")
            .header("x-session", "s-1")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        assert_eq!(
            response.json(),
            json!({"user": {"name": "ann", "session": "s-1"}, "session": "s-1"})
        );

        let response = TestRequest::get("/profile")
            .header("authorization", "Bearer stolen")
            .header("x-session", "s-1")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);

        let response = TestRequest::get("/profile")
            .header("x-session", "s-1")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_treat_optional_basic_as_anonymous_when_absent() {
        let service = service();

        let response = TestRequest::get("/admin").send(&service).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "anonymous");

        // root:hunter2
        let response = TestRequest::get("/admin")
            .header("authorization", "Basic cm9vdDpodW50ZXIy")
            .send(&service)
            .await;
        assert_eq!(response.text(), "root");

        // root:guess
        let response = TestRequest::get("/admin")
            .header("authorization", "Basic cm9vdDpndWVzcw==")
            .send(&service)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }
}
