//! A small in-memory user directory exposed through brisk inputs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use brisk_http::{Api, ApiError, Json};
use brisk_model::{Bits, Field, FieldType, HttpError, Input, SecurityScheme, Shape};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A stored user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
}

/// User fields accepted on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: Option<u8>,
}

fn new_user_shape() -> Shape {
    Shape::new("NewUser")
        .field(
            Field::new("name", FieldType::String)
                .tag("json", "name")
                .tag("xml", "Name")
                .tag("min", "2")
                .tag("max", "64"),
        )
        .field(
            Field::new("email", FieldType::String)
                .tag("json", "email")
                .tag("xml", "Email")
                .tag("regexp", r"^[^@\s]+@[^@\s]+$"),
        )
        .field(
            Field::new("age", FieldType::optional(FieldType::Uint(Bits::B8)))
                .tag("json", "age,omitempty")
                .tag("xml", "Age")
                .tag("lte", "150"),
        )
}

/// `POST /users`
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub user: NewUser,
}

impl Input for CreateUser {
    fn shape() -> Shape {
        Shape::new("CreateUser")
            .field(
                Field::route()
                    .tag("path", "/users")
                    .tag("method", "POST")
                    .tag("summary", "Create a user")
                    .tag("tags", "users"),
            )
            .field(Field::new("user", FieldType::Struct(new_user_shape())).tag("body", "json,xml"))
    }
}

/// `GET /users/{id}`
#[derive(Debug, Deserialize)]
pub struct GetUser {
    pub id: u64,
}

impl Input for GetUser {
    fn shape() -> Shape {
        Shape::new("GetUser")
            .field(
                Field::route()
                    .tag("path", "/users/{id}")
                    .tag("method", "GET,HEAD")
                    .tag("summary", "Fetch a user")
                    .tag("tags", "users"),
            )
            .field(Field::new("id", FieldType::Uint(Bits::B64)).tag("path", "id").tag("gte", "1"))
    }
}

/// `GET /users`
#[derive(Debug, Deserialize)]
pub struct ListUsers {
    pub limit: u32,
    pub offset: u32,
    pub name: Option<String>,
}

impl Input for ListUsers {
    fn shape() -> Shape {
        Shape::new("ListUsers")
            .field(
                Field::route()
                    .tag("path", "/users")
                    .tag("method", "GET")
                    .tag("summary", "List users")
                    .tag("tags", "users"),
            )
            .field(
                Field::new("limit", FieldType::Uint(Bits::B32))
                    .tag("query", "limit")
                    .tag("default", "20")
                    .tag("gte", "1")
                    .tag("lte", "100"),
            )
            .field(Field::new("offset", FieldType::Uint(Bits::B32)).tag("query", "offset,omitempty"))
            .field(Field::new("name", FieldType::optional(FieldType::String)).tag("query", "name"))
    }
}

/// `DELETE /users/{id}`, admin only.
#[derive(Debug, Deserialize)]
pub struct DeleteUser {
    pub id: u64,
    #[allow(dead_code)]
    pub admin: serde_json::Value,
}

impl DeleteUser {
    fn shape_with(admin: SecurityScheme) -> Shape {
        Shape::new("DeleteUser")
            .field(
                Field::route()
                    .tag("path", "/users/{id}")
                    .tag("method", "DELETE")
                    .tag("summary", "Delete a user")
                    .tag("tags", "users,admin"),
            )
            .field(Field::new("id", FieldType::Uint(Bits::B64)).tag("path", "id"))
            .field(Field::new("admin", FieldType::Security(admin)))
    }
}

impl Input for DeleteUser {
    fn shape() -> Shape {
        let token = std::env::var("BRISK_ADMIN_TOKEN").ok();
        Self::shape_with(admin_scheme(token))
    }
}

fn admin_scheme(token: Option<String>) -> SecurityScheme {
    SecurityScheme::bearer_fn(move |_, presented| match &token {
        Some(expected) if expected == presented => Ok(serde_json::json!({ "role": "admin" })),
        Some(_) => Err(HttpError::forbidden("invalid admin token")),
        None => Err(HttpError::forbidden("admin access is disabled")),
    })
}

/// `GET /health`
#[derive(Debug, Deserialize)]
pub struct Health {}

impl Input for Health {
    fn shape() -> Shape {
        Shape::new("Health").field(Field::route().tag("path", "/health").tag("method", "GET,HEAD"))
    }
}

/// Health check payload.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub users: usize,
}

/// The user store.
#[derive(Debug, Default)]
pub struct Directory {
    users: DashMap<u64, User>,
    next_id: AtomicU64,
}

impl Directory {
    pub fn insert(&self, user: NewUser) -> Result<User, HttpError> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(HttpError::new(
                http::StatusCode::CONFLICT,
                format!("email {} is already registered", user.email),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User {
            id,
            name: user.name,
            email: user.email,
            age: user.age,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn list(&self, filter: &ListUsers) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| filter.name.as_ref().is_none_or(|n| u.name.contains(n.as_str())))
            .map(|u| u.clone())
            .collect();
        users.sort_by_key(|u| u.id);
        users
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect()
    }

    pub fn remove(&self, id: u64) -> Option<User> {
        self.users.remove(&id).map(|(_, u)| u)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}

fn missing(id: u64) -> HttpError {
    HttpError::not_found(format!("user {id} not found"))
}

/// Register the user routes against `directory`.
pub fn register(api: &mut Api, directory: &Arc<Directory>, version: &'static str) -> Result<(), ApiError> {
    let dir = Arc::clone(directory);
    api.register(move |input: CreateUser| {
        let dir = Arc::clone(&dir);
        async move {
            dir.insert(input.user)
                .map(|user| (http::StatusCode::CREATED, Json(user)))
        }
    })?;

    let dir = Arc::clone(directory);
    api.register(move |input: GetUser| {
        let dir = Arc::clone(&dir);
        async move { dir.get(input.id).map(Json).ok_or_else(|| missing(input.id)) }
    })?;

    let dir = Arc::clone(directory);
    api.register(move |input: ListUsers| {
        let dir = Arc::clone(&dir);
        async move { Json(dir.list(&input)) }
    })?;

    let dir = Arc::clone(directory);
    api.register(move |input: DeleteUser| {
        let dir = Arc::clone(&dir);
        async move { dir.remove(input.id).map(|_| ()).ok_or_else(|| missing(input.id)) }
    })?;

    let dir = Arc::clone(directory);
    api.register(move |_: Health| {
        let dir = Arc::clone(&dir);
        async move {
            Json(HealthStatus {
                status: "running",
                version,
                users: dir.len(),
            })
        }
    })?;

    Ok(())
}
