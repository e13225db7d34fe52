use axum::response::Json;
use utoipa::{
    openapi::{Contact, License},
    OpenApi,
};

use super::{auth, health, types};
use crate::custodia::{error::ErrorBody, gate::AuthMethod};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::issue_token,
        auth::login,
        auth::verify_cookie,
        auth::logout,
        auth::me,
    ),
    components(schemas(
        health::Health,
        types::RequestTokenResponse,
        types::LoginRequest,
        types::LoginResponse,
        types::UserSummary,
        types::MessageResponse,
        types::MeResponse,
        AuthMethod,
        ErrorBody,
    )),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "auth", description = "Sessions and single-use request tokens")
    )
)]
struct ApiDoc;

/// The `OpenAPI` document with info filled from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    doc
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }
    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim().trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
