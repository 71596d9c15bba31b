//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the AI proxy so the dashboard can generate
//! its client from it.
//!
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`). The document is
//! stamped with this crate's version and, when `BIND_ADDRESS` is set, a server
//! entry pointing at it.

use api_lib::web::rest::ApiDoc;
use utoipa::openapi::{OpenApi as OpenApiDoc, ServerBuilder};
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

/// Stamps the crate version and, when known, the address the API listens on.
fn stamped(mut doc: OpenApiDoc, bind_address: Option<String>) -> OpenApiDoc {
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    if let Some(address) = bind_address {
        doc.servers = Some(vec![ServerBuilder::new()
            .url(format!("http://{}", address))
            .description(Some("ScrollMine API"))
            .build()]);
    }
    doc
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let doc = stamped(ApiDoc::openapi(), std::env::var("BIND_ADDRESS").ok());

    std::fs::write(&output, doc.to_pretty_json()?)?;
    println!("OpenAPI document written to {}", output);
    Ok(())
}
