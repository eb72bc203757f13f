//! OpenAPI Specification Generator Binary
//!
//! Writes the Goods API OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p goods-api --bin generate-openapi --features openapi > openapi.json

use goods_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
