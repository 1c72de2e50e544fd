//! Writes the OpenAPI document to `specs/timetable-api.json` at the repo root.

use utoipa::OpenApi;

fn main() {
    let doc = timetable_api::routes::ApiDoc::openapi()
        .to_pretty_json()
        .expect("serialize OpenAPI document");

    let out = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../specs/timetable-api.json");
    if let Some(dir) = out.parent() {
        std::fs::create_dir_all(dir).expect("create specs directory");
    }
    std::fs::write(&out, doc).expect("write OpenAPI document");
    println!("Wrote {}", out.display());
}
