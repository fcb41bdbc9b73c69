//! Version command implementation.

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    schema_version: i32,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    if json {
        let output = VersionOutput {
            version,
            build,
            schema_version: CURRENT_SCHEMA_VERSION,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("ghg version {version} ({build}, schema v{CURRENT_SCHEMA_VERSION})");
    Ok(())
}
