//! Direct tool execution.
//!
//! Runs one tool call exactly as the conversation loop would and logs the
//! JSON result the model would see.
//!
//! # Usage
//!
//! ```bash
//! sc-cli tool search_products '{"description": "外套", "color": "黑"}'
//! sc-cli tool get_product_details '{"product_id": "P003"}' -i p003.jpg
//! ```

use std::path::Path;

use shop_concierge_core::UserId;
use thiserror::Error;

/// Errors that can occur running a tool from the command line.
#[derive(Debug, Error)]
pub enum ToolCommandError {
    /// Arguments were not a JSON object.
    #[error("Arguments must be a JSON object: {0}")]
    InvalidArgs(String),

    /// The attached picture could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Execute tool `name` with `args` on behalf of `user`.
pub fn run(
    name: &str,
    args: &str,
    user: &str,
    image_out: Option<&Path>,
) -> Result<(), ToolCommandError> {
    let args: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(args).map_err(|e| ToolCommandError::InvalidArgs(e.to_string()))?;

    let executor = super::demo_executor();
    let execution = executor.execute(name, &args, &UserId::new(user));

    let rendered = serde_json::to_string_pretty(&execution.result.to_json())
        .map_err(|e| ToolCommandError::InvalidArgs(e.to_string()))?;
    tracing::info!("{rendered}");

    match (execution.image, image_out) {
        (Some(bytes), Some(path)) => {
            std::fs::write(path, &bytes).map_err(|source| ToolCommandError::Write {
                path: path.display().to_string(),
                source,
            })?;
            tracing::info!("Product picture written to {}", path.display());
        }
        (Some(bytes), None) => {
            tracing::info!("Product picture attached ({} bytes)", bytes.len());
        }
        (None, _) => {}
    }

    Ok(())
}
