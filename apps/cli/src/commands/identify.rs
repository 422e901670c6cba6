//! Identify command implementation.

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use colored::Colorize;
use std::collections::HashMap;
use std::path::Path;
use upcycle_core::{ActionOptions, FlowExecutor, identify_material_action};

/// Execute the identify command.
pub async fn execute(
    executor: &FlowExecutor,
    photo: &Path,
    description: Option<String>,
    json_output: bool,
    options: ActionOptions,
) -> Result<()> {
    let photo_data_uri = read_photo(photo)?;

    let mut form = HashMap::new();
    form.insert("photoDataUri".to_string(), photo_data_uri);
    if let Some(description) = description {
        form.insert("description".to_string(), description);
    }

    let state = identify_material_action(executor, &form, options).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    match (state.result, state.error) {
        (Some(result), _) => {
            if !json_output {
                println!();
                println!("{} {}", "Material:".bold().cyan(), result.material.bold());
                if let Some(confidence) = result.confidence {
                    println!("{} {:.0}%", "Confidence:".dimmed(), confidence * 100.0);
                }
                println!();
            }
            Ok(())
        }
        (None, error) => bail!(error.unwrap_or_else(|| "Failed to identify material.".to_string())),
    }
}

/// Reads an image file into a `data:<mime>;base64,<payload>` URI.
fn read_photo(path: &Path) -> Result<String> {
    let mime = mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .with_context(|| format!("{} does not look like an image file", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read photo {}", path.display()))?;
    if bytes.is_empty() {
        bail!("Photo {} is empty", path.display());
    }
    Ok(format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_photo_builds_data_uri() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shirt.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let uri = read_photo(&path).unwrap();
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_read_photo_rejects_non_images() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        assert!(read_photo(&path).is_err());
    }

    #[test]
    fn test_read_photo_missing_file() {
        assert!(read_photo(Path::new("/nonexistent/shirt.jpg")).is_err());
    }
}
