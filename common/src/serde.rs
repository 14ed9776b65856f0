use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::FileFormat;

pub type Result<T> = anyhow::Result<T>;

pub fn serialize<T: Serialize>(value: &T, format: FileFormat) -> Result<String> {
    let text = match format {
        FileFormat::Yaml => serde_yml::to_string(value)?,
        FileFormat::Json => serde_json::to_string_pretty(value)?,
        FileFormat::Toml => toml::to_string(value)?,
    };
    Ok(text)
}

pub fn deserialize<T: DeserializeOwned>(serialized: &[u8], format: FileFormat) -> Result<T> {
    let text = std::str::from_utf8(serialized)?;
    match format {
        FileFormat::Yaml => Ok(serde_yml::from_str(text)?),
        FileFormat::Json => Ok(serde_json::from_str(text)?),
        FileFormat::Toml => Ok(toml::from_str(text)?),
    }
}

/// Reads `path` and deserializes it using the format implied by its extension.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = FileFormat::from_path(path)?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    deserialize(&bytes, format).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn save_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let format = FileFormat::from_path(path)?;
    let text = serialize(value, format)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::test_utils::test_output_path;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Settings {
        name: String,
        lanes: u32,
        ratio: f64,
    }

    #[test]
    fn file_round_trip_in_every_format() -> anyhow::Result<()> {
        let settings = Settings {
            name: "volume".to_string(),
            lanes: 16,
            ratio: 0.25,
        };

        for format in FileFormat::all() {
            let path = test_output_path(&format!("settings.{}", format.extension()));
            save_file(&settings, &path)?;
            let loaded: Settings = load_file(&path)?;
            assert_eq!(loaded, settings, "format {format:?}");
        }

        Ok(())
    }

    #[test]
    fn load_reports_unknown_extension() {
        let result: Result<Settings> = load_file(Path::new("settings.xml"));
        assert!(result.is_err());
    }
}
