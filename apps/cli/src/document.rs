// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading and writing documents in the three supported formats.

use std::fs;
use std::path::Path;

use anyhow::Context;
use vac_lite_complex::{Settings, Vac, VacSnapshot};

use crate::error::CliError;

/// On-disk document format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.vec` / `.xml`
    Xml,
    /// `.txt` / `.vac`: bracketed `Field : value` text
    Legacy,
    /// `.json`: serde snapshot
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("vec") | Some("xml") => Ok(Format::Xml),
            Some("txt") | Some("vac") => Ok(Format::Legacy),
            Some("json") => Ok(Format::Json),
            _ => Err(CliError::UnknownFormat(path.to_path_buf())),
        }
    }
}

/// Reads the document at `path` into a complex using `settings`.
pub fn load(path: &Path, settings: Settings) -> anyhow::Result<Vac> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let vac = match format {
        Format::Xml => Vac::from_xml_str_with_settings(&text, settings)?,
        Format::Legacy => Vac::from_legacy_str_with_settings(&text, settings)?,
        Format::Json => {
            let snapshot: VacSnapshot = serde_json::from_str(&text)
                .with_context(|| format!("decoding snapshot {}", path.display()))?;
            let mut vac = Vac::with_settings(settings);
            vac.load_snapshot(&snapshot)?;
            vac
        }
    };
    tracing::debug!(path = %path.display(), ?format, cells = vac.len(), "document loaded");
    Ok(vac)
}

/// Encodes `vac` in `format`.
pub fn encode(vac: &Vac, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Xml => vac.to_xml_string()?,
        Format::Legacy => vac.to_legacy_string(),
        Format::Json => vac.to_json()?,
    })
}

/// Writes `vac` to `path` in the format of its extension.
pub fn save(vac: &Vac, path: &Path) -> anyhow::Result<()> {
    let format = Format::from_path(path)?;
    let text = encode(vac, format)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?format, "document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("a.vec")).unwrap(), Format::Xml);
        assert_eq!(Format::from_path(Path::new("a.XML")).unwrap(), Format::Xml);
        assert_eq!(Format::from_path(Path::new("a.txt")).unwrap(), Format::Legacy);
        assert_eq!(Format::from_path(Path::new("dir/a.json")).unwrap(), Format::Json);
        assert!(Format::from_path(&PathBuf::from("a")).is_err());
        assert!(Format::from_path(Path::new("a.svg")).is_err());
    }

    #[test]
    fn files_round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!("vac-lite-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut vac = Vac::new();
        let t = vac_lite_complex::Time::frame(2);
        let a = vac.new_key_vertex(t, vac_lite_complex::Vector2::new(0.0, 0.0));
        let b = vac.new_key_vertex(t, vac_lite_complex::Vector2::new(10.0, 5.0));
        vac.new_key_edge(a, b).unwrap();

        for name in ["doc.vec", "doc.txt", "doc.json"] {
            let path = dir.join(name);
            save(&vac, &path).unwrap();
            let loaded = load(&path, Settings::default()).unwrap();
            assert_eq!(loaded.cell_ids(), vac.cell_ids());
            assert!(loaded.check());
        }
        fs::remove_dir_all(&dir).ok();
    }
}
