//! Job manifests: one method and the data sources it runs over.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use deid_model::{DataSource, MethodConfig};

/// A method plus the sources to transform with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub method: MethodConfig,
    pub sources: Vec<SourceEntry>,
}

/// A data source descriptor and the CSV file holding its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub data_source: DataSource,
    /// Relative paths resolve against the manifest's directory.
    pub input: PathBuf,
}

impl JobManifest {
    /// Read and parse a manifest, resolving input paths.
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let mut manifest: JobManifest = serde_json::from_str(&text)
            .with_context(|| format!("parse manifest {}", path.display()))?;
        if manifest.sources.is_empty() {
            bail!("manifest {} lists no sources", path.display());
        }
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        manifest.resolve_inputs(base);
        Ok(manifest)
    }

    fn resolve_inputs(&mut self, base: &Path) {
        for source in &mut self.sources {
            if source.input.is_relative() {
                source.input = base.join(&source.input);
            }
        }
    }
}
