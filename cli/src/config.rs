use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use plate_core::catalog::Catalog;

pub struct Config {
    pub db_path: PathBuf,
    pub catalog_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "plate").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Self::in_dir(&data_dir))
    }

    fn in_dir(data_dir: &Path) -> Self {
        Config {
            db_path: data_dir.join("plate.db"),
            catalog_path: data_dir.join("catalog.json"),
        }
    }

    /// The explicit `--catalog` file, else `catalog.json` in the data
    /// directory when present, else the built-in catalog.
    pub fn catalog(&self, override_path: Option<&Path>) -> Result<Catalog> {
        if let Some(path) = override_path {
            return Catalog::load(path);
        }
        if self.catalog_path.exists() {
            return Catalog::load(&self.catalog_path);
        }
        Catalog::builtin()
    }
}
