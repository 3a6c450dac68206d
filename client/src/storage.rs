use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::Result;

/// Key a level's win token is stored under
pub fn level_key(level: u8) -> String {
    format!("level-{level}")
}

/// Persistent key/value storage for win tokens
pub trait TokenStore: Send {
    fn save(&mut self, key: &str, token: &str) -> Result<()>;

    fn load(&self, key: &str) -> Option<String>;
}

/// Tokens kept for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: HashMap<String, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&mut self, key: &str, token: &str) -> Result<()> {
        self.tokens.insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Option<String> {
        self.tokens.get(key).cloned()
    }
}

/// Tokens kept in a JSON object on disk. The whole file is rewritten on
/// every save.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: BTreeMap<String, String>,
}

impl FileTokenStore {
    /// Open the store at `path`; a missing file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tokens = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };

        debug!("Loaded {} tokens from {}", tokens.len(), path.display());
        Ok(Self { path, tokens })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn save(&mut self, key: &str, token: &str) -> Result<()> {
        self.tokens.insert(key.to_string(), token.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.tokens)?)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Option<String> {
        self.tokens.get(key).cloned()
    }
}
