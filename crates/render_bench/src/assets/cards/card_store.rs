//! Material card store
//!
//! Discovers `*.FCMat` files under a list of search directories and caches
//! parsed cards. Directories are scanned in order, so a card in an earlier
//! (user) directory hides a card of the same name in a later (system) one.
//!
//! The index is built lazily on first use and published with a single
//! write-lock swap; parsed cards are added to an append-only cache. Both are
//! only dropped by [`CardStore::reload`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{CardError, CardParser};
use crate::material::RawParams;

/// Extension of card files, compared ignoring case
pub const CARD_EXTENSION: &str = "FCMat";

static GLOBAL: OnceLock<CardStore> = OnceLock::new();

type CardIndex = BTreeMap<String, PathBuf>;

/// Thread-safe catalog of material cards
pub struct CardStore {
    /// Search directories, highest priority first
    search_paths: Vec<PathBuf>,
    /// Card name -> file, built on first use
    index: RwLock<Option<Arc<CardIndex>>>,
    /// Card name -> parsed parameters
    cache: RwLock<HashMap<String, Arc<RawParams>>>,
}

impl CardStore {
    /// Create a store over the given search directories
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
            index: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide store
    ///
    /// Has no search directories unless [`CardStore::install_global`] ran first.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| Self::new(Vec::<PathBuf>::new()))
    }

    /// Set up the process-wide store
    ///
    /// Returns `false` when the global store already existed; its search
    /// directories are left unchanged in that case.
    pub fn install_global<I, P>(search_paths: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let installed = GLOBAL.set(Self::new(search_paths)).is_ok();
        if !installed {
            log::warn!("Card store already initialized, keeping existing search paths");
        }
        installed
    }

    /// Search directories, highest priority first
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Names of all known cards, in alphabetical order
    pub fn list_cards(&self) -> Vec<String> {
        self.index().keys().cloned().collect()
    }

    /// File a card was discovered in
    pub fn card_path(&self, name: &str) -> Option<PathBuf> {
        self.index().get(name).cloned()
    }

    /// Load a card, using the cache if available
    ///
    /// # Returns
    /// A shared reference to the parsed parameters; repeated loads return the
    /// same `Arc`
    pub fn load_card(&self, name: &str) -> Result<Arc<RawParams>, CardError> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(card) = cache.get(name) {
                return Ok(Arc::clone(card));
            }
        }

        let path = self
            .card_path(name)
            .ok_or_else(|| CardError::NotFound(name.to_string()))?;
        let contents = std::fs::read_to_string(&path).map_err(|source| CardError::Io {
            path: path.clone(),
            source,
        })?;
        let card = CardParser::parse(&contents).map_err(|reason| CardError::Malformed {
            name: name.to_string(),
            reason,
        })?;
        log::debug!("Loaded card '{}' from {}", name, path.display());

        // Another reader may have loaded the same card meanwhile; keep the first.
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(card.params));
        Ok(Arc::clone(entry))
    }

    /// Check if a card is cached
    pub fn is_cached(&self, name: &str) -> bool {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.contains_key(name)
    }

    /// Forget the index and every cached card
    ///
    /// The next call rescans the search directories.
    pub fn reload(&self) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
        log::info!("Card store cleared, directories will be rescanned");
    }

    /// Get the number of cached cards
    pub fn len(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.len()
    }

    /// Check if no card is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(&self) -> Arc<CardIndex> {
        if let Some(index) = self.index.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Arc::clone(index);
        }

        let built = Arc::new(self.scan());

        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slot.get_or_insert(built))
    }

    fn scan(&self) -> CardIndex {
        let mut index = CardIndex::new();
        for dir in &self.search_paths {
            let mut files = Vec::new();
            collect_card_files(dir, &mut files);
            files.sort();
            for file in files {
                let name = card_name(&file);
                match index.get(&name) {
                    Some(existing) => log::debug!(
                        "Card '{}' in {} hidden by {}",
                        name,
                        file.display(),
                        existing.display()
                    ),
                    None => {
                        index.insert(name, file);
                    }
                }
            }
        }
        log::info!("Indexed {} material card(s) in {} director(ies)", index.len(), self.search_paths.len());
        index
    }
}

impl std::fmt::Debug for CardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardStore")
            .field("search_paths", &self.search_paths)
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

fn collect_card_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Skipping card directory {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_card_files(&path, out);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(CARD_EXTENSION))
        {
            out.push(path);
        }
    }
}

/// `Name` entry of the card, or the file stem when absent or unreadable
fn card_name(path: &Path) -> String {
    let declared = std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| CardParser::parse(&contents).ok())
        .and_then(|card| card.name);
    declared.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_card(dir: &Path, file: &str, contents: &str) -> PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_list_is_alphabetical_and_uses_declared_names() {
        let dir = TempDir::new().unwrap();
        write_card(dir.path(), "b.FCMat", "[General]\nName = Steel\nShader = Disney\n");
        write_card(dir.path(), "Acrylic.fcmat", "Shader = Glass\n");
        write_card(dir.path(), "notes.txt", "Shader = Glass\n");

        let store = CardStore::new([dir.path()]);
        assert_eq!(store.list_cards(), vec!["Acrylic".to_string(), "Steel".to_string()]);
    }

    #[test]
    fn test_user_directory_overrides_system() {
        let user = TempDir::new().unwrap();
        let system = TempDir::new().unwrap();
        write_card(user.path(), "Glass.FCMat", "Shader = Glass\nGlass.IOR = 1.6\n");
        write_card(system.path(), "Glass.FCMat", "Shader = Glass\nGlass.IOR = 1.4\n");
        std::fs::create_dir(system.path().join("metals")).unwrap();
        write_card(&system.path().join("metals"), "Gold.FCMat", "Shader = Disney\n");

        let store = CardStore::new([user.path(), system.path()]);
        assert_eq!(store.list_cards(), vec!["Glass".to_string(), "Gold".to_string()]);
        assert_eq!(store.load_card("Glass").unwrap().get("Glass.IOR"), Some("1.6"));
    }

    #[test]
    fn test_load_is_cached() {
        let dir = TempDir::new().unwrap();
        write_card(dir.path(), "Glass.FCMat", "Shader = Glass\n");
        let store = CardStore::new([dir.path()]);
        assert!(store.is_empty());

        let first = store.load_card("Glass").unwrap();
        let second = store.load_card("Glass").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
        assert!(store.is_cached("Glass"));
    }

    #[test]
    fn test_errors() {
        let dir = TempDir::new().unwrap();
        write_card(dir.path(), "Broken.FCMat", "[General\n");
        let store = CardStore::new([dir.path()]);

        assert!(matches!(store.load_card("Missing"), Err(CardError::NotFound(_))));
        assert!(matches!(store.load_card("Broken"), Err(CardError::Malformed { .. })));
    }

    #[test]
    fn test_reload_rescans() {
        let dir = TempDir::new().unwrap();
        write_card(dir.path(), "Glass.FCMat", "Shader = Glass\n");
        let store = CardStore::new([dir.path()]);
        let before = store.load_card("Glass").unwrap();
        assert_eq!(store.list_cards().len(), 1);

        write_card(dir.path(), "Glass.FCMat", "Shader = Glass\nGlass.IOR = 2\n");
        write_card(dir.path(), "Marble.FCMat", "Shader = Diffuse\n");
        // Cached until an explicit reload
        assert_eq!(store.list_cards().len(), 1);
        assert!(Arc::ptr_eq(&before, &store.load_card("Glass").unwrap()));

        store.reload();
        assert_eq!(store.list_cards().len(), 2);
        let after = store.load_card("Glass").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.get("Glass.IOR"), Some("2"));
    }

    #[test]
    fn test_concurrent_loads_share_one_card() {
        let dir = TempDir::new().unwrap();
        write_card(dir.path(), "Glass.FCMat", "Shader = Glass\n");
        let store = CardStore::new([dir.path()]);

        let cards: Vec<Arc<RawParams>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| store.load_card("Glass").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(cards.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let store = CardStore::new(["/nonexistent/cards"]);
        assert!(store.list_cards().is_empty());
    }
}
