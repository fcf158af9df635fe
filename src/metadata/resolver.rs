//! Peer-module resolution.

use std::{path::Path, path::PathBuf, sync::Arc};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::metadata::module::Module;

/// Answers name → module lookups for cross-module references.
///
/// Implementations must hand out the *same* `Arc` for repeated resolutions
/// of one name; resolved-definition identity comparisons in the pattern
/// matcher rely on it.
pub trait AssemblyResolver: Sync {
    /// Resolve a peer module by name, or `None` when it is not available.
    fn resolve(&self, name: &str) -> Option<Arc<Module>>;
}

/// Resolver over a set of search directories.
///
/// All `*.iidm` containers found in the configured directories are loaded
/// up front (in parallel; the per-module tables are immutable after load as
/// far as the resolver is concerned). Files that fail to load are skipped -
/// a damaged peer module in a search directory must not break patching of
/// an unrelated input.
pub struct FolderResolver {
    modules: DashMap<String, Arc<Module>>,
}

impl FolderResolver {
    /// Build a resolver by preloading every module in `directories`.
    #[must_use]
    pub fn new(directories: &[PathBuf]) -> FolderResolver {
        let resolver = FolderResolver {
            modules: DashMap::new(),
        };

        let mut paths = Vec::new();
        for dir in directories {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "iidm").unwrap_or(false) {
                    paths.push(path);
                }
            }
        }

        let loaded: Vec<Arc<Module>> = paths
            .par_iter()
            .filter_map(|path: &PathBuf| match Module::from_file(path) {
                Ok(module) => Some(Arc::new(module)),
                Err(err) => {
                    log::debug!("skipping unreadable module {}: {}", path.display(), err);
                    None
                }
            })
            .collect();

        for module in loaded {
            resolver.register(module);
        }
        resolver
    }

    /// Build a resolver over a single directory.
    #[must_use]
    pub fn for_directory(dir: &Path) -> FolderResolver {
        FolderResolver::new(&[dir.to_path_buf()])
    }

    /// An empty resolver; modules are added through [`FolderResolver::register`].
    #[must_use]
    pub fn empty() -> FolderResolver {
        FolderResolver {
            modules: DashMap::new(),
        }
    }

    /// Register an already-loaded module. The first registration of a name
    /// wins, matching directory scan order.
    pub fn register(&self, module: Arc<Module>) {
        self.modules.entry(module.name.clone()).or_insert(module);
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl AssemblyResolver for FolderResolver {
    fn resolve(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.get(name).map(|m| m.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve_same_arc() {
        let resolver = FolderResolver::empty();
        let module = Arc::new(Module::new("WinRT.Runtime"));
        resolver.register(module.clone());

        let a = resolver.resolve("WinRT.Runtime").unwrap();
        let b = resolver.resolve("WinRT.Runtime").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &module));
        assert!(resolver.resolve("Missing").is_none());
    }

    #[test]
    fn first_registration_wins() {
        let resolver = FolderResolver::empty();
        let first = Arc::new(Module::new("Peer"));
        let second = Arc::new(Module::new("Peer"));
        resolver.register(first.clone());
        resolver.register(second);
        assert!(Arc::ptr_eq(&resolver.resolve("Peer").unwrap(), &first));
        assert_eq!(resolver.len(), 1);
    }
}
