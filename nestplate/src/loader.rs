use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[cfg(feature = "loader")]
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::{Error, ErrorKind};
use crate::template::CompiledTemplate;

type LoadFunc = dyn Fn(&str) -> Result<Option<String>, Error> + Send + Sync;

/// Holds the templates of an [`Environment`](crate::Environment).
///
/// Templates added explicitly live in `templates`; templates produced by the
/// loader callback are compiled on first use and cached in `loaded`.
#[derive(Default)]
pub(crate) struct LoaderStore {
    loader: Option<Arc<LoadFunc>>,
    templates: BTreeMap<String, Arc<CompiledTemplate>>,
    loaded: Mutex<BTreeMap<String, Arc<CompiledTemplate>>>,
}

impl Clone for LoaderStore {
    fn clone(&self) -> Self {
        LoaderStore {
            loader: self.loader.clone(),
            templates: self.templates.clone(),
            loaded: Mutex::new(
                self.loaded
                    .lock()
                    .map(|loaded| loaded.clone())
                    .unwrap_or_default(),
            ),
        }
    }
}

impl fmt::Debug for LoaderStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut l = f.debug_list();
        l.entries(self.templates.keys());
        if let Ok(loaded) = self.loaded.lock() {
            l.entries(loaded.keys().filter(|x| !self.templates.contains_key(*x)));
        }
        l.finish()
    }
}

impl LoaderStore {
    pub fn insert(&mut self, name: &str, source: &str) -> Result<(), Error> {
        let compiled = ok!(CompiledTemplate::new(name, source));
        self.forget_loaded(name);
        self.templates.insert(name.to_string(), Arc::new(compiled));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.templates.remove(name);
        self.forget_loaded(name);
    }

    fn forget_loaded(&mut self, name: &str) {
        if let Ok(loaded) = self.loaded.get_mut() {
            loaded.remove(name);
        }
    }

    #[cfg(feature = "loader")]
    pub fn set_loader<F>(&mut self, f: F)
    where
        F: Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(f));
        if let Ok(loaded) = self.loaded.get_mut() {
            loaded.clear();
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<CompiledTemplate>, Error> {
        if let Some(rv) = self.templates.get(name) {
            return Ok(rv.clone());
        }
        let loader = match self.loader {
            Some(ref loader) => loader,
            None => return Err(template_not_found(name)),
        };
        if let Some(rv) = self.loaded.lock().ok().and_then(|x| x.get(name).cloned()) {
            return Ok(rv);
        }
        let source = match ok!(loader(name)) {
            Some(source) => source,
            None => return Err(template_not_found(name)),
        };
        let compiled = Arc::new(ok!(CompiledTemplate::new(name, &source)));
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(name.to_string(), compiled.clone());
        }
        Ok(compiled)
    }
}

fn template_not_found(name: &str) -> Error {
    Error::new(
        ErrorKind::TemplateNotFound,
        format!("template {name:?} does not exist"),
    )
}

/// Safely joins two paths.
#[cfg(feature = "loader")]
pub fn safe_join(base: &Path, template: &str) -> Option<PathBuf> {
    let mut rv = base.to_path_buf();
    for segment in template.split('/') {
        if segment.starts_with('.') || segment.contains('\\') {
            return None;
        }
        rv.push(segment);
    }
    Some(rv)
}

/// Helper to load templates from a given directory.
///
/// This creates a dynamic loader which looks up templates in the
/// given directory.  Templates that start with a dot (`.`) or are contained in
/// a folder starting with a dot cannot be loaded.
///
/// # Example
///
/// ```rust
/// # use nestplate::{path_loader, Environment};
/// fn create_env() -> Environment {
///     let mut env = Environment::new();
///     env.set_loader(path_loader("metrics/templates"));
///     env
/// }
/// ```
#[cfg(feature = "loader")]
pub fn path_loader<P: AsRef<Path>>(
    dir: P,
) -> impl Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    let dir = dir.as_ref().to_path_buf();
    move |name| {
        let path = match safe_join(&dir, name) {
            Some(path) => path,
            None => return Ok(None),
        };
        match fs::read_to_string(path) {
            Ok(result) => Ok(Some(result)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(
                Error::new(ErrorKind::InvalidOperation, "could not read template").with_source(err),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    #[cfg(feature = "loader")]
    fn test_safe_join() {
        assert_eq!(
            safe_join(Path::new("metrics"), "summary/report.md"),
            Some(PathBuf::from("metrics").join("summary").join("report.md"))
        );
        assert_eq!(safe_join(Path::new("metrics"), ".hidden/report.md"), None);
        assert_eq!(safe_join(Path::new("metrics"), "summary/../report.md"), None);
        assert_eq!(safe_join(Path::new("metrics"), "a\\b.md"), None);
    }

    #[test]
    fn test_store_lookup() {
        let mut store = LoaderStore::default();
        store.insert("a.md", "A {{ x }}").unwrap();
        assert_eq!(store.get("a.md").unwrap().source(), "A {{ x }}");
        let err = store.get("b.md").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert_eq!(
            err.to_string(),
            "template not found: template \"b.md\" does not exist"
        );
        store.remove("a.md");
        assert!(store.get("a.md").is_err());
    }

    #[test]
    #[cfg(feature = "loader")]
    fn test_loader_results_are_cached() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = LoaderStore::default();
        store.set_loader({
            let calls = calls.clone();
            move |name: &str| {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok((name == "x.md").then(|| "loaded".to_string()))
            }
        });
        assert_eq!(store.get("x.md").unwrap().source(), "loaded");
        assert_eq!(store.get("x.md").unwrap().source(), "loaded");
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(store.get("y.md").is_err());
    }
}
