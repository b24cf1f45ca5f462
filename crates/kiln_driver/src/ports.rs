//! The external collaborators of a build.

use kiln_build::FrontEnd;
use kiln_integrity::PackageCache;
use kiln_toolchain::{ProcessInvoker, ToolInvoker};
use std::sync::Arc;

/// Where a build finds its tools and its package cache.
///
/// The front-end and the cache default to what the workspace and the
/// environment name: the configured front-end executable run through
/// `invoker`, and the cache at `$KILN_PACKAGE_CACHE`.
#[derive(Clone)]
pub struct Ports {
    /// Runs the backend and, by default, the front-end.
    pub invoker: Arc<dyn ToolInvoker>,
    /// Overrides the configured front-end.
    pub frontend: Option<Arc<dyn FrontEnd>>,
    /// Overrides the package cache location.
    pub cache: Option<PackageCache>,
}

impl Ports {
    /// Real child processes and the environment's cache.
    pub fn process() -> Self {
        Self::with_invoker(Arc::new(ProcessInvoker))
    }

    /// `invoker` with the default front-end and cache.
    pub fn with_invoker(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            frontend: None,
            cache: None,
        }
    }

    /// Replaces the front-end.
    pub fn frontend(mut self, frontend: Arc<dyn FrontEnd>) -> Self {
        self.frontend = Some(frontend);
        self
    }

    /// Replaces the package cache.
    pub fn cache(mut self, cache: PackageCache) -> Self {
        self.cache = Some(cache);
        self
    }
}
