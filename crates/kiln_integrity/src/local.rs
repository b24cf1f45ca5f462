//! Resolution of local path imports between workspace packages.
//!
//! A local import (`./lib2`, `../shared`) is resolved against the importing
//! package's root and must land on the root of another declared package.
//! Imports are followed transitively through a petgraph dependency graph.
//! Traversal is guarded by a visited set keyed by canonical package root, so
//! import cycles terminate and two names declared on one root are visited
//! once.

use crate::error::IntegrityError;
use kiln_common::{normalize, relative_to};
use kiln_config::{ImportSpec, WorkspaceConfig};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

/// A local import that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LocalImportFault {
    /// The importing package.
    pub package: String,
    /// The import entry as declared.
    pub import: String,
    /// Workspace-relative path the import resolved to.
    pub resolved: String,
}

/// Several declared packages sharing one canonical root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RootAlias {
    /// Workspace-relative root.
    pub root: String,
    /// Package names declared on it, sorted.
    pub packages: Vec<String>,
}

/// Outcome of local import resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalResolution {
    /// Imports whose path does not exist.
    pub missing: Vec<LocalImportFault>,
    /// Imports whose path exists but is not a declared package root.
    pub undeclared: Vec<LocalImportFault>,
    /// Roots declared by more than one package.
    pub aliases: Vec<RootAlias>,
    /// For each package, the transitive set of packages it imports locally.
    pub depends_on: BTreeMap<String, Vec<String>>,
}

/// Resolves every local import in the workspace.
///
/// Packages whose root does not exist are skipped; the build pipeline reports
/// those separately.
pub fn resolve_local_imports(
    workspace_dir: &Path,
    config: &WorkspaceConfig,
) -> Result<LocalResolution, IntegrityError> {
    let workspace = workspace_dir
        .canonicalize()
        .map_err(|e| IntegrityError::io(workspace_dir, e))?;

    let mut roots: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    let mut package_roots: BTreeMap<&str, PathBuf> = BTreeMap::new();
    for pkg in &config.packages {
        let declared = workspace.join(&pkg.root);
        let root = match declared.canonicalize() {
            Ok(root) => root,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(package = %pkg.name, root = %pkg.root, "package root missing");
                continue;
            }
            Err(e) => return Err(IntegrityError::io(declared, e)),
        };
        roots.entry(root.clone()).or_default().push(pkg.name.clone());
        package_roots.insert(pkg.name.as_str(), root);
    }

    let display = |path: &Path| relative_to(&workspace, path).ok();

    let mut aliases = Vec::new();
    for (root, names) in roots.iter_mut() {
        names.sort();
        if names.len() > 1 {
            aliases.push(RootAlias {
                root: display(root.as_path()).unwrap_or_else(|| root.display().to_string()),
                packages: names.clone(),
            });
        }
    }

    let mut graph: DiGraph<PathBuf, ()> = DiGraph::new();
    let nodes: BTreeMap<PathBuf, NodeIndex> = roots
        .keys()
        .map(|root| (root.clone(), graph.add_node(root.clone())))
        .collect();

    let mut missing = BTreeSet::new();
    let mut undeclared = BTreeSet::new();
    let mut visited: BTreeSet<PathBuf> = BTreeSet::new();
    let mut stack: Vec<PathBuf> = roots.keys().rev().cloned().collect();

    while let Some(root) = stack.pop() {
        if !visited.insert(root.clone()) {
            continue;
        }
        let from = nodes[&root];
        for name in &roots[&root] {
            let Some(pkg) = config.package(name) else {
                continue;
            };
            for entry in &pkg.import {
                let Ok(ImportSpec::Local { path }) = ImportSpec::parse(name, entry) else {
                    continue;
                };
                let target = normalize(&root.join(&path));
                let fault = || LocalImportFault {
                    package: name.clone(),
                    import: path.clone(),
                    resolved: display(target.as_path()).unwrap_or_else(|| path.clone()),
                };
                if !target.exists() {
                    missing.insert(fault());
                    continue;
                }
                let canonical = target
                    .canonicalize()
                    .map_err(|e| IntegrityError::io(&target, e))?;
                match nodes.get(&canonical) {
                    Some(&to) => {
                        graph.update_edge(from, to, ());
                        if !visited.contains(&canonical) {
                            stack.push(canonical);
                        }
                    }
                    None => {
                        undeclared.insert(fault());
                    }
                }
            }
        }
    }

    let mut depends_on = BTreeMap::new();
    for (name, root) in &package_roots {
        let start = nodes[root];
        let mut deps = BTreeSet::new();
        let mut dfs = Dfs::new(&graph, start);
        while let Some(node) = dfs.next(&graph) {
            if node != start {
                deps.extend(roots[&graph[node]].iter().cloned());
            }
        }
        depends_on.insert(name.to_string(), deps.into_iter().collect());
    }

    Ok(LocalResolution {
        missing: missing.into_iter().collect(),
        undeclared: undeclared.into_iter().collect(),
        aliases,
        depends_on,
    })
}
