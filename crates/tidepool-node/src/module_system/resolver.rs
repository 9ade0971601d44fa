// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (CommonJS algorithm)
//!
//! A request is resolved against an ordered list of search roots. For each
//! root the resolver tries, in order:
//!
//! 1. the literal file
//! 2. the file with each registered extension appended
//! 3. the `main` entry of a `package.json` in that directory
//! 4. `index` with each registered extension
//!
//! Steps 1 and 2 are skipped for requests that end in a separator. Results
//! are cached for the lifetime of the resolver; the filesystem is assumed
//! not to change underneath it.

use crate::error::{NodeError, Result};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::cell::RefCell;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

type PathCacheKey = (String, Vec<PathBuf>);

/// Resolves module requests to absolute filenames.
#[derive(Debug)]
pub struct PathResolver {
    /// Anchor for relative search roots
    basedir: PathBuf,
    /// (request, search roots) -> filename, failures included
    path_cache: RefCell<FxHashMap<PathCacheKey, Option<PathBuf>>>,
    /// Literal candidate -> canonical path, regular files only
    realpath_cache: RefCell<FxHashMap<PathBuf, PathBuf>>,
    /// Directory -> `main` from its package.json, `None` when absent
    package_main_cache: RefCell<FxHashMap<PathBuf, Option<String>>>,
}

impl PathResolver {
    /// Create a resolver whose relative search roots are anchored at
    /// `basedir`.
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            path_cache: RefCell::default(),
            realpath_cache: RefCell::default(),
            package_main_cache: RefCell::default(),
        }
    }

    /// Resolve `request` against `paths`, trying `extensions` in order.
    ///
    /// Returns `Ok(None)` when nothing matched. The only hard error is a
    /// malformed `package.json` met along the way.
    pub fn find_path(
        &self,
        request: &str,
        paths: &[PathBuf],
        extensions: &[&str],
    ) -> Result<Option<PathBuf>> {
        let roots = if Path::new(request).is_absolute() {
            vec![PathBuf::new()]
        } else {
            paths.to_vec()
        };
        let key = (request.to_string(), roots);

        if let Some(hit) = self.path_cache.borrow().get(&key) {
            debug!(request, filename = ?hit, "path cache hit");
            return Ok(hit.clone());
        }

        let trailing_slash = request.ends_with('/') || request.ends_with(std::path::MAIN_SEPARATOR);
        let mut found = None;

        for root in &key.1 {
            let base = self.expand(request, root);

            let mut filename = None;
            if !trailing_slash {
                filename = self
                    .try_file(&base)
                    .or_else(|| self.try_extensions(&base, extensions));
            }
            if filename.is_none() {
                filename = self.try_package(&base, extensions)?;
            }
            if filename.is_none() {
                filename = self.try_extensions(&base.join("index"), extensions);
            }

            if filename.is_some() {
                found = filename;
                break;
            }
        }

        debug!(request, filename = ?found, "resolved path");
        self.path_cache.borrow_mut().insert(key, found.clone());
        Ok(found)
    }

    /// Number of cached (request, roots) entries
    pub fn cached_paths(&self) -> usize {
        self.path_cache.borrow().len()
    }

    fn try_file(&self, path: &Path) -> Option<PathBuf> {
        if let Some(real) = self.realpath_cache.borrow().get(path) {
            return Some(real.clone());
        }
        if !path.is_file() {
            return None;
        }
        let real = path.canonicalize().ok()?;
        self.realpath_cache
            .borrow_mut()
            .insert(path.to_path_buf(), real.clone());
        Some(real)
    }

    fn try_extensions(&self, path: &Path, extensions: &[&str]) -> Option<PathBuf> {
        extensions.iter().find_map(|ext| {
            let mut candidate = OsString::from(path.as_os_str());
            candidate.push(ext);
            self.try_file(Path::new(&candidate))
        })
    }

    fn try_package(&self, dir: &Path, extensions: &[&str]) -> Result<Option<PathBuf>> {
        let Some(main) = self.read_package(dir)? else {
            return Ok(None);
        };
        let filename = self.expand(&main, dir);

        Ok(self
            .try_file(&filename)
            .or_else(|| self.try_extensions(&filename, extensions))
            .or_else(|| self.try_extensions(&filename.join("index"), extensions)))
    }

    /// Read the `main` field of `dir/package.json`, once per directory.
    fn read_package(&self, dir: &Path) -> Result<Option<String>> {
        if let Some(main) = self.package_main_cache.borrow().get(dir) {
            return Ok(main.clone());
        }

        let json_path = dir.join("package.json");
        let main = match std::fs::read_to_string(&json_path) {
            Ok(json) => {
                let package: PackageJson =
                    serde_json::from_str(&json).map_err(|source| NodeError::PackageJson {
                        path: json_path.clone(),
                        source,
                    })?;
                package.main.and_then(|main| main.as_str().map(str::to_string))
            }
            Err(_) => None,
        };

        self.package_main_cache
            .borrow_mut()
            .insert(dir.to_path_buf(), main.clone());
        Ok(main)
    }

    /// Join `request` onto `root` and normalize. Relative roots, including
    /// the empty root used for absolute requests, hang off the base
    /// directory.
    fn expand(&self, request: &str, root: &Path) -> PathBuf {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            self.basedir.join(root)
        };
        normalize(&root.join(request))
    }
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    main: Option<serde_json::Value>,
}

/// The `node_modules` directories to search for bare requests issued from
/// `from`, nearest first.
///
/// Path segments that are themselves named `node_modules` do not get a
/// nested `node_modules` candidate. Candidates are not checked for
/// existence.
pub fn node_module_paths(from: &Path) -> Vec<PathBuf> {
    let from = normalize(from);
    let parts: Vec<Component<'_>> = from.components().collect();

    let mut paths = Vec::with_capacity(parts.len());
    for tip in (0..parts.len()).rev() {
        if parts[tip].as_os_str() == "node_modules" {
            continue;
        }
        let dir: PathBuf = parts[..=tip].iter().collect();
        paths.push(dir.join("node_modules"));
    }
    paths
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment. Symlinks are not consulted.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const EXTS: &[&str] = &[".js", ".json", ".node"];

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path.canonicalize().unwrap()
    }

    #[test]
    fn test_node_module_paths_order() {
        let paths = node_module_paths(Path::new("/x/y/node_modules/z"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/x/y/node_modules/z/node_modules"),
                PathBuf::from("/x/y/node_modules"),
                PathBuf::from("/x/node_modules"),
                PathBuf::from("/node_modules"),
            ]
        );
    }

    #[test]
    fn test_node_module_paths_root() {
        assert_eq!(node_module_paths(Path::new("/")), vec![PathBuf::from("/node_modules")]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("../../b")), PathBuf::from("../../b"));
    }

    #[test]
    fn test_extension_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "mod.json", "{}");
        let js = write(tmp.path(), "mod.js", "");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./mod", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(js));
    }

    #[test]
    fn test_literal_file_wins_over_extensions() {
        let tmp = TempDir::new().unwrap();
        let literal = write(tmp.path(), "data", "");
        write(tmp.path(), "data.js", "");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./data", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(literal));
    }

    #[test]
    fn test_package_main() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "pkg/package.json", r#"{"main": "lib/entry.js"}"#);
        let entry = write(tmp.path(), "pkg/lib/entry.js", "");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./pkg", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(entry));
    }

    #[test]
    fn test_package_main_directory_index() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "pkg/package.json", r#"{"main": "lib"}"#);
        let index = write(tmp.path(), "pkg/lib/index.js", "");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./pkg", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(index));
    }

    #[test]
    fn test_index_fallback_without_package() {
        let tmp = TempDir::new().unwrap();
        let index = write(tmp.path(), "dir/index.json", "{}");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./dir", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(index));
    }

    #[test]
    fn test_package_without_main_falls_back_to_index() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "dir/package.json", r#"{"name": "dir"}"#);
        let index = write(tmp.path(), "dir/index.js", "");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./dir", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(index));
    }

    #[test]
    fn test_trailing_slash_skips_file_lookups() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "lib.js", "");
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./lib/", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, None);

        let index = write(tmp.path(), "lib/index.js", "");
        let resolver = PathResolver::new(tmp.path());
        let found = resolver
            .find_path("./lib/", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(index));
    }

    #[test]
    fn test_absolute_request_ignores_roots() {
        let tmp = TempDir::new().unwrap();
        let target = write(tmp.path(), "abs.js", "");
        let resolver = PathResolver::new("/");
        let request = tmp.path().join("abs").to_string_lossy().into_owned();

        let found = resolver
            .find_path(&request, &[PathBuf::from("/nowhere")], EXTS)
            .unwrap();
        assert_eq!(found, Some(target));
    }

    #[test]
    fn test_first_root_wins() {
        let tmp = TempDir::new().unwrap();
        let near = write(tmp.path(), "a/node_modules/dep.js", "");
        write(tmp.path(), "node_modules/dep.js", "");
        let resolver = PathResolver::new(tmp.path());
        let roots = node_module_paths(&tmp.path().join("a"));

        let found = resolver.find_path("dep", &roots, EXTS).unwrap();
        assert_eq!(found, Some(near));
    }

    #[test]
    fn test_failures_are_cached() {
        let tmp = TempDir::new().unwrap();
        let resolver = PathResolver::new(tmp.path());
        let roots = [tmp.path().to_path_buf()];

        assert_eq!(resolver.find_path("./late", &roots, EXTS).unwrap(), None);
        write(tmp.path(), "late.js", "");
        assert_eq!(resolver.find_path("./late", &roots, EXTS).unwrap(), None);
        assert_eq!(resolver.cached_paths(), 1);
    }

    #[test]
    fn test_package_json_is_read_once_per_directory() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "pkg/package.json", r#"{"main": "first.js"}"#);
        let first = write(tmp.path(), "pkg/first.js", "");
        write(tmp.path(), "pkg/second.js", "");
        let resolver = PathResolver::new(tmp.path());
        let roots = [tmp.path().to_path_buf()];

        assert_eq!(resolver.find_path("./pkg/", &roots, EXTS).unwrap(), Some(first.clone()));

        write(tmp.path(), "pkg/package.json", r#"{"main": "second.js"}"#);
        let found = resolver.find_path("./pkg/../pkg/", &roots, EXTS).unwrap();
        assert_eq!(found, Some(first));
        assert_eq!(resolver.cached_paths(), 2);
    }

    #[test]
    fn test_missing_package_json_is_remembered() {
        let tmp = TempDir::new().unwrap();
        let index = write(tmp.path(), "pkg/index.js", "");
        write(tmp.path(), "pkg/other.js", "");
        let resolver = PathResolver::new(tmp.path());
        let roots = [tmp.path().to_path_buf()];

        assert_eq!(resolver.find_path("./pkg/", &roots, EXTS).unwrap(), Some(index.clone()));

        write(tmp.path(), "pkg/package.json", r#"{"main": "other.js"}"#);
        let found = resolver.find_path("./pkg/../pkg/", &roots, EXTS).unwrap();
        assert_eq!(found, Some(index));
        assert_eq!(resolver.cached_paths(), 2);
    }

    #[test]
    fn test_malformed_package_json() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad/package.json", "{ not json");
        let resolver = PathResolver::new(tmp.path());

        let err = resolver
            .find_path("./bad", &[tmp.path().to_path_buf()], EXTS)
            .unwrap_err();
        match err {
            NodeError::PackageJson { path, .. } => assert!(path.ends_with("bad/package.json")),
            other => panic!("expected package.json error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_canonicalized() {
        let tmp = TempDir::new().unwrap();
        let real = write(tmp.path(), "real.js", "");
        std::os::unix::fs::symlink(&real, tmp.path().join("link.js")).unwrap();
        let resolver = PathResolver::new(tmp.path());

        let found = resolver
            .find_path("./link", &[tmp.path().to_path_buf()], EXTS)
            .unwrap();
        assert_eq!(found, Some(real));
    }
}
