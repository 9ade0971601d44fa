// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Builtin (native) modules
//!
//! Builtins are bundled script sources identified by id. They live in a
//! namespace of their own: a request matching a builtin id never touches
//! the filesystem. Each builtin is compiled at most once per context.

use crate::error::{NodeError, Result};
use crate::module_system::module::{request_arg, strip_shebang, wrap};
use crate::runtime::Context;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tidepool_engine::{ObjectRef, Value};
use tracing::debug;

/// Sources compiled into the binary, keyed by id.
const BUNDLED: &[(&str, &str)] = &[
    ("assert", include_str!("../../lib/assert.js")),
    ("console", include_str!("../../lib/console.js")),
    ("util", include_str!("../../lib/util.js")),
];

/// Where builtin sources come from.
#[derive(Debug)]
enum Origin {
    Bundled,
    Dir(PathBuf),
}

/// The fixed set of builtin ids and their (lazily read) source text.
#[derive(Debug)]
pub struct BuiltinSources {
    origin: Origin,
    ids: Vec<String>,
    sources: RefCell<FxHashMap<String, Rc<str>>>,
}

impl BuiltinSources {
    /// The builtins bundled with this crate.
    pub fn bundled() -> Self {
        Self {
            origin: Origin::Bundled,
            ids: BUNDLED.iter().map(|(id, _)| id.to_string()).collect(),
            sources: RefCell::default(),
        }
    }

    /// Builtins read from the `*.js` files in `dir`. Ids are the file stems;
    /// sources are read on first use.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let entries = std::fs::read_dir(&dir).map_err(|source| NodeError::read(&dir, source))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| NodeError::read(&dir, source))?.path();
            if path.extension().is_some_and(|ext| ext == "js") && path.is_file() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();

        Ok(Self {
            origin: Origin::Dir(dir),
            ids,
            sources: RefCell::default(),
        })
    }

    /// All builtin ids, sorted
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Check if `id` names a builtin
    pub fn exists(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    /// Source text for `id`, read once and kept.
    pub fn source(&self, id: &str) -> Result<Option<Rc<str>>> {
        if !self.exists(id) {
            return Ok(None);
        }
        if let Some(source) = self.sources.borrow().get(id) {
            return Ok(Some(Rc::clone(source)));
        }

        let source: Rc<str> = match &self.origin {
            Origin::Bundled => BUNDLED
                .iter()
                .find(|(known, _)| *known == id)
                .map(|(_, source)| Rc::from(*source))
                .ok_or_else(|| NodeError::NoSuchNativeModule(id.to_string()))?,
            Origin::Dir(dir) => {
                let path = dir.join(format!("{}.js", id));
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| NodeError::read(&path, source))?;
                Rc::from(text)
            }
        };

        self.sources
            .borrow_mut()
            .insert(id.to_string(), Rc::clone(&source));
        Ok(Some(source))
    }
}

/// One compiled builtin.
#[derive(Debug)]
pub struct NativeModule {
    id: String,
    filename: String,
    object: ObjectRef,
    loaded: Cell<bool>,
}

impl NativeModule {
    fn new(cx: &Context, id: &str) -> Self {
        let filename = format!("{}.js", id);
        let object = cx.new_object();
        object.set("id", Value::from(id));
        object.set("filename", Value::from(filename.as_str()));
        object.set("exports", Value::Object(cx.new_object()));
        object.set("loaded", Value::Boolean(false));

        Self {
            id: id.to_string(),
            filename,
            object,
            loaded: Cell::new(false),
        }
    }

    /// Builtin id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `id + ".js"`
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Current value of `module.exports`
    pub fn exports(&self) -> Value {
        self.object.get("exports")
    }

    /// True once the builtin body has run
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Run the builtin body with `(exports, require, module, __filename)`.
    fn compile(&self, cx: &Context, source: &str) -> Result<()> {
        let engine = cx.engine();
        let function = engine.evaluate(&wrap(strip_shebang(source)), &self.filename)?;

        let weak = cx.downgrade();
        let require = cx.new_function("require", &[], move |_, _, args| {
            let cx = weak.upgrade()?;
            let request = request_arg(args)?;
            Ok(cx.anchor_module().require(&cx, request)?)
        });

        let exports = self.exports();
        let args = [
            exports.clone(),
            Value::Object(require),
            Value::Object(self.object.clone()),
            Value::from(self.filename.as_str()),
        ];
        engine.call(&function, exports, &args)?;

        self.loaded.set(true);
        self.object.set("loaded", Value::Boolean(true));
        Ok(())
    }
}

/// Per-context cache of compiled builtins.
#[derive(Debug)]
pub struct NativeRegistry {
    sources: BuiltinSources,
    cache: RefCell<FxHashMap<String, Rc<NativeModule>>>,
}

impl NativeRegistry {
    /// Create an empty registry over `sources`.
    pub fn new(sources: BuiltinSources) -> Self {
        Self {
            sources,
            cache: RefCell::default(),
        }
    }

    /// Check if `id` names a builtin
    pub fn exists(&self, id: &str) -> bool {
        self.sources.exists(id)
    }

    /// All builtin ids
    pub fn ids(&self) -> &[String] {
        self.sources.ids()
    }

    /// The compiled builtin for `id`, if it has been required
    pub fn get(&self, id: &str) -> Option<Rc<NativeModule>> {
        self.cache.borrow().get(id).cloned()
    }

    /// Exports of builtin `id`, compiling it on first use.
    pub fn require(&self, cx: &Context, id: &str) -> Result<Value> {
        if let Some(cached) = self.get(id) {
            return Ok(cached.exports());
        }

        let source = self
            .sources
            .source(id)?
            .ok_or_else(|| NodeError::NoSuchNativeModule(id.to_string()))?;

        debug!(id, "compiling builtin");
        let native = Rc::new(NativeModule::new(cx, id));
        native.compile(cx, &source)?;

        self.cache
            .borrow_mut()
            .insert(id.to_string(), Rc::clone(&native));
        Ok(native.exports())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn bundled_dir() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/lib"))
    }

    #[test]
    fn test_bundled_ids() {
        let sources = BuiltinSources::bundled();
        assert_eq!(sources.ids(), ["assert", "console", "util"]);
        assert!(sources.exists("console"));
        assert!(!sources.exists("fs"));
    }

    #[test]
    fn test_bundled_source_matches_shim_file() {
        let sources = BuiltinSources::bundled();
        let source = sources.source("util").unwrap().unwrap();
        let on_disk = std::fs::read_to_string(bundled_dir().join("util.js")).unwrap();
        assert_eq!(&*source, on_disk.as_str());
        assert!(sources.source("nope").unwrap().is_none());
    }

    #[test]
    fn test_dir_sources_are_read_lazily() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("greet.js"), "exports.hi = 'v1';").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();
        let sources = BuiltinSources::from_dir(tmp.path()).unwrap();
        assert_eq!(sources.ids(), ["greet"]);

        let first = sources.source("greet").unwrap().unwrap();
        std::fs::write(tmp.path().join("greet.js"), "exports.hi = 'v2';").unwrap();
        let second = sources.source("greet").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(&*second, "exports.hi = 'v1';");
    }

    #[test]
    fn test_missing_dir() {
        let err = BuiltinSources::from_dir("/definitely/not/here").unwrap_err();
        assert!(matches!(err, NodeError::Read { .. }));
    }
}
