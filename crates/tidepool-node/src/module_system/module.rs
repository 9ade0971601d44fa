// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A loaded unit of user code
//!
//! Every [`Module`] has a sandbox-side `module` object that scripts see.
//! The Rust side reads `exports` through it, so a body that reassigns
//! `module.exports` is observed without any extra bookkeeping.

use crate::error::{NodeError, Result};
use crate::module_system::resolver::{node_module_paths, normalize};
use crate::runtime::Context;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use tidepool_engine::runtime::ObjectKind;
use tidepool_engine::{ObjectRef, Value};
use tracing::{debug, warn};

/// Wrap module source so it runs as a function of the five module bindings.
pub fn wrap(source: &str) -> String {
    format!(
        "(function (exports, require, module, __filename, __dirname) {{\n{}\n}})",
        source
    )
}

/// Blank out a leading `#!` line, keeping the newline so line numbers in
/// diagnostics still match the file.
pub(crate) fn strip_shebang(content: &str) -> &str {
    if content.starts_with("#!") {
        match content.find('\n') {
            Some(end) => &content[end..],
            None => "",
        }
    } else {
        content
    }
}

/// A module loaded from the filesystem (or compiled from a script string).
pub struct Module {
    id: RefCell<String>,
    filename: RefCell<Option<PathBuf>>,
    loaded: Cell<bool>,
    parent: Option<Weak<Module>>,
    children: RefCell<Vec<Rc<Module>>>,
    paths: RefCell<Vec<PathBuf>>,
    object: ObjectRef,
}

impl Module {
    /// Create an unloaded module with a fresh `exports` object. When a
    /// parent is given the new module is appended to its children.
    pub fn new(cx: &Context, id: &str, parent: Option<&Rc<Module>>) -> Rc<Self> {
        let engine = cx.engine();
        let object = cx.new_object();
        object.set("id", Value::from(id));
        object.set("exports", Value::Object(cx.new_object()));
        object.set(
            "parent",
            parent.map_or(Value::Null, |p| Value::Object(p.object.clone())),
        );
        object.set("filename", Value::Null);
        object.set("loaded", Value::Boolean(false));
        object.set("children", Value::Object(engine.new_array(Vec::new())));
        object.set("paths", Value::Object(engine.new_array(Vec::new())));

        let module = Rc::new(Self {
            id: RefCell::new(id.to_string()),
            filename: RefCell::new(None),
            loaded: Cell::new(false),
            parent: parent.map(Rc::downgrade),
            children: RefCell::new(Vec::new()),
            paths: RefCell::new(Vec::new()),
            object,
        });
        if let Some(parent) = parent {
            parent.add_child(&module);
        }
        module
    }

    /// Display id
    pub fn id(&self) -> String {
        self.id.borrow().clone()
    }

    /// Absolute filename, set once loading starts
    pub fn filename(&self) -> Option<PathBuf> {
        self.filename.borrow().clone()
    }

    /// True once the body has run to completion
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// The module that first required this one, if it is still alive
    pub fn parent(&self) -> Option<Rc<Module>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Modules first required by this one, in order
    pub fn children(&self) -> Vec<Rc<Module>> {
        self.children.borrow().clone()
    }

    /// Search roots for bare requests issued by this module
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.borrow().clone()
    }

    /// The sandbox `module` object
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// Current value of `module.exports`
    pub fn exports(&self) -> Value {
        self.object.get("exports")
    }

    pub(crate) fn set_exports(&self, exports: Value) {
        self.object.set("exports", exports);
    }

    pub(crate) fn set_id(&self, id: &str) {
        *self.id.borrow_mut() = id.to_string();
        self.object.set("id", Value::from(id));
    }

    pub(crate) fn set_filename(&self, filename: &Path) {
        *self.filename.borrow_mut() = Some(filename.to_path_buf());
        self.object
            .set("filename", Value::from(filename.to_string_lossy().as_ref()));
    }

    pub(crate) fn set_paths(&self, cx: &Context, paths: Vec<PathBuf>) {
        let values = paths
            .iter()
            .map(|p| Value::from(p.to_string_lossy().as_ref()))
            .collect();
        self.object
            .set("paths", Value::Object(cx.engine().new_array(values)));
        *self.paths.borrow_mut() = paths;
    }

    fn set_loaded(&self) {
        self.loaded.set(true);
        self.object.set("loaded", Value::Boolean(true));
    }

    fn add_child(&self, child: &Rc<Module>) {
        self.children.borrow_mut().push(Rc::clone(child));
        if let Value::Object(array) = self.object.get("children") {
            if let ObjectKind::Array(elements) = &mut array.borrow_mut().kind {
                elements.push(Value::Object(child.object.clone()));
            }
        }
    }

    /// Require `request` on behalf of this module.
    ///
    /// Builtins win over the filesystem. A registry hit returns the cached
    /// exports even if that module is still loading, which is how cycles
    /// terminate. A module whose body fails is evicted before the error is
    /// returned.
    pub fn require(self: &Rc<Self>, cx: &Context, request: &str) -> Result<Value> {
        if cx.natives().exists(request) {
            return cx.natives().require(cx, request);
        }

        let filename = self.resolve(cx, request)?;

        if let Some(cached) = cx.modules().get(&filename) {
            debug!(
                filename = %filename.display(),
                loaded = cached.is_loaded(),
                "module cache hit"
            );
            return Ok(cached.exports());
        }

        let id = filename.to_string_lossy().into_owned();
        let module = Module::new(cx, &id, Some(self));
        cx.modules().insert(filename.clone(), Rc::clone(&module));

        if let Err(err) = module.load(cx, &filename) {
            cx.modules().remove(&filename);
            warn!(filename = %filename.display(), error = %err, "module failed to load; evicted");
            return Err(err);
        }

        Ok(module.exports())
    }

    /// Resolve `request` to a filename without loading it.
    pub fn resolve(&self, cx: &Context, request: &str) -> Result<PathBuf> {
        let (id, paths) = self.resolve_lookup_paths(cx, request);

        match cx.find_path(request, &paths)? {
            Some(filename) => {
                debug!(request, id = %id, filename = %filename.display(), "resolved module");
                Ok(filename)
            }
            None => Err(NodeError::module_not_found(request)),
        }
    }

    /// The logical id of `request` and the roots to search for it.
    ///
    /// Relative requests search the directory of this module's file. Bare
    /// requests search this module's `paths`, then the global paths.
    fn resolve_lookup_paths(&self, cx: &Context, request: &str) -> (String, Vec<PathBuf>) {
        if !is_relative(request) {
            let mut paths = self.paths();
            paths.extend_from_slice(cx.global_paths());
            return (request.to_string(), paths);
        }

        let Some(filename) = self.filename() else {
            let basedir = cx.basedir().to_path_buf();
            let mut paths = node_module_paths(&basedir);
            paths.push(basedir);
            paths.extend_from_slice(cx.global_paths());
            return (request.to_string(), paths);
        };

        // An index file stands for its directory, so its own id anchors the
        // request instead of the id's parent.
        let own_id = self.id();
        let id_path = if is_index(&filename) {
            PathBuf::from(&own_id)
        } else {
            Path::new(&own_id)
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        };
        let mut id = normalize(&id_path.join(request))
            .to_string_lossy()
            .into_owned();
        if (id_path.as_os_str().is_empty() || id_path == Path::new(".")) && !id.contains('/') {
            id = format!("./{}", id);
        }

        let dirname = filename
            .parent()
            .map_or_else(|| cx.basedir().to_path_buf(), Path::to_path_buf);
        (id, vec![dirname])
    }

    /// Load this module from `filename` through the extension table.
    pub(crate) fn load(self: &Rc<Self>, cx: &Context, filename: &Path) -> Result<()> {
        if self.is_loaded() {
            return Err(NodeError::AlreadyLoaded(self.id()));
        }

        self.set_filename(filename);
        if let Some(dir) = filename.parent() {
            self.set_paths(cx, node_module_paths(dir));
        }

        let handler = cx.extensions().handler_for(filename);
        debug!(filename = %filename.display(), ?handler, "loading module");
        handler.run(cx, self, filename)?;

        self.set_loaded();
        Ok(())
    }

    /// Compile `content` in the module wrapper and run it with this
    /// module's bindings. `filename` names the source in diagnostics and
    /// becomes `__filename`.
    pub(crate) fn compile(self: &Rc<Self>, cx: &Context, content: &str, filename: &Path) -> Result<Value> {
        let engine = cx.engine();
        let name = filename.to_string_lossy();
        let function = engine.evaluate(&wrap(strip_shebang(content)), &name)?;

        let dirname = filename
            .parent()
            .map_or_else(|| ".".into(), |dir| dir.to_string_lossy());
        let exports = self.exports();
        let args = [
            exports.clone(),
            Value::Object(self.require_function(cx)),
            Value::Object(self.object.clone()),
            Value::from(name.as_ref()),
            Value::from(dirname.as_ref()),
        ];

        Ok(engine.call(&function, exports, &args)?)
    }

    /// Build the `require` callable handed to this module's body, with
    /// `main`, `cache`, `extensions` and `resolve` attached.
    fn require_function(self: &Rc<Self>, cx: &Context) -> ObjectRef {
        let resolve = {
            let weak = cx.downgrade();
            let module = Rc::clone(self);
            cx.new_function("resolve", &[], move |_, _, args| {
                let cx = weak.upgrade()?;
                let request = request_arg(args)?;
                if cx.natives().exists(request) {
                    return Ok(Value::from(request));
                }
                let filename = module.resolve(&cx, request)?;
                Ok(Value::from(filename.to_string_lossy().as_ref()))
            })
        };

        let props = [
            ("main", cx.process().get("mainModule")),
            ("cache", Value::Object(cx.modules().mirror().clone())),
            ("extensions", Value::Object(cx.extensions_object())),
            ("resolve", Value::Object(resolve)),
        ];

        let weak = cx.downgrade();
        let module = Rc::clone(self);
        cx.new_function("require", &props, move |_, _, args| {
            let cx = weak.upgrade()?;
            let request = request_arg(args)?;
            Ok(module.require(&cx, request)?)
        })
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &*self.id.borrow())
            .field("filename", &*self.filename.borrow())
            .field("loaded", &self.loaded.get())
            .field("children", &self.children.borrow().len())
            .finish()
    }
}

pub(crate) fn request_arg(args: &[Value]) -> Result<&str> {
    args.first()
        .and_then(Value::as_str)
        .ok_or(NodeError::InvalidArgument)
}

/// `.`, `..` and requests starting with `./` or `../` are relative. A name
/// like `..foo` is bare and goes through `node_modules`.
fn is_relative(request: &str) -> bool {
    matches!(request, "." | "..")
        || request.starts_with("./")
        || request.starts_with("../")
        || (cfg!(windows) && (request.starts_with(".\\") || request.starts_with("..\\")))
}

/// `index`, `index.js`, `index.test.js` and so on.
fn is_index(filename: &Path) -> bool {
    let Some(name) = filename.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match name.strip_prefix("index") {
        Some("") => true,
        Some(rest) => rest.strip_prefix('.').is_some_and(|rest| {
            rest.split('.').all(|part| {
                !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_')
            })
        }),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ContextOptions, Output};
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        let mut options = ContextOptions::new(dir.path());
        options.stdout = Output::buffer();
        options.stderr = Output::buffer();
        Context::new(options).unwrap()
    }

    #[test]
    fn test_wrap() {
        assert_eq!(
            wrap("exports.a = 1;"),
            "(function (exports, require, module, __filename, __dirname) {\nexports.a = 1;\n})"
        );
    }

    #[test]
    fn test_strip_shebang() {
        assert_eq!(strip_shebang("#!/usr/bin/env node\nx();"), "\nx();");
        assert_eq!(strip_shebang("#!only"), "");
        assert_eq!(strip_shebang("x();\n#!not-first"), "x();\n#!not-first");
    }

    #[test]
    fn test_is_index() {
        assert!(is_index(Path::new("/a/index.js")));
        assert!(is_index(Path::new("/a/index")));
        assert!(is_index(Path::new("/a/index.test.js")));
        assert!(!is_index(Path::new("/a/indexer.js")));
        assert!(!is_index(Path::new("/a/index..js")));
    }

    #[test]
    fn test_is_relative() {
        assert!(is_relative("./a"));
        assert!(is_relative("../a"));
        assert!(is_relative("."));
        assert!(!is_relative("pkg"));
        assert!(!is_relative(".hidden"));
        assert!(is_relative(".."));
        assert!(!is_relative("..foo"));
        assert!(!is_relative("/abs"));
    }

    #[test]
    fn test_new_module_is_linked_to_parent() {
        let tmp = TempDir::new().unwrap();
        let cx = context(&tmp);
        let parent = Module::new(&cx, "parent", None);
        let child = Module::new(&cx, "child", Some(&parent));

        assert_eq!(parent.children().len(), 1);
        assert!(child.parent().is_some_and(|p| Rc::ptr_eq(&p, &parent)));
        assert!(!child.is_loaded());

        let sandbox_children = parent.object().get("children");
        let elements = sandbox_children.as_object().and_then(ObjectRef::array_elements);
        assert_eq!(elements.map(|e| e.len()), Some(1));
        assert_eq!(
            child.object().get("parent"),
            Value::Object(parent.object().clone())
        );
    }

    #[test]
    fn test_load_twice_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("once.js"), "exports.n = 1;").unwrap();
        let cx = context(&tmp);
        let filename = tmp.path().join("once.js");
        let module = Module::new(&cx, "once", None);

        module.load(&cx, &filename).unwrap();
        assert!(module.is_loaded());
        assert_eq!(module.object().get("loaded"), Value::Boolean(true));
        assert!(matches!(
            module.load(&cx, &filename),
            Err(NodeError::AlreadyLoaded(_))
        ));
    }

    #[test]
    fn test_reassigned_exports_are_observed() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("fn.js"), "module.exports = 'replaced';").unwrap();
        let cx = context(&tmp);
        let module = Module::new(&cx, "fn", None);

        module.load(&cx, &tmp.path().join("fn.js")).unwrap();
        assert_eq!(module.exports(), Value::from("replaced"));
    }

    #[test]
    fn test_bindings_passed_to_body() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("bindings.js"),
            "module.exports = [this === exports, typeof require, __filename, __dirname];",
        )
        .unwrap();
        let cx = context(&tmp);
        let filename = tmp.path().join("bindings.js");
        let module = Module::new(&cx, "bindings", None);
        module.load(&cx, &filename).unwrap();

        let exported = module.exports();
        let values = exported.as_object().and_then(ObjectRef::array_elements).unwrap();
        assert_eq!(values[0], Value::Boolean(true));
        assert_eq!(values[1], Value::from("function"));
        assert_eq!(values[2], Value::from(filename.to_string_lossy().as_ref()));
        assert_eq!(
            values[3],
            Value::from(tmp.path().to_string_lossy().as_ref())
        );
    }

    #[test]
    fn test_paths_follow_filename() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("lib")).unwrap();
        std::fs::write(tmp.path().join("lib/x.js"), "").unwrap();
        let cx = context(&tmp);
        let filename = tmp.path().join("lib/x.js");
        let module = Module::new(&cx, "x", None);
        module.load(&cx, &filename).unwrap();

        let paths = module.paths();
        assert_eq!(paths[0], tmp.path().join("lib/node_modules"));
        assert_eq!(paths[1], tmp.path().join("node_modules"));
    }
}
