// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution context: one engine, one module graph

use crate::error::{NodeError, Result};
use crate::globals;
use crate::module_system::{
    BuiltinSources, ExtensionHandler, Extensions, Module, ModuleCache, NativeRegistry,
    PathResolver, node_module_paths, normalize,
};
use crate::options::ContextOptions;
use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use tidepool_engine::{Engine, ObjectRef, Value};
use tracing::debug;

/// An execution context.
///
/// Owns the script engine, the module registry, the builtin registry and
/// the resolution caches. Nothing is shared between contexts. A context is
/// a cheap handle; clones refer to the same engine.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    engine: Engine,
    basedir: PathBuf,
    resolver: PathResolver,
    extensions: Extensions,
    extensions_object: ObjectRef,
    modules: ModuleCache,
    natives: NativeRegistry,
    global_paths: Vec<PathBuf>,
    process: ObjectRef,
    main: RefCell<Option<Rc<Module>>>,
    anchor: OnceCell<Rc<Module>>,
}

/// A non-owning handle captured by native callbacks, so the engine does
/// not keep its own context alive.
#[derive(Clone)]
pub(crate) struct WeakContext(Weak<ContextInner>);

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Result<Context> {
        self.0
            .upgrade()
            .map(|inner| Context { inner })
            .ok_or(NodeError::ContextDropped)
    }
}

impl Context {
    /// Create a context, install the sandbox globals and load `console`.
    pub fn new(options: ContextOptions) -> Result<Self> {
        let basedir = std::path::absolute(&options.basedir)
            .map(|dir| normalize(&dir))
            .map_err(|source| NodeError::read(&options.basedir, source))?;
        let sources = match &options.builtin_dir {
            Some(dir) => BuiltinSources::from_dir(dir)?,
            None => BuiltinSources::bundled(),
        };
        let global_paths = global_paths(&options.env, options.exec_path.as_deref());

        let inner = Rc::new_cyclic(|weak| {
            let engine = Engine::new();
            engine.set_stack_budget(options.stack_budget);
            let process = globals::process::create_process_object(&engine, &options, &basedir);
            globals::install(&engine, &process);

            let extensions = Extensions::new();
            let extensions_object =
                create_extensions_object(&engine, &extensions, WeakContext(weak.clone()));
            let modules = ModuleCache::new(engine.new_object());

            ContextInner {
                resolver: PathResolver::new(&basedir),
                natives: NativeRegistry::new(sources),
                main: RefCell::new(None),
                anchor: OnceCell::new(),
                engine,
                basedir,
                extensions,
                extensions_object,
                modules,
                global_paths,
                process,
            }
        });

        let cx = Self { inner };
        debug!(
            basedir = %cx.basedir().display(),
            builtins = ?cx.natives().ids(),
            "context created"
        );

        let console = cx.natives().require(&cx, "console")?;
        cx.engine().global().define_hidden("console", console);
        Ok(cx)
    }

    /// Create a context rooted at `basedir` and require the package or
    /// index file found there.
    pub fn main(basedir: impl Into<PathBuf>) -> Result<(Self, Value)> {
        let cx = Self::new(ContextOptions::new(basedir))?;
        let exports = cx.require("./")?;
        Ok((cx, exports))
    }

    /// Require `path` from a fresh main module rooted at the base
    /// directory and return its exports.
    pub fn require(&self, path: &str) -> Result<Value> {
        let script = format!(
            "module.exports = require({});",
            serde_json::Value::from(path)
        );
        let module = self.eval_as_module(&script, "[main]", true)?;
        Ok(module.exports())
    }

    /// Compile `script` as a module named `name` in the base directory.
    ///
    /// A main module gets the id `"."` and becomes `process.mainModule`.
    pub fn eval_as_module(&self, script: &str, name: &str, is_main: bool) -> Result<Rc<Module>> {
        let module = Module::new(self, name, None);
        let filename = self.basedir().join(name);
        module.set_filename(&filename);
        module.set_paths(self, node_module_paths(self.basedir()));

        if is_main {
            self.process()
                .set("mainModule", Value::Object(module.object().clone()));
            module.set_id(".");
            *self.inner.main.borrow_mut() = Some(Rc::clone(&module));
        }

        module.compile(self, script, &filename)?;
        Ok(module)
    }

    /// Resolve `request` against `paths` with the registered extensions.
    pub fn find_path(&self, request: &str, paths: &[PathBuf]) -> Result<Option<PathBuf>> {
        self.inner
            .resolver
            .find_path(request, paths, &self.inner.extensions.keys())
    }

    /// Create a plain object in the sandbox
    pub fn new_object(&self) -> ObjectRef {
        self.engine().new_object()
    }

    /// Create a callable in the sandbox with `props` attached to it.
    pub fn new_function<F>(&self, name: &str, props: &[(&str, Value)], f: F) -> ObjectRef
    where
        F: Fn(&Engine, Value, &[Value]) -> tidepool_engine::Result<Value> + 'static,
    {
        let function = self.engine().new_function(name, f);
        for (key, value) in props {
            function.set(*key, value.clone());
        }
        function
    }

    /// The script engine
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// Root search origin and `process.cwd()`
    pub fn basedir(&self) -> &Path {
        &self.inner.basedir
    }

    /// The sandbox `process` object
    pub fn process(&self) -> ObjectRef {
        self.inner.process.clone()
    }

    /// The module registry
    pub fn modules(&self) -> &ModuleCache {
        &self.inner.modules
    }

    /// The builtin registry
    pub fn natives(&self) -> &NativeRegistry {
        &self.inner.natives
    }

    /// The extension table
    pub fn extensions(&self) -> &Extensions {
        &self.inner.extensions
    }

    /// Fallback search roots for bare requests: `NODE_PATH`, the per-user
    /// module folders, then the library folder next to the executable.
    pub fn global_paths(&self) -> &[PathBuf] {
        &self.inner.global_paths
    }

    /// The most recent main module
    pub fn main_module(&self) -> Option<Rc<Module>> {
        self.inner.main.borrow().clone()
    }

    pub(crate) fn extensions_object(&self) -> ObjectRef {
        self.inner.extensions_object.clone()
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Rc::downgrade(&self.inner))
    }

    /// Module that builtins require filesystem paths through. It sits in
    /// the base directory and is never registered.
    pub(crate) fn anchor_module(&self) -> Rc<Module> {
        let anchor = self.inner.anchor.get_or_init(|| {
            let module = Module::new(self, "[native]", None);
            module.set_filename(&self.basedir().join("[native]"));
            module.set_paths(self, node_module_paths(self.basedir()));
            module
        });
        Rc::clone(anchor)
    }

    /// The module whose sandbox object is `object`
    pub(crate) fn module_for_object(&self, object: &ObjectRef) -> Option<Rc<Module>> {
        let main = self.main_module();
        let anchor = self.inner.anchor.get().cloned();
        main.into_iter()
            .chain(anchor)
            .find(|module| module.object().ptr_eq(object))
            .or_else(|| self.modules().find_by_object(object))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("basedir", &self.inner.basedir)
            .field("modules", &self.inner.modules.len())
            .field("global_paths", &self.inner.global_paths)
            .finish()
    }
}

/// `require.extensions`: one callable per extension taking
/// `(module, filename)`.
fn create_extensions_object(engine: &Engine, extensions: &Extensions, weak: WeakContext) -> ObjectRef {
    let object = engine.new_object();
    for (ext, handler) in extensions.iter() {
        let weak = weak.clone();
        let function = engine.new_function(ext, move |_, _, args| {
            let cx = weak.upgrade()?;
            run_extension(&cx, handler, args)?;
            Ok(Value::Undefined)
        });
        object.set(ext, Value::Object(function));
    }
    object
}

fn run_extension(cx: &Context, handler: ExtensionHandler, args: &[Value]) -> tidepool_engine::Result<()> {
    let module = args
        .first()
        .and_then(Value::as_object)
        .and_then(|object| cx.module_for_object(object))
        .ok_or_else(|| tidepool_engine::Error::TypeError("first argument must be a module".to_string()))?;
    let filename = args
        .get(1)
        .and_then(Value::as_str)
        .ok_or(NodeError::InvalidArgument)?;
    handler.run(cx, &module, Path::new(filename))?;
    Ok(())
}

fn global_paths(env: &BTreeMap<String, String>, exec_path: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(node_path) = env.get("NODE_PATH") {
        paths.extend(std::env::split_paths(node_path).filter(|p| !p.as_os_str().is_empty()));
    }

    let home = if cfg!(windows) {
        env.get("USERPROFILE").or_else(|| env.get("HOME"))
    } else {
        env.get("HOME")
    };
    if let Some(home) = home {
        let home = Path::new(home);
        paths.push(normalize(&home.join(".node_modules")));
        paths.push(normalize(&home.join(".node_libraries")));
    }

    if let Some(exec_path) = exec_path {
        paths.push(normalize(&exec_path.join("../../lib/node")));
    }

    paths
}
