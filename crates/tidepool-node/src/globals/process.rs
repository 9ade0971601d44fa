// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The sandbox `process` object

use crate::error::NodeError;
use crate::options::{ContextOptions, Output};
use std::path::Path;
use tidepool_engine::{Engine, ErrorKind, ObjectRef, Value};

/// Listener methods that exist but do nothing, since there is no event
/// loop to deliver events.
const EVENT_METHODS: &[&str] = &[
    "on",
    "once",
    "off",
    "addListener",
    "removeListener",
    "removeAllListeners",
    "emit",
];

/// Create the process object
pub fn create_process_object(engine: &Engine, options: &ContextOptions, basedir: &Path) -> ObjectRef {
    let process = engine.new_object();

    process.set("title", Value::from(options.title.as_str()));
    process.set("pid", Value::Number(std::process::id() as f64));

    let env = engine.new_object();
    for (key, value) in &options.env {
        env.set(key.as_str(), Value::from(value.as_str()));
    }
    process.set("env", Value::Object(env));

    // process.cwd() is fixed to the context's base directory
    let cwd = basedir.to_string_lossy().into_owned();
    let cwd_fn = engine.new_function("cwd", move |_, _, _| Ok(Value::from(cwd.as_str())));
    process.set("cwd", Value::Object(cwd_fn));

    process.set("stdout", Value::Object(create_stream(engine, options.stdout.clone())));
    process.set("stderr", Value::Object(create_stream(engine, options.stderr.clone())));

    for name in EVENT_METHODS {
        let noop = engine.new_function(name, |_, _, _| Ok(Value::Undefined));
        process.set(*name, Value::Object(noop));
    }

    process.set("domain", Value::Null);

    let chdir = engine.new_function("chdir", |engine, _, _| {
        Err(tidepool_engine::Error::Thrown(Value::Object(
            engine.new_error(ErrorKind::Error, "process.chdir is not supported"),
        )))
    });
    process.set("chdir", Value::Object(chdir));

    let umask = engine.new_function("umask", |_, _, _| Ok(Value::Number(0.0)));
    process.set("umask", Value::Object(umask));

    process
}

/// A `{ write(chunk) }` object forwarding to `output`.
fn create_stream(engine: &Engine, output: Output) -> ObjectRef {
    let stream = engine.new_object();
    let write = engine.new_function("write", move |engine, _, args| {
        let chunk = engine.to_js_string(args.first().unwrap_or(&Value::Undefined))?;
        output
            .write(chunk.as_bytes())
            .map_err(NodeError::Output)?;
        Ok(Value::Boolean(true))
    });
    stream.set("write", Value::Object(write));
    stream
}
