// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Sandbox globals
//!
//! Installed before any builtin or user code runs:
//!
//! - `global`, `GLOBAL`, `root` and `globalThis` alias the global object
//! - `process` (see [`process`])
//! - `Buffer`, which throws on use

pub mod process;

use tidepool_engine::{Engine, ErrorKind, ObjectRef, Value};

/// Install the global aliases, `process` and the `Buffer` stub.
pub fn install(engine: &Engine, process: &ObjectRef) {
    let global = engine.global();

    for alias in ["global", "GLOBAL", "root", "globalThis"] {
        global.define_hidden(alias, Value::Object(global.clone()));
    }

    global.define_hidden("process", Value::Object(process.clone()));

    let buffer = engine.new_function("Buffer", |engine, _, _| {
        Err(tidepool_engine::Error::Thrown(Value::Object(
            engine.new_error(ErrorKind::Error, "global.Buffer is not supported"),
        )))
    });
    global.define_hidden("Buffer", Value::Object(buffer));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_point_at_global() {
        let engine = Engine::new();
        install(&engine, &engine.new_object());
        let result = engine
            .evaluate(
                "global === this && GLOBAL === global && root === global && globalThis === global",
                "aliases.js",
            )
            .unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn test_buffer_throws() {
        let engine = Engine::new();
        install(&engine, &engine.new_object());
        let err = engine.evaluate("new Buffer(4)", "buffer.js").unwrap_err();
        assert_eq!(err.to_string(), "Error: global.Buffer is not supported");
    }
}
