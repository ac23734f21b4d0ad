//! Stub native layer: records every call and answers with a per-function handler.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sentech_sys::{CallTypes, Error, NativeArg, NativeFunction, NativeLibrary, Result, Value};

type Handler = Box<dyn Fn(&mut [NativeArg<'_>]) -> Value + Send + Sync>;

/// What the stub saw for one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenArg {
    pub by_ref: bool,
    pub int: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: String,
    pub args: Vec<SeenArg>,
    pub typed: bool,
}

struct StubFunction {
    name: String,
    handler: Handler,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl NativeFunction for StubFunction {
    unsafe fn invoke(&self, args: &mut [NativeArg<'_>], types: CallTypes<'_>) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            name: self.name.clone(),
            args: args
                .iter()
                .map(|a| SeenArg {
                    by_ref: a.is_ref(),
                    int: a.value().as_i64(),
                })
                .collect(),
            typed: types.args.is_some(),
        });
        Ok((self.handler)(args))
    }
}

#[derive(Clone, Default)]
pub struct StubLibrary {
    functions: HashMap<String, Arc<StubFunction>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl StubLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        name: &str,
        handler: impl Fn(&mut [NativeArg<'_>]) -> Value + Send + Sync + 'static,
    ) -> Self {
        let function = StubFunction {
            name: name.to_string(),
            handler: Box::new(handler),
            calls: Arc::clone(&self.calls),
        };
        self.functions.insert(name.to_string(), Arc::new(function));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, name: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }
}

impl NativeLibrary for StubLibrary {
    fn resolve(&self, symbol: &str) -> Result<Arc<dyn NativeFunction>> {
        self.functions
            .get(symbol)
            .map(|f| Arc::clone(f) as Arc<dyn NativeFunction>)
            .ok_or_else(|| Error::Symbol {
                name: symbol.to_string(),
                message: "not exported by stub".into(),
            })
    }
}
