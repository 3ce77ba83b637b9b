#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use oxide_router::{AccessRecord, HandlerUnit, Observer, Response};

/// A plain unit answering `200` with `body`.
pub fn text(body: &'static str) -> HandlerUnit {
    HandlerUnit::plain(move |ctx| {
        Box::pin(async move {
            ctx.send(Response::text(body));
            Ok(())
        })
    })
}

/// A plain unit answering with the value of path parameter `name`.
pub fn echo_param(name: &'static str) -> HandlerUnit {
    HandlerUnit::plain(move |ctx| {
        Box::pin(async move {
            let value = ctx.param(name).unwrap_or("<none>").to_string();
            ctx.send(Response::text(value));
            Ok(())
        })
    })
}

/// A plain unit that panics.
pub fn panicking(message: &'static str) -> HandlerUnit {
    HandlerUnit::plain(move |_ctx| {
        Box::pin(async move {
            if !message.is_empty() {
                panic!("{message}");
            }
            Ok(())
        })
    })
}

/// Records which units ran, in order.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    /// A plain unit that records `name`.
    pub fn plain(&self, name: &'static str) -> HandlerUnit {
        let log = Arc::clone(&self.0);
        HandlerUnit::plain(move |_ctx| {
            log.lock().unwrap().push(name.to_string());
            Box::pin(async move { Ok(()) })
        })
    }

    /// A filter that records `name` and lets the chain continue.
    pub fn pass(&self, name: &'static str) -> HandlerUnit {
        let log = Arc::clone(&self.0);
        HandlerUnit::filter(move |ctx| {
            log.lock().unwrap().push(name.to_string());
            ctx.proceed()
        })
    }

    /// A filter that records `name` and stops the chain.
    pub fn block(&self, name: &'static str) -> HandlerUnit {
        let log = Arc::clone(&self.0);
        HandlerUnit::filter(move |_ctx| {
            log.lock().unwrap().push(name.to_string());
            Box::pin(async move { Ok(()) })
        })
    }

    /// A plain unit that records `name` and sends `body`.
    pub fn send(&self, name: &'static str, body: &'static str) -> HandlerUnit {
        let log = Arc::clone(&self.0);
        HandlerUnit::plain(move |ctx| {
            log.lock().unwrap().push(name.to_string());
            Box::pin(async move {
                ctx.send(Response::text(body));
                Ok(())
            })
        })
    }

    pub fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Collects access records.
#[derive(Clone, Default)]
pub struct Records(Arc<Mutex<Vec<AccessRecord>>>);

impl Records {
    pub fn observer(&self) -> impl Observer {
        let sink = Arc::clone(&self.0);
        move |record: &AccessRecord| sink.lock().unwrap().push(record.clone())
    }

    pub fn all(&self) -> Vec<AccessRecord> {
        self.0.lock().unwrap().clone()
    }
}
