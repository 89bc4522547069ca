//! Test doubles for the external model.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{Engine, EngineError, EngineResult, FanOut, TextGenerator, TransportError};

type Responder = Box<dyn Fn(&str) -> EngineResult<String> + Send + Sync>;

/// Generator that answers from a script instead of the network.
pub struct ScriptedGenerator {
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Replies handed out in call order.
    pub fn new(replies: Vec<&str>) -> Self {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(replies.into_iter().map(String::from).collect());

        Self::with(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| unscripted("script exhausted"))
        })
    }

    /// Replies keyed by the exact prompt. Unknown prompts fail as transport
    /// errors.
    pub fn by_prompt(replies: HashMap<String, String>) -> Self {
        Self::with(move |prompt| {
            replies
                .get(prompt)
                .cloned()
                .ok_or_else(|| unscripted("unscripted prompt"))
        })
    }

    pub fn with(responder: impl Fn(&str) -> EngineResult<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn unscripted(reason: &str) -> EngineError {
    TransportError::Status {
        status: 404,
        body: reason.to_string(),
    }
    .into()
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(prompt)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn engine_with(gen: &Arc<ScriptedGenerator>, fan_out: FanOut) -> Engine {
    Engine::new(gen.clone(), fan_out)
}
