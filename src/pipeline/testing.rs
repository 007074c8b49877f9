//! Scripted capability doubles shared by the pipeline unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::clients::{Clip, GenerateRequest, MusicGenerator, TextGenerator, TextRequest};

pub(crate) fn sample_lyrics() -> &'static str {
    "[intro 阮阮]\n\
     [Verse1] 夕陽照著老庭院\n\
     [Chorus] 牽你的手行過五十冬\n\
     [Verse2] 老照片內的笑容\n\
     [Chorus] 牽你的手行過五十冬\n\
     [Bridge] 歲月輕輕流\n\
     [Chorus] 牽你的手行過五十冬\n\
     [Outro] 阮會永遠陪你\n\
     [End]"
}

/// Answers text requests from a queue, recording every request.
pub(crate) struct ScriptedTextGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<TextRequest>>,
}

impl ScriptedTextGenerator {
    pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextGenerator {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted text response left")))
    }
}

/// Music capability with a scripted generate result and clip lookups.
///
/// Lookups are served from a queue; once it is drained, `fallback` is
/// returned for every further lookup.
pub(crate) struct ScriptedMusicGenerator {
    generated: Mutex<Option<Result<Vec<Clip>>>>,
    lookups: Mutex<VecDeque<Result<Clip>>>,
    fallback: Option<Clip>,
    requests: Mutex<Vec<GenerateRequest>>,
    lookup_calls: AtomicUsize,
}

impl ScriptedMusicGenerator {
    pub(crate) fn new(generated: Result<Vec<Clip>>) -> Self {
        Self {
            generated: Mutex::new(Some(generated)),
            lookups: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_lookups(self, lookups: Vec<Result<Clip>>) -> Self {
        *self.lookups.lock().expect("lookups lock") = lookups.into();
        self
    }

    pub(crate) fn with_fallback(mut self, clip: Clip) -> Self {
        self.fallback = Some(clip);
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn generate_calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub(crate) fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicGenerator for ScriptedMusicGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<Clip>> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.generated
            .lock()
            .expect("generated lock")
            .take()
            .unwrap_or_else(|| Err(anyhow!("generate called more than once")))
    }

    async fn get_clip(&self, clip_id: &str) -> Result<Clip> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.lookups.lock().expect("lookups lock").pop_front() {
            return next;
        }
        self.fallback
            .clone()
            .ok_or_else(|| anyhow!("no scripted lookup left for {clip_id}"))
    }
}
