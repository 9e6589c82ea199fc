//! Shared test doubles: a controllable push source and a recording
//! subscriber.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sluice::{
    EndHandler, FailureHandler, ItemHandler, ReadStream, Relay, RelayConfig, Subscriber,
    Subscription,
};

// ============================================================================
// Mock source
// ============================================================================

type ResumeHook = Box<dyn FnOnce(&MockReadStream) + Send>;

#[derive(Default)]
struct MockState {
    item: Option<ItemHandler<u32>>,
    end: Option<EndHandler>,
    failure: Option<FailureHandler<String>>,
    paused: bool,
    pauses: usize,
    resumes: usize,
    on_resume: Vec<ResumeHook>,
}

/// A push source driven by the test. Handlers are invoked without holding
/// the mock's own lock, so the relay may call back into it freely.
#[derive(Default)]
pub struct MockReadStream {
    state: Mutex<MockState>,
}

impl MockReadStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Emit one item. Returns `false` if the source is paused afterwards.
    pub fn emit(&self, item: u32) -> bool {
        let handler = self.state.lock().unwrap().item.clone();
        if let Some(handler) = handler {
            handler(item);
        }
        !self.is_paused()
    }

    pub fn emit_all(&self, items: impl IntoIterator<Item = u32>) {
        for item in items {
            self.emit(item);
        }
    }

    /// Emit 0, 1, 2, ... until the source gets paused. Returns how many
    /// items were emitted.
    pub fn emit_until_paused(&self, limit: u32) -> u32 {
        let mut count = 0;
        while count < limit {
            let running = self.emit(count);
            count += 1;
            if !running {
                break;
            }
        }
        count
    }

    pub fn end(&self) {
        let handler = self.state.lock().unwrap().end.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    pub fn fail(&self, cause: &str) {
        let handler = self.state.lock().unwrap().failure.clone();
        if let Some(handler) = handler {
            handler(cause.to_string());
        }
    }

    /// Run `hook` inside the next `resume()` call.
    pub fn on_resume(&self, hook: impl FnOnce(&MockReadStream) + Send + 'static) {
        self.state.lock().unwrap().on_resume.push(Box::new(hook));
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn pauses(&self) -> usize {
        self.state.lock().unwrap().pauses
    }

    pub fn resumes(&self) -> usize {
        self.state.lock().unwrap().resumes
    }

    pub fn has_item_handler(&self) -> bool {
        self.state.lock().unwrap().item.is_some()
    }

    pub fn has_end_handler(&self) -> bool {
        self.state.lock().unwrap().end.is_some()
    }
}

impl ReadStream<u32, String> for MockReadStream {
    fn item_handler(&self, handler: Option<ItemHandler<u32>>) {
        self.state.lock().unwrap().item = handler;
    }

    fn end_handler(&self, handler: Option<EndHandler>) {
        self.state.lock().unwrap().end = handler;
    }

    fn failure_handler(&self, handler: Option<FailureHandler<String>>) {
        self.state.lock().unwrap().failure = handler;
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(!state.paused, "pause() called on a paused source");
        state.paused = true;
        state.pauses += 1;
    }

    fn resume(&self) {
        let hooks = {
            let mut state = self.state.lock().unwrap();
            assert!(state.paused, "resume() called on a running source");
            state.paused = false;
            state.resumes += 1;
            std::mem::take(&mut state.on_resume)
        };
        for hook in hooks {
            hook(self);
        }
    }
}

pub fn relay(source: &Arc<MockReadStream>, high_water_mark: usize) -> Relay<u32, String> {
    Relay::new(
        source.clone(),
        RelayConfig::new()
            .name("test")
            .high_water_mark(high_water_mark),
    )
}

// ============================================================================
// Recording subscriber
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Next(u32),
    Complete,
    Error(String),
}

/// What the subscriber does after recording an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnNext {
    Nothing,
    RequestOne,
    Cancel,
}

/// Shared view of what a [`RecordingSubscriber`] saw.
#[derive(Clone, Default)]
pub struct Probe {
    events: Arc<Mutex<Vec<Event>>>,
    subscribed: Arc<Mutex<usize>>,
}

impl Probe {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn items(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Next(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    pub fn subscribe_calls(&self) -> usize {
        *self.subscribed.lock().unwrap()
    }
}

pub struct RecordingSubscriber {
    probe: Probe,
    prefetch: u64,
    on_next: OnNext,
    subscription: Option<Subscription<u32, String>>,
    in_callback: Arc<AtomicBool>,
    terminated: bool,
}

impl RecordingSubscriber {
    /// A subscriber that requests `prefetch` items on subscribe (none if 0).
    pub fn new(prefetch: u64) -> (Self, Probe) {
        let probe = Probe::default();
        let subscriber = Self {
            probe: probe.clone(),
            prefetch,
            on_next: OnNext::Nothing,
            subscription: None,
            in_callback: Arc::new(AtomicBool::new(false)),
            terminated: false,
        };
        (subscriber, probe)
    }

    pub fn on_next(mut self, behaviour: OnNext) -> Self {
        self.on_next = behaviour;
        self
    }

    fn enter(&mut self) {
        assert!(
            !self.in_callback.swap(true, Ordering::SeqCst),
            "overlapping subscriber callbacks"
        );
        assert!(!self.terminated, "callback after terminal signal");
    }

    fn leave(&self) {
        self.in_callback.store(false, Ordering::SeqCst);
    }
}

impl Subscriber<u32, String> for RecordingSubscriber {
    fn on_subscribe(&mut self, subscription: &Subscription<u32, String>) {
        *self.probe.subscribed.lock().unwrap() += 1;
        self.subscription = Some(subscription.clone());
        if self.prefetch > 0 {
            subscription.request(self.prefetch).unwrap();
        }
    }

    fn on_next(&mut self, item: u32) {
        self.enter();
        self.probe.events.lock().unwrap().push(Event::Next(item));
        if let Some(subscription) = &self.subscription {
            match self.on_next {
                OnNext::Nothing => {}
                OnNext::RequestOne => subscription.request(1).unwrap(),
                OnNext::Cancel => subscription.cancel(),
            }
        }
        self.leave();
    }

    fn on_complete(&mut self) {
        self.enter();
        self.terminated = true;
        self.probe.events.lock().unwrap().push(Event::Complete);
        self.leave();
    }

    fn on_error(&mut self, error: String) {
        self.enter();
        self.terminated = true;
        self.probe.events.lock().unwrap().push(Event::Error(error));
        self.leave();
    }
}
