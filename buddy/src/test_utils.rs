//! Fakes shared by the unit tests.

use crate::presentation::{PresentationHandle, Presenter};
use crate::relay::{RelayHttp, ACCEPTED_SUFFIX, RESPONSE_SUFFIX};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationEvent {
    Connected { src: Url, wallet_id: Option<String> },
    Shown,
    Hidden,
}

type EventLog = Arc<Mutex<Vec<(usize, PresentationEvent)>>>;

/// Presenter that records every call made on it and its handles. Each event is
/// tagged with the index of the `connect` call it belongs to.
#[derive(Clone, Default)]
pub struct RecordingPresenter {
    events: EventLog,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<PresentationEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Events of the `connection`-th surface, starting at 0.
    pub fn session_events(&self, connection: usize) -> Vec<PresentationEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(index, _)| *index == connection)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn shows(&self) -> usize {
        self.count(&PresentationEvent::Shown)
    }

    pub fn hides(&self) -> usize {
        self.count(&PresentationEvent::Hidden)
    }

    fn count(&self, event: &PresentationEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

struct RecordingHandle {
    connection: usize,
    events: EventLog,
}

impl PresentationHandle for RecordingHandle {
    fn show(&self) {
        self.events
            .lock()
            .unwrap()
            .push((self.connection, PresentationEvent::Shown));
    }

    fn hide(&self) {
        self.events
            .lock()
            .unwrap()
            .push((self.connection, PresentationEvent::Hidden));
    }
}

impl Presenter for RecordingPresenter {
    fn connect(&self, request_src: &Url, wallet_id: Option<&str>) -> Box<dyn PresentationHandle> {
        let mut events = self.events.lock().unwrap();
        let connection = events
            .iter()
            .filter(|(_, event)| matches!(event, PresentationEvent::Connected { .. }))
            .count();
        events.push((
            connection,
            PresentationEvent::Connected {
                src: request_src.clone(),
                wallet_id: wallet_id.map(str::to_string),
            },
        ));
        Box::new(RecordingHandle {
            connection,
            events: self.events.clone(),
        })
    }
}

/// In-memory relay driven by the (usually paused) tokio clock.
///
/// Long-polls are held for up to `hold` and answered as soon as the scripted
/// resource becomes available, like the real relay does.
pub struct FakeRelay {
    start: Instant,
    hold: Duration,
    failing_submits: AtomicUsize,
    accepted_at: Option<Duration>,
    response: Option<(Duration, String)>,
    posts: Mutex<Vec<(Url, String)>>,
    gets: Mutex<Vec<Url>>,
}

impl FakeRelay {
    /// A relay whose clock starts now and on which nothing ever happens.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            hold: Duration::from_secs(5),
            failing_submits: AtomicUsize::new(0),
            accepted_at: None,
            response: None,
            posts: Mutex::new(vec![]),
            gets: Mutex::new(vec![]),
        }
    }

    pub fn failing_submits(self, count: usize) -> Self {
        self.failing_submits.store(count, Ordering::SeqCst);
        self
    }

    pub fn accepted_after(mut self, delay: Duration) -> Self {
        self.accepted_at = Some(delay);
        self
    }

    pub fn responding_after(mut self, delay: Duration, body: impl Into<String>) -> Self {
        self.response = Some((delay, body.into()));
        self
    }

    pub fn posts(&self) -> Vec<(Url, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn polled(&self, suffix: &str) -> usize {
        self.gets
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.path().ends_with(suffix))
            .count()
    }

    fn scripted(&self, url: &Url) -> Option<(Duration, String)> {
        let path = url.path();
        if path.ends_with(ACCEPTED_SUFFIX) {
            self.accepted_at.map(|at| (at, "1".to_string()))
        } else if path.ends_with(RESPONSE_SUFFIX) {
            self.response.clone()
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
impl RelayHttp for FakeRelay {
    async fn post_json(&self, url: Url, body: String) -> anyhow::Result<()> {
        self.posts.lock().unwrap().push((url, body));
        let remaining = self.failing_submits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_submits.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("503 Service Unavailable");
        }
        Ok(())
    }

    async fn get_text(&self, url: Url) -> anyhow::Result<String> {
        self.gets.lock().unwrap().push(url.clone());
        let now = Instant::now();
        match self.scripted(&url) {
            Some((at, body)) if self.start + at <= now + self.hold => {
                tokio::time::sleep_until(self.start + at).await;
                Ok(body)
            }
            _ => {
                tokio::time::sleep(self.hold).await;
                Ok(String::new())
            }
        }
    }
}
