//! Recording doubles for the host collaborators

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::Secret;
use host::{
    Alerts, BoxFuture, ConsentPrompt, FirstPartyLogin, HostError, Identity, IdentityCheck,
    IdentityProbe, Navigator,
};
use url::Url;

pub struct CountingProbe {
    accept: bool,
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityProbe for CountingProbe {
    fn probe<'a>(&'a self, _token: &'a Secret<String>) -> BoxFuture<'a, host::Result<()>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.accept {
                Ok(())
            } else {
                Err(HostError::Rejected("provider returned 401 Unauthorized".into()))
            }
        })
    }
}

/// Identity endpoint with a fixed answer.
pub struct StubIdentity {
    answer: std::result::Result<Option<String>, String>,
    calls: AtomicUsize,
}

impl StubIdentity {
    pub fn present(user: &str) -> Self {
        Self {
            answer: Ok(Some(user.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn absent() -> Self {
        Self {
            answer: Ok(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err("connection refused".into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityCheck for StubIdentity {
    fn check(&self) -> BoxFuture<'_, host::Result<Option<Identity>>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(user) => Ok(user.clone().map(|user_id| Identity { user_id })),
                Err(msg) => Err(HostError::Network(msg.clone())),
            }
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    urls: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn assign(&self, url: &Url) {
        self.urls.lock().unwrap().push(url.clone());
    }
}

/// Answers consent prompts from a script; `false` once the script runs out.
#[derive(Default)]
pub struct ScriptedConsent {
    answers: Mutex<Vec<bool>>,
    asked: AtomicUsize,
}

impl ScriptedConsent {
    pub fn answering(answers: &[bool]) -> Self {
        let mut answers = answers.to_vec();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ConsentPrompt for ScriptedConsent {
    fn confirm<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answers.lock().unwrap().pop().unwrap_or(false)
        })
    }
}

#[derive(Default)]
pub struct RecordingLogin {
    targets: Mutex<Vec<String>>,
}

impl RecordingLogin {
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl FirstPartyLogin for RecordingLogin {
    fn require_login(&self, target: &str) {
        self.targets.lock().unwrap().push(target.to_string());
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Alerts for RecordingAlerts {
    fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
