//! Recording gateway bridge.

use crate::error::{Result, StorefrontError};
use crate::gateway::{FormPost, SubmissionMode};
use crate::providers::GatewayBridge;
use reqwest::Url;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Recorded {
    submissions: Vec<(FormPost, SubmissionMode)>,
    locations: Vec<Url>,
    fail_submit: bool,
}

/// Gateway bridge that records submissions instead of navigating.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingGateway {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every submission fail.
    pub fn fail_submissions(&self) {
        self.lock().fail_submit = true;
    }

    /// Forms submitted so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<(FormPost, SubmissionMode)> {
        self.lock().submissions.clone()
    }

    /// Locations the flow replaced the address with.
    #[must_use]
    pub fn locations(&self) -> Vec<Url> {
        self.lock().locations.clone()
    }
}

impl GatewayBridge for RecordingGateway {
    fn submit(&self, post: FormPost, mode: SubmissionMode) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();

        async move {
            let mut recorded = this.lock();
            if recorded.fail_submit {
                return Err(StorefrontError::Gateway("popup blocked".to_string()));
            }
            recorded.submissions.push((post, mode));
            Ok(())
        }
    }

    fn replace_location(&self, url: &Url) -> Result<()> {
        self.lock().locations.push(url.clone());
        Ok(())
    }
}
