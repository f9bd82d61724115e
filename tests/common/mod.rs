#![allow(dead_code)]

use arena_wallet::application::context::{AppContext, Stores};
use arena_wallet::application::notify::{Channel, Credential, DeliveryError, Dispatcher, NotificationProvider};
use arena_wallet::config::AppConfig;
use arena_wallet::domain::clock::{Clock, ManualClock};
use arena_wallet::domain::identity::{IdentityKey, IdentityKind};
use arena_wallet::domain::otp::OtpCode;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const PHONE: &str = "9876543210";
pub const ADMIN_TOKEN: &str = "test-admin-token";

pub fn key(raw: &str) -> IdentityKey {
    IdentityKey::parse(raw).unwrap()
}

/// Provider that answers from a script and remembers every code it was handed.
pub struct RecordingProvider {
    name: String,
    kind: IdentityKind,
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    codes: Mutex<Vec<String>>,
}

impl RecordingProvider {
    pub fn new(name: &str, kind: IdentityKind, script: Vec<Result<(), DeliveryError>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            kind,
            script: Mutex::new(script.into()),
            codes: Mutex::new(Vec::new()),
        })
    }

    pub fn last_code(&self) -> String {
        self.codes.lock().unwrap().last().cloned().expect("no code delivered")
    }

    pub fn calls(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationProvider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: IdentityKind) -> bool {
        self.kind == kind
    }

    async fn deliver(
        &self,
        _credential: &Credential,
        _recipient: &IdentityKey,
        code: &OtpCode,
    ) -> Result<(), DeliveryError> {
        self.codes.lock().unwrap().push(code.as_str().to_string());
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub struct Harness {
    pub context: Arc<AppContext>,
    pub clock: ManualClock,
}

/// An in-memory context delivering through `providers`, each with its own credential.
/// Admin routes accept [`ADMIN_TOKEN`].
pub fn harness(providers: Vec<Arc<RecordingProvider>>) -> Harness {
    let mut config = AppConfig::default();
    config.admin.token = Credential::new(ADMIN_TOKEN);
    harness_with(config, providers)
}

pub fn harness_with(config: AppConfig, providers: Vec<Arc<RecordingProvider>>) -> Harness {
    let clock = ManualClock::default();
    let channels = providers
        .into_iter()
        .enumerate()
        .map(|(i, p)| Channel::new(p, Credential::new(format!("key-{}", i))))
        .collect();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let context = AppContext::with_dispatcher(config, Stores::in_memory(), Dispatcher::new(channels), shared);
    Harness {
        context: Arc::new(context),
        clock,
    }
}
