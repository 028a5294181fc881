//! Shared helpers for unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use crate::auth::MemoryTokenStore;
use crate::client::{ReqwestTransport, ResourceClient};
use crate::config::{ClientConfig, DEFAULT_TIMEOUT};
use crate::session::{Navigator, SessionGuard};

#[derive(Debug, Default)]
pub(crate) struct RecordingNavigator(Mutex<Vec<String>>);

impl RecordingNavigator {
    pub(crate) fn visits(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, path: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

pub(crate) fn client_for(
    base_url: &str,
    token: Option<&str>,
) -> (
    ResourceClient,
    Arc<MemoryTokenStore>,
    Arc<RecordingNavigator>,
) {
    let store = Arc::new(token.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_token));
    let navigator = Arc::new(RecordingNavigator::default());
    let config = ClientConfig::builder(base_url)
        .build()
        .expect("test base url");
    let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).expect("transport");
    let session = Arc::new(SessionGuard::new(
        store.clone(),
        navigator.clone(),
        config.login_path.clone(),
    ));
    (
        ResourceClient::new(Arc::new(transport), config, session),
        store,
        navigator,
    )
}
