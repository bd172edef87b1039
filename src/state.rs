use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::gate::RequestGate;
use crate::quota::{QuotaLedger, QuotaLimits};
use crate::session::SessionStore;
use crate::upstream::PhraseGenerator;

// app's shared state
pub struct AppState {
    pub gate: RequestGate,
    pub ledger: Arc<QuotaLedger>,
    pub sessions: Arc<SessionStore>,
    password_digest: [u8; 32], // never keep the plaintext around
}

impl AppState {
    pub fn new(
        access_password: &str,
        limits: QuotaLimits,
        max_sessions: usize,
        generator: Arc<dyn PhraseGenerator>,
    ) -> Self {
        let ledger = Arc::new(QuotaLedger::new(limits));
        let sessions = Arc::new(SessionStore::new(max_sessions));
        Self {
            gate: RequestGate::new(ledger.clone(), sessions.clone(), generator),
            ledger,
            sessions,
            password_digest: digest(access_password),
        }
    }

    // compares fixed-size digests, not the plaintext
    pub fn verify_password(&self, candidate: &str) -> bool {
        digest(candidate) == self.password_digest
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
