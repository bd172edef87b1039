// Per-request authorization and metering.
//
// Every generation request goes through `RequestGate::generate`:
// identity is resolved from the optional session token (falling back to the
// caller's IP), the matching ledger is checked, the upstream generator is
// called, and only a successful call is charged.

use chrono::{Local, NaiveDate};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::AppError;
use crate::metrics::{GENERATIONS_TOTAL, QUOTA_REJECTIONS, UPSTREAM_FAILURES, UPSTREAM_LATENCY};
use crate::phrases::{extract_phrases, requested_count};
use crate::quota::{QuotaKey, QuotaLedger, QuotaRecord};
use crate::session::{SessionStore, fingerprint};
use crate::upstream::{PhraseGenerator, UpstreamError};

// Who a request is charged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    Anonymous(IpAddr),
    Authenticated(String),
}

// Successful generation plus the usage after charging for it
#[derive(Debug)]
pub struct Generation {
    pub phrases: Vec<String>,
    pub usage: QuotaRecord,
}

pub struct RequestGate {
    ledger: Arc<QuotaLedger>,
    sessions: Arc<SessionStore>,
    generator: Arc<dyn PhraseGenerator>,
}

impl RequestGate {
    pub fn new(
        ledger: Arc<QuotaLedger>,
        sessions: Arc<SessionStore>,
        generator: Arc<dyn PhraseGenerator>,
    ) -> Self {
        Self {
            ledger,
            sessions,
            generator,
        }
    }

    // A token that is missing, blank or unknown resolves to the anonymous
    // identity. A stale token is not an error; the caller simply lands on
    // the free tier.
    pub fn resolve_identity(&self, ip: IpAddr, token: Option<&str>) -> ClientIdentity {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) if self.sessions.is_valid(token) => {
                ClientIdentity::Authenticated(token.to_string())
            }
            _ => ClientIdentity::Anonymous(ip),
        }
    }

    fn quota_key(identity: &ClientIdentity, today: NaiveDate) -> QuotaKey {
        match identity {
            ClientIdentity::Anonymous(ip) => QuotaKey::Free(*ip),
            ClientIdentity::Authenticated(token) => QuotaKey::Premium {
                token: token.clone(),
                day: today,
            },
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    // Current usage of whoever is calling; never fails
    pub fn usage(&self, ip: IpAddr, token: Option<&str>) -> QuotaRecord {
        let identity = self.resolve_identity(ip, token);
        self.ledger.check(&Self::quota_key(&identity, Self::today()))
    }

    pub async fn generate(
        &self,
        ip: IpAddr,
        token: Option<&str>,
        prompt: &str,
    ) -> Result<Generation, AppError> {
        if prompt.trim().is_empty() {
            return Err(AppError::MissingPrompt);
        }

        let identity = self.resolve_identity(ip, token);
        // fix the key before the call so the charge lands on the day that was checked
        let key = Self::quota_key(&identity, Self::today());
        let class = key.class();

        let usage = self.ledger.check(&key);
        if usage.exceeded() {
            QUOTA_REJECTIONS.with_label_values(&[class.as_str()]).inc();
            info!(%ip, class = class.as_str(), used = usage.used, "usage limit reached");
            return Err(AppError::QuotaExceeded(usage));
        }

        let session = match &identity {
            ClientIdentity::Authenticated(token) => fingerprint(token),
            ClientIdentity::Anonymous(_) => "-".to_string(),
        };
        info!(
            %ip,
            %session,
            class = class.as_str(),
            attempt = usage.used + 1,
            limit = usage.limit,
            "calling upstream generator"
        );

        let start_time = Instant::now();
        let result = self.generator.complete(prompt).await;
        UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        let phrases = match result.and_then(|blocks| Self::collect_phrases(prompt, &blocks)) {
            Ok(phrases) => phrases,
            Err(e) => {
                // failed calls are never charged
                UPSTREAM_FAILURES.inc();
                warn!(%ip, class = class.as_str(), error = %e, "generation failed, usage not charged");
                return Err(AppError::Upstream(e));
            }
        };

        self.ledger.increment(&key);
        GENERATIONS_TOTAL.inc();

        let usage = self.ledger.check(&key);
        info!(
            %ip,
            class = class.as_str(),
            count = phrases.len(),
            remaining = usage.remaining(),
            "phrases generated"
        );

        Ok(Generation { phrases, usage })
    }

    fn collect_phrases(prompt: &str, blocks: &[String]) -> Result<Vec<String>, UpstreamError> {
        let phrases = extract_phrases(&blocks.join("\n\n"), requested_count(prompt));
        if phrases.is_empty() {
            return Err(UpstreamError::NoPhrases);
        }
        Ok(phrases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::{QuotaClass, QuotaLimits};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ScriptedGenerator {
        reply: String,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PhraseGenerator for ScriptedGenerator {
        async fn complete(&self, _prompt: &str) -> Result<Vec<String>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(UpstreamError::Status {
                    status: 529,
                    message: "overloaded".to_string(),
                });
            }
            Ok(vec![self.reply.clone()])
        }
    }

    fn gate_with(generator: Arc<ScriptedGenerator>) -> (RequestGate, Arc<SessionStore>, Arc<QuotaLedger>) {
        let ledger = Arc::new(QuotaLedger::new(QuotaLimits::default()));
        let sessions = Arc::new(SessionStore::default());
        let gate = RequestGate::new(ledger.clone(), sessions.clone(), generator);
        (gate, sessions, ledger)
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const REPLY: &str = "**Phrase 1:** Alpha\n\n**Phrase 2:** Beta\n\n**Phrase 3:** Gamma";

    #[tokio::test]
    async fn test_anonymous_free_tier_scenario() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, _, _) = gate_with(generator.clone());
        let client = ip("10.0.0.5");

        for expected_remaining in [2, 1, 0] {
            let generation = gate.generate(client, None, "make phrases").await.unwrap();
            assert_eq!(generation.usage.class, QuotaClass::Free);
            assert_eq!(generation.usage.remaining(), expected_remaining);
            assert_eq!(generation.phrases, vec!["Alpha", "Beta", "Gamma"]);
        }

        let err = gate.generate(client, None, "make phrases").await.unwrap_err();
        match err {
            AppError::QuotaExceeded(usage) => {
                assert_eq!(usage.class, QuotaClass::Free);
                assert_eq!(usage.used, 3);
                assert_eq!(usage.remaining(), 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the rejected request never reached upstream and did not change usage
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(gate.usage(client, None).used, 3);
    }

    #[tokio::test]
    async fn test_premium_daily_limit_scenario() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, sessions, _) = gate_with(generator.clone());
        let client = ip("10.0.0.7");
        let token = sessions.issue();

        for n in 1..=100u32 {
            let generation = gate
                .generate(client, Some(&token), "make phrases")
                .await
                .unwrap();
            assert_eq!(generation.usage.class, QuotaClass::Premium);
            assert_eq!(generation.usage.used, n);
        }

        let err = gate
            .generate(client, Some(&token), "make phrases")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PREMIUM_USAGE_EXCEEDED");
        match err {
            AppError::QuotaExceeded(usage) => assert_eq!(usage.remaining(), 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_generation_is_not_charged() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, sessions, _) = gate_with(generator.clone());
        let client = ip("10.0.0.8");
        let token = sessions.issue();

        generator.fail.store(true, Ordering::SeqCst);
        for _ in 0..5 {
            let err = gate.generate(client, None, "prompt").await.unwrap_err();
            assert!(matches!(err, AppError::Upstream(_)));
            let err = gate.generate(client, Some(&token), "prompt").await.unwrap_err();
            assert!(matches!(err, AppError::Upstream(_)));
        }

        assert_eq!(gate.usage(client, None).used, 0);
        assert_eq!(gate.usage(client, Some(&token)).used, 0);
    }

    #[tokio::test]
    async fn test_empty_completion_is_not_charged() {
        let generator = ScriptedGenerator::new("\n\n  \n\n");
        let (gate, _, _) = gate_with(generator);
        let client = ip("10.0.0.9");

        let err = gate.generate(client, None, "prompt").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(UpstreamError::NoPhrases)));
        assert_eq!(gate.usage(client, None).used, 0);
    }

    #[tokio::test]
    async fn test_unknown_token_falls_back_to_free() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, _, _) = gate_with(generator);
        let client = ip("10.0.0.5");

        assert_eq!(
            gate.resolve_identity(client, Some("stale-token")),
            ClientIdentity::Anonymous(client)
        );
        assert_eq!(gate.resolve_identity(client, Some("  ")), ClientIdentity::Anonymous(client));

        let generation = gate
            .generate(client, Some("stale-token"), "prompt")
            .await
            .unwrap();
        assert_eq!(generation.usage.class, QuotaClass::Free);
        // charged exactly as if no token had been sent
        assert_eq!(gate.usage(client, None).used, 1);
    }

    #[tokio::test]
    async fn test_premium_and_free_usage_are_independent() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, sessions, _) = gate_with(generator);
        let client = ip("10.0.0.5");
        let token = sessions.issue();

        gate.generate(client, Some(&token), "prompt").await.unwrap();
        gate.generate(client, Some(&token), "prompt").await.unwrap();
        assert_eq!(gate.usage(client, None).used, 0);

        gate.generate(client, None, "prompt").await.unwrap();
        assert_eq!(gate.usage(client, Some(&token)).used, 2);
        assert_eq!(gate.usage(client, None).used, 1);
    }

    #[tokio::test]
    async fn test_rollover_resets_premium_only() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, sessions, ledger) = gate_with(generator);
        let client = ip("10.0.0.5");
        let token = sessions.issue();

        gate.generate(client, Some(&token), "prompt").await.unwrap();
        gate.generate(client, None, "prompt").await.unwrap();

        crate::reset::rollover(&ledger);

        assert_eq!(gate.usage(client, Some(&token)).used, 0);
        assert_eq!(gate.usage(client, None).used, 1);
    }

    #[tokio::test]
    async fn test_missing_prompt_has_no_effect() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, _, _) = gate_with(generator.clone());
        let client = ip("10.0.0.5");

        let err = gate.generate(client, None, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::MissingPrompt));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(gate.usage(client, None).used, 0);
    }

    #[tokio::test]
    async fn test_requested_count_truncates_phrases() {
        let generator = ScriptedGenerator::new(REPLY);
        let (gate, _, _) = gate_with(generator);

        let generation = gate
            .generate(ip("10.0.0.5"), None, "Number of phrases to generate: 2")
            .await
            .unwrap();
        assert_eq!(generation.phrases, vec!["Alpha", "Beta"]);
    }
}
