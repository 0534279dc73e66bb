//! Per-virtual-user scenario.
//!
//! Each virtual user owns a [`VirtualUser`] context. An iteration logs in if
//! no token is held, then round-trips a random payload through encrypt and
//! decrypt and checks that the decrypted text matches. Failures are counted
//! and logged, never propagated.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::client::SecretsService;
use crate::error::Result;
use crate::metrics::RunMetrics;
use crate::payload;
use crate::types::{AuthState, Operation, VuId};

/// AppRole credentials.
#[derive(Clone)]
pub struct Credentials {
    pub role_id: String,
    pub secret_id: String,
}

impl Credentials {
    pub fn new(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            secret_id: secret_id.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("role_id", &self.role_id)
            .field("secret_id", &"<redacted>")
            .finish()
    }
}

/// What happened in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationOutcome {
    /// Login failed; nothing else was attempted.
    LoginFailed,
    /// Encrypt failed; decrypt was skipped.
    EncryptFailed,
    /// Encrypt returned an empty ciphertext; decrypt was skipped.
    EmptyCiphertext,
    /// Decrypt failed.
    DecryptFailed,
    /// Round trip completed but the plaintext did not match.
    CheckFailed,
    /// Round trip completed and the plaintext matched.
    Passed,
}

impl IterationOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl std::fmt::Display for IterationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoginFailed => write!(f, "login failed"),
            Self::EncryptFailed => write!(f, "encrypt failed"),
            Self::EmptyCiphertext => write!(f, "empty ciphertext"),
            Self::DecryptFailed => write!(f, "decrypt failed"),
            Self::CheckFailed => write!(f, "decrypted text does not match"),
            Self::Passed => write!(f, "decrypted text matches"),
        }
    }
}

/// Per-virtual-user context.
pub struct VirtualUser {
    id: VuId,
    token: Option<String>,
    service: Arc<dyn SecretsService>,
    credentials: Arc<Credentials>,
    metrics: Arc<RunMetrics>,
    payload_len: usize,
    iterations: u64,
}

impl VirtualUser {
    /// Create an unauthenticated virtual user.
    pub fn new(
        id: VuId,
        service: Arc<dyn SecretsService>,
        credentials: Arc<Credentials>,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        Self {
            id,
            token: None,
            service,
            credentials,
            metrics,
            payload_len: payload::DEFAULT_PAYLOAD_LEN,
            iterations: 0,
        }
    }

    /// Set the plaintext length used per iteration.
    pub fn with_payload_len(mut self, payload_len: usize) -> Self {
        self.payload_len = payload_len;
        self
    }

    pub fn id(&self) -> VuId {
        self.id
    }

    /// Token held by this virtual user, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn state(&self) -> AuthState {
        if self.token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    /// Number of iterations completed.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run a single iteration.
    pub async fn iterate(&mut self) -> IterationOutcome {
        let outcome = self.step().await;
        self.iterations += 1;
        self.metrics.record_iteration();
        outcome
    }

    async fn step(&mut self) -> IterationOutcome {
        let token = match self.token.clone() {
            Some(token) => token,
            None => {
                let login = self
                    .service
                    .login(&self.credentials.role_id, &self.credentials.secret_id);
                let result = self.timed(Operation::Login, login).await;
                match result {
                    Ok(token) => {
                        debug!(vu = %self.id, "Logged in");
                        self.token = Some(token.clone());
                        token
                    }
                    Err(_) => return IterationOutcome::LoginFailed,
                }
            }
        };

        let plaintext = payload::generate(self.payload_len);
        debug!(vu = %self.id, "Generated plaintext: {}", plaintext);

        let encrypt = self.service.encrypt(&token, plaintext.as_bytes());
        let ciphertext = match self.timed(Operation::Encrypt, encrypt).await {
            Ok(ciphertext) => ciphertext,
            Err(_) => return IterationOutcome::EncryptFailed,
        };

        if ciphertext.is_empty() {
            warn!(vu = %self.id, "Encrypt returned an empty ciphertext, skipping decrypt");
            return IterationOutcome::EmptyCiphertext;
        }

        let decrypt = self.service.decrypt(&token, &ciphertext);
        let decrypted = match self.timed(Operation::Decrypt, decrypt).await {
            Ok(decrypted) => decrypted,
            Err(_) => return IterationOutcome::DecryptFailed,
        };

        let matches = decrypted == plaintext.as_bytes();
        self.metrics.record_check(matches);

        if matches {
            IterationOutcome::Passed
        } else {
            warn!(vu = %self.id, "Check failed: decrypted text does not match");
            IterationOutcome::CheckFailed
        }
    }

    /// Await a service call, recording its latency and counting a failure.
    async fn timed<T, F>(&self, op: Operation, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = call.await;
        self.metrics
            .record_request(op, start.elapsed(), result.is_ok());

        if let Err(ref e) = result {
            self.metrics.record_failure(op);
            warn!(vu = %self.id, operation = %op, "{}", e);
        }

        result
    }

    /// Repeat iterations until `deadline` or a shutdown signal.
    ///
    /// Each iteration is followed by `think_time`. An iteration in progress
    /// when the deadline passes is allowed to finish; a shutdown signal
    /// abandons it.
    pub async fn run_until(
        &mut self,
        deadline: tokio::time::Instant,
        think_time: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> u64 {
        let started = self.iterations;

        while tokio::time::Instant::now() < deadline {
            tokio::select! {
                _ = self.iterate() => {}
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(think_time) => {}
                _ = tokio::time::sleep_until(deadline) => break,
                _ = shutdown.recv() => break,
            }
        }

        self.iterations - started
    }
}

impl std::fmt::Debug for VirtualUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualUser")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Failure};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// In-memory service that wraps plaintext in a fake envelope and records every call.
    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<Operation>>,
        fail_login: bool,
        corrupt_decrypt: bool,
    }

    impl RecordingService {
        fn calls(&self) -> Vec<Operation> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SecretsService for RecordingService {
        async fn login(&self, _role_id: &str, _secret_id: &str) -> Result<String> {
            self.calls.lock().push(Operation::Login);
            if self.fail_login {
                Err(Error::Auth(Failure::Status {
                    code: 403,
                    reason: "Forbidden".into(),
                }))
            } else {
                Ok("tok1".into())
            }
        }

        async fn encrypt(&self, token: &str, plaintext: &[u8]) -> Result<String> {
            self.calls.lock().push(Operation::Encrypt);
            assert_eq!(token, "tok1");
            Ok(format!("vault:v1:{}", crate::codec::encode(plaintext)))
        }

        async fn decrypt(&self, token: &str, ciphertext: &str) -> Result<Vec<u8>> {
            self.calls.lock().push(Operation::Decrypt);
            assert_eq!(token, "tok1");
            let mut plain = crate::codec::decode(ciphertext.trim_start_matches("vault:v1:"))?;
            if self.corrupt_decrypt {
                plain.reverse();
            }
            Ok(plain)
        }
    }

    fn user(service: Arc<RecordingService>) -> (VirtualUser, Arc<RunMetrics>) {
        let metrics = Arc::new(RunMetrics::new().unwrap());
        let vu = VirtualUser::new(
            VuId(1),
            service,
            Arc::new(Credentials::new("role", "secret")),
            Arc::clone(&metrics),
        );
        (vu, metrics)
    }

    #[tokio::test]
    async fn test_login_once_then_reuse_token() {
        let service = Arc::new(RecordingService::default());
        let (mut vu, metrics) = user(Arc::clone(&service));

        assert_eq!(vu.state(), AuthState::Unauthenticated);
        assert_eq!(vu.iterate().await, IterationOutcome::Passed);
        assert_eq!(vu.state(), AuthState::Authenticated);
        assert_eq!(vu.token(), Some("tok1"));

        assert_eq!(vu.iterate().await, IterationOutcome::Passed);

        assert_eq!(
            service.calls(),
            vec![
                Operation::Login,
                Operation::Encrypt,
                Operation::Decrypt,
                Operation::Encrypt,
                Operation::Decrypt,
            ]
        );

        let snap = metrics.snapshot();
        assert_eq!(snap.iterations, 2);
        assert_eq!(snap.checks_passed, 2);
        assert_eq!(snap.total_failures(), 0);
    }

    #[tokio::test]
    async fn test_login_failure_skips_rest() {
        let service = Arc::new(RecordingService {
            fail_login: true,
            ..Default::default()
        });
        let (mut vu, metrics) = user(Arc::clone(&service));

        assert_eq!(vu.iterate().await, IterationOutcome::LoginFailed);
        assert_eq!(vu.iterate().await, IterationOutcome::LoginFailed);
        assert_eq!(vu.state(), AuthState::Unauthenticated);

        // Retried on the next iteration, never followed by encrypt
        assert_eq!(service.calls(), vec![Operation::Login, Operation::Login]);
        assert_eq!(metrics.snapshot().auth_failures, 2);
        assert_eq!(metrics.snapshot().iterations, 2);
    }

    #[tokio::test]
    async fn test_mismatch_is_recorded() {
        let service = Arc::new(RecordingService {
            corrupt_decrypt: true,
            ..Default::default()
        });
        let (vu, metrics) = user(service);
        let mut vu = vu.with_payload_len(16);

        assert_eq!(vu.iterate().await, IterationOutcome::CheckFailed);
        let snap = metrics.snapshot();
        assert_eq!(snap.checks_failed, 1);
        assert_eq!(snap.checks_passed, 0);
        assert_eq!(snap.decrypt_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_deadline() {
        let service = Arc::new(RecordingService::default());
        let (mut vu, metrics) = user(service);
        let (_tx, mut rx) = broadcast::channel(1);

        let deadline = tokio::time::Instant::now() + Duration::from_millis(3500);
        let n = vu
            .run_until(deadline, Duration::from_secs(1), &mut rx)
            .await;

        // Iterations start at t=0, 1, 2, 3
        assert_eq!(n, 4);
        assert_eq!(metrics.snapshot().iterations, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let service = Arc::new(RecordingService::default());
        let (mut vu, _metrics) = user(service);
        let (tx, mut rx) = broadcast::channel(1);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3600);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            tx.send(()).unwrap();
        });

        let n = vu
            .run_until(deadline, Duration::from_secs(1), &mut rx)
            .await;
        stopper.await.unwrap();

        assert_eq!(n, 3);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("role-abc", "very-secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("role-abc"));
        assert!(!debug.contains("very-secret"));
    }
}
