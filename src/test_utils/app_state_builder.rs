//! Test app state builder for HTTP-level integration testing.
//!
//! `TestAppStateBuilder` wires the real use cases to the in-memory ledger and
//! port doubles, with the clock fixed at 2024-01-15.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::jwt,
    domain::entities::role::Actor,
    infra::config::{AppConfig, DEFAULT_MAX_PROOF_BYTES},
    test_utils::{FixedClock, InMemoryLedger, InMemoryProofStorage, RecordingAuditLog},
    use_cases::{
        payment::{PaymentProfile, PaymentUseCases},
        plan_catalog::{PlanCatalogUseCases, PlanProfile},
        subscription::{MemberProfile, SubscriptionProfile, SubscriptionUseCases},
        verification::VerificationUseCases,
    },
};

const TEST_JWT_SECRET: &str = "test_jwt_secret";

/// The doubles behind a built `AppState`, for assertions.
pub struct TestDoubles {
    pub ledger: Arc<InMemoryLedger>,
    pub proofs: Arc<InMemoryProofStorage>,
    pub audit: Arc<RecordingAuditLog>,
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let plan = create_test_plan(|p| p.duration_months = 3);
/// let builder = TestAppStateBuilder::new().with_plan(plan);
/// let token = builder.token_for(&staff_actor());
/// let (app_state, ledger) = builder.build_with_ledger();
/// ```
pub struct TestAppStateBuilder {
    ledger: InMemoryLedger,
    clock: FixedClock,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            ledger: InMemoryLedger::new(),
            clock: FixedClock::at(2024, 1, 15),
        }
    }

    pub fn with_plan(self, plan: PlanProfile) -> Self {
        self.ledger.insert_plan(plan);
        self
    }

    pub fn with_subscription(self, subscription: SubscriptionProfile) -> Self {
        self.ledger.insert_subscription(subscription);
        self
    }

    pub fn with_payment(self, payment: PaymentProfile) -> Self {
        self.ledger.insert_payment(payment);
        self
    }

    pub fn with_member(self, member: MemberProfile) -> Self {
        self.ledger.insert_member(member);
        self
    }

    pub fn with_clock(mut self, clock: FixedClock) -> Self {
        self.clock = clock;
        self
    }

    /// An access token the built state will accept for `actor`.
    pub fn token_for(&self, actor: &Actor) -> String {
        jwt::issue(
            actor.id,
            actor.role,
            &SecretString::new(TEST_JWT_SECRET.into()),
            time::Duration::hours(1),
        )
        .unwrap()
    }

    pub fn build(self) -> AppState {
        self.build_with_doubles().0
    }

    pub fn build_with_ledger(self) -> (AppState, Arc<InMemoryLedger>) {
        let (app_state, doubles) = self.build_with_doubles();
        (app_state, doubles.ledger)
    }

    pub fn build_with_doubles(self) -> (AppState, TestDoubles) {
        let ledger = Arc::new(self.ledger);
        let proofs = Arc::new(InMemoryProofStorage::new());
        let audit = Arc::new(RecordingAuditLog::new());
        let clock = Arc::new(self.clock);

        let plan_use_cases = PlanCatalogUseCases::new(ledger.clone(), audit.clone(), clock.clone());
        let subscription_use_cases = SubscriptionUseCases::new(
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            proofs.clone(),
            audit.clone(),
            clock.clone(),
        );
        let payment_use_cases = PaymentUseCases::new(
            ledger.clone(),
            ledger.clone(),
            ledger.clone(),
            proofs.clone(),
            audit.clone(),
            clock.clone(),
        );
        let verification_use_cases =
            VerificationUseCases::new(ledger.clone(), audit.clone(), clock);

        // Create minimal config for testing
        let config = Arc::new(AppConfig {
            jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            database_url: String::new(),
            db_max_connections: 1,
            upload_dir: PathBuf::from("uploads/test"),
            max_proof_bytes: DEFAULT_MAX_PROOF_BYTES,
            expiry_sweep_secs: 3600,
            log_file: "test.log".to_string(),
        });

        let app_state = AppState {
            config,
            plan_use_cases: Arc::new(plan_use_cases),
            subscription_use_cases: Arc::new(subscription_use_cases),
            payment_use_cases: Arc::new(payment_use_cases),
            verification_use_cases: Arc::new(verification_use_cases),
        };
        (
            app_state,
            TestDoubles {
                ledger,
                proofs,
                audit,
            },
        )
    }
}
