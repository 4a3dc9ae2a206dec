use crate::{
    adapters::{http::app_state::AppState, proof_storage::LocalProofStorage},
    application::ports::{audit_log::AuditLog, clock::SystemClock, proof_storage::ProofStorage},
    infra::{config::AppConfig, postgres_persistence},
    use_cases::{
        payment::{PaymentRepo, PaymentUseCases, ReceivingAccountRepo},
        plan_catalog::{PlanCatalogUseCases, PlanRepo},
        subscription::{MemberRepo, SubscriptionRepo, SubscriptionUseCases},
        verification::{SettlementRepo, VerificationUseCases},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.log_file)?;

    let postgres_arc =
        Arc::new(postgres_persistence(&config.database_url, config.db_max_connections).await?);

    let plan_repo = postgres_arc.clone() as Arc<dyn PlanRepo>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let payment_repo = postgres_arc.clone() as Arc<dyn PaymentRepo>;
    let settlement_repo = postgres_arc.clone() as Arc<dyn SettlementRepo>;
    let member_repo = postgres_arc.clone() as Arc<dyn MemberRepo>;
    let accounts = postgres_arc.clone() as Arc<dyn ReceivingAccountRepo>;
    let audit = postgres_arc as Arc<dyn AuditLog>;

    let proof_storage: Arc<dyn ProofStorage> = Arc::new(LocalProofStorage::new(
        config.upload_dir.clone(),
        config.max_proof_bytes,
    ));
    let clock = Arc::new(SystemClock);

    let plan_use_cases = PlanCatalogUseCases::new(plan_repo.clone(), audit.clone(), clock.clone());
    let subscription_use_cases = SubscriptionUseCases::new(
        subscription_repo.clone(),
        plan_repo,
        member_repo,
        accounts.clone(),
        proof_storage.clone(),
        audit.clone(),
        clock.clone(),
    );
    let payment_use_cases = PaymentUseCases::new(
        payment_repo,
        subscription_repo,
        accounts,
        proof_storage,
        audit.clone(),
        clock.clone(),
    );
    let verification_use_cases = VerificationUseCases::new(settlement_repo, audit, clock);

    Ok(AppState {
        config: Arc::new(config),
        plan_use_cases: Arc::new(plan_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        payment_use_cases: Arc::new(payment_use_cases),
        verification_use_cases: Arc::new(verification_use_cases),
    })
}

pub fn init_tracing(log_file: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gymdesk=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create(log_file)
        .map_err(|e| anyhow::anyhow!("Cannot create log file {log_file}: {e}"))?;
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
    Ok(())
}
