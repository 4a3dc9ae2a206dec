use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        payment::PaymentUseCases, plan_catalog::PlanCatalogUseCases,
        subscription::SubscriptionUseCases, verification::VerificationUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub plan_use_cases: Arc<PlanCatalogUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub verification_use_cases: Arc<VerificationUseCases>,
}
