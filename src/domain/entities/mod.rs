pub mod membership_period;
pub mod payment_method;
pub mod payment_status;
pub mod role;
pub mod subscription_status;
