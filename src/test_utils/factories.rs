//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
    application::{
        ports::proof_storage::ProofUpload,
        use_cases::{
            payment::PaymentProfile, plan_catalog::PlanProfile,
            subscription::{MemberProfile, SubscriptionProfile},
        },
    },
    domain::entities::{
        membership_period::period_end,
        payment_method::PaymentMethod,
        payment_status::PaymentStatus,
        role::{Actor, Role},
        subscription_status::SubscriptionStatus,
    },
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fixed datetime for reproducible fixtures.
pub fn test_datetime() -> NaiveDateTime {
    date(2024, 1, 15).and_hms_opt(9, 0, 0).unwrap()
}

pub fn admin_actor() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin)
}

pub fn staff_actor() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Staff)
}

pub fn member_actor() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Member)
}

/// Create an active one-month plan.
pub fn create_test_plan(overrides: impl FnOnce(&mut PlanProfile)) -> PlanProfile {
    let mut plan = PlanProfile {
        id: Uuid::new_v4(),
        name: "Monthly".to_string(),
        price_cents: 150_000,
        duration_months: 1,
        features: vec!["Gym access".to_string(), "Locker".to_string()],
        created_by: Some(Uuid::new_v4()),
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
        deleted_at: None,
    };
    overrides(&mut plan);
    plan
}

/// Create a pending subscription priced from `plan`, starting 2024-01-15.
pub fn create_test_subscription(
    user_id: Uuid,
    plan: &PlanProfile,
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let start_date = date(2024, 1, 15);
    let mut subscription = SubscriptionProfile {
        id: Uuid::new_v4(),
        user_id,
        plan_id: plan.id,
        start_date,
        end_date: period_end(start_date, plan.duration_months).unwrap(),
        status: SubscriptionStatus::Pending,
        amount_cents: plan.price_cents,
        duration_months: plan.duration_months,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut subscription);
    subscription
}

/// Create a pending gcash payment for `subscription`.
pub fn create_test_payment(
    subscription: &SubscriptionProfile,
    overrides: impl FnOnce(&mut PaymentProfile),
) -> PaymentProfile {
    let mut payment = PaymentProfile {
        id: Uuid::new_v4(),
        subscription_id: subscription.id,
        user_id: subscription.user_id,
        amount_cents: subscription.amount_cents,
        payment_method: PaymentMethod::Gcash,
        reference_number: "GC-0001".to_string(),
        payment_proof: Some("payment_fixture.png".to_string()),
        proof_sha256: Some("0".repeat(64)),
        status: PaymentStatus::Pending,
        verified_by: None,
        verified_at: None,
        rejection_reason: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut payment);
    payment
}

/// Create a verified, not deleted member.
pub fn create_test_member(overrides: impl FnOnce(&mut MemberProfile)) -> MemberProfile {
    let mut member = MemberProfile {
        id: Uuid::new_v4(),
        role: Role::Member,
        is_verified: true,
        is_deleted: false,
    };
    overrides(&mut member);
    member
}

/// A small PNG upload.
pub fn test_proof() -> ProofUpload {
    ProofUpload {
        file_name: "receipt.png".to_string(),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0],
    }
}
