use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Plan not found")]
    PlanNotFound,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Member already has an active or pending subscription")]
    DuplicateActiveSubscription,

    #[error("Payment already processed")]
    AlreadyProcessed,

    #[error("Active subscriptions cannot be deleted")]
    ActiveSubscriptionProtected,

    #[error("Member has a pending subscription")]
    PendingSubscriptionExists,

    #[error("Member must be verified before renewing membership")]
    MemberNotVerified,

    #[error("{0}")]
    PlanInUse(String),

    #[error("Payment references a missing subscription")]
    SubscriptionInconsistent,

    #[error("Proof storage error: {0}")]
    ProofStorage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure families surfaced to callers alongside the specific code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Authorization,
    Dependency,
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    InvalidInput,
    InvalidCredentials,
    Forbidden,
    PlanNotFound,
    SubscriptionNotFound,
    PaymentNotFound,
    MemberNotFound,
    DuplicateActiveSubscription,
    AlreadyProcessed,
    ActiveSubscriptionProtected,
    PendingSubscriptionExists,
    MemberNotVerified,
    PlanInUse,
    SubscriptionInconsistent,
    ProofStorageError,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::PlanNotFound => "PLAN_NOT_FOUND",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ErrorCode::MemberNotFound => "MEMBER_NOT_FOUND",
            ErrorCode::DuplicateActiveSubscription => "DUPLICATE_ACTIVE_SUBSCRIPTION",
            ErrorCode::AlreadyProcessed => "ALREADY_PROCESSED",
            ErrorCode::ActiveSubscriptionProtected => "ACTIVE_SUBSCRIPTION_PROTECTED",
            ErrorCode::PendingSubscriptionExists => "PENDING_SUBSCRIPTION_EXISTS",
            ErrorCode::MemberNotVerified => "MEMBER_NOT_VERIFIED",
            ErrorCode::PlanInUse => "PLAN_IN_USE",
            ErrorCode::SubscriptionInconsistent => "SUBSCRIPTION_INCONSISTENT",
            ErrorCode::ProofStorageError => "PROOF_STORAGE_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::Forbidden => ErrorCode::Forbidden,
            AppError::PlanNotFound => ErrorCode::PlanNotFound,
            AppError::SubscriptionNotFound => ErrorCode::SubscriptionNotFound,
            AppError::PaymentNotFound => ErrorCode::PaymentNotFound,
            AppError::MemberNotFound => ErrorCode::MemberNotFound,
            AppError::DuplicateActiveSubscription => ErrorCode::DuplicateActiveSubscription,
            AppError::AlreadyProcessed => ErrorCode::AlreadyProcessed,
            AppError::ActiveSubscriptionProtected => ErrorCode::ActiveSubscriptionProtected,
            AppError::PendingSubscriptionExists => ErrorCode::PendingSubscriptionExists,
            AppError::MemberNotVerified => ErrorCode::MemberNotVerified,
            AppError::PlanInUse(_) => ErrorCode::PlanInUse,
            AppError::SubscriptionInconsistent => ErrorCode::SubscriptionInconsistent,
            AppError::ProofStorage(_) => ErrorCode::ProofStorageError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::Validation,
            AppError::InvalidCredentials | AppError::Forbidden => ErrorKind::Authorization,
            AppError::PlanNotFound
            | AppError::SubscriptionNotFound
            | AppError::PaymentNotFound
            | AppError::MemberNotFound => ErrorKind::NotFound,
            AppError::DuplicateActiveSubscription
            | AppError::AlreadyProcessed
            | AppError::ActiveSubscriptionProtected
            | AppError::PendingSubscriptionExists
            | AppError::MemberNotVerified
            | AppError::PlanInUse(_) => ErrorKind::Conflict,
            AppError::SubscriptionInconsistent
            | AppError::ProofStorage(_)
            | AppError::Database(_)
            | AppError::Internal(_) => ErrorKind::Dependency,
        }
    }

    /// Message safe to show to the caller. Dependency failures never leak
    /// their internal detail.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Dependency => {
                "Something went wrong while processing the request. Please try again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
