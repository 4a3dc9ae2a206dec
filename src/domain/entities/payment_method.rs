use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Gcash,
    Bank,
    /// Recorded by staff when a pending subscription is settled at the desk.
    Admin,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Gcash => "gcash",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Admin => "admin",
        }
    }

    /// Online payments must carry an uploaded proof.
    pub fn requires_proof(&self) -> bool {
        matches!(self, PaymentMethod::Gcash | PaymentMethod::Bank)
    }

    /// Online methods are only open while the gym has an active receiving
    /// account of that type.
    pub fn needs_receiving_account(&self) -> bool {
        matches!(self, PaymentMethod::Gcash | PaymentMethod::Bank)
    }

    /// GCash transfers are matched by the member-supplied reference number.
    pub fn requires_reference(&self) -> bool {
        matches!(self, PaymentMethod::Gcash)
    }

    /// Methods a member may pick when submitting a payment.
    pub fn is_member_selectable(&self) -> bool {
        !matches!(self, PaymentMethod::Admin)
    }

    /// Prefix used for references the system generates for this method.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Gcash => "GCASH",
            PaymentMethod::Bank => "BANK",
            PaymentMethod::Admin => "ADM",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "gcash" => Ok(PaymentMethod::Gcash),
            "bank" => Ok(PaymentMethod::Bank),
            "admin" => Ok(PaymentMethod::Admin),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}
