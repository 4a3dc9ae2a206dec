use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if a subscription in this status, ending on `end_date`,
    /// still counts against the one-open-subscription-per-member rule.
    pub fn holds_membership(&self, end_date: NaiveDate, today: NaiveDate) -> bool {
        matches!(self, SubscriptionStatus::Pending | SubscriptionStatus::Active) && end_date >= today
    }

    /// Only pending subscriptions may be activated or cancelled by verification.
    pub fn awaits_verification(&self) -> bool {
        matches!(self, SubscriptionStatus::Pending)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" | "canceled" => Ok(SubscriptionStatus::Cancelled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_holds_membership() {
        let today = date(2024, 3, 10);

        assert!(SubscriptionStatus::Pending.holds_membership(date(2024, 4, 10), today));
        assert!(SubscriptionStatus::Active.holds_membership(today, today));
        // Lapsed active rows no longer block a new subscription
        assert!(!SubscriptionStatus::Active.holds_membership(date(2024, 3, 9), today));
        assert!(!SubscriptionStatus::Cancelled.holds_membership(date(2024, 4, 10), today));
        assert!(!SubscriptionStatus::Expired.holds_membership(date(2024, 4, 10), today));
    }

    #[test]
    fn test_canceled_spelling_is_accepted() {
        assert_eq!(
            "canceled".parse::<SubscriptionStatus>(),
            Ok(SubscriptionStatus::Cancelled)
        );
        assert_eq!(
            serde_json::from_str::<SubscriptionStatus>("\"canceled\"").unwrap(),
            SubscriptionStatus::Cancelled
        );
    }
}
