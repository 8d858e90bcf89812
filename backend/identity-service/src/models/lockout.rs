use uuid::Uuid;

/// One failed password check for a (user, address) pair
#[derive(Debug, Clone)]
pub struct FailedLogin {
    pub user_id: Uuid,
    pub address: String,
    pub attempted_at: i64,
}

/// Temporary refusal to authenticate a (user, address) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lockout {
    pub user_id: Uuid,
    pub address: String,
    /// Refused through this second inclusive
    pub locked_until: i64,
    pub reason: String,
    pub created_at: i64,
}
