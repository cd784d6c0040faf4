use serde::{Deserialize, Serialize};

/// Optimistic-lock state of an account.
///
/// The state is the single shared mutable resource contended over by
/// competing authorizations: every consumed permission ticket advances it,
/// and a ticket binds to the exact state it expects the account to reach.
/// Two consumers racing from the same pre-state cannot both land — the
/// version compare *is* the lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountState {
    /// Monotonic version counter. Increments by one per consumed ticket.
    pub version: u64,
    /// Chained digest binding the full action history.
    pub digest: [u8; 32],
}

impl AccountState {
    /// The state every account starts in.
    pub fn genesis() -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"quill-account-genesis-v1");
        Self {
            version: 0,
            digest: *hasher.finalize().as_bytes(),
        }
    }

    /// Deterministic successor state after applying an encoded action.
    ///
    /// Pure: the next state is a function of `(self, action)` and nothing
    /// else, so clients can chain expected states off-line.
    pub fn advance(&self, action: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"quill-account-state-v1:");
        hasher.update(&self.digest);
        hasher.update(action);
        Self {
            version: self.version + 1,
            digest: *hasher.finalize().as_bytes(),
        }
    }

    /// Short hex form of the digest, for logs.
    pub fn short_digest(&self) -> String {
        self.digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}:{}", self.version, self.short_digest())
    }
}
