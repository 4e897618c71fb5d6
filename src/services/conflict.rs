use crate::models::ConflictPolicy;
use crate::services::list_merge::StructuralConflict;
use crate::services::remote_store::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Which side wins a structural conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Upload the local lists, discarding the remote ones
    Local,
    /// Adopt the remote lists, discarding pending local operations
    Remote,
    /// Change nothing; the next sync re-evaluates
    Cancelled,
}

/// Decides structural conflicts and confirms destructive manual actions,
/// usually by asking the user
pub trait ConflictResolver: Send + Sync {
    fn resolve<'a>(&'a self, conflict: &'a StructuralConflict) -> BoxFuture<'a, ConflictChoice>;

    /// Yes/no confirmation before an overwrite
    fn confirm<'a>(&'a self, title: &'a str, message: &'a str) -> BoxFuture<'a, bool>;
}

/// Maps a configured policy to a choice without asking anyone.
/// `None` means the resolver has to be asked.
pub fn policy_choice(policy: ConflictPolicy) -> Option<ConflictChoice> {
    match policy {
        ConflictPolicy::Ask => None,
        ConflictPolicy::PreferLocal => Some(ConflictChoice::Local),
        ConflictPolicy::PreferRemote => Some(ConflictChoice::Remote),
    }
}

/// Resolver for headless use: always answers the same way
pub struct FixedResolver {
    choice: ConflictChoice,
    confirmed: bool,
    asked: AtomicUsize,
}

impl FixedResolver {
    pub fn new(choice: ConflictChoice, confirmed: bool) -> Self {
        Self {
            choice,
            confirmed,
            asked: AtomicUsize::new(0),
        }
    }

    /// Number of conflicts this resolver was asked about
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ConflictResolver for FixedResolver {
    fn resolve<'a>(&'a self, conflict: &'a StructuralConflict) -> BoxFuture<'a, ConflictChoice> {
        Box::pin(async move {
            self.asked.fetch_add(1, Ordering::SeqCst);
            log::info!("[Sync] Conflict {} resolved as {:?}", conflict, self.choice);
            self.choice
        })
    }

    fn confirm<'a>(&'a self, title: &'a str, _message: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            log::debug!("[Sync] Confirmation '{}': {}", title, self.confirmed);
            self.confirmed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_choice() {
        assert_eq!(policy_choice(ConflictPolicy::Ask), None);
        assert_eq!(
            policy_choice(ConflictPolicy::PreferLocal),
            Some(ConflictChoice::Local)
        );
        assert_eq!(
            policy_choice(ConflictPolicy::PreferRemote),
            Some(ConflictChoice::Remote)
        );
    }

    #[tokio::test]
    async fn test_fixed_resolver_counts_questions() {
        let resolver = FixedResolver::new(ConflictChoice::Cancelled, false);
        let conflict = StructuralConflict {
            op_index: 0,
            op_kind: "list_update",
            list_id: "L1".to_string(),
            reason: "gone".to_string(),
        };
        assert_eq!(resolver.resolve(&conflict).await, ConflictChoice::Cancelled);
        assert!(!resolver.confirm("Upload", "Overwrite?").await);
        assert_eq!(resolver.asked(), 1);
    }
}
