//! Platform administration, gated on the global user role.

use crate::error::{AccessError, Result};
use crate::identity::VerifiedSubject;
use crate::org::storage::UserStore;
use crate::org::types::User;
use crate::rbac::{require_global_role, GlobalRole};
use tracing::{info, instrument};

/// Operations reserved for platform administrators.
///
/// These act on the global user record, outside any organization, and are
/// guarded by [`require_global_role`] rather than the per-organization
/// permission catalog.
#[derive(Clone)]
pub struct AdminService<S> {
    store: S,
}

impl<S> AdminService<S>
where
    S: UserStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Set a user's platform-wide role.
    ///
    /// The actor must hold [`GlobalRole::Admin`]. Fails with `NotFound` when
    /// the target user does not exist.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn set_global_role(
        &self,
        actor: &VerifiedSubject,
        user_id: &str,
        role: GlobalRole,
    ) -> Result<User> {
        require_global_role(&self.store, actor, &[GlobalRole::Admin]).await?;

        if self.store.find_user(user_id).await?.is_none() {
            return Err(AccessError::not_found(format!("user {user_id}")));
        }

        let updated = self.store.update_global_role(user_id, role).await?;
        info!(user_id = %updated.id, role = %updated.role, "global role updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org::memory::InMemoryStore;
    use chrono::Utc;

    fn subject(id: &str, email: &str) -> VerifiedSubject {
        VerifiedSubject {
            id: id.to_string(),
            email: email.to_string(),
            role_hint: None,
        }
    }

    async fn store_with_admin() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_user(User {
            id: "root".to_string(),
            email: "root@example.com".to_string(),
            role: GlobalRole::Admin,
            created_at: Utc::now(),
        });
        store.upsert_user("target", "target@example.com").await.unwrap();
        store
    }

    #[tokio::test]
    async fn admin_can_promote_user() {
        let store = store_with_admin().await;
        let service = AdminService::new(store.clone());

        let updated = service
            .set_global_role(
                &subject("root", "root@example.com"),
                "target",
                GlobalRole::Admin,
            )
            .await
            .unwrap();
        assert_eq!(updated.role, GlobalRole::Admin);
    }

    #[tokio::test]
    async fn ordinary_user_is_forbidden() {
        let store = store_with_admin().await;
        let service = AdminService::new(store.clone());

        let err = service
            .set_global_role(
                &subject("target", "target@example.com"),
                "root",
                GlobalRole::User,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let store = store_with_admin().await;
        let service = AdminService::new(store);

        let err = service
            .set_global_role(
                &subject("root", "root@example.com"),
                "ghost",
                GlobalRole::Admin,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
