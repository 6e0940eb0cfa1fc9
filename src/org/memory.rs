//! In-memory store implementing every storage trait and the audit sink.
//!
//! Backs the crate's tests and is handy for examples and prototypes.
//! Cloning shares the same underlying data (uses Arc internally). The
//! atomic-unit methods hold the relevant write locks for the whole unit, so
//! they give the same all-or-nothing guarantees a transactional backend
//! does.

use super::storage::{
    CatalogStore, InviteStore, MembershipStore, OrganizationStore, UserStore,
};
use super::types::{MemberRecord, Membership, Organization, OrganizationInvite, User};
use crate::audit::{AuditEntry, AuditSink};
use crate::error::{AccessError, Result};
use crate::rbac::{GlobalRole, OrgRole, Permission};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

// Lock order when holding more than one: users, orgs, invites,
// invites_by_token, memberships, catalog, audit. Readers that need data
// from two maps clone what they need and release the first guard before
// taking the second.
struct Inner {
    users: RwLock<HashMap<String, User>>,
    orgs: RwLock<HashMap<String, Organization>>,
    // (organization_id, user_id) -> membership
    memberships: RwLock<HashMap<(String, String), Membership>>,
    invites: RwLock<HashMap<String, OrganizationInvite>>,
    // token -> invite id
    invites_by_token: RwLock<HashMap<String, String>>,
    catalog: RwLock<HashSet<(OrgRole, Permission)>>,
    audit: RwLock<Vec<AuditEntry>>,
}

/// In-memory backend for tests and prototypes.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                users: RwLock::new(HashMap::new()),
                orgs: RwLock::new(HashMap::new()),
                memberships: RwLock::new(HashMap::new()),
                invites: RwLock::new(HashMap::new()),
                invites_by_token: RwLock::new(HashMap::new()),
                catalog: RwLock::new(HashSet::new()),
                audit: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Insert a user directly (for test setup).
    pub fn insert_user(&self, user: User) {
        self.inner
            .users
            .write()
            .expect("users lock")
            .insert(user.id.clone(), user);
    }

    /// Insert a membership directly (for test setup).
    pub fn insert_membership(&self, membership: Membership) {
        let key = (
            membership.organization_id.clone(),
            membership.user_id.clone(),
        );
        self.inner
            .memberships
            .write()
            .expect("memberships lock")
            .insert(key, membership);
    }

    /// Number of memberships in one organization (for test assertions).
    #[must_use]
    pub fn membership_count(&self, organization_id: &str) -> usize {
        self.inner
            .memberships
            .read()
            .expect("memberships lock")
            .keys()
            .filter(|(org, _)| org == organization_id)
            .count()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn upsert_user(&self, id: &str, email: &str) -> Result<User> {
        let mut users = self.inner.users.write().expect("users lock");
        let user = users
            .entry(id.to_string())
            .and_modify(|u| u.email = email.to_string())
            .or_insert_with(|| User {
                id: id.to_string(),
                email: email.to_string(),
                role: GlobalRole::User,
                created_at: Utc::now(),
            });
        Ok(user.clone())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.inner.users.read().expect("users lock").get(id).cloned())
    }

    async fn update_global_role(&self, id: &str, role: GlobalRole) -> Result<User> {
        let mut users = self.inner.users.write().expect("users lock");
        let user = users
            .get_mut(id)
            .ok_or_else(|| AccessError::not_found(format!("user {id}")))?;
        user.role = role;
        Ok(user.clone())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn create_with_owner(&self, org: &Organization, owner: &Membership) -> Result<()> {
        let mut orgs = self.inner.orgs.write().expect("orgs lock");
        let mut memberships = self.inner.memberships.write().expect("memberships lock");
        orgs.insert(org.id.clone(), org.clone());
        memberships.insert(
            (owner.organization_id.clone(), owner.user_id.clone()),
            owner.clone(),
        );
        Ok(())
    }

    async fn find_organization(&self, id: &str) -> Result<Option<Organization>> {
        Ok(self.inner.orgs.read().expect("orgs lock").get(id).cloned())
    }

    async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>> {
        let org_ids: Vec<String> = {
            let memberships = self.inner.memberships.read().expect("memberships lock");
            memberships
                .keys()
                .filter(|(_, uid)| uid == user_id)
                .map(|(org_id, _)| org_id.clone())
                .collect()
        };
        let orgs = self.inner.orgs.read().expect("orgs lock");
        Ok(org_ids
            .iter()
            .filter_map(|org_id| orgs.get(org_id).cloned())
            .collect())
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn add_member(&self, membership: &Membership) -> Result<()> {
        let mut memberships = self.inner.memberships.write().expect("memberships lock");
        let key = (
            membership.organization_id.clone(),
            membership.user_id.clone(),
        );
        if memberships.contains_key(&key) {
            return Err(AccessError::AlreadyMember);
        }
        memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn remove_member(&self, organization_id: &str, user_id: &str) -> Result<()> {
        self.inner
            .memberships
            .write()
            .expect("memberships lock")
            .remove(&(organization_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn membership(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>> {
        Ok(self
            .inner
            .memberships
            .read()
            .expect("memberships lock")
            .get(&(organization_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn memberships_for_users(
        &self,
        organization_id: &str,
        user_ids: &[&str],
    ) -> Result<Vec<Membership>> {
        let memberships = self.inner.memberships.read().expect("memberships lock");
        Ok(user_ids
            .iter()
            .filter_map(|uid| {
                memberships
                    .get(&(organization_id.to_string(), (*uid).to_string()))
                    .cloned()
            })
            .collect())
    }

    async fn list_members(&self, organization_id: &str) -> Result<Vec<MemberRecord>> {
        let rows: Vec<Membership> = {
            let memberships = self.inner.memberships.read().expect("memberships lock");
            memberships
                .values()
                .filter(|m| m.organization_id == organization_id)
                .cloned()
                .collect()
        };
        let users = self.inner.users.read().expect("users lock");
        Ok(rows
            .into_iter()
            .map(|m| {
                let email = users.get(&m.user_id).map(|u| u.email.clone()).unwrap_or_default();
                MemberRecord { membership: m, email }
            })
            .collect())
    }

    async fn update_role(
        &self,
        organization_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> Result<Membership> {
        let mut memberships = self.inner.memberships.write().expect("memberships lock");
        let membership = memberships
            .get_mut(&(organization_id.to_string(), user_id.to_string()))
            .ok_or(AccessError::NotAMember)?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn update_roles_atomic(
        &self,
        organization_id: &str,
        changes: &[(&str, OrgRole)],
    ) -> Result<()> {
        let mut memberships = self.inner.memberships.write().expect("memberships lock");

        // Validate every row first so the unit applies fully or not at all.
        for (user_id, _) in changes {
            if !memberships
                .contains_key(&(organization_id.to_string(), (*user_id).to_string()))
            {
                return Err(AccessError::NotAMember);
            }
        }
        for (user_id, role) in changes {
            if let Some(m) =
                memberships.get_mut(&(organization_id.to_string(), (*user_id).to_string()))
            {
                m.role = *role;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InviteStore for InMemoryStore {
    async fn create_invite(&self, invite: &OrganizationInvite) -> Result<()> {
        let mut invites = self.inner.invites.write().expect("invites lock");
        let mut by_token = self.inner.invites_by_token.write().expect("token index lock");
        invites.insert(invite.id.clone(), invite.clone());
        by_token.insert(invite.token.clone(), invite.id.clone());
        Ok(())
    }

    async fn find_invite_by_token(&self, token: &str) -> Result<Option<OrganizationInvite>> {
        let id = {
            let by_token = self.inner.invites_by_token.read().expect("token index lock");
            by_token.get(token).cloned()
        };
        let Some(id) = id else {
            return Ok(None);
        };
        Ok(self.inner.invites.read().expect("invites lock").get(&id).cloned())
    }

    async fn redeem(&self, invite_id: &str, membership: &Membership) -> Result<()> {
        // Both write locks for the whole unit: the accepted_at check-then-set
        // and the membership insert are observed together or not at all.
        let mut invites = self.inner.invites.write().expect("invites lock");
        let mut memberships = self.inner.memberships.write().expect("memberships lock");

        let invite = invites
            .get_mut(invite_id)
            .ok_or(AccessError::InvalidInvite)?;
        if invite.accepted_at.is_some() {
            return Err(AccessError::InvalidInvite);
        }

        let key = (
            membership.organization_id.clone(),
            membership.user_id.clone(),
        );
        if memberships.contains_key(&key) {
            return Err(AccessError::AlreadyMember);
        }

        memberships.insert(key, membership.clone());
        invite.accepted_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn upsert_role_permission(&self, role: OrgRole, permission: Permission) -> Result<()> {
        self.inner
            .catalog
            .write()
            .expect("catalog lock")
            .insert((role, permission));
        Ok(())
    }

    async fn permissions_for_role(&self, role: OrgRole) -> Result<Vec<Permission>> {
        Ok(self
            .inner
            .catalog
            .read()
            .expect("catalog lock")
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, p)| *p)
            .collect())
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.inner.audit.write().expect("audit lock").push(entry.clone());
        Ok(())
    }

    async fn entries_for_organization(
        &self,
        organization_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>> {
        let audit = self.inner.audit.read().expect("audit lock");
        // Reverse insertion order first so the stable sort keeps
        // same-timestamp entries newest-first.
        let mut entries: Vec<AuditEntry> = audit
            .iter()
            .rev()
            .filter(|e| e.organization_id == organization_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
