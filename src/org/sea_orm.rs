//! SeaORM-backed persistence for every storage trait and the audit sink.
//!
//! # Database Schema
//!
//! The store expects the following tables. Create them with SeaORM
//! migrations or adapt them to your existing schema:
//!
//! ```sql
//! CREATE TABLE users (
//!     id VARCHAR(64) PRIMARY KEY,
//!     email VARCHAR(255) NOT NULL,
//!     role VARCHAR(20) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE organizations (
//!     id VARCHAR(36) PRIMARY KEY,
//!     name VARCHAR(255) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE organization_members (
//!     organization_id VARCHAR(36) NOT NULL,
//!     user_id VARCHAR(64) NOT NULL,
//!     role VARCHAR(20) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (organization_id, user_id),
//!     FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
//! );
//!
//! CREATE INDEX idx_members_user ON organization_members(user_id);
//!
//! CREATE TABLE organization_invites (
//!     id VARCHAR(36) PRIMARY KEY,
//!     token VARCHAR(64) UNIQUE NOT NULL,
//!     organization_id VARCHAR(36) NOT NULL,
//!     email VARCHAR(255) NOT NULL,
//!     role VARCHAR(20) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     accepted_at TIMESTAMPTZ,
//!     FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
//! );
//!
//! CREATE INDEX idx_invites_token ON organization_invites(token);
//!
//! CREATE TABLE org_role_permissions (
//!     role VARCHAR(20) NOT NULL,
//!     permission VARCHAR(40) NOT NULL,
//!     PRIMARY KEY (role, permission)
//! );
//!
//! CREATE TABLE audit_logs (
//!     id VARCHAR(36) PRIMARY KEY,
//!     organization_id VARCHAR(36) NOT NULL,
//!     actor_id VARCHAR(64) NOT NULL,
//!     action VARCHAR(64) NOT NULL,
//!     target_id VARCHAR(64),
//!     metadata JSON,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE INDEX idx_audit_org_created ON audit_logs(organization_id, created_at);
//! ```

use async_trait::async_trait;
use sea_orm::{
    entity::prelude::*, sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::str::FromStr;

use super::storage::{
    CatalogStore, InviteStore, MembershipStore, OrganizationStore, UserStore,
};
use super::types::{MemberRecord, Membership, Organization, OrganizationInvite, User};
use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::error::{AccessError, Result};
use crate::rbac::{AssignableRole, GlobalRole, OrgRole, Permission};

mod entity {
    use sea_orm::entity::prelude::*;

    pub mod user {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "users")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: String,
            pub email: String,
            pub role: String,
            pub created_at: DateTimeUtc,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod organization {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "organizations")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: String,
            pub name: String,
            pub created_at: DateTimeUtc,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod membership {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "organization_members")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub organization_id: String,
            #[sea_orm(primary_key, auto_increment = false)]
            pub user_id: String,
            pub role: String,
            pub created_at: DateTimeUtc,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod invite {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "organization_invites")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: String,
            #[sea_orm(unique)]
            pub token: String,
            pub organization_id: String,
            pub email: String,
            pub role: String,
            pub created_at: DateTimeUtc,
            pub accepted_at: Option<DateTimeUtc>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod role_permission {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "org_role_permissions")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub role: String,
            #[sea_orm(primary_key, auto_increment = false)]
            pub permission: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod audit_log {
        use super::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "audit_logs")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: String,
            pub organization_id: String,
            pub actor_id: String,
            pub action: String,
            pub target_id: Option<String>,
            pub metadata: Option<Json>,
            pub created_at: DateTimeUtc,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::{audit_log, invite, membership, organization, role_permission, user};

fn db_err(e: sea_orm::DbErr) -> AccessError {
    AccessError::storage(e.to_string())
}

fn model_to_user(model: user::Model) -> User {
    User {
        id: model.id,
        email: model.email,
        role: GlobalRole::from_str(&model.role).unwrap_or_default(),
        created_at: model.created_at,
    }
}

fn model_to_organization(model: organization::Model) -> Organization {
    Organization {
        id: model.id,
        name: model.name,
        created_at: model.created_at,
    }
}

fn model_to_membership(model: membership::Model) -> Membership {
    Membership {
        user_id: model.user_id,
        organization_id: model.organization_id,
        role: OrgRole::from_str(&model.role).unwrap_or_default(),
        created_at: model.created_at,
    }
}

fn model_to_invite(model: invite::Model) -> OrganizationInvite {
    OrganizationInvite {
        id: model.id,
        token: model.token,
        organization_id: model.organization_id,
        email: model.email,
        role: AssignableRole::from_str(&model.role).unwrap_or(AssignableRole::Member),
        created_at: model.created_at,
        accepted_at: model.accepted_at,
    }
}

fn membership_model(m: &Membership) -> membership::ActiveModel {
    membership::ActiveModel {
        organization_id: Set(m.organization_id.clone()),
        user_id: Set(m.user_id.clone()),
        role: Set(m.role.as_str().to_string()),
        created_at: Set(m.created_at),
    }
}

fn model_to_audit_entry(model: audit_log::Model) -> AuditEntry {
    AuditEntry {
        id: model.id,
        organization_id: model.organization_id,
        actor_id: model.actor_id,
        action: AuditAction::from_str(&model.action).unwrap_or(AuditAction::OrganizationCreated),
        target_id: model.target_id,
        metadata: model.metadata,
        created_at: model.created_at,
    }
}

/// SeaORM-backed store implementing all storage traits and [`AuditSink`].
#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Reference to the underlying database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl UserStore for SeaOrmStore {
    async fn upsert_user(&self, id: &str, email: &str) -> Result<User> {
        let model = user::ActiveModel {
            id: Set(id.to_string()),
            email: Set(email.to_string()),
            role: Set(GlobalRole::default().as_str().to_string()),
            created_at: Set(chrono::Utc::now()),
        };

        user::Entity::insert(model)
            .on_conflict(
                OnConflict::column(user::Column::Id)
                    .update_column(user::Column::Email)
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        let found = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AccessError::storage("upserted user not found"))?;
        Ok(model_to_user(found))
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let found = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(found.map(model_to_user))
    }

    async fn update_global_role(&self, id: &str, role: GlobalRole) -> Result<User> {
        let found = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AccessError::not_found(format!("user {id}")))?;

        let mut active: user::ActiveModel = found.into();
        active.role = Set(role.as_str().to_string());
        let updated = active.update(&self.db).await.map_err(db_err)?;
        Ok(model_to_user(updated))
    }
}

#[async_trait]
impl OrganizationStore for SeaOrmStore {
    async fn create_with_owner(&self, org: &Organization, owner: &Membership) -> Result<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let org_model = organization::ActiveModel {
            id: Set(org.id.clone()),
            name: Set(org.name.clone()),
            created_at: Set(org.created_at),
        };
        organization::Entity::insert(org_model)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        membership::Entity::insert(membership_model(owner))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)
    }

    async fn find_organization(&self, id: &str) -> Result<Option<Organization>> {
        let found = organization::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(found.map(model_to_organization))
    }

    async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>> {
        let memberships = membership::Entity::find()
            .filter(membership::Column::UserId.eq(user_id))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let org_ids: Vec<String> = memberships
            .into_iter()
            .map(|m| m.organization_id)
            .collect();
        if org_ids.is_empty() {
            return Ok(vec![]);
        }

        let orgs = organization::Entity::find()
            .filter(organization::Column::Id.is_in(org_ids))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(orgs.into_iter().map(model_to_organization).collect())
    }
}

#[async_trait]
impl MembershipStore for SeaOrmStore {
    async fn add_member(&self, m: &Membership) -> Result<()> {
        membership::Entity::insert(membership_model(m))
            .exec(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => AccessError::AlreadyMember,
                _ => db_err(e),
            })?;
        Ok(())
    }

    async fn remove_member(&self, organization_id: &str, user_id: &str) -> Result<()> {
        membership::Entity::delete_many()
            .filter(membership::Column::OrganizationId.eq(organization_id))
            .filter(membership::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn membership(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>> {
        let found = membership::Entity::find_by_id((
            organization_id.to_string(),
            user_id.to_string(),
        ))
        .one(&self.db)
        .await
        .map_err(db_err)?;
        Ok(found.map(model_to_membership))
    }

    async fn memberships_for_users(
        &self,
        organization_id: &str,
        user_ids: &[&str],
    ) -> Result<Vec<Membership>> {
        let ids: Vec<String> = user_ids.iter().map(|s| s.to_string()).collect();
        let rows = membership::Entity::find()
            .filter(membership::Column::OrganizationId.eq(organization_id))
            .filter(membership::Column::UserId.is_in(ids))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(model_to_membership).collect())
    }

    async fn list_members(&self, organization_id: &str) -> Result<Vec<MemberRecord>> {
        let rows = membership::Entity::find()
            .filter(membership::Column::OrganizationId.eq(organization_id))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let user_ids: Vec<String> = rows.iter().map(|m| m.user_id.clone()).collect();
        let users = if user_ids.is_empty() {
            vec![]
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(&self.db)
                .await
                .map_err(db_err)?
        };

        Ok(rows
            .into_iter()
            .map(|m| {
                let email = users
                    .iter()
                    .find(|u| u.id == m.user_id)
                    .map(|u| u.email.clone())
                    .unwrap_or_default();
                MemberRecord {
                    membership: model_to_membership(m),
                    email,
                }
            })
            .collect())
    }

    async fn update_role(
        &self,
        organization_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> Result<Membership> {
        let found = membership::Entity::find_by_id((
            organization_id.to_string(),
            user_id.to_string(),
        ))
        .one(&self.db)
        .await
        .map_err(db_err)?
        .ok_or(AccessError::NotAMember)?;

        let mut active: membership::ActiveModel = found.into();
        active.role = Set(role.as_str().to_string());
        let updated = active.update(&self.db).await.map_err(db_err)?;
        Ok(model_to_membership(updated))
    }

    async fn update_roles_atomic(
        &self,
        organization_id: &str,
        changes: &[(&str, OrgRole)],
    ) -> Result<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        for (user_id, role) in changes {
            let result = membership::Entity::update_many()
                .col_expr(membership::Column::Role, Expr::value(role.as_str()))
                .filter(membership::Column::OrganizationId.eq(organization_id))
                .filter(membership::Column::UserId.eq(*user_id))
                .exec(&txn)
                .await
                .map_err(db_err)?;
            if result.rows_affected != 1 {
                txn.rollback().await.map_err(db_err)?;
                return Err(AccessError::NotAMember);
            }
        }

        txn.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl InviteStore for SeaOrmStore {
    async fn create_invite(&self, inv: &OrganizationInvite) -> Result<()> {
        let model = invite::ActiveModel {
            id: Set(inv.id.clone()),
            token: Set(inv.token.clone()),
            organization_id: Set(inv.organization_id.clone()),
            email: Set(inv.email.clone()),
            role: Set(inv.role.as_str().to_string()),
            created_at: Set(inv.created_at),
            accepted_at: Set(inv.accepted_at),
        };
        invite::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_invite_by_token(&self, token: &str) -> Result<Option<OrganizationInvite>> {
        let found = invite::Entity::find()
            .filter(invite::Column::Token.eq(token))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(found.map(model_to_invite))
    }

    async fn redeem(&self, invite_id: &str, m: &Membership) -> Result<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        // Conditional on accepted_at still being null. rows_affected 0 means
        // a concurrent acceptance won; fail the whole unit.
        let result = invite::Entity::update_many()
            .col_expr(
                invite::Column::AcceptedAt,
                Expr::value(Some(chrono::Utc::now())),
            )
            .filter(invite::Column::Id.eq(invite_id))
            .filter(invite::Column::AcceptedAt.is_null())
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected != 1 {
            txn.rollback().await.map_err(db_err)?;
            return Err(AccessError::InvalidInvite);
        }

        membership::Entity::insert(membership_model(m))
            .exec(&txn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => AccessError::AlreadyMember,
                _ => db_err(e),
            })?;

        txn.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl CatalogStore for SeaOrmStore {
    async fn upsert_role_permission(&self, role: OrgRole, permission: Permission) -> Result<()> {
        let model = role_permission::ActiveModel {
            role: Set(role.as_str().to_string()),
            permission: Set(permission.as_str().to_string()),
        };
        role_permission::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    role_permission::Column::Role,
                    role_permission::Column::Permission,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn permissions_for_role(&self, role: OrgRole) -> Result<Vec<Permission>> {
        let rows = role_permission::Entity::find()
            .filter(role_permission::Column::Role.eq(role.as_str()))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        // Unknown permission strings from newer deployments are skipped.
        Ok(rows
            .into_iter()
            .filter_map(|r| Permission::from_str(&r.permission).ok())
            .collect())
    }
}

#[async_trait]
impl AuditSink for SeaOrmStore {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        let model = audit_log::ActiveModel {
            id: Set(entry.id.clone()),
            organization_id: Set(entry.organization_id.clone()),
            actor_id: Set(entry.actor_id.clone()),
            action: Set(entry.action.as_str().to_string()),
            target_id: Set(entry.target_id.clone()),
            metadata: Set(entry.metadata.clone()),
            created_at: Set(entry.created_at),
        };
        audit_log::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn entries_for_organization(
        &self,
        organization_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>> {
        let rows = audit_log::Entity::find()
            .filter(audit_log::Column::OrganizationId.eq(organization_id))
            .order_by_desc(audit_log::Column::CreatedAt)
            .limit(Some(limit as u64))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(model_to_audit_entry).collect())
    }
}
