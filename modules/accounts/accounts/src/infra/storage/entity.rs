//! Persisted rows of the account core.
//!
//! The child entities (repos, manifests, blobs and their link tables)
//! are modeled to the extent the deletion path needs to inspect and
//! drain them; their content columns live with the registry data plane.

pub mod accounts {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "accounts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub name: String,
        pub auth_tenant_id: String,
        /// Empty unless this is a peer replica.
        pub upstream_peer_hostname: String,
        /// Empty unless this is an external replica.
        pub external_peer_url: String,
        pub external_peer_username: String,
        /// Encrypted at rest by the database layer.
        pub external_peer_password: String,
        pub platform_filter_json: Option<String>,
        pub rbac_policies_json: Option<String>,
        pub gc_policies_json: Option<String>,
        pub tag_policies_json: Option<String>,
        pub security_scan_policies_json: Option<String>,
        /// Comma-separated list of required manifest labels.
        pub required_labels: String,
        pub is_managed: bool,
        pub is_deleting: bool,
        pub next_deletion_attempt_at: Option<DateTimeUtc>,
        pub next_blob_sweep_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod repos {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "repos")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub account_name: String,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod manifests {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "manifests")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub repo_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub digest: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Parent-to-child edges between manifests (image lists and their
/// members).
pub mod manifest_refs {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "manifest_refs")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub repo_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub parent_digest: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub child_digest: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod tags {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "tags")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub repo_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub name: String,
        pub digest: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod blobs {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "blobs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub account_name: String,
        pub digest: String,
        /// Set when the blob became eligible for the blob sweep.
        pub can_be_deleted_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod blob_mounts {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "blob_mounts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub blob_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub repo_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
