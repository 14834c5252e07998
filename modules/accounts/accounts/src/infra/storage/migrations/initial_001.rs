use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::AuthTenantId).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::UpstreamPeerHostname)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Accounts::ExternalPeerUrl)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Accounts::ExternalPeerUsername)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Accounts::ExternalPeerPassword)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Accounts::PlatformFilterJson).string())
                    .col(ColumnDef::new(Accounts::RbacPoliciesJson).string())
                    .col(ColumnDef::new(Accounts::GcPoliciesJson).string())
                    .col(ColumnDef::new(Accounts::TagPoliciesJson).string())
                    .col(ColumnDef::new(Accounts::SecurityScanPoliciesJson).string())
                    .col(
                        ColumnDef::new(Accounts::RequiredLabels)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Accounts::IsManaged)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Accounts::IsDeleting)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Accounts::NextDeletionAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Accounts::NextBlobSweepAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Repos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repos::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repos::AccountName).string().not_null())
                    .col(ColumnDef::new(Repos::Name).string().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_repos_account_name")
                    .table(Repos::Table)
                    .col(Repos::AccountName)
                    .col(Repos::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Manifests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Manifests::RepoId).big_integer().not_null())
                    .col(ColumnDef::new(Manifests::Digest).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(Manifests::RepoId)
                            .col(Manifests::Digest),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ManifestRefs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ManifestRefs::RepoId).big_integer().not_null())
                    .col(ColumnDef::new(ManifestRefs::ParentDigest).string().not_null())
                    .col(ColumnDef::new(ManifestRefs::ChildDigest).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(ManifestRefs::RepoId)
                            .col(ManifestRefs::ParentDigest)
                            .col(ManifestRefs::ChildDigest),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::RepoId).big_integer().not_null())
                    .col(ColumnDef::new(Tags::Name).string().not_null())
                    .col(ColumnDef::new(Tags::Digest).string().not_null())
                    .primary_key(Index::create().col(Tags::RepoId).col(Tags::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Blobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Blobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Blobs::AccountName).string().not_null())
                    .col(ColumnDef::new(Blobs::Digest).string().not_null())
                    .col(ColumnDef::new(Blobs::CanBeDeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BlobMounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BlobMounts::BlobId).big_integer().not_null())
                    .col(ColumnDef::new(BlobMounts::RepoId).big_integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(BlobMounts::BlobId)
                            .col(BlobMounts::RepoId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlobMounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Blobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ManifestRefs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Manifests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Name,
    AuthTenantId,
    UpstreamPeerHostname,
    ExternalPeerUrl,
    ExternalPeerUsername,
    ExternalPeerPassword,
    PlatformFilterJson,
    RbacPoliciesJson,
    GcPoliciesJson,
    TagPoliciesJson,
    SecurityScanPoliciesJson,
    RequiredLabels,
    IsManaged,
    IsDeleting,
    NextDeletionAttemptAt,
    NextBlobSweepAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
    AccountName,
    Name,
}

#[derive(DeriveIden)]
enum Manifests {
    Table,
    RepoId,
    Digest,
}

#[derive(DeriveIden)]
enum ManifestRefs {
    Table,
    RepoId,
    ParentDigest,
    ChildDigest,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    RepoId,
    Name,
    Digest,
}

#[derive(DeriveIden)]
enum Blobs {
    Table,
    Id,
    AccountName,
    Digest,
    CanBeDeletedAt,
}

#[derive(DeriveIden)]
enum BlobMounts {
    Table,
    BlobId,
    RepoId,
}
