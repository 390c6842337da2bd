//! Database migrations for external modules

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_modules_and_settings::Migration),
            Box::new(m20250101_000002_create_log::Migration),
            Box::new(m20250101_000003_create_project_records::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum ExternalModules {
    Table,
    ExternalModuleId,
    DirectoryPrefix,
}

#[derive(DeriveIden)]
enum ExternalModuleSettings {
    Table,
    Id,
    ExternalModuleId,
    ProjectId,
    Key,
    ValueType,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ExternalModulesLog {
    Table,
    LogId,
    Timestamp,
    UiId,
    Ip,
    ExternalModuleId,
    ProjectId,
    Record,
    Message,
}

#[derive(DeriveIden)]
enum ExternalModulesLogParameters {
    Table,
    LogId,
    Name,
    Value,
    ValueType,
}

#[derive(DeriveIden)]
enum UserInformation {
    Table,
    UiId,
    Username,
}

#[derive(DeriveIden)]
enum ProjectRecords {
    Table,
    Id,
    ProjectId,
    RecordId,
}

mod m20250101_000001_create_modules_and_settings {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_modules_and_settings"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ExternalModules::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExternalModules::ExternalModuleId)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ExternalModules::DirectoryPrefix)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ExternalModuleSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExternalModuleSettings::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ExternalModuleSettings::ExternalModuleId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExternalModuleSettings::ProjectId).big_integer())
                        .col(ColumnDef::new(ExternalModuleSettings::Key).string().not_null())
                        .col(
                            ColumnDef::new(ExternalModuleSettings::ValueType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExternalModuleSettings::Value).text().not_null())
                        .col(
                            ColumnDef::new(ExternalModuleSettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_settings_module")
                                .from(
                                    ExternalModuleSettings::Table,
                                    ExternalModuleSettings::ExternalModuleId,
                                )
                                .to(ExternalModules::Table, ExternalModules::ExternalModuleId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_settings_module_project_key")
                        .table(ExternalModuleSettings::Table)
                        .col(ExternalModuleSettings::ExternalModuleId)
                        .col(ExternalModuleSettings::ProjectId)
                        .col(ExternalModuleSettings::Key)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ExternalModuleSettings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ExternalModules::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000002_create_log {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_log"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UserInformation::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserInformation::UiId)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(UserInformation::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ExternalModulesLog::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExternalModulesLog::LogId)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ExternalModulesLog::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExternalModulesLog::UiId).big_integer())
                        .col(ColumnDef::new(ExternalModulesLog::Ip).text())
                        .col(
                            ColumnDef::new(ExternalModulesLog::ExternalModuleId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExternalModulesLog::ProjectId).big_integer())
                        .col(ColumnDef::new(ExternalModulesLog::Record).string())
                        .col(ColumnDef::new(ExternalModulesLog::Message).text().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_log_module_project")
                        .table(ExternalModulesLog::Table)
                        .col(ExternalModulesLog::ExternalModuleId)
                        .col(ExternalModulesLog::ProjectId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ExternalModulesLogParameters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExternalModulesLogParameters::LogId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExternalModulesLogParameters::Name)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExternalModulesLogParameters::Value)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExternalModulesLogParameters::ValueType)
                                .string_len(16)
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(ExternalModulesLogParameters::LogId)
                                .col(ExternalModulesLogParameters::Name),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_log_parameters_log")
                                .from(
                                    ExternalModulesLogParameters::Table,
                                    ExternalModulesLogParameters::LogId,
                                )
                                .to(ExternalModulesLog::Table, ExternalModulesLog::LogId)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_log_parameters_name")
                        .table(ExternalModulesLogParameters::Table)
                        .col(ExternalModulesLogParameters::Name)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(ExternalModulesLogParameters::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(ExternalModulesLog::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserInformation::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000003_create_project_records {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_project_records"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProjectRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProjectRecords::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProjectRecords::ProjectId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProjectRecords::RecordId)
                                .big_integer()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_project_records_project_record")
                        .table(ProjectRecords::Table)
                        .col(ProjectRecords::ProjectId)
                        .col(ProjectRecords::RecordId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProjectRecords::Table).to_owned())
                .await
        }
    }
}
