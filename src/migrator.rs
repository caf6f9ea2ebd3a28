use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_catalog_tables::Migration),
            Box::new(m20250101_000002_create_production_tables::Migration),
            Box::new(m20250101_000003_add_scheduling_indexes::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Materials {
    Table,
    Id,
    Name,
    Quantity,
    UnitOfMeasure,
    MinimalStock,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Description,
    Specifications,
    Category,
    MinimalStock,
    ProductionTimePerUnit,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProductMaterials {
    Table,
    ProductId,
    MaterialId,
    QuantityNeeded,
}

#[derive(DeriveIden)]
enum ProductionLines {
    Table,
    Id,
    Name,
    Status,
    EfficiencyFactor,
    CurrentWorkOrderId,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WorkOrders {
    Table,
    Id,
    ProductId,
    ProductionLineId,
    Quantity,
    StartDate,
    EstimatedEndDate,
    Status,
    Progress,
    Version,
    CreatedAt,
    UpdatedAt,
}

const FK_LINE_CURRENT_WORK_ORDER: &str = "fk_production_lines_current_work_order_id";

mod m20250101_000001_create_catalog_tables {
    use super::{Materials, ProductMaterials, Products};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Materials::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Materials::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::UnitOfMeasure)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::MinimalStock)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Specifications).text().null())
                        .col(ColumnDef::new(Products::Category).string_len(50).not_null())
                        .col(
                            ColumnDef::new(Products::MinimalStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::ProductionTimePerUnit)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductMaterials::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterials::MaterialId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMaterials::QuantityNeeded)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(ProductMaterials::ProductId)
                                .col(ProductMaterials::MaterialId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_materials_product_id")
                                .from(ProductMaterials::Table, ProductMaterials::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_materials_material_id")
                                .from(ProductMaterials::Table, ProductMaterials::MaterialId)
                                .to(Materials::Table, Materials::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductMaterials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000002_create_production_tables {
    use super::{ProductionLines, Products, WorkOrders, FK_LINE_CURRENT_WORK_ORDER};
    use sea_orm_migration::prelude::*;
    use sea_orm_migration::sea_orm::DatabaseBackend;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_production_tables"
        }
    }

    fn current_work_order_fk() -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(FK_LINE_CURRENT_WORK_ORDER)
            .from(ProductionLines::Table, ProductionLines::CurrentWorkOrderId)
            .to(WorkOrders::Table, WorkOrders::Id)
            .on_delete(ForeignKeyAction::SetNull)
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Lines and work orders reference each other. SQLite resolves foreign
            // keys lazily and cannot add constraints later, so it gets the pointer
            // constraint inline; other backends add it once work_orders exists.
            let sqlite = manager.get_database_backend() == DatabaseBackend::Sqlite;

            let mut lines = Table::create();
            lines
                .table(ProductionLines::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(ProductionLines::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(
                    ColumnDef::new(ProductionLines::Name)
                        .string_len(100)
                        .not_null(),
                )
                .col(
                    ColumnDef::new(ProductionLines::Status)
                        .string_len(20)
                        .not_null()
                        .default("Stopped"),
                )
                .col(
                    ColumnDef::new(ProductionLines::EfficiencyFactor)
                        .double()
                        .not_null()
                        .default(1.0),
                )
                .col(
                    ColumnDef::new(ProductionLines::CurrentWorkOrderId)
                        .integer()
                        .null(),
                )
                .col(
                    ColumnDef::new(ProductionLines::Version)
                        .integer()
                        .not_null()
                        .default(1),
                )
                .col(
                    ColumnDef::new(ProductionLines::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(ProductionLines::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null(),
                );
            if sqlite {
                lines.foreign_key(&mut current_work_order_fk());
            }
            manager.create_table(lines.to_owned()).await?;

            manager
                .create_table(
                    Table::create()
                        .table(WorkOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(WorkOrders::ProductId).integer().not_null())
                        .col(ColumnDef::new(WorkOrders::ProductionLineId).integer().null())
                        .col(ColumnDef::new(WorkOrders::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(WorkOrders::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::EstimatedEndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::Status)
                                .string_len(20)
                                .not_null()
                                .default("Pending"),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::Progress)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_work_orders_product_id")
                                .from(WorkOrders::Table, WorkOrders::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_work_orders_production_line_id")
                                .from(WorkOrders::Table, WorkOrders::ProductionLineId)
                                .to(ProductionLines::Table, ProductionLines::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            if !sqlite {
                manager.create_foreign_key(current_work_order_fk()).await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            if manager.get_database_backend() != DatabaseBackend::Sqlite {
                manager
                    .drop_foreign_key(
                        ForeignKey::drop()
                            .name(FK_LINE_CURRENT_WORK_ORDER)
                            .table(ProductionLines::Table)
                            .to_owned(),
                    )
                    .await?;
            }
            manager
                .drop_table(Table::drop().table(WorkOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionLines::Table).to_owned())
                .await
        }
    }
}

mod m20250101_000003_add_scheduling_indexes {
    use super::{Materials, WorkOrders};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_add_scheduling_indexes"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_line_status")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::ProductionLineId)
                        .col(WorkOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_status_end")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::Status)
                        .col(WorkOrders::EstimatedEndDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_name")
                        .table(Materials::Table)
                        .col(Materials::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_materials_name")
                        .table(Materials::Table)
                        .to_owned(),
                )
                .await?;
            for name in ["idx_work_orders_line_status", "idx_work_orders_status_end"] {
                manager
                    .drop_index(Index::drop().name(name).table(WorkOrders::Table).to_owned())
                    .await?;
            }
            Ok(())
        }
    }
}
