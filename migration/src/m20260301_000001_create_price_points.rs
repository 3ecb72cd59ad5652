use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create price_points table (insert-only observation log)
        manager
            .create_table(
                Table::create()
                    .table(PricePoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PricePoints::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::AssetId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Symbol)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Name)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Price)
                            .decimal_len(30, 10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Volume24h)
                            .decimal_len(30, 2)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::MarketCap)
                            .decimal_len(30, 2)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::PercentChange1h)
                            .decimal_len(10, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::PercentChange24h)
                            .decimal_len(10, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::PercentChange7d)
                            .decimal_len(10, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::PercentChange30d)
                            .decimal_len(10, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::PercentChange90d)
                            .decimal_len(10, 4)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Currency)
                            .string_len(10)
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Composite index for historical range queries: (asset_id, timestamp)
        manager
            .create_index(
                Index::create()
                    .name("idx_price_points_asset_time")
                    .table(PricePoints::Table)
                    .col(PricePoints::AssetId)
                    .col(PricePoints::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_price_points_symbol")
                    .table(PricePoints::Table)
                    .col(PricePoints::Symbol)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_price_points_timestamp")
                    .table(PricePoints::Table)
                    .col(PricePoints::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PricePoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PricePoints {
    Table,
    Id,
    AssetId,
    Symbol,
    Name,
    Price,
    #[iden = "volume_24h"]
    Volume24h,
    MarketCap,
    #[iden = "percent_change_1h"]
    PercentChange1h,
    #[iden = "percent_change_24h"]
    PercentChange24h,
    #[iden = "percent_change_7d"]
    PercentChange7d,
    #[iden = "percent_change_30d"]
    PercentChange30d,
    #[iden = "percent_change_90d"]
    PercentChange90d,
    Currency,
    Timestamp,
    CreatedAt,
}
