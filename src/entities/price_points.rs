//! SeaORM entity for raw cryptocurrency price observations
//!
//! Rows are insert-only: one row per asset per upstream fetch, never
//! updated or deleted by the aggregation subsystem.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_points")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// CoinMarketCap asset id; a query key only together with `currency`
    pub asset_id: i64,
    /// Display symbol captured at observation time
    pub symbol: String,
    /// Display name captured at observation time
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((30, 10)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((30, 2)))", nullable)]
    pub volume_24h: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 2)))", nullable)]
    pub market_cap: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub percent_change_1h: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub percent_change_24h: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub percent_change_7d: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub percent_change_30d: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub percent_change_90d: Option<Decimal>,
    /// ISO-like currency code the quote was converted to
    pub currency: String,
    /// Instant the observation was taken (stamped at ingestion, not the
    /// upstream-reported last_updated time)
    pub timestamp: DateTimeWithTimeZone,
    /// When the row was created
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
