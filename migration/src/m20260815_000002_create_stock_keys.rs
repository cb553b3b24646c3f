use sea_orm_migration::prelude::*;

use super::m20260815_000001_create_sales::Sales;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(StockKeys::Table)
          .if_not_exists()
          .col(ColumnDef::new(StockKeys::Id).string().not_null().primary_key())
          .col(ColumnDef::new(StockKeys::Key).string().not_null().unique_key())
          .col(ColumnDef::new(StockKeys::ProductId).string().not_null())
          .col(ColumnDef::new(StockKeys::PlanId).string().null())
          .col(
            ColumnDef::new(StockKeys::Used)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(StockKeys::UsedAt).date_time().null())
          .col(ColumnDef::new(StockKeys::SaleId).string().null())
          .col(ColumnDef::new(StockKeys::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_stock_keys_sale")
              .from(StockKeys::Table, StockKeys::SaleId)
              .to(Sales::Table, Sales::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_stock_keys_lookup")
          .table(StockKeys::Table)
          .col(StockKeys::ProductId)
          .col(StockKeys::Used)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(StockKeys::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum StockKeys {
  Table,
  Id,
  Key,
  ProductId,
  PlanId,
  Used,
  UsedAt,
  SaleId,
  CreatedAt,
}
