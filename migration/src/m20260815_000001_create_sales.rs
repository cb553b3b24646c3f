use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Sales::Table)
          .if_not_exists()
          .col(ColumnDef::new(Sales::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Sales::Key).string().not_null().unique_key())
          .col(ColumnDef::new(Sales::ProductId).string().not_null())
          .col(ColumnDef::new(Sales::PlanId).string().null())
          .col(ColumnDef::new(Sales::BuyerId).string().null())
          .col(ColumnDef::new(Sales::BuyerEmail).string().not_null())
          .col(
            ColumnDef::new(Sales::BuyerName).string().not_null().default(""),
          )
          .col(ColumnDef::new(Sales::Value).decimal_len(12, 2).not_null())
          .col(
            ColumnDef::new(Sales::Status)
              .string()
              .not_null()
              .default("completed"),
          )
          .col(ColumnDef::new(Sales::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_sales_product")
          .table(Sales::Table)
          .col(Sales::ProductId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Sales::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Sales {
  Table,
  Id,
  Key,
  ProductId,
  PlanId,
  BuyerId,
  BuyerEmail,
  BuyerName,
  Value,
  Status,
  CreatedAt,
}
