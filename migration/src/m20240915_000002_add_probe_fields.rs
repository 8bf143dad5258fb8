use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite only accepts one ADD COLUMN per ALTER TABLE
        manager
            .alter_table(
                Table::alter()
                    .table(Domains::Table)
                    .add_column(ColumnDef::new(Domains::Reachability).text())
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Domains::Table)
                    .add_column(ColumnDef::new(Domains::Technologies).text())
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Domains::Table)
                    .add_column(
                        ColumnDef::new(Domains::ProbedAt).timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for column in [Domains::ProbedAt, Domains::Technologies, Domains::Reachability] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Domains::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Reachability,
    Technologies,
    ProbedAt,
}
