//! Migration: Create the case run status catalog.
//!
//! Ids follow insertion order so IDLE is always 1, which is the status new
//! case runs start in.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE test_case_run_status (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(60) NOT NULL UNIQUE,
                    sortkey INTEGER NOT NULL DEFAULT 0,
                    description TEXT,
                    auto_blinddown BOOLEAN NOT NULL DEFAULT TRUE
                );

                INSERT INTO test_case_run_status (name, sortkey) VALUES
                    ('IDLE', 1),
                    ('PASSED', 2),
                    ('FAILED', 3),
                    ('RUNNING', 4),
                    ('PAUSED', 5),
                    ('BLOCKED', 6),
                    ('ERROR', 7),
                    ('WAIVED', 8);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS test_case_run_status CASCADE;")
            .await?;

        Ok(())
    }
}
