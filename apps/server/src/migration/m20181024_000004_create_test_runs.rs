//! Migration: Create test runs with their tags and CC list.

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
                CREATE TABLE test_runs (
                    id SERIAL PRIMARY KEY,
                    summary TEXT NOT NULL,
                    notes TEXT NOT NULL DEFAULT '',
                    plan_id INTEGER NOT NULL REFERENCES test_plans(id) ON DELETE CASCADE,
                    plan_text_version INTEGER NOT NULL,
                    product_version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
                    build_id INTEGER NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
                    manager_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    default_tester_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    environment_id INTEGER NOT NULL DEFAULT 0,
                    estimated_time_secs BIGINT NOT NULL DEFAULT 0,

                    -- false: closed/reopened by hand; true: closed when every case run completes
                    auto_update_run_status BOOLEAN NOT NULL DEFAULT FALSE,

                    start_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    -- NULL while the run is open
                    stop_date TIMESTAMPTZ,

                    UNIQUE (id, product_version_id, plan_text_version)
                );

                CREATE INDEX idx_test_runs_start_date ON test_runs(start_date);
                CREATE INDEX idx_test_runs_stop_date ON test_runs(stop_date);
                CREATE INDEX idx_test_runs_manager ON test_runs(manager_id);
                CREATE INDEX idx_test_runs_default_tester ON test_runs(default_tester_id);

                CREATE TABLE test_run_tags (
                    id SERIAL PRIMARY KEY,
                    run_id INTEGER NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL DEFAULT 0,
                    UNIQUE (run_id, tag_id)
                );

                CREATE TABLE test_run_cc (
                    id SERIAL PRIMARY KEY,
                    run_id INTEGER NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    UNIQUE (run_id, user_id)
                );
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TABLE IF EXISTS test_run_cc CASCADE;
                DROP TABLE IF EXISTS test_run_tags CASCADE;
                DROP TABLE IF EXISTS test_runs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
