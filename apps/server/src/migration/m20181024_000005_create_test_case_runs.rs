//! Migration: Create case runs and the records attached to them.
//!
//! Bug associations and link references are not cascaded from case runs; the
//! run event housekeeping handler removes them when a case run is deleted.
//! A status cannot be deleted while case runs still use it.

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
                CREATE TABLE test_case_runs (
                    id SERIAL PRIMARY KEY,
                    run_id INTEGER NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
                    case_id INTEGER NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
                    case_run_status_id INTEGER NOT NULL
                        REFERENCES test_case_run_status(id) ON DELETE RESTRICT,
                    assignee_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    tested_by_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    case_text_version INTEGER NOT NULL,
                    build_id INTEGER NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
                    environment_id INTEGER NOT NULL DEFAULT 0,
                    sortkey INTEGER,
                    notes TEXT,
                    running_date TIMESTAMPTZ,
                    close_date TIMESTAMPTZ,
                    UNIQUE (case_id, run_id, case_text_version)
                );

                -- Status subtotals group by (run_id, status)
                CREATE INDEX idx_test_case_runs_run_status
                    ON test_case_runs(run_id, case_run_status_id);
                CREATE INDEX idx_test_case_runs_assignee ON test_case_runs(assignee_id);

                CREATE TABLE test_case_bugs (
                    id SERIAL PRIMARY KEY,
                    bug_id VARCHAR(25) NOT NULL,
                    bug_system_id INTEGER NOT NULL DEFAULT 1,
                    case_id INTEGER NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
                    case_run_id INTEGER,
                    summary VARCHAR(255)
                );

                CREATE INDEX idx_test_case_bugs_case_run ON test_case_bugs(case_run_id);

                CREATE TABLE link_references (
                    id SERIAL PRIMARY KEY,
                    case_run_id INTEGER NOT NULL,
                    name VARCHAR(64) NOT NULL,
                    url TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_link_references_case_run ON link_references(case_run_id);
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
                DROP TABLE IF EXISTS link_references CASCADE;
                DROP TABLE IF EXISTS test_case_bugs CASCADE;
                DROP TABLE IF EXISTS test_case_runs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
