//! Migration: Create users, test plans, test cases and case texts.

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
                CREATE TABLE users (
                    id SERIAL PRIMARY KEY,
                    username VARCHAR(150) NOT NULL UNIQUE,
                    email VARCHAR(254) NOT NULL DEFAULT '',
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                ALTER TABLE components
                    ADD CONSTRAINT fk_components_initial_owner
                        FOREIGN KEY (initial_owner_id) REFERENCES users(id) ON DELETE CASCADE,
                    ADD CONSTRAINT fk_components_initial_qa_contact
                        FOREIGN KEY (initial_qa_contact_id) REFERENCES users(id) ON DELETE CASCADE;

                CREATE TABLE test_plans (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                    product_version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_plans_name ON test_plans(name);

                -- is_automated: 0 = manual, 1 = automated, 2 = both
                CREATE TABLE test_cases (
                    id SERIAL PRIMARY KEY,
                    summary TEXT NOT NULL,
                    is_automated INTEGER NOT NULL DEFAULT 0
                        CHECK (is_automated IN (0, 1, 2)),
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    default_tester_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Versioned case text; case runs pin one version
                CREATE TABLE test_case_texts (
                    id SERIAL PRIMARY KEY,
                    case_id INTEGER NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
                    case_text_version INTEGER NOT NULL,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    action TEXT NOT NULL DEFAULT '',
                    effect TEXT NOT NULL DEFAULT '',
                    setup TEXT NOT NULL DEFAULT '',
                    breakdown TEXT NOT NULL DEFAULT '',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (case_id, case_text_version)
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
                DROP TABLE IF EXISTS test_case_texts CASCADE;
                DROP TABLE IF EXISTS test_cases CASCADE;
                DROP TABLE IF EXISTS test_plans CASCADE;
                ALTER TABLE components
                    DROP CONSTRAINT IF EXISTS fk_components_initial_owner,
                    DROP CONSTRAINT IF EXISTS fk_components_initial_qa_contact;
                DROP TABLE IF EXISTS users CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
