//! Migration: Create product management tables.
//!
//! Classifications group products; each product owns its versions, builds and
//! components. Priorities are seeded with P1..P5.

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
                CREATE TABLE classifications (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(64) NOT NULL UNIQUE,
                    description TEXT NOT NULL DEFAULT '',
                    sortkey INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE products (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(64) NOT NULL UNIQUE,
                    description TEXT NOT NULL DEFAULT '',
                    classification_id INTEGER NOT NULL REFERENCES classifications(id) ON DELETE CASCADE
                );

                CREATE TABLE versions (
                    id SERIAL PRIMARY KEY,
                    value VARCHAR(192) NOT NULL,
                    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                    UNIQUE (product_id, value)
                );

                CREATE TABLE builds (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                    UNIQUE (product_id, name)
                );

                CREATE TABLE tags (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(255) NOT NULL
                );

                CREATE INDEX idx_tags_name ON tags(name);

                CREATE TABLE priorities (
                    id SERIAL PRIMARY KEY,
                    value VARCHAR(64) NOT NULL UNIQUE,
                    sortkey INTEGER NOT NULL DEFAULT 0,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE
                );

                INSERT INTO priorities (value, sortkey) VALUES
                    ('P1', 1), ('P2', 2), ('P3', 3), ('P4', 4), ('P5', 5);

                CREATE TABLE components (
                    id SERIAL PRIMARY KEY,
                    name VARCHAR(64) NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                    initial_owner_id INTEGER,
                    initial_qa_contact_id INTEGER,
                    UNIQUE (product_id, name)
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
                DROP TABLE IF EXISTS components CASCADE;
                DROP TABLE IF EXISTS priorities CASCADE;
                DROP TABLE IF EXISTS tags CASCADE;
                DROP TABLE IF EXISTS builds CASCADE;
                DROP TABLE IF EXISTS versions CASCADE;
                DROP TABLE IF EXISTS products CASCADE;
                DROP TABLE IF EXISTS classifications CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
