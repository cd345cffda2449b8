//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20181024_000001_create_management;
mod m20181024_000002_create_users_plans_cases;
mod m20181024_000003_create_case_run_status;
mod m20181024_000004_create_test_runs;
mod m20181024_000005_create_test_case_runs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20181024_000001_create_management::Migration),
            Box::new(m20181024_000002_create_users_plans_cases::Migration),
            Box::new(m20181024_000003_create_case_run_status::Migration),
            Box::new(m20181024_000004_create_test_runs::Migration),
            Box::new(m20181024_000005_create_test_case_runs::Migration),
        ]
    }
}
