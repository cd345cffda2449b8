//! Bug association entity (bug tracker id linked to a case and optionally a case run).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_case_bugs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub bug_id: String,
    pub bug_system_id: i32,
    pub case_id: i32,
    pub case_run_id: Option<i32>,
    pub summary: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
