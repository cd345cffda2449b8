//! Test case entity.
//!
//! Only the columns the run subsystem reads are mapped.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_cases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub summary: String,
    /// 0 = manual, 1 = automated, 2 = both
    pub is_automated: i32,
    pub author_id: i32,
    pub default_tester_id: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::test_case_run::Entity")]
    CaseRuns,
}

impl Related<super::test_case_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CaseRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
