//! Case run status entity (the outcome catalog for run items).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_case_run_status")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub sortkey: i32,
    pub description: Option<String>,
    pub auto_blinddown: bool,
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
