//! Test case run entity (one case's execution record within a run).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_case_runs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub run_id: i32,
    pub case_id: i32,
    #[sea_orm(column_name = "case_run_status_id")]
    pub status_id: i32,
    pub assignee_id: Option<i32>,
    pub tested_by_id: Option<i32>,
    pub case_text_version: i32,
    pub build_id: i32,
    pub environment_id: i32,
    pub sortkey: Option<i32>,
    pub notes: Option<String>,
    pub running_date: Option<DateTimeUtc>,
    pub close_date: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_run::Entity",
        from = "Column::RunId",
        to = "super::test_run::Column::Id",
        on_delete = "Cascade"
    )]
    Run,
    #[sea_orm(
        belongs_to = "super::test_case::Entity",
        from = "Column::CaseId",
        to = "super::test_case::Column::Id",
        on_delete = "Cascade"
    )]
    Case,
    #[sea_orm(
        belongs_to = "super::case_run_status::Entity",
        from = "Column::StatusId",
        to = "super::case_run_status::Column::Id",
        on_delete = "Restrict"
    )]
    Status,
}

impl Related<super::test_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Run.def()
    }
}

impl Related<super::test_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Case.def()
    }
}

impl Related<super::case_run_status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Status.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
