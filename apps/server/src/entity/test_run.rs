//! Test run entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_runs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub summary: String,
    pub notes: String,
    pub plan_id: i32,
    pub plan_text_version: i32,
    pub product_version_id: i32,
    pub build_id: i32,
    pub manager_id: i32,
    pub default_tester_id: Option<i32>,
    pub environment_id: i32,
    pub estimated_time_secs: i64,
    /// When true the run is closed/reopened from case run outcomes, otherwise only by hand
    pub auto_update_run_status: bool,
    pub start_date: DateTimeUtc,
    /// NULL while the run is open
    pub stop_date: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_plan::Entity",
        from = "Column::PlanId",
        to = "super::test_plan::Column::Id",
        on_delete = "Cascade"
    )]
    Plan,
    #[sea_orm(
        belongs_to = "super::build::Entity",
        from = "Column::BuildId",
        to = "super::build::Column::Id",
        on_delete = "Cascade"
    )]
    Build,
    #[sea_orm(has_many = "super::test_case_run::Entity")]
    CaseRuns,
    #[sea_orm(has_many = "super::test_run_tag::Entity")]
    Tags,
    #[sea_orm(has_many = "super::test_run_cc::Entity")]
    CcList,
}

impl Related<super::test_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::build::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Build.def()
    }
}

impl Related<super::test_case_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CaseRuns.def()
    }
}

impl Related<super::test_run_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tags.def()
    }
}

impl Related<super::test_run_cc::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CcList.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
