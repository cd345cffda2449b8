//! Link reference entity (external URLs attached to a case run).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "link_references")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub case_run_id: i32,
    pub name: String,
    pub url: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
