//! Tag entity.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::test_run_tag::Entity")]
    RunTags,
}

impl Related<super::test_run_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RunTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
