//! Database queries for the case run status catalog.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};

use crate::entity::case_run_status::{self, ActiveModel, Entity as CaseRunStatus};
use crate::entity::test_case_run::{self, Entity as TestCaseRun};
use crate::error::{AppError, AppResult};
use crate::models::{NewStatus, StatusDefinition};
use crate::services::StatusStore;

use super::DbPool;

#[async_trait]
impl StatusStore for DbPool {
    async fn list_statuses(&self) -> AppResult<Vec<StatusDefinition>> {
        let statuses = CaseRunStatus::find()
            .order_by_asc(case_run_status::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list case run statuses: {}", e)))?;

        Ok(statuses.into_iter().map(StatusDefinition::from).collect())
    }

    async fn find_status_by_name(&self, name: &str) -> AppResult<Option<StatusDefinition>> {
        let status = CaseRunStatus::find()
            .filter(case_run_status::Column::Name.eq(name))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case run status: {}", e)))?;

        Ok(status.map(StatusDefinition::from))
    }

    async fn find_status_by_id(&self, id: i32) -> AppResult<Option<StatusDefinition>> {
        let status = CaseRunStatus::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case run status: {}", e)))?;

        Ok(status.map(StatusDefinition::from))
    }

    async fn insert_status(&self, status: NewStatus) -> AppResult<StatusDefinition> {
        let model = ActiveModel {
            name: Set(status.name),
            sortkey: Set(status.sortkey),
            description: Set(status.description),
            auto_blinddown: Set(status.auto_blinddown),
            ..Default::default()
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert case run status: {}", e)))?;

        Ok(result.into())
    }

    async fn update_status_name(&self, id: i32, name: &str) -> AppResult<StatusDefinition> {
        let status = CaseRunStatus::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case run status: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Case run status {}", id)))?;

        let mut active: ActiveModel = status.into();
        active.name = Set(name.to_string());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to rename case run status: {}", e)))?;

        Ok(result.into())
    }

    async fn count_case_runs_with_status(&self, id: i32) -> AppResult<u64> {
        TestCaseRun::find()
            .filter(test_case_run::Column::StatusId.eq(id))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count case runs: {}", e)))
    }

    async fn delete_status(&self, id: i32) -> AppResult<()> {
        let status = CaseRunStatus::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case run status: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Case run status {}", id)))?;

        // The foreign key from test_case_runs is ON DELETE RESTRICT
        status.delete(self.connection()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::InvalidInput(format!("Case run status {} is in use", id))
            }
            _ => AppError::Database(format!("Failed to delete case run status: {}", e)),
        })?;

        Ok(())
    }
}
