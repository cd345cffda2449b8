//! Database queries for case runs.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};

use crate::entity::{test_case, test_case_text};
use crate::entity::test_case_run::{self, ActiveModel, Entity as TestCaseRun};
use crate::error::{AppError, AppResult};
use crate::models::status::RUNNING;
use crate::models::{NewCaseRun, StatusDefinition};

use super::DbPool;

impl DbPool {
    pub async fn get_test_case(&self, case_id: i32) -> AppResult<Option<test_case::Model>> {
        let result = test_case::Entity::find_by_id(case_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test case: {}", e)))?;

        Ok(result)
    }

    /// Highest text version of a case, `None` when the case has no text yet.
    pub async fn latest_case_text_version(&self, case_id: i32) -> AppResult<Option<i32>> {
        let text = test_case_text::Entity::find()
            .filter(test_case_text::Column::CaseId.eq(case_id))
            .order_by_desc(test_case_text::Column::CaseTextVersion)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case text: {}", e)))?;

        Ok(text.map(|t| t.case_text_version))
    }

    /// Insert a case run.
    pub async fn insert_case_run(&self, case_run: NewCaseRun) -> AppResult<test_case_run::Model> {
        let model = ActiveModel {
            run_id: Set(case_run.run_id),
            case_id: Set(case_run.case_id),
            status_id: Set(case_run.status_id),
            assignee_id: Set(case_run.assignee_id),
            tested_by_id: Set(None),
            case_text_version: Set(case_run.case_text_version),
            build_id: Set(case_run.build_id),
            environment_id: Set(case_run.environment_id),
            sortkey: Set(Some(case_run.sortkey)),
            notes: Set(case_run.notes),
            running_date: Set(None),
            close_date: Set(None),
            ..Default::default()
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert case run: {}", e)))?;

        Ok(result)
    }

    /// Get a case run by ID.
    pub async fn get_case_run_by_id(&self, id: i32) -> AppResult<Option<test_case_run::Model>> {
        let result = TestCaseRun::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get case run: {}", e)))?;

        Ok(result)
    }

    /// Get a case run that must belong to `run_id`.
    pub async fn require_case_run(
        &self,
        run_id: i32,
        case_run_id: i32,
    ) -> AppResult<test_case_run::Model> {
        self.get_case_run_by_id(case_run_id)
            .await?
            .filter(|cr| cr.run_id == run_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Case run {} in test run {}", case_run_id, run_id))
            })
    }

    /// Case runs of a run in display order.
    pub async fn list_case_runs(&self, run_id: i32) -> AppResult<Vec<test_case_run::Model>> {
        let result = TestCaseRun::find()
            .filter(test_case_run::Column::RunId.eq(run_id))
            .order_by_asc(test_case_run::Column::Sortkey)
            .order_by_asc(test_case_run::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list case runs: {}", e)))?;

        Ok(result)
    }

    /// Record a new outcome.
    ///
    /// Entering RUNNING stamps `running_date`; entering a complete status stamps
    /// `close_date`, any other status clears it.
    pub async fn update_case_run_status(
        &self,
        case_run: test_case_run::Model,
        status: &StatusDefinition,
        tested_by_id: Option<i32>,
    ) -> AppResult<test_case_run::Model> {
        let now = Utc::now();
        let mut active: ActiveModel = case_run.into();
        active.status_id = Set(status.id);
        if tested_by_id.is_some() {
            active.tested_by_id = Set(tested_by_id);
        }
        if status.name == RUNNING {
            active.running_date = Set(Some(now));
        }
        active.close_date = Set(status.is_complete().then_some(now));

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update case run status: {}", e)))?;

        Ok(result)
    }

    pub async fn update_case_run_assignee(
        &self,
        case_run: test_case_run::Model,
        assignee_id: i32,
    ) -> AppResult<test_case_run::Model> {
        let mut active: ActiveModel = case_run.into();
        active.assignee_id = Set(Some(assignee_id));

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update case run assignee: {}", e)))?;

        Ok(result)
    }

    pub async fn delete_case_run(&self, case_run: test_case_run::Model) -> AppResult<()> {
        case_run
            .delete(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete case run: {}", e)))?;

        Ok(())
    }
}
