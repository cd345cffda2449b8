//! Database queries for test runs, their tags and CC lists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseBackend, EntityTrait, FromQueryResult,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};

use crate::entity::test_run::{self, ActiveModel, Entity as TestRun};
use crate::entity::{
    build, link_reference, tag, test_case_bug, test_case_run, test_plan, test_run_cc,
    test_run_tag, user,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AutomationCounts, CreateRunRequest, PeopleRole, PlanRef, RunFilter, RunSort, RunSortField,
    RunStatus, StatusTally,
};
use crate::services::RunStore;

use super::DbPool;

/// Escape LIKE wildcards and wrap the text for a contains match.
fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Translate one list filter into a condition on `test_runs`.
fn filter_condition(filter: &RunFilter) -> Condition {
    match filter {
        RunFilter::Search(text) => {
            let pattern = contains_pattern(text);
            Condition::any()
                .add(Expr::cust_with_values(
                    "CAST(test_runs.id AS TEXT) ILIKE $1",
                    [pattern.clone()],
                ))
                .add(Expr::cust_with_values("test_runs.summary ILIKE $1", [pattern]))
        }
        RunFilter::Summary(text) => Condition::all().add(Expr::cust_with_values(
            "test_runs.summary ILIKE $1",
            [contains_pattern(text)],
        )),
        RunFilter::Product(product_id) => Condition::all().add(
            test_run::Column::BuildId.in_subquery(
                Query::select()
                    .column(build::Column::Id)
                    .from(build::Entity)
                    .and_where(build::Column::ProductId.eq(*product_id))
                    .to_owned(),
            ),
        ),
        RunFilter::ProductVersion(version_id) => {
            Condition::all().add(test_run::Column::ProductVersionId.eq(*version_id))
        }
        RunFilter::Plan(PlanRef::Id(plan_id)) => {
            Condition::all().add(test_run::Column::PlanId.eq(*plan_id))
        }
        RunFilter::Plan(PlanRef::Name(name)) => Condition::all().add(
            test_run::Column::PlanId.in_subquery(
                Query::select()
                    .column(test_plan::Column::Id)
                    .from(test_plan::Entity)
                    .and_where(Expr::cust_with_values(
                        "test_plans.name ILIKE $1",
                        [contains_pattern(name)],
                    ))
                    .to_owned(),
            ),
        ),
        RunFilter::Build(build_id) => Condition::all().add(test_run::Column::BuildId.eq(*build_id)),
        RunFilter::PeopleId(user_id)
        | RunFilter::People {
            user_id,
            role: PeopleRole::Either,
        } => Condition::any()
            .add(test_run::Column::ManagerId.eq(*user_id))
            .add(test_run::Column::DefaultTesterId.eq(*user_id)),
        RunFilter::People {
            user_id,
            role: PeopleRole::Manager,
        }
        | RunFilter::Manager(user_id) => {
            Condition::all().add(test_run::Column::ManagerId.eq(*user_id))
        }
        RunFilter::People {
            user_id,
            role: PeopleRole::DefaultTester,
        }
        | RunFilter::DefaultTester(user_id) => {
            Condition::all().add(test_run::Column::DefaultTesterId.eq(*user_id))
        }
        RunFilter::Tags(names) => Condition::all().add(
            test_run::Column::Id.in_subquery(
                Query::select()
                    .column(test_run_tag::Column::RunId)
                    .from(test_run_tag::Entity)
                    .and_where(
                        test_run_tag::Column::TagId.in_subquery(
                            Query::select()
                                .column(tag::Column::Id)
                                .from(tag::Entity)
                                .and_where(tag::Column::Name.is_in(names.clone()))
                                .to_owned(),
                        ),
                    )
                    .to_owned(),
            ),
        ),
        RunFilter::CaseRunAssignee(user_id) => Condition::all().add(
            test_run::Column::Id.in_subquery(
                Query::select()
                    .column(test_case_run::Column::RunId)
                    .from(test_case_run::Entity)
                    .and_where(test_case_run::Column::AssigneeId.eq(*user_id))
                    .to_owned(),
            ),
        ),
        RunFilter::Status(RunStatus::Running) => {
            Condition::all().add(test_run::Column::StopDate.is_null())
        }
        RunFilter::Status(RunStatus::Finished) => {
            Condition::all().add(test_run::Column::StopDate.is_not_null())
        }
    }
}

fn sort_column(field: RunSortField) -> test_run::Column {
    match field {
        RunSortField::Id => test_run::Column::Id,
        RunSortField::Summary => test_run::Column::Summary,
        RunSortField::StartDate => test_run::Column::StartDate,
        RunSortField::StopDate => test_run::Column::StopDate,
        RunSortField::Manager => test_run::Column::ManagerId,
        RunSortField::DefaultTester => test_run::Column::DefaultTesterId,
        RunSortField::Build => test_run::Column::BuildId,
        RunSortField::Plan => test_run::Column::PlanId,
    }
}

impl DbPool {
    /// Insert a run from a cleaned create request.
    pub async fn insert_run(&self, request: &CreateRunRequest) -> AppResult<test_run::Model> {
        let model = ActiveModel {
            summary: Set(request.summary.clone()),
            notes: Set(request.notes.clone()),
            plan_id: Set(request.plan_id),
            plan_text_version: Set(request.plan_text_version),
            product_version_id: Set(request.product_version_id),
            build_id: Set(request.build_id),
            manager_id: Set(request.manager_id),
            default_tester_id: Set(request.default_tester_id),
            environment_id: Set(request.environment_id),
            estimated_time_secs: Set(request.estimated_time_secs),
            auto_update_run_status: Set(request.auto_update_run_status),
            start_date: Set(Utc::now()),
            stop_date: Set(None),
            ..Default::default()
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert test run: {}", e)))?;

        Ok(result)
    }

    /// Get a run by ID.
    pub async fn get_run_by_id(&self, id: i32) -> AppResult<Option<test_run::Model>> {
        let result = TestRun::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test run: {}", e)))?;

        Ok(result)
    }

    /// Get a run by ID, failing with NotFound.
    pub async fn require_run(&self, id: i32) -> AppResult<test_run::Model> {
        self.get_run_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test run {}", id)))
    }

    /// List runs matching every filter.
    pub async fn list_runs(
        &self,
        filters: &[RunFilter],
        sort: Option<RunSort>,
        limit: i32,
        offset: i32,
    ) -> AppResult<(Vec<test_run::Model>, u64)> {
        let mut select = TestRun::find();
        for filter in filters {
            select = select.filter(filter_condition(filter));
        }

        // Count total before pagination
        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count test runs: {}", e)))?;

        select = match sort {
            Some(sort) => {
                let order = if sort.descending { Order::Desc } else { Order::Asc };
                select
                    .order_by(sort_column(sort.field), order)
                    .order_by_asc(test_run::Column::Id)
            }
            None => select.order_by_asc(test_run::Column::Id),
        };

        let limit = limit.clamp(1, 100) as u64;
        let offset = offset.max(0) as u64;

        let runs = select
            .offset(offset)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list test runs: {}", e)))?;

        Ok((runs, total))
    }

    /// Whether the user manages the run or authored its plan.
    pub async fn run_belongs_to(&self, run_id: i32, user_id: i32) -> AppResult<bool> {
        let run = self.require_run(run_id).await?;
        if run.manager_id == user_id {
            return Ok(true);
        }

        let plan = test_plan::Entity::find_by_id(run.plan_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test plan: {}", e)))?;

        Ok(plan.is_some_and(|p| p.author_id == user_id))
    }

    /// Distinct bug ids recorded against the run's case runs.
    pub async fn count_run_bugs(&self, run_id: i32) -> AppResult<u64> {
        #[derive(Debug, FromQueryResult)]
        struct CountResult {
            count: i64,
        }

        let result = CountResult::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT COUNT(DISTINCT b.bug_id) AS count
            FROM test_case_bugs b
            JOIN test_case_runs cr ON cr.id = b.case_run_id
            WHERE cr.run_id = $1
            "#,
            [run_id.into()],
        ))
        .one(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to count run bugs: {}", e)))?;

        Ok(result.map(|r| r.count.max(0) as u64).unwrap_or(0))
    }

    /// Split the run's case runs by the automation flag of their case.
    pub async fn count_run_automation(&self, run_id: i32) -> AppResult<AutomationCounts> {
        #[derive(Debug, FromQueryResult)]
        struct AutomationResult {
            automated: i64,
            manual: i64,
            total: i64,
        }

        let result = AutomationResult::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT
                COUNT(*) FILTER (WHERE c.is_automated = 1) AS automated,
                COUNT(*) FILTER (WHERE c.is_automated = 0) AS manual,
                COUNT(*) AS total
            FROM test_case_runs cr
            JOIN test_cases c ON c.id = cr.case_id
            WHERE cr.run_id = $1
            "#,
            [run_id.into()],
        ))
        .one(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to count run automation: {}", e)))?;

        Ok(result
            .map(|r| AutomationCounts {
                automated: r.automated.max(0) as u64,
                manual: r.manual.max(0) as u64,
                both: (r.total - r.automated - r.manual).max(0) as u64,
            })
            .unwrap_or_default())
    }

    /// Tag names of a run, sorted.
    pub async fn list_run_tags(&self, run_id: i32) -> AppResult<Vec<String>> {
        let tags = tag::Entity::find()
            .filter(
                tag::Column::Id.in_subquery(
                    Query::select()
                        .column(test_run_tag::Column::TagId)
                        .from(test_run_tag::Entity)
                        .and_where(test_run_tag::Column::RunId.eq(run_id))
                        .to_owned(),
                ),
            )
            .order_by_asc(tag::Column::Name)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list run tags: {}", e)))?;

        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    /// Tag a run, creating the tag if needed. Adding an existing tag is a no-op.
    pub async fn add_run_tag(&self, run_id: i32, name: &str, user_id: i32) -> AppResult<()> {
        let existing = tag::Entity::find()
            .filter(tag::Column::Name.eq(name))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get tag: {}", e)))?;

        let tag = match existing {
            Some(tag) => tag,
            None => tag::ActiveModel {
                name: Set(name.to_string()),
                ..Default::default()
            }
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert tag: {}", e)))?,
        };

        let linked = test_run_tag::Entity::find()
            .filter(test_run_tag::Column::RunId.eq(run_id))
            .filter(test_run_tag::Column::TagId.eq(tag.id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get run tag: {}", e)))?;

        if linked.is_none() {
            test_run_tag::ActiveModel {
                run_id: Set(run_id),
                tag_id: Set(tag.id),
                user_id: Set(user_id),
                ..Default::default()
            }
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert run tag: {}", e)))?;
        }

        Ok(())
    }

    /// Remove a tag from a run. Returns the number of removed associations.
    pub async fn remove_run_tag(&self, run_id: i32, name: &str) -> AppResult<u64> {
        let result = test_run_tag::Entity::delete_many()
            .filter(test_run_tag::Column::RunId.eq(run_id))
            .filter(
                test_run_tag::Column::TagId.in_subquery(
                    Query::select()
                        .column(tag::Column::Id)
                        .from(tag::Entity)
                        .and_where(tag::Column::Name.eq(name))
                        .to_owned(),
                ),
            )
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to remove run tag: {}", e)))?;

        Ok(result.rows_affected)
    }

    /// CC recipient user ids of a run, sorted.
    pub async fn list_run_cc(&self, run_id: i32) -> AppResult<Vec<i32>> {
        let rows = test_run_cc::Entity::find()
            .filter(test_run_cc::Column::RunId.eq(run_id))
            .order_by_asc(test_run_cc::Column::UserId)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list run CC: {}", e)))?;

        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }

    /// Add a user to the CC list. Adding an existing recipient is a no-op.
    pub async fn add_run_cc(&self, run_id: i32, user_id: i32) -> AppResult<()> {
        user::Entity::find_by_id(user_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        let existing = test_run_cc::Entity::find()
            .filter(test_run_cc::Column::RunId.eq(run_id))
            .filter(test_run_cc::Column::UserId.eq(user_id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get run CC: {}", e)))?;

        if existing.is_none() {
            test_run_cc::ActiveModel {
                run_id: Set(run_id),
                user_id: Set(user_id),
                ..Default::default()
            }
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert run CC: {}", e)))?;
        }

        Ok(())
    }

    pub async fn remove_run_cc(&self, run_id: i32, user_id: i32) -> AppResult<u64> {
        let result = test_run_cc::Entity::delete_many()
            .filter(test_run_cc::Column::RunId.eq(run_id))
            .filter(test_run_cc::Column::UserId.eq(user_id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to remove run CC: {}", e)))?;

        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RunStore for DbPool {
    async fn find_run(&self, run_id: i32) -> AppResult<Option<test_run::Model>> {
        self.get_run_by_id(run_id).await
    }

    async fn count_case_runs_by_status(&self, run_id: i32) -> AppResult<Vec<StatusTally>> {
        #[derive(Debug, FromQueryResult)]
        struct TallyResult {
            status_id: i32,
            count: i64,
        }

        let rows = TallyResult::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT case_run_status_id AS status_id, COUNT(*) AS count
            FROM test_case_runs
            WHERE run_id = $1
            GROUP BY case_run_status_id
            "#,
            [run_id.into()],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to count case runs by status: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|r| StatusTally {
                status_id: r.status_id,
                count: r.count.max(0) as u64,
            })
            .collect())
    }

    async fn set_run_stop_date(
        &self,
        run_id: i32,
        stop_date: Option<DateTime<Utc>>,
    ) -> AppResult<test_run::Model> {
        let run = self.require_run(run_id).await?;

        let mut active: ActiveModel = run.into();
        active.stop_date = Set(stop_date);

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update run stop date: {}", e)))?;

        Ok(result)
    }

    async fn run_recipient_emails(&self, run_id: i32) -> AppResult<Vec<String>> {
        #[derive(Debug, FromQueryResult)]
        struct EmailResult {
            email: String,
        }

        let rows = EmailResult::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            r#"
            SELECT u.email FROM users u JOIN test_runs r ON u.id = r.manager_id WHERE r.id = $1
            UNION
            SELECT u.email FROM users u JOIN test_run_cc c ON u.id = c.user_id WHERE c.run_id = $1
            UNION
            SELECT u.email FROM users u JOIN test_runs r ON u.id = r.default_tester_id WHERE r.id = $1
            UNION
            SELECT u.email FROM users u JOIN test_case_runs cr ON u.id = cr.assignee_id WHERE cr.run_id = $1
            "#,
            [run_id.into()],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get run recipients: {}", e)))?;

        Ok(rows.into_iter().map(|r| r.email).collect())
    }

    async fn remove_case_run_attachments(&self, case_run_id: i32) -> AppResult<u64> {
        let links = link_reference::Entity::delete_many()
            .filter(link_reference::Column::CaseRunId.eq(case_run_id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to remove link references: {}", e)))?;

        let bugs = test_case_bug::Entity::delete_many()
            .filter(test_case_bug::Column::CaseRunId.eq(case_run_id))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to remove case run bugs: {}", e)))?;

        Ok(links.rows_affected + bugs.rows_affected)
    }
}
