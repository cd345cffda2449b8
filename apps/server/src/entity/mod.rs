//! SeaORM entity definitions for PostgreSQL database.

pub mod build;
pub mod case_run_status;
pub mod link_reference;
pub mod tag;
pub mod test_case;
pub mod test_case_bug;
pub mod test_case_run;
pub mod test_case_text;
pub mod test_plan;
pub mod test_run;
pub mod test_run_cc;
pub mod test_run_tag;
pub mod user;
