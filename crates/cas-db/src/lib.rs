//! CAS database layer
//!
//! Postgres repositories for members, sessions, intake forms, resources and
//! the submission outbox.

pub mod db;

pub use db::{
    normalize_email, FormRepository, MemberRepository, NewSubmission, ResourceRepository, SessionRepository,
    SubmissionListQuery, SubmissionRepository,
};
