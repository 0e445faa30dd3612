//! Database repositories for data access layer
//!
//! Each repository is responsible for a specific domain entity and provides
//! CRUD operations and specialized queries.

mod forms;
mod member;
mod resource;
mod session;
mod submission;

pub use forms::FormRepository;
pub use member::{normalize_email, MemberRepository};
pub use resource::ResourceRepository;
pub use session::SessionRepository;
pub use submission::{NewSubmission, SubmissionListQuery, SubmissionRepository};
