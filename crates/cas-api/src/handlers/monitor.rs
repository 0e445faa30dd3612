use crate::auth::models::MemberContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::{DbState, SubmissionState};
use axum::{extract::State, Json};
use cas_core::models::SubmissionStats;

#[utoipa::path(
    get,
    path = "/api/monitor/stats",
    tag = "monitor",
    responses(
        (status = 200, description = "Submission outbox statistics", body = SubmissionStats),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_stats(
    State(db): State<DbState>,
    State(submissions): State<SubmissionState>,
    member_ctx: MemberContext,
) -> Result<Json<SubmissionStats>, HttpAppError> {
    member_ctx.require_admin()?;

    let mut stats = db.submission_repository.get_stats().await?;
    stats.max_retries = submissions.max_retries;
    stats.in_flight = submissions.queue.in_flight();

    Ok(Json(stats))
}
