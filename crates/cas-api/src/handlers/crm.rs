//! CRM workflow provisioning

use crate::auth::models::MemberContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::CrmState;
use axum::{extract::State, http::StatusCode, Json};
use cas_crm::{provision_workflows, ProvisioningResult};

#[utoipa::path(
    post,
    path = "/api/admin/crm/workflows",
    tag = "crm",
    responses(
        (status = 200, description = "Every workflow was created", body = ProvisioningResult),
        (status = 207, description = "Some workflows failed; see errors", body = ProvisioningResult),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 502, description = "CRM token missing or current user unavailable", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(crm, member_ctx), fields(admin_id = %member_ctx.member_id()))]
pub async fn provision_crm_workflows(
    State(crm): State<CrmState>,
    member_ctx: MemberContext,
) -> Result<(StatusCode, Json<ProvisioningResult>), HttpAppError> {
    member_ctx.require_admin()?;

    let result =
        provision_workflows(&crm.client, crm.token_provider.as_ref(), &crm.workflows).await?;

    let status = if result.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    Ok((status, Json(result)))
}
