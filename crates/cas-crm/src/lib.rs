//! Zoho CRM integration.
//!
//! [`ZohoClient`] talks to the CRM REST API (v8). [`mapping`] turns a stored
//! form submission into Lead fields and [`workflows`] provisions the three
//! notification workflows keyed on `Lead_Source`.

pub mod client;
pub mod error;
pub mod mapping;
pub mod token;
pub mod workflows;

pub use client::ZohoClient;
pub use error::{CrmError, CrmResult};
pub use mapping::{lead_from_submission, lead_source};
pub use token::{AccessTokenProvider, StaticTokenProvider};
pub use workflows::{
    default_workflows, provision_workflows, CreatedWorkflow, LeadSourceCondition,
    ProvisioningResult, WorkflowConfig, WorkflowError,
};

/// Service name used in logs and error responses
pub const SERVICE_NAME: &str = "Zoho CRM";
