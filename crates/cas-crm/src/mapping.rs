//! Mapping from stored form submissions to Zoho Lead fields.
//!
//! `Lead_Source` is what the provisioned workflows filter on, so every form
//! gets a source containing `Website`, and membership applications add
//! `Membership` (plus `CANN` for CANN applicants).

use serde_json::{Map, Value};

use cas_core::models::{CONTACT_FORM, MEMBERSHIP_FORM, RESOURCES_FORM, STORIES_FORM};

use crate::error::{CrmError, CrmResult};

pub const CAS_MEMBERSHIP_SOURCE: &str = "Website - CAS Membership";
pub const CANN_MEMBERSHIP_SOURCE: &str = "Website - CANN Membership";
pub const CONTACT_SOURCE: &str = "Website - Contact";
pub const STORY_SOURCE: &str = "Website - Patient Story";
pub const RESOURCE_SOURCE: &str = "Website - Resource Submission";

const UNKNOWN_LAST_NAME: &str = "Unknown";
const MAX_DESCRIPTION_LEN: usize = 32_000;

/// Lead source for a submission of `form_name` carrying `data`
pub fn lead_source(form_name: &str, data: &Value) -> String {
    match form_name {
        MEMBERSHIP_FORM => {
            if flag(data, "cannMember") {
                CANN_MEMBERSHIP_SOURCE.to_string()
            } else {
                CAS_MEMBERSHIP_SOURCE.to_string()
            }
        }
        CONTACT_FORM => CONTACT_SOURCE.to_string(),
        STORIES_FORM => STORY_SOURCE.to_string(),
        RESOURCES_FORM => RESOURCE_SOURCE.to_string(),
        other => format!("Website - {}", other),
    }
}

/// Build the Lead record for a submission. The payload must be a JSON object.
pub fn lead_from_submission(form_name: &str, data: &Value) -> CrmResult<Map<String, Value>> {
    let fields = data.as_object().ok_or_else(|| {
        CrmError::InvalidPayload(format!("submission data for `{}` is not an object", form_name))
    })?;

    let mut lead = Map::new();

    let (first_name, last_name) = person_name(fields);
    if let Some(first) = first_name {
        lead.insert("First_Name".to_string(), Value::String(first));
    }
    lead.insert("Last_Name".to_string(), Value::String(last_name));

    if let Some(email) = text(fields, "email").or_else(|| text(fields, "submitterEmail")) {
        lead.insert("Email".to_string(), Value::String(email));
    }
    if let Some(phone) = text(fields, "phone") {
        lead.insert("Phone".to_string(), Value::String(phone));
    }
    if let Some(company) = text(fields, "institution") {
        lead.insert("Company".to_string(), Value::String(company));
    }
    if let Some(discipline) = text(fields, "discipline") {
        lead.insert("Designation".to_string(), Value::String(discipline));
    }
    if form_name == MEMBERSHIP_FORM {
        lead.insert(
            "Email_Opt_Out".to_string(),
            Value::Bool(!flag(data, "newsletterOptIn")),
        );
    }

    if let Some(description) = description(form_name, fields) {
        lead.insert("Description".to_string(), Value::String(description));
    }

    lead.insert(
        "Lead_Source".to_string(),
        Value::String(lead_source(form_name, data)),
    );

    Ok(lead)
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn flag(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Split into (first, last). Falls back to a single `name` field, then `submitterName`.
fn person_name(fields: &Map<String, Value>) -> (Option<String>, String) {
    let first = text(fields, "firstName");
    if let Some(last) = text(fields, "lastName") {
        return (first, last);
    }

    let full = text(fields, "name").or_else(|| text(fields, "submitterName"));
    match full {
        Some(full) => match full.rsplit_once(char::is_whitespace) {
            Some((given, family)) => (
                first.or_else(|| Some(given.trim().to_string())),
                family.to_string(),
            ),
            None => (first, full),
        },
        None => (first, UNKNOWN_LAST_NAME.to_string()),
    }
}

fn description(form_name: &str, fields: &Map<String, Value>) -> Option<String> {
    let mut lines = Vec::new();

    match form_name {
        MEMBERSHIP_FORM => {
            let cas = fields.get("casMember").and_then(Value::as_bool).unwrap_or(false);
            let cann = fields.get("cannMember").and_then(Value::as_bool).unwrap_or(false);
            lines.push(format!("CAS member: {}", yes_no(cas)));
            lines.push(format!("CANN member: {}", yes_no(cann)));
            for (key, label) in [
                ("eventNotifications", "Event notifications"),
                ("researchUpdates", "Research updates"),
            ] {
                let value = fields.get(key).and_then(Value::as_bool).unwrap_or(false);
                lines.push(format!("{}: {}", label, yes_no(value)));
            }
        }
        _ => {
            for key in ["subject", "title", "relationship", "category", "fileName"] {
                if let Some(value) = text(fields, key) {
                    lines.push(format!("{}: {}", key, value));
                }
            }
            for key in ["message", "story", "description"] {
                if let Some(value) = text(fields, key) {
                    lines.push(String::new());
                    lines.push(value);
                }
            }
        }
    }

    if lines.is_empty() {
        return None;
    }

    let mut description = lines.join("\n");
    if description.len() > MAX_DESCRIPTION_LEN {
        let mut cut = MAX_DESCRIPTION_LEN;
        while !description.is_char_boundary(cut) {
            cut -= 1;
        }
        description.truncate(cut);
    }
    Some(description)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
