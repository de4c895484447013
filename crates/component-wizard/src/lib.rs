use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use wizard_spec::{
    FormSpec, Path, PathError, ReviewError, ReviewPayload, SessionError, VisibilityMode,
    WizardSession, build_review, form_schema, render_review_json as wizard_render_review_json,
    render_review_text as wizard_render_review_text, resolve_visibility, to_display_text,
    to_submission, validate,
};

const DEFAULT_SPEC: &str = include_str!("../../wizard-spec/tests/fixtures/policy_automation.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse document: {0}")]
    DocumentParse(#[source] serde_json::Error),
    #[error("form '{0}' is not available")]
    FormUnavailable(String),
    #[error("unknown visibility mode '{0}'")]
    UnknownMode(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Review(#[from] ReviewError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
}

fn load_form_spec(config_json: &str) -> Result<FormSpec, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.form_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);

    serde_json::from_str(spec_json).map_err(ComponentError::ConfigParse)
}

fn ensure_form(form_id: &str, config_json: &str) -> Result<FormSpec, ComponentError> {
    let spec = load_form_spec(config_json)?;
    if spec.id != form_id {
        Err(ComponentError::FormUnavailable(form_id.to_string()))
    } else {
        Ok(spec)
    }
}

/// Blank input means "start from the form's default data".
fn parse_document(spec: &FormSpec, document_json: &str) -> Result<Value, ComponentError> {
    if document_json.trim().is_empty() {
        return Ok(spec
            .default_data
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default())));
    }
    serde_json::from_str(document_json).map_err(ComponentError::DocumentParse)
}

fn parse_mode(mode: &str) -> Result<VisibilityMode, ComponentError> {
    match mode {
        "" | "edit" => Ok(VisibilityMode::Edit),
        "review" => Ok(VisibilityMode::Review),
        other => Err(ComponentError::UnknownMode(other.to_string())),
    }
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

pub fn describe(form_id: &str, config_json: &str) -> String {
    debug!(form_id, "describe");
    respond(
        ensure_form(form_id, config_json)
            .and_then(|spec| serde_json::to_value(spec).map_err(ComponentError::JsonEncode)),
    )
}

pub fn get_form_schema() -> String {
    respond(Ok(form_schema()))
}

pub fn get_visibility(form_id: &str, config_json: &str, document_json: &str, mode: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let mode = parse_mode(mode)?;
        let document = parse_document(&spec, document_json)?;
        let map = resolve_visibility(&spec, &document, mode);
        serde_json::to_value(map).map_err(ComponentError::JsonEncode)
    }))
}

pub fn validate_document(form_id: &str, config_json: &str, document_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let document = parse_document(&spec, document_json)?;
        serde_json::to_value(validate(&spec, &document)).map_err(ComponentError::JsonEncode)
    }))
}

fn open_session(
    form_id: &str,
    config_json: &str,
    document_json: &str,
) -> Result<WizardSession, ComponentError> {
    let spec = ensure_form(form_id, config_json)?;
    let document = parse_document(&spec, document_json)?;
    Ok(WizardSession::with_document(spec, document))
}

/// Document plus everything a host needs to redraw after an edit.
fn session_response(
    session: &WizardSession,
    extra: Option<(&str, Value)>,
) -> Result<Value, ComponentError> {
    let validation = serde_json::to_value(session.validate()).map_err(ComponentError::JsonEncode)?;
    let mut response = json!({
        "document": session.item(),
        "visibility": session.visibility_map(),
        "validation": validation,
    });
    if let Some((key, value)) = extra
        && let Some(map) = response.as_object_mut()
    {
        map.insert(key.to_string(), value);
    }
    Ok(response)
}

pub fn set_value(
    form_id: &str,
    config_json: &str,
    document_json: &str,
    path: &str,
    value_json: &str,
) -> String {
    debug!(form_id, path, "set_value");
    respond(open_session(form_id, config_json, document_json).and_then(|mut session| {
        let path = Path::parse(path)?;
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::DocumentParse)?;
        session.set_value(&path, value)?;
        session_response(&session, None)
    }))
}

pub fn array_add(form_id: &str, config_json: &str, document_json: &str, array_id: &str) -> String {
    debug!(form_id, array_id, "array_add");
    respond(open_session(form_id, config_json, document_json).and_then(|mut session| {
        let index = session.array_add(array_id)?;
        session_response(&session, Some(("index", json!(index))))
    }))
}

pub fn array_remove(
    form_id: &str,
    config_json: &str,
    document_json: &str,
    array_id: &str,
    index: usize,
) -> String {
    debug!(form_id, array_id, index, "array_remove");
    respond(open_session(form_id, config_json, document_json).and_then(|mut session| {
        let removed = session.array_remove(array_id, index)?;
        session_response(&session, Some(("removed", removed)))
    }))
}

pub fn array_move(
    form_id: &str,
    config_json: &str,
    document_json: &str,
    array_id: &str,
    from: usize,
    to: usize,
) -> String {
    debug!(form_id, array_id, from, to, "array_move");
    respond(open_session(form_id, config_json, document_json).and_then(|mut session| {
        session.array_move(array_id, from, to)?;
        session_response(&session, None)
    }))
}

fn review_payload(
    form_id: &str,
    config_json: &str,
    document_json: &str,
) -> Result<ReviewPayload, ComponentError> {
    let spec = ensure_form(form_id, config_json)?;
    let document = parse_document(&spec, document_json)?;
    Ok(build_review(&spec, &document)?)
}

pub fn render_review_text(form_id: &str, config_json: &str, document_json: &str) -> String {
    respond_string(
        review_payload(form_id, config_json, document_json)
            .map(|payload| wizard_render_review_text(&payload)),
    )
}

pub fn render_review_json(form_id: &str, config_json: &str, document_json: &str) -> String {
    respond(
        review_payload(form_id, config_json, document_json)
            .map(|payload| wizard_render_review_json(&payload)),
    )
}

/// YAML of the document as the review step shows it.
pub fn render_yaml(form_id: &str, config_json: &str, document_json: &str) -> String {
    respond_string(ensure_form(form_id, config_json).and_then(|spec| {
        let document = parse_document(&spec, document_json)?;
        Ok(to_display_text(&document)?)
    }))
}

/// The document that would be submitted, with validation results.
pub fn submission(form_id: &str, config_json: &str, document_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let document = parse_document(&spec, document_json)?;
        let validation = validate(&spec, &document);
        let status = if validation.valid { "complete" } else { "error" };
        let validation = serde_json::to_value(validation).map_err(ComponentError::JsonEncode)?;
        Ok(json!({
            "status": status,
            "document": to_submission(&spec, &document),
            "validation": validation,
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FORM: &str = "policy-automation";

    fn filled() -> String {
        json!({
            "metadata": { "name": "my-policy-policy-automation", "namespace": "my-namespace" },
            "spec": {
                "policyRef": "my-policy",
                "mode": "disabled",
                "automationDef": {
                    "name": "job1",
                    "secret": "my-ansible-creds",
                    "type": "AnsibleJob",
                    "extra_vars": { "abc": "123" }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn describe_returns_spec_json() {
        let payload = describe(FORM, "");
        let spec: Value = serde_json::from_str(&payload).expect("valid json");
        assert_eq!(spec["id"], FORM);
        assert_eq!(spec["steps"][0]["id"], "automation-step");
    }

    #[test]
    fn describe_rejects_unknown_form() {
        let payload = describe("other", "");
        let parsed: Value = serde_json::from_str(&payload).expect("json");
        assert_eq!(parsed["error"], "form 'other' is not available");
    }

    #[test]
    fn form_schema_describes_steps() {
        let schema: Value = serde_json::from_str(&get_form_schema()).expect("json");
        assert!(schema["properties"]["steps"].is_object());
    }

    #[test]
    fn visibility_of_default_document() {
        let response = get_visibility(FORM, "", "", "edit");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["secret"], true);
        assert_eq!(parsed["job"], false);
    }

    #[test]
    fn review_visibility_hides_empty_inputs() {
        let response = get_visibility(FORM, "", &filled(), "review");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["mode"], true);
        assert_eq!(parsed["rerun"], false);

        let response = get_visibility(FORM, "", "", "sideways");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["error"], "unknown visibility mode 'sideways'");
    }

    #[test]
    fn validate_document_reports_missing_credential() {
        let result = validate_document(FORM, "", "");
        let parsed: Value = serde_json::from_str(&result).expect("json");
        assert_eq!(parsed["valid"], false);
        assert_eq!(parsed["missing_required"][0], "secret");
    }

    #[test]
    fn set_value_runs_change_effects() {
        let response = set_value(
            FORM,
            "",
            &filled(),
            "spec.automationDef.secret",
            r#""other-creds""#,
        );
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["document"]["spec"]["automationDef"]["name"], "");
        assert_eq!(parsed["visibility"]["mode"], false);
        assert_eq!(parsed["validation"]["missing_required"][0], "job");
    }

    #[test]
    fn set_value_reports_bad_path() {
        let response = set_value(FORM, "", "", "spec..mode", r#""once""#);
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert!(parsed["error"].as_str().is_some_and(|error| error.contains("spec..mode")));
    }

    #[test]
    fn array_operations_round_through_documents() {
        let spec = json!({
            "id": "hooks",
            "title": "Hooks",
            "version": "1.0",
            "steps": [{
                "id": "hooks",
                "sections": [{
                    "id": "hook-list",
                    "children": [{
                        "node": "array",
                        "id": "pre",
                        "path": "spec.hooks.pre",
                        "new_value": { "name": "" },
                        "sortable": true,
                        "children": [{ "node": "input", "id": "name" }]
                    }, {
                        "node": "array",
                        "id": "post",
                        "path": "spec.hooks.post",
                        "children": [{ "node": "input", "id": "name" }]
                    }]
                }]
            }]
        });
        let config = json!({ "form_spec_json": spec.to_string() }).to_string();

        let added: Value =
            serde_json::from_str(&array_add("hooks", &config, "{}", "pre")).expect("json");
        assert_eq!(added["index"], 0);
        assert_eq!(added["document"], json!({ "spec": { "hooks": { "pre": [{ "name": "" }] } } }));

        let document = json!({ "spec": { "hooks": { "pre": [{ "name": "a" }, { "name": "b" }] } } })
            .to_string();
        let moved: Value =
            serde_json::from_str(&array_move("hooks", &config, &document, "pre", 1, 0))
                .expect("json");
        assert_eq!(moved["document"]["spec"]["hooks"]["pre"][0]["name"], "b");

        let removed: Value =
            serde_json::from_str(&array_remove("hooks", &config, &document, "pre", 5))
                .expect("json");
        assert!(removed["error"].as_str().is_some_and(|error| error.contains("out of range")));

        let document = json!({
            "spec": { "hooks": { "post": [{ "name": "a" }, { "name": "b" }] } }
        })
        .to_string();
        let refused: Value =
            serde_json::from_str(&array_move("hooks", &config, &document, "post", 1, 0))
                .expect("json");
        assert_eq!(refused["error"], "array input 'post' is not sortable");
    }

    #[test]
    fn set_value_rejects_huge_index_without_panicking() {
        let response = set_value(FORM, "", "", "spec.hooks[18446744073709551615]", "1");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        let error = parsed["error"].as_str().expect("error message");
        assert!(error.contains("too far past the end"));
    }

    #[test]
    fn review_text_outputs_summary() {
        let output = render_review_text(FORM, "", &filled());
        assert!(output.contains("Review: Create policy automation"));
        assert!(output.contains("Schedule: Disabled"));
    }

    #[test]
    fn review_json_outputs_steps() {
        let output = render_review_json(FORM, "", &filled());
        let parsed: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(parsed["form_id"], FORM);
        assert_eq!(parsed["steps"][0]["items"][0]["kind"], "section");
    }

    #[test]
    fn yaml_is_plain_text() {
        let output = render_yaml(FORM, "", &filled());
        assert!(output.starts_with("metadata:\n  name: my-policy-policy-automation\n"));
    }

    #[test]
    fn submission_of_complete_document() {
        let output = submission(FORM, "", &filled());
        let parsed: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(parsed["status"], "complete");
        assert_eq!(parsed["document"]["spec"]["mode"], "disabled");
    }

    #[test]
    fn malformed_document_is_an_error() {
        let output = submission(FORM, "", "{not json");
        let parsed: Value = serde_json::from_str(&output).expect("json");
        let error = parsed["error"].as_str().expect("error message");
        assert!(error.starts_with("failed to parse document"));
    }
}
