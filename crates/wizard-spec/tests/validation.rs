use serde_json::json;

use wizard_spec::{
    Expr, FormSpec, InputKind, InputSpec, NodeSpec, Path, SectionSpec, StepSpec, Validator,
    WizardSession, to_submission, validate,
};

fn path(input: &str) -> Path {
    Path::parse(input).expect("path")
}

fn input(id: &str, bound: &str) -> InputSpec {
    let mut spec = InputSpec::new(id, InputKind::Text);
    spec.path = Some(path(bound));
    spec
}

fn make_simple_form(exclude_hidden: bool) -> FormSpec {
    let mut git = input("git-url", "spec.git.url");
    git.required = true;
    git.validators = vec![Validator::WebUrl];
    git.hidden = Some(Expr::not_equals(path("spec.type"), "git"));

    let mut helm = input("helm-chart", "spec.helm.chart");
    helm.hidden = Some(Expr::not_equals(path("spec.type"), "helm"));

    let mut kind = InputSpec::new("type", InputKind::Radio);
    kind.path = Some(path("spec.type"));
    kind.required = true;

    let mut name = input("name", "metadata.name");
    name.required = true;
    name.validators = vec![Validator::KubernetesName];

    FormSpec {
        id: "application".into(),
        title: "Application".into(),
        version: "1.0.0".into(),
        description: None,
        default_data: Some(json!({ "metadata": { "name": "" }, "spec": { "type": "git" } })),
        submit_label: None,
        steps: vec![
            StepSpec {
                id: "details".into(),
                label: "Details".into(),
                hidden: None,
                sections: vec![SectionSpec {
                    id: "general".into(),
                    label: "General".into(),
                    description: None,
                    hidden: None,
                    exclude_hidden: false,
                    children: vec![NodeSpec::Input(name), NodeSpec::Input(kind)],
                }],
            },
            StepSpec {
                id: "source".into(),
                label: "Source".into(),
                hidden: None,
                sections: vec![SectionSpec {
                    id: "repository".into(),
                    label: "Repository".into(),
                    description: None,
                    hidden: None,
                    exclude_hidden,
                    children: vec![NodeSpec::Input(git), NodeSpec::Input(helm)],
                }],
            },
        ],
    }
}

#[test]
fn visible_required_input_blocks_submission() {
    let spec = make_simple_form(false);
    let document = json!({ "metadata": { "name": "app" }, "spec": { "type": "git" } });
    let result = validate(&spec, &document);
    assert!(!result.can_submit());
    assert_eq!(result.missing_required, vec!["git-url".to_string()]);
    assert!(result.step_has_error("source"));
    assert!(!result.step_has_error("details"));
}

#[test]
fn hiding_required_input_unblocks_submission() {
    let spec = make_simple_form(false);
    let document = json!({ "metadata": { "name": "app" }, "spec": { "type": "helm" } });
    let result = validate(&spec, &document);
    assert!(result.can_submit(), "{result:?}");
}

#[test]
fn validators_report_messages() {
    let spec = make_simple_form(false);
    let document = json!({
        "metadata": { "name": "App" },
        "spec": { "type": "git", "git": { "url": "not a url" } }
    });
    let result = validate(&spec, &document);
    let messages: Vec<_> = result
        .errors
        .iter()
        .map(|error| (error.key.as_str(), error.message.as_str()))
        .collect();
    assert_eq!(
        messages,
        vec![
            (
                "name",
                "This value can only contain lowercase alphanumeric characters or '-' or '.'"
            ),
            ("git-url", "The URL is not valid.")
        ]
    );
    assert_eq!(result.message_for("git-url"), Some("The URL is not valid."));
}

#[test]
fn hidden_values_are_kept_unless_section_excludes_them() {
    let document = json!({
        "metadata": { "name": "app" },
        "spec": {
            "type": "helm",
            "git": { "url": "https://github.com/a/b" },
            "helm": { "chart": "nginx" }
        }
    });

    let kept = to_submission(&make_simple_form(false), &document);
    assert_eq!(kept, document);

    let stripped = to_submission(&make_simple_form(true), &document);
    assert_eq!(
        stripped,
        json!({
            "metadata": { "name": "app" },
            "spec": { "type": "helm", "git": {}, "helm": { "chart": "nginx" } }
        })
    );
}

#[test]
fn session_blocks_next_until_required_inputs_are_filled() {
    let mut session = WizardSession::new(make_simple_form(false));
    assert!(session.next_step().is_err());
    assert!(session.shows_validation("details"));

    session
        .set_value(&path("metadata.name"), json!("app"))
        .expect("name");
    session.next_step().expect("to source");
    assert!(session.next_step().is_err());

    session
        .set_value(&path("spec.type"), json!("helm"))
        .expect("type");
    session.next_step().expect("to review");
    let result = session.submit(|document| {
        assert_eq!(document["spec"]["type"], "helm");
        Ok::<(), String>(())
    });
    assert!(result.is_ok());
}
