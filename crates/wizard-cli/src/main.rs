mod presenter;

use clap::{Parser, Subcommand, ValueEnum};
use component_wizard::{
    get_visibility, render_review_json, render_review_text, render_yaml, set_value, submission,
};
use presenter::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};
use serde_json::{Map, Number, Value, json};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wizard_spec::{
    Cursor, FormSpec, InputKind, InputSpec, SessionError, StepSpec, ValidationResult,
    WizardSession, display_value, form_schema, is_missing_or_empty,
    render_review_text as review_text, to_display_text, validate,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form wizard CLI",
    long_about = "Reviews, validates and edits documents against a form wizard spec"
)]
struct Cli {
    /// Log at debug level (overridden by FORM_WIZARD_LOG).
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ReviewFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum VisibilityArg {
    Edit,
    Review,
}

impl VisibilityArg {
    fn as_str(&self) -> &'static str {
        match self {
            VisibilityArg::Edit => "edit",
            VisibilityArg::Review => "review",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the review summary of a document.
    Review {
        /// Path to the FormSpec JSON describing the wizard.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Document JSON; the form spec's default data when omitted.
        #[arg(long, value_name = "DOCUMENT")]
        document: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ReviewFormat::Text)]
        format: ReviewFormat,
    },
    /// Print a document as YAML, one block per resource.
    Yaml {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DOCUMENT")]
        document: Option<PathBuf>,
        /// Print the submission (hidden values excluded where configured) instead.
        #[arg(long)]
        submission: bool,
    },
    /// Validate a document against a FormSpec.
    Validate {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DOCUMENT")]
        document: PathBuf,
    },
    /// Set one value (running its change effects) and print the updated document.
    Set {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DOCUMENT")]
        document: Option<PathBuf>,
        /// Dotted path; escape literal dots with a backslash.
        #[arg(long)]
        path: String,
        /// JSON value; bare words are taken as strings.
        #[arg(long)]
        value: String,
        /// Write the document here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print which steps, sections and inputs are shown.
    Visibility {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DOCUMENT")]
        document: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = VisibilityArg::Edit)]
        mode: VisibilityArg,
    },
    /// Walk the wizard steps in a text shell and print the submitted document.
    Walk {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DOCUMENT")]
        document: Option<PathBuf>,
        /// Write the submitted document here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the JSON Schema of FormSpec documents.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Review {
            spec,
            document,
            format,
        } => run_review(spec, document, format),
        Command::Yaml {
            spec,
            document,
            submission,
        } => run_yaml(spec, document, submission),
        Command::Validate { spec, document } => run_validate(spec, document),
        Command::Set {
            spec,
            document,
            path,
            value,
            out,
        } => run_set(spec, document, &path, &value, out),
        Command::Visibility {
            spec,
            document,
            mode,
        } => run_visibility(spec, document, mode),
        Command::Walk {
            spec,
            document,
            out,
        } => run_walk(spec, document, cli.verbose, out),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&form_schema())?);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("FORM_WIZARD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let log_json = env::var("FORM_WIZARD_LOG_JSON").is_ok_and(|value| value == "1");
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// Spec text, its id and the component config wrapping it.
struct LoadedSpec {
    form_id: String,
    config_json: String,
}

fn load_spec(spec_path: &PathBuf) -> CliResult<LoadedSpec> {
    let spec_str = fs::read_to_string(spec_path)?;
    let spec_value: Value = serde_json::from_str(&spec_str)?;
    let form_id = spec_value
        .get("id")
        .and_then(Value::as_str)
        .ok_or("form spec is missing an id")?
        .to_string();
    debug!(form_id, spec = %spec_path.display(), "loaded form spec");
    Ok(LoadedSpec {
        form_id,
        config_json: json!({ "form_spec_json": spec_str }).to_string(),
    })
}

fn read_document(document_path: Option<&PathBuf>) -> CliResult<String> {
    match document_path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(String::new()),
    }
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

/// Text responses are either the text itself or an `{"error": ...}` object.
fn component_text(response: String) -> CliResult<String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&response)
        && let Some(error) = map.get("error").and_then(Value::as_str)
    {
        return Err(error.into());
    }
    Ok(response)
}

fn run_review(
    spec_path: PathBuf,
    document_path: Option<PathBuf>,
    format: ReviewFormat,
) -> CliResult<()> {
    let spec = load_spec(&spec_path)?;
    let document = read_document(document_path.as_ref())?;
    match format {
        ReviewFormat::Text => {
            let text = component_text(render_review_text(
                &spec.form_id,
                &spec.config_json,
                &document,
            ))?;
            println!("{}", text);
        }
        ReviewFormat::Json => {
            let value = parse_component_result(&render_review_json(
                &spec.form_id,
                &spec.config_json,
                &document,
            ))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

fn run_yaml(
    spec_path: PathBuf,
    document_path: Option<PathBuf>,
    submitted: bool,
) -> CliResult<()> {
    let spec = load_spec(&spec_path)?;
    let document = read_document(document_path.as_ref())?;
    let yaml = if submitted {
        let response =
            parse_component_result(&submission(&spec.form_id, &spec.config_json, &document))?;
        to_display_text(&response["document"])?
    } else {
        component_text(render_yaml(&spec.form_id, &spec.config_json, &document))?
    };
    print!("{}", yaml);
    Ok(())
}

fn run_validate(spec_path: PathBuf, document_path: PathBuf) -> CliResult<()> {
    let spec_json = fs::read_to_string(spec_path)?;
    let spec: FormSpec = serde_json::from_str(&spec_json)?;
    let document_json = fs::read_to_string(document_path)?;
    let document: Value = serde_json::from_str(&document_json)?;

    let result = validate(&spec, &document);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  {} ({}) - {}", error.key, error.path, error.message);
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required values: {}",
            result.missing_required.join(", ")
        );
    }
    let failing: Vec<_> = result
        .steps
        .iter()
        .filter(|(_, has_error)| **has_error)
        .map(|(step, _)| step.as_str())
        .collect();
    if !failing.is_empty() {
        println!("Steps with problems: {}", failing.join(", "));
    }
}

/// Accepts JSON, falling back to a plain string for bare words.
fn parse_value_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run_set(
    spec_path: PathBuf,
    document_path: Option<PathBuf>,
    path: &str,
    raw_value: &str,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let spec = load_spec(&spec_path)?;
    let document = read_document(document_path.as_ref())?;
    let value = parse_value_arg(raw_value).to_string();
    let response = parse_component_result(&set_value(
        &spec.form_id,
        &spec.config_json,
        &document,
        path,
        &value,
    ))?;

    let validation: ValidationResult = serde_json::from_value(response["validation"].clone())?;
    if !validation.valid {
        eprintln!("Document still has problems:");
        for error in &validation.errors {
            eprintln!("  {} - {}", error.key, error.message);
        }
        for key in &validation.missing_required {
            eprintln!("  {} - This is a required field.", key);
        }
    }

    let pretty = serde_json::to_string_pretty(&response["document"])?;
    match out {
        Some(out) => fs::write(out, format!("{}\n", pretty))?,
        None => println!("{}", pretty),
    }
    Ok(())
}

fn run_visibility(
    spec_path: PathBuf,
    document_path: Option<PathBuf>,
    mode: VisibilityArg,
) -> CliResult<()> {
    let spec = load_spec(&spec_path)?;
    let document = read_document(document_path.as_ref())?;
    let map = parse_component_result(&get_visibility(
        &spec.form_id,
        &spec.config_json,
        &document,
        mode.as_str(),
    ))?;
    let entries = map.as_object().ok_or("visibility response is not an object")?;
    for (key, visible) in entries {
        let state = if visible.as_bool() == Some(true) {
            "shown"
        } else {
            "hidden"
        };
        println!("{} = {}", key, state);
    }
    Ok(())
}

fn run_walk(
    spec_path: PathBuf,
    document_path: Option<PathBuf>,
    verbose: bool,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let spec_json = fs::read_to_string(spec_path)?;
    let spec: FormSpec = serde_json::from_str(&spec_json)?;
    let mut session = match document_path {
        Some(path) => {
            let document: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
            WizardSession::with_document(spec, document)
        }
        None => WizardSession::new(spec),
    };

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));
    presenter.show_header(&session.spec().title, session.spec().description.as_deref());

    loop {
        let step_id = match session.current_step() {
            Cursor::Step(step_id) => step_id.clone(),
            Cursor::Review => break,
        };
        prompt_step(&mut session, &step_id, &presenter)?;
        match session.next_step().map(|_| ()) {
            Ok(()) => {}
            Err(SessionError::StepInvalid(step)) => {
                eprintln!("Step '{}' has problems:", step);
                let validation = session.validate();
                presenter.show_validation(&validation);
                let blocked = session
                    .spec()
                    .step(&step)
                    .map(|spec| array_problems(spec, &validation))
                    .unwrap_or_default();
                if !blocked.is_empty() {
                    return Err(format!(
                        "step '{}' needs values the text walk cannot edit: {}",
                        step,
                        blocked.join(", ")
                    )
                    .into());
                }
            }
            Err(error) => return Err(error.into()),
        }
    }

    let review = session.review()?;
    presenter.show_review(&review_text(&review));

    let mut submitted = None;
    session.submit(|document| {
        serde_json::to_string_pretty(document)
            .map(|pretty| submitted = Some(pretty))
            .map_err(|error| error.to_string())
    })?;
    let submitted = submitted.ok_or("wizard did not produce a document")?;
    match out {
        Some(out) => {
            fs::write(&out, format!("{}\n", submitted))?;
            presenter.show_completion(&format!("Document written to {}", out.display()));
        }
        None => presenter.show_completion(&submitted),
    }
    Ok(())
}

/// Problem keys of a step that belong to array inputs, which are never prompted.
fn array_problems(step: &StepSpec, validation: &ValidationResult) -> Vec<String> {
    let arrays: Vec<&str> = step.arrays().into_iter().map(|array| array.id.as_str()).collect();
    validation
        .errors
        .iter()
        .map(|error| error.key.as_str())
        .chain(validation.missing_required.iter().map(String::as_str))
        .filter(|key| {
            arrays
                .iter()
                .any(|id| key == id || key.starts_with(&format!("{id}-")))
        })
        .map(str::to_string)
        .collect()
}

/// Prompts every shown input of the step once, re-checking visibility after each answer.
fn prompt_step(
    session: &mut WizardSession,
    step_id: &str,
    presenter: &WizardPresenter,
) -> CliResult<()> {
    let visible_steps: Vec<String> = session
        .visible_steps()
        .iter()
        .map(|step| step.id.clone())
        .collect();
    let index = visible_steps
        .iter()
        .position(|id| id == step_id)
        .map_or(1, |position| position + 1);
    let step = session
        .spec()
        .step(step_id)
        .ok_or_else(|| format!("unknown step '{}'", step_id))?;
    let visible_inputs: Vec<&InputSpec> = step
        .inputs()
        .into_iter()
        .filter(|input| session.is_rendered(&input.id))
        .collect();
    let label = if step.label.is_empty() {
        step.id.as_str()
    } else {
        step.label.as_str()
    };
    presenter.show_step(index, visible_steps.len(), label, &visible_inputs);

    let mut prompted = BTreeSet::new();
    loop {
        let next = session.spec().step(step_id).and_then(|step| {
            step.inputs()
                .into_iter()
                .find(|input| session.is_rendered(&input.id) && !prompted.contains(&input.id))
                .cloned()
        });
        let Some(input) = next else {
            return Ok(());
        };
        prompted.insert(input.id.clone());

        let current = input.bound_path().get(session.item()).cloned();
        let prompt = prompt_context(&input, current.as_ref());
        if let Some(value) = prompt_input(&input, current.as_ref(), &prompt, presenter)? {
            session.set_value(&input.bound_path(), value)?;
        }
    }
}

fn prompt_context(input: &InputSpec, current: Option<&Value>) -> PromptContext {
    let choices: Vec<String> = input
        .options
        .iter()
        .map(|option| option.label().to_string())
        .collect();
    PromptContext {
        label: input.display_label().to_string(),
        description: input.description.clone(),
        required: input.required,
        hint: describe_type_hint(input),
        current: current
            .filter(|value| !is_missing_or_empty(Some(*value)))
            .map(display_value),
        choices,
    }
}

fn describe_type_hint(input: &InputSpec) -> Option<String> {
    match input.kind {
        InputKind::Number => Some("(number)".into()),
        InputKind::Checkbox => Some("(yes/no)".into()),
        InputKind::KeyValue => Some("(key=value, comma separated)".into()),
        InputKind::MultiSelect | InputKind::Strings => Some("(comma separated)".into()),
        InputKind::Select | InputKind::Radio | InputKind::Tiles if !input.options.is_empty() => {
            let values: Vec<String> = input
                .options
                .iter()
                .map(|option| display_value(&option.value()))
                .collect();
            Some(format!("({})", values.join("/")))
        }
        _ => None,
    }
}

fn prompt_input(
    input: &InputSpec,
    current: Option<&Value>,
    prompt: &PromptContext,
    presenter: &WizardPresenter,
) -> CliResult<Option<Value>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Err("unexpected end of input".into());
        }

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }

        match parse_answer(input, current, trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

/// Converts typed text to a value for the input; blank keeps the current value.
fn parse_answer(
    input: &InputSpec,
    current: Option<&Value>,
    raw: &str,
) -> Result<Option<Value>, AnswerParseError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value = match input.kind {
        InputKind::Text | InputKind::TextArea => Value::String(raw.to_string()),
        InputKind::Number => parse_number(raw)?,
        InputKind::Checkbox => parse_checkbox(raw, current)?,
        InputKind::Select | InputKind::Radio | InputKind::Tiles => parse_choice(input, raw)?,
        InputKind::MultiSelect | InputKind::Strings => {
            let items = raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| {
                    if input.options.is_empty() {
                        Ok(Value::String(item.to_string()))
                    } else {
                        parse_choice(input, item)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        }
        InputKind::KeyValue => parse_key_values(raw)?,
    };
    Ok(Some(value))
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Number(integer.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| AnswerParseError::new("expected a number", Some(format!("got '{}'", raw))))
}

/// Checkboxes bound to string values (like annotations) stay strings.
fn parse_checkbox(raw: &str, current: Option<&Value>) -> Result<Value, AnswerParseError> {
    let flag = match raw.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => true,
        "n" | "no" | "false" => false,
        _ => {
            return Err(AnswerParseError::new(
                "expected yes or no",
                Some("y, yes, true, n, no, false".into()),
            ));
        }
    };
    if current.is_some_and(Value::is_string) {
        Ok(Value::String(flag.to_string()))
    } else {
        Ok(Value::Bool(flag))
    }
}

fn parse_choice(input: &InputSpec, raw: &str) -> Result<Value, AnswerParseError> {
    if input.options.is_empty() {
        return Ok(Value::String(raw.to_string()));
    }
    input
        .options
        .iter()
        .find(|option| {
            display_value(&option.value()) == raw || option.label().eq_ignore_ascii_case(raw)
        })
        .map(|option| option.value())
        .ok_or_else(|| {
            let choices: Vec<String> = input
                .options
                .iter()
                .map(|option| display_value(&option.value()))
                .collect();
            AnswerParseError::new(
                format!("'{}' is not one of the choices", raw),
                Some(choices.join(", ")),
            )
        })
}

fn parse_key_values(raw: &str) -> Result<Value, AnswerParseError> {
    let mut map = Map::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AnswerParseError::new(
                format!("'{}' is not a key=value pair", pair),
                Some("key=value[,key=value]".into()),
            )
        })?;
        map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(Value::Object(map))
}
