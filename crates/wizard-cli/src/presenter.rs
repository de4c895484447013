use wizard_spec::{InputSpec, ValidationResult};

/// Controls which bits of state the walk prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: step headers and prompts only.
    Clean,
    /// Verbose output: visible inputs, option lists, validation codes.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and progress while walking the wizard steps.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, title: &str, description: Option<&str>) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", title);
        if self.verbosity.is_verbose()
            && let Some(description) = description
        {
            println!("Help: {}", description);
        }
        self.header_printed = true;
    }

    pub fn show_step(
        &self,
        index: usize,
        total: usize,
        label: &str,
        visible_inputs: &[&InputSpec],
    ) {
        println!("Step {}/{}: {}", index, total, label);
        if self.verbosity.is_verbose() {
            println!("Visible inputs:");
            for input in visible_inputs {
                let mut entry = format!(" - {} ({})", input.id, input.display_label());
                if input.required {
                    entry.push_str(" [required]");
                }
                println!("{}", entry);
            }
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = prompt.label.clone();
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(current) = &prompt.current {
            line.push_str(&format!(" [{}]", current));
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation(&self, result: &ValidationResult) {
        for error in &result.errors {
            if self.verbosity.is_verbose() {
                eprintln!("  {} - {} ({})", error.key, error.message, error.code);
            } else {
                eprintln!("  {} - {}", error.key, error.message);
            }
        }
        for key in &result.missing_required {
            eprintln!("  {} - This is a required field.", key);
        }
    }

    pub fn show_review(&self, review_text: &str) {
        println!("{}", review_text);
    }

    pub fn show_completion(&self, document: &str) {
        println!("Done ✅");
        println!("{}", document);
    }
}

/// Everything needed to print one input prompt.
pub struct PromptContext {
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub current: Option<String>,
    pub choices: Vec<String>,
}

#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}
