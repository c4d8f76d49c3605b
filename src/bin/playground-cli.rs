use clap::Parser;
use colored::*;
use llm_playground::chat::ReasoningEffort;
use llm_playground::config::{Connection, PlaygroundConfig};
use llm_playground::models::Models;
use llm_playground::playground::Submission;
use llm_playground::session::{TurnSlot, DEFAULT_EXPORT_FILE};
use llm_playground::settings::{Chain, Settings};
use llm_playground::{LLMError, Playground};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spinners::{Spinner, Spinners};
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

/// Command line arguments for the playground
#[derive(Parser)]
#[clap(
    name = "playground",
    about = "Interactive playground for chat-style LLM prompting",
    allow_hyphen_values = true
)]
struct CliArgs {
    /// Prompt to submit once without entering the interactive session
    #[arg(index = 1)]
    prompt: Option<String>,

    /// Model name (gpt-4o, gpt-4o-mini, o1, o3-mini, develop-debugging)
    #[arg(long)]
    model: Option<String>,

    /// Sampling chain (top-probability, high-temperature)
    #[arg(long)]
    chain: Option<String>,

    /// Temperature, within the chain's range
    #[arg(long)]
    temperature: Option<f32>,

    /// Top_p, within the chain's range
    #[arg(long)]
    top_p: Option<f32>,

    /// Replay memory turns and store new turns as memory
    #[arg(long)]
    memory: bool,

    /// Replay memory turns without storing new ones
    #[arg(long)]
    read_only: bool,

    /// System message to prepend to every request
    #[arg(long)]
    system: Option<String>,

    /// Reasoning effort for o1/o3-mini (low, medium, high)
    #[arg(long)]
    reasoning_effort: Option<String>,

    /// Expected model response when using develop-debugging
    #[arg(long)]
    expect: Option<String>,

    /// API key, defaults to OPENAI_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL for the API
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Configuration file, defaults to ~/.llm-playground/config.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the chat history to this file on exit
    #[arg(long)]
    save: Option<PathBuf>,
}

/// What the REPL does after a command.
enum Flow {
    Continue,
    Quit,
}

/// Builds the playground from the config file overlaid with command line flags.
fn build_playground(args: &CliArgs) -> Result<Playground, LLMError> {
    let config = match &args.config {
        Some(path) => PlaygroundConfig::load(path)?,
        None => PlaygroundConfig::load_default()?,
    };
    let mut settings = config.to_settings()?;

    if let Some(model) = &args.model {
        settings.model = model.parse()?;
    }
    if let Some(chain) = &args.chain {
        settings.set_chain(chain.parse()?);
    }
    if let Some(temperature) = args.temperature {
        settings.set_temperature(temperature)?;
    }
    if let Some(top_p) = args.top_p {
        settings.set_top_p(top_p)?;
    }
    if args.memory {
        settings.write_memory = true;
    }
    if args.read_only {
        settings.read_only_memory = true;
    }
    if let Some(system) = &args.system {
        settings.set_system_message(system.clone());
    }
    if let Some(effort) = &args.reasoning_effort {
        settings.reasoning_effort = effort.parse()?;
    }

    let api_key = args.api_key.clone().or(Connection::from_env().api_key);
    let mut connection = config.connection(api_key);
    if let Some(url) = &args.base_url {
        connection.base_url = Some(url.clone());
    }
    if let Some(timeout) = args.timeout {
        connection.timeout_seconds = Some(timeout);
    }

    Ok(Playground::new(settings, connection))
}

fn on_off(value: bool) -> ColoredString {
    if value {
        "on".bright_green()
    } else {
        "off".bright_black()
    }
}

fn parse_on_off(arg: &str) -> Result<bool, LLMError> {
    match arg.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(LLMError::InvalidRequest(format!(
            "expected on or off, got '{other}'"
        ))),
    }
}

fn parse_float(arg: &str) -> Result<f32, LLMError> {
    arg.trim()
        .parse()
        .map_err(|_| LLMError::InvalidRequest(format!("'{arg}' is not a number")))
}

fn print_separator() {
    println!("{}", "─".repeat(50).bright_black());
}

fn print_settings(settings: &Settings) {
    println!("{}", "LLM Settings:".bright_cyan());
    println!("  model            {}", settings.model.name().bright_green());
    println!("  chain            {}", settings.chain());
    let range = settings.chain().temperature_range();
    println!(
        "  temperature      {:.1}  ({:.1}..={:.1})",
        settings.temperature(),
        range.start(),
        range.end()
    );
    println!("  top_p            {:.1}  (0.1..=1.0)", settings.top_p());
    if settings.model.is_reasoning() {
        println!("  reasoning effort {}", settings.reasoning_effort);
    }
    println!("  write memory     {}", on_off(settings.write_memory));
    println!("  read-only memory {}", on_off(settings.read_only_memory));
    match settings.system() {
        Some(system) => println!("  system message   {}", system),
        None => println!("  system message   {}", on_off(false)),
    }
}

fn print_history(playground: &Playground) {
    if playground.session.is_empty() {
        println!("{}", "No turns yet.".bright_black());
        return;
    }
    for (number, slot) in playground.session.history() {
        match slot {
            TurnSlot::Pending => {
                println!("{} {}", format!("turn {number}").bright_yellow(), "(no response)".bright_red())
            }
            TurnSlot::Complete(turn) => {
                let memory = if turn.metadata.memory { " [memory]" } else { "" };
                println!(
                    "{}{} {} {}",
                    format!("turn {number}").bright_yellow(),
                    memory.bright_magenta(),
                    turn.metadata.model_name.bright_green(),
                    turn.metadata.timestamp.bright_black()
                );
                println!("  {} {}", "human:".bright_blue(), turn.human);
                println!("  {} {}", "ai:".bright_green(), turn.ai);
            }
        }
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_cyan());
    for (cmd, desc) in [
        ("/settings", "show the current settings"),
        ("/models", "list the models"),
        ("/model [name]", "show or select the model"),
        ("/chain <name>", "top-probability or high-temperature (resets sampling)"),
        ("/temperature <x>", "set the temperature"),
        ("/top-p <x>", "set top_p"),
        ("/memory on|off", "write memory"),
        ("/read-only on|off", "read-only memory"),
        ("/system <text>|off", "set or disable the system message"),
        ("/effort low|medium|high", "reasoning effort for o1/o3-mini"),
        ("/expect <text>", "expected response for the next develop-debugging turn"),
        ("/history", "show all turns"),
        ("/save [path]", "write the chat history as JSON"),
        ("/reset", "start a new session"),
        ("/copy", "copy the last response to the clipboard"),
        ("exit", "quit"),
    ] {
        println!("  {:<26} {}", cmd.bright_white(), desc.bright_black());
    }
}

fn print_submission(submission: &Submission) {
    println!("{} {}", "> Assistant:".bright_green(), submission.turn.ai);
    if let Some(usage) = &submission.usage {
        println!(
            "{}",
            format!(
                "turn {} · {} prompt + {} completion tokens",
                submission.number, usage.prompt_tokens, usage.completion_tokens
            )
            .bright_black()
        );
    }
}

fn copy_to_clipboard(text: &str) -> Result<(), LLMError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| LLMError::Generic(format!("clipboard: {e}")))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| LLMError::Generic(format!("clipboard: {e}")))
}

/// A parsed slash command.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Help,
    Settings,
    Models,
    Model(&'a str),
    Chain(&'a str),
    Temperature(&'a str),
    TopP(&'a str),
    Memory(&'a str),
    ReadOnly(&'a str),
    System(Option<&'a str>),
    Effort(&'a str),
    Expect(&'a str),
    History,
    Save(&'a str),
    Reset,
    Copy,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };

        match cmd {
            "/help" => Command::Help,
            "/settings" => Command::Settings,
            "/models" => Command::Models,
            "/model" if arg.is_empty() => Command::Models,
            "/model" => Command::Model(arg),
            "/chain" => Command::Chain(arg),
            "/temperature" => Command::Temperature(arg),
            "/top-p" | "/top_p" => Command::TopP(arg),
            "/memory" => Command::Memory(arg),
            "/read-only" => Command::ReadOnly(arg),
            "/system" if arg.is_empty() || arg.eq_ignore_ascii_case("off") => Command::System(None),
            "/system" => Command::System(Some(arg)),
            "/effort" => Command::Effort(arg),
            "/expect" => Command::Expect(arg),
            "/history" => Command::History,
            "/save" if arg.is_empty() => Command::Save(DEFAULT_EXPORT_FILE),
            "/save" => Command::Save(arg),
            "/reset" => Command::Reset,
            "/copy" => Command::Copy,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other),
        }
    }
}

fn print_models(current: Models) {
    for model in Models::ALL {
        let marker = if model == current { "*" } else { " " };
        println!("{} {}", marker.bright_green(), model);
    }
}

/// Runs a slash command against the playground.
fn handle_command(
    playground: &mut Playground,
    rl: &mut DefaultEditor,
    expected: &mut Option<String>,
    line: &str,
) -> Result<Flow, Box<dyn std::error::Error>> {
    match Command::parse(line) {
        Command::Help => print_help(),
        Command::Settings => print_settings(&playground.settings),
        Command::Models => print_models(playground.settings.model),
        Command::Model(name) => {
            playground.settings.model = name.parse()?;
            println!("Model: {}", playground.settings.model.name().bright_green());
        }
        Command::Chain(name) => {
            let chain: Chain = name.parse()?;
            playground.settings.set_chain(chain);
            println!(
                "Chain: {} (temperature {:.1}, top_p {:.1})",
                chain,
                playground.settings.temperature(),
                playground.settings.top_p()
            );
        }
        Command::Temperature(arg) => playground.settings.set_temperature(parse_float(arg)?)?,
        Command::TopP(arg) => playground.settings.set_top_p(parse_float(arg)?)?,
        Command::Memory(arg) => playground.settings.write_memory = parse_on_off(arg)?,
        Command::ReadOnly(arg) => playground.settings.read_only_memory = parse_on_off(arg)?,
        Command::System(None) => playground.settings.disable_system_message(),
        Command::System(Some(text)) => playground.settings.set_system_message(text),
        Command::Effort(arg) => {
            playground.settings.reasoning_effort = arg.parse::<ReasoningEffort>()?
        }
        Command::Expect(text) => *expected = Some(text.to_string()),
        Command::History => print_history(playground),
        Command::Save(path) => {
            playground.export(path)?;
            println!("{} History written to {}", "✓".bright_green(), path);
        }
        Command::Reset => {
            let answer = rl.readline("Do you want to reset the session? [y/N] ")?;
            if answer.trim().eq_ignore_ascii_case("y") {
                playground.reset();
                *expected = None;
                println!("{} Session reset.", "✓".bright_green());
            }
        }
        Command::Copy => {
            copy_to_clipboard(playground.session.output())?;
            println!("{} Copied.", "✓".bright_green());
        }
        Command::Quit => return Ok(Flow::Quit),
        Command::Unknown(other) => eprintln!(
            "{} Unknown command '{}', try /help",
            "Error:".bright_red(),
            other
        ),
    }
    Ok(Flow::Continue)
}

/// Outcome of asking for the develop-debugging response.
#[derive(Debug, PartialEq, Eq)]
enum ExpectedInput {
    Response(String),
    /// Ctrl-C: drop this submission
    Skip,
    /// Ctrl-D: leave the session
    Quit,
}

impl ExpectedInput {
    fn from_readline(result: Result<String, ReadlineError>) -> Result<Self, ReadlineError> {
        match result {
            Ok(text) => Ok(ExpectedInput::Response(text)),
            Err(ReadlineError::Interrupted) => Ok(ExpectedInput::Skip),
            Err(ReadlineError::Eof) => Ok(ExpectedInput::Quit),
            Err(err) => Err(err),
        }
    }
}

/// Submits one prompt, showing a spinner while a remote model answers.
async fn submit(
    playground: &mut Playground,
    prompt: &str,
    expected: Option<String>,
) -> Result<Submission, LLMError> {
    if !playground.settings.model.is_remote() {
        return playground.submit(prompt, expected).await;
    }
    let mut sp = Spinner::new(
        Spinners::Dots12,
        "Request sent to the model - Please wait...".bright_magenta().to_string(),
    );
    let result = playground.submit(prompt, None).await;
    sp.stop();
    print!("\r\x1B[K");
    result
}

/// Main entry point for the playground
///
/// Runs a single prompt when one is given or stdin is piped, otherwise starts
/// the interactive session.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    llm_playground::init_logging();
    let args = CliArgs::parse();
    let mut playground = build_playground(&args)?;

    let is_pipe = !io::stdin().is_terminal();

    if is_pipe || args.prompt.is_some() {
        let mut input = String::new();
        if is_pipe {
            io::stdin().read_to_string(&mut input)?;
        }
        let prompt = match &args.prompt {
            Some(p) if !input.trim().is_empty() => format!("{p}\n\n{input}"),
            Some(p) => p.clone(),
            None => input,
        };

        let submission = playground.submit(&prompt, args.expect.clone()).await?;
        println!("{}", submission.turn.ai);
        if let Some(path) = &args.save {
            playground.export(path)?;
        }
        return Ok(());
    }

    println!("{}", "LLM playground - Freestyle Prompting".bright_cyan());
    print_settings(&playground.settings);
    println!("{}", "Type /help for commands, 'exit' to quit".bright_black());
    print_separator();

    let mut rl = DefaultEditor::new()?;
    let mut expected = args.expect.clone();

    loop {
        io::stdout().flush()?;
        let label = format!("Turn {} input> ", playground.session.next_turn_label());
        let readline = rl.readline(&label);
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.eq_ignore_ascii_case("exit") {
                    break;
                }
                let _ = rl.add_history_entry(trimmed);

                if trimmed.starts_with('/') {
                    match handle_command(&mut playground, &mut rl, &mut expected, trimmed) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Quit) => break,
                        Err(e) => eprintln!("{} {}", "Error:".bright_red(), e),
                    }
                    continue;
                }

                let expected_response = if playground.settings.model.is_remote() {
                    None
                } else if let Some(text) = expected.take() {
                    Some(text)
                } else {
                    match ExpectedInput::from_readline(rl.readline("Model response> ")) {
                        Ok(ExpectedInput::Response(text)) => Some(text),
                        Ok(ExpectedInput::Skip) => {
                            println!();
                            continue;
                        }
                        Ok(ExpectedInput::Quit) => {
                            println!();
                            break;
                        }
                        Err(err) => {
                            eprintln!("{} {:?}", "Error:".bright_red(), err);
                            break;
                        }
                    }
                };

                match submit(&mut playground, trimmed, expected_response).await {
                    Ok(submission) => print_submission(&submission),
                    Err(e) => eprintln!("{} {}", "Error:".bright_red(), e),
                }
                print_separator();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".bright_red(), err);
                break;
            }
        }
    }

    if let Some(path) = &args.save {
        playground.export(path)?;
        println!("{} History written to {}", "✓".bright_green(), path.display());
    }
    println!("{}", "Goodbye!".bright_cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_command_lists_models() {
        assert_eq!(Command::parse("/models"), Command::Models);
        assert_eq!(Command::parse("/model"), Command::Models);
        assert_eq!(Command::parse("/model  o1 "), Command::Model("o1"));
    }

    #[test]
    fn test_command_arguments() {
        assert_eq!(Command::parse("/system off"), Command::System(None));
        assert_eq!(Command::parse("/system"), Command::System(None));
        assert_eq!(
            Command::parse("/system Be brief."),
            Command::System(Some("Be brief."))
        );
        assert_eq!(Command::parse("/save"), Command::Save(DEFAULT_EXPORT_FILE));
        assert_eq!(Command::parse("/save out.json"), Command::Save("out.json"));
        assert_eq!(Command::parse("/top_p 0.5"), Command::TopP("0.5"));
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope"));
    }

    #[test]
    fn test_interrupted_response_prompt_does_not_abort() {
        assert_eq!(
            ExpectedInput::from_readline(Ok("42".into())).unwrap(),
            ExpectedInput::Response("42".into())
        );
        assert_eq!(
            ExpectedInput::from_readline(Err(ReadlineError::Interrupted)).unwrap(),
            ExpectedInput::Skip
        );
        assert_eq!(
            ExpectedInput::from_readline(Err(ReadlineError::Eof)).unwrap(),
            ExpectedInput::Quit
        );
    }

    #[test]
    fn test_on_off_parsing() {
        assert!(parse_on_off("ON").unwrap());
        assert!(!parse_on_off("off").unwrap());
        assert!(parse_on_off("maybe").is_err());
    }
}
