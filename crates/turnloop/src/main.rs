//! A simple program demonstrates how to use `turnloop` as a library.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;
use turnloop::core::AgentStage;
use turnloop::core::conversation::Conversation;
use turnloop::{SessionBuilder, ToolsConfig};
use turnloop_model::Turn;
use turnloop_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

enum SessionEvent {
    Stage(AgentStage),
    ToolCall(String, String),
}

struct Args {
    transcript: bool,
    assistant_text: Option<String>,
    prompt: Vec<String>,
}

const BAR_CHAR: &str = "▎";
const USAGE: &str = "usage: turnloop [--transcript] [MESSAGE...]
       turnloop --assistant-text TRANSCRIPT.json";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    if let Some(path) = &args.assistant_text {
        return print_assistant_text(path);
    }

    let Some(config) = OpenAIConfigBuilder::from_env() else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return ExitCode::FAILURE;
    };
    let model_provider = OpenAIProvider::new(config.build());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_system_prompt(include_str!("./system_prompt.md").trim_end())
        .with_tools_config(ToolsConfig::from_env())
        .on_stage({
            let event_tx = event_tx.clone();
            move |stage| {
                event_tx.send(SessionEvent::Stage(stage)).ok();
            }
        })
        .on_turn({
            let event_tx = event_tx.clone();
            move |turn| {
                for call in turn.tool_calls() {
                    event_tx
                        .send(SessionEvent::ToolCall(
                            call.function.name.clone(),
                            call.function.arguments.clone(),
                        ))
                        .ok();
                }
            }
        })
        .build();

    let prompt = if args.prompt.is_empty() {
        print!("Enter a message: ");
        std::io::stdout().flush().ok();
        match read_line().await {
            Some(line) => line,
            None => return ExitCode::FAILURE,
        }
    } else {
        args.prompt.join(" ")
    };
    let prompt = prompt.trim();
    if prompt.is_empty() {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("🤔 Thinking...");

    let mut run = pin!(session.send_message(prompt));
    let result = loop {
        let tick = sleep(Duration::from_millis(100));
        select! {
            result = &mut run => break result,
            Some(event) = event_rx.recv() => match event {
                SessionEvent::Stage(AgentStage::AwaitingModel) => {
                    progress_bar.set_message("🤔 Thinking...");
                }
                SessionEvent::Stage(AgentStage::ExecutingTools) => {
                    progress_bar.set_message("🔧 Running tools...");
                }
                SessionEvent::Stage(_) => {}
                SessionEvent::ToolCall(name, arguments) => {
                    progress_bar.suspend(|| {
                        println!(
                            "{}🔧 {} {}",
                            BAR_CHAR.bright_yellow(),
                            name.bright_white().bold(),
                            arguments.dimmed()
                        );
                    });
                }
            },
            _ = tick => progress_bar.tick(),
        }
    };
    progress_bar.finish_and_clear();

    match result {
        Ok(output) => {
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                output.answer().bright_white()
            );
            if args.transcript {
                print_transcript(output.conversation());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}❌ {}", BAR_CHAR.bright_red(), err.bright_red());
            if args.transcript {
                print_transcript(err.conversation());
            }
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Option<Args> {
    let mut args = Args {
        transcript: false,
        assistant_text: None,
        prompt: vec![],
    };
    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--transcript" => args.transcript = true,
            "--assistant-text" => args.assistant_text = Some(argv.next()?),
            flag if flag.starts_with("--") => return None,
            _ => args.prompt.push(arg),
        }
    }
    Some(args)
}

fn print_assistant_text(path: &str) -> ExitCode {
    let conversation = std::fs::File::open(path)
        .map_err(|err| err.to_string())
        .and_then(|file| {
            Conversation::from_reader(std::io::BufReader::new(file))
                .map_err(|err| err.to_string())
        });
    match conversation {
        Ok(conversation) => {
            println!("{}", conversation.assistant_text());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", format!("cannot load `{path}`: {err}").red());
            ExitCode::FAILURE
        }
    }
}

fn print_transcript(conversation: &Conversation) {
    println!("\n{}", "Conversation:".bright_white().bold());
    for turn in conversation.turns() {
        let role = turn.role().to_string();
        let text = match turn {
            Turn::Assistant { tool_calls, .. } if !tool_calls.is_empty() => {
                tool_calls
                    .iter()
                    .map(|call| {
                        format!(
                            "{}({})",
                            call.function.name, call.function.arguments
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            }
            _ => turn.content().unwrap_or_default().to_owned(),
        };
        println!("{}{:>9}: {text}", BAR_CHAR.dimmed(), role.bright_magenta());
    }
    println!("\n{}", conversation.to_json_pretty().dimmed());
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
