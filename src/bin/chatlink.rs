use anyhow::Result;
use chatlink::api::ChatClient;
use chatlink::config::Config;
use chatlink::session::{coerce_field_input, ChatSession, ExchangeOutcome, SessionUpdate};
use chatlink::types::{FieldSchema, InterruptPayload, Sender, ToolFormSchema};
use chatlink::util::parse_bool_str;
use serde_json::{Map, Value};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;
    config.validate()?;

    let client = ChatClient::new(&config);
    println!(
        "chatlink - talking to '{}' at {}",
        config.agent_id,
        client.endpoint()
    );
    println!("/reset clears the conversation, /quit exits.");

    let mut session = ChatSession::new(client, &config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(line) = prompt_line(&mut lines, "> ").await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("(conversation cleared)");
                continue;
            }
            _ => {}
        }

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_updates(update_rx));

        let mut outcome = session.submit_user_message(&line, Some(&update_tx)).await?;
        while outcome == ExchangeOutcome::Interrupted {
            match walk_interrupt(&mut session, &mut lines, &update_tx).await? {
                Some(next) => outcome = next,
                None => break,
            }
        }

        drop(update_tx);
        let _ = printer.await;
    }

    Ok(())
}

/// Prints agent output as it streams, then finishes the line once the full
/// message lands in the transcript.
async fn print_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    let mut printed = String::new();
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::AgentDelta { content } => {
                print!("{content}");
                let _ = std::io::stdout().flush();
                printed.push_str(&content);
            }
            SessionUpdate::MessageAppended(message) if message.sender == Sender::Agent => {
                if message.content.is_empty() && printed.is_empty() {
                    continue;
                }
                match message.content.strip_prefix(printed.as_str()) {
                    Some(tail) => print!("{tail}"),
                    None => {
                        // a synthetic error message replaces whatever streamed
                        if !printed.is_empty() {
                            println!();
                        }
                        print!("{}", message.content);
                    }
                }
                println!();
                let _ = std::io::stdout().flush();
                printed.clear();
            }
            _ => {}
        }
    }
}

async fn prompt_line(lines: &mut InputLines, prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

/// Runs one round of interrupt resolution. Returns the outcome of the resumed
/// exchange, or `None` when the user dismissed the interrupt.
async fn walk_interrupt(
    session: &mut ChatSession,
    lines: &mut InputLines,
    updates: &mpsc::UnboundedSender<SessionUpdate>,
) -> Result<Option<ExchangeOutcome>> {
    let Some(pending) = session.pending_interrupt() else {
        return Ok(None);
    };
    let payload = pending.payload.clone();

    match payload {
        InterruptPayload::ToolApprove { tool } => {
            println!("The agent wants to run the tool '{tool}'.");
            let Some(answer) = prompt_line(lines, "approve? [y/N] ").await? else {
                session.cancel_interrupt();
                return Ok(None);
            };
            let normalized = answer.trim().to_ascii_lowercase();
            let approved = normalized == "y" || parse_bool_str(&normalized).unwrap_or(false);
            let outcome = session.resolve_approval(approved, Some(updates)).await?;
            Ok(Some(outcome))
        }
        InterruptPayload::ToolInputForm {
            tool,
            schema,
            current_values,
        } => {
            println!("The tool '{tool}' needs more input. Leave a field empty to skip it.");
            loop {
                let Some(values) = collect_form_values(lines, &schema, &current_values).await?
                else {
                    session.cancel_interrupt();
                    println!("(input form dismissed)");
                    return Ok(None);
                };
                let outcome = session.resolve_form(&values, Some(updates)).await?;
                if let ExchangeOutcome::Rejected { missing } = &outcome {
                    println!("Still required: {}.", missing.join(", "));
                    continue;
                }
                return Ok(Some(outcome));
            }
        }
    }
}

/// Prompts for each form field in schema order. Returns `None` on EOF.
async fn collect_form_values(
    lines: &mut InputLines,
    schema: &ToolFormSchema,
    current_values: &Map<String, Value>,
) -> Result<Option<Map<String, Value>>> {
    let mut values = current_values.clone();
    for (name, field) in &schema.properties {
        let required = schema.required.contains(name);
        let Some(input) = prompt_line(lines, &field_prompt(name, field, required)).await? else {
            return Ok(None);
        };
        if input.trim().is_empty() {
            continue;
        }
        values.insert(name.clone(), coerce_field_input(field, &input));
    }
    Ok(Some(values))
}

fn field_prompt(name: &str, field: &FieldSchema, required: bool) -> String {
    let mut prompt = String::from(name);
    if required {
        prompt.push('*');
    }
    if let Some(description) = &field.description {
        prompt.push_str(&format!(" ({description})"));
    }
    if let Some(choices) = &field.choices {
        prompt.push_str(&format!(" [{}]", choices.join("/")));
    }
    if let Some(default) = &field.default {
        prompt.push_str(&format!(" (default: {default})"));
    }
    prompt.push_str(": ");
    prompt
}
