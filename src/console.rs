//! Line-based interactive chat

use instructa_agent::ChatSession;
use instructa_core::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Exit,
    Reset,
    ShowInstructions,
    ClearInstructions,
    Skip,
    Say(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Self::Skip,
            "exit" => Self::Exit,
            "reset" => Self::Reset,
            "show_instructions" => Self::ShowInstructions,
            "clear_instructions" => Self::ClearInstructions,
            _ => Self::Say(trimmed.to_string()),
        }
    }
}

pub const BANNER: &str = "Type 'exit' to quit, 'reset' to clear the history, \
'show_instructions' to list active instructions, 'clear_instructions' to drop them.\n";

const PROMPT: &str = "you: ";

/// Drive `session` from `reader` until `exit` or end of input.
pub async fn run_console<R, W>(session: &mut ChatSession, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(BANNER.as_bytes()).await?;
    let mut lines = reader.lines();
    loop {
        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;
        let Some(line) = lines.next_line().await? else {
            writer.write_all(b"\n").await?;
            break;
        };

        let text = match ConsoleCommand::parse(&line) {
            ConsoleCommand::Exit => break,
            ConsoleCommand::Skip => continue,
            ConsoleCommand::Reset => {
                session.reset_history();
                "system: conversation history cleared\n".to_string()
            }
            ConsoleCommand::ClearInstructions => {
                session.clear_instructions();
                "system: active instructions cleared\n".to_string()
            }
            ConsoleCommand::ShowInstructions => {
                let mut out = String::from("active instructions:\n");
                for (i, inst) in session.active_instructions().iter().enumerate() {
                    out.push_str(&format!("{}. [{}] {}\n", i + 1, inst.name, inst.description));
                }
                out
            }
            ConsoleCommand::Say(input) => {
                let outcome = session.respond(&input).await;
                format!("assistant: {}\n\n", outcome.reply)
            }
        };
        writer.write_all(text.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}
